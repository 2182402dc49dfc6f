use std::fmt;

use camino::Utf8Path;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MolgenError;
use crate::fs_util::read_structure_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    #[default]
    Pdb,
    Pdbqt,
}

impl StructureFormat {
    /// Anything that is not `.pdbqt` is treated as plain PDB.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let stem = lower.strip_suffix(".gz").unwrap_or(&lower);
        if stem.ends_with(".pdbqt") {
            StructureFormat::Pdbqt
        } else {
            StructureFormat::Pdb
        }
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureFormat::Pdb => write!(f, "pdb"),
            StructureFormat::Pdbqt => write!(f, "pdbqt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedStructure {
    pub name: String,
    pub format: StructureFormat,
    pub content: Vec<u8>,
}

impl UploadedStructure {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Result<Self, MolgenError> {
        let name = name.into();
        let content = content.into();
        if content.iter().all(|byte| byte.is_ascii_whitespace()) {
            return Err(MolgenError::InvalidStructure(format!("{name} is empty")));
        }
        Ok(Self {
            format: StructureFormat::from_file_name(&name),
            name,
            content,
        })
    }

    pub fn from_path(path: &Utf8Path) -> Result<Self, MolgenError> {
        let content = read_structure_bytes(path)?;
        let file_name = path
            .file_name()
            .ok_or_else(|| MolgenError::InvalidStructure(path.to_string()))?;
        let name = file_name.strip_suffix(".gz").unwrap_or(file_name);
        Self::new(name, content)
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructureList {
    items: Vec<UploadedStructure>,
}

impl StructureList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, structure: UploadedStructure) {
        self.items.push(structure);
    }

    pub fn remove(&mut self, index: usize) -> Option<UploadedStructure> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadedStructure> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[UploadedStructure] {
        &self.items
    }
}

impl FromIterator<UploadedStructure> for StructureList {
    fn from_iter<T: IntoIterator<Item = UploadedStructure>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoleculeId(String);

impl MoleculeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Key for records without a molecule number. Prefixed so it cannot
    /// collide with a number the service sent as a string.
    pub fn from_smiles(smiles: &str) -> Self {
        Self(format!("smiles:{smiles}"))
    }

    /// Integral numbers and their string spelling map to the same id.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Some(Self(int.to_string()))
                } else if let Some(uint) = number.as_u64() {
                    Some(Self(uint.to_string()))
                } else {
                    number.as_f64().map(|float| Self(float.to_string()))
                }
            }
            Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoleculeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
