use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::domain::{StructureFormat, UploadedStructure};
use crate::error::MolgenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    #[default]
    Cartoon,
    Surface,
    Spacefill,
    Licorice,
    Line,
    #[value(name = "ball+stick")]
    #[serde(rename = "ball+stick")]
    BallAndStick,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Representation::Cartoon => "cartoon",
            Representation::Surface => "surface",
            Representation::Spacefill => "spacefill",
            Representation::Licorice => "licorice",
            Representation::Line => "line",
            Representation::BallAndStick => "ball+stick",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
pub enum ColorScheme {
    #[default]
    #[serde(rename = "chainindex")]
    ChainIndex,
    #[serde(rename = "element")]
    Element,
    #[serde(rename = "rainbow")]
    Rainbow,
    #[serde(rename = "secondaryStructure")]
    SecondaryStructure,
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorScheme::ChainIndex => "chainindex",
            ColorScheme::Element => "element",
            ColorScheme::Rainbow => "rainbow",
            ColorScheme::SecondaryStructure => "secondaryStructure",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DisplayStyle {
    pub representation: Representation,
    pub color_scheme: ColorScheme,
    pub show_water: bool,
    pub show_ions: bool,
}

/// A live rendering resource. Dropping it releases the resource.
pub trait ViewerHandle {
    fn restyle(&mut self, style: &DisplayStyle);
}

pub trait StructureViewer {
    type Handle: ViewerHandle;

    fn load(
        &self,
        structure: &UploadedStructure,
        style: &DisplayStyle,
    ) -> Result<Self::Handle, MolgenError>;
}

/// Owns one viewer handle per displayed structure, index-aligned with the
/// structure list it mirrors.
pub struct ViewerSession<V: StructureViewer> {
    viewer: V,
    style: DisplayStyle,
    handles: Vec<V::Handle>,
}

impl<V: StructureViewer> ViewerSession<V> {
    pub fn new(viewer: V, style: DisplayStyle) -> Self {
        Self {
            viewer,
            style,
            handles: Vec::new(),
        }
    }

    pub fn style(&self) -> DisplayStyle {
        self.style
    }

    pub fn handles(&self) -> &[V::Handle] {
        &self.handles
    }

    pub fn show(&mut self, structure: &UploadedStructure) -> Result<(), MolgenError> {
        let handle = self.viewer.load(structure, &self.style)?;
        self.handles.push(handle);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> bool {
        if index < self.handles.len() {
            self.handles.remove(index);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.handles.clear();
    }

    pub fn restyle(&mut self, style: DisplayStyle) {
        self.style = style;
        for handle in &mut self.handles {
            handle.restyle(&style);
        }
    }

    pub fn toggle_water(&mut self) {
        let mut style = self.style;
        style.show_water = !style.show_water;
        self.restyle(style);
    }

    pub fn toggle_ions(&mut self) {
        let mut style = self.style;
        style.show_ions = !style.show_ions;
        self.restyle(style);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureSummary {
    pub name: String,
    pub format: StructureFormat,
    pub atoms: usize,
    pub hetero_atoms: usize,
    pub residues: usize,
    pub chains: Vec<String>,
    pub waters: usize,
    pub ions: usize,
}

const WATER_RESIDUES: &[&str] = &["HOH", "WAT", "H2O", "DOD"];
const ION_RESIDUES: &[&str] = &[
    "NA", "K", "CL", "MG", "CA", "ZN", "MN", "FE", "CU", "CO", "NI", "CD", "LI", "BR", "IOD",
];

/// Reads ATOM/HETATM records using the fixed PDB columns, which PDBQT
/// shares.
pub fn summarize(structure: &UploadedStructure) -> StructureSummary {
    let text = structure.text();
    let mut summary = StructureSummary {
        name: structure.name.clone(),
        format: structure.format,
        ..StructureSummary::default()
    };
    let mut chains = BTreeSet::new();
    let mut residues = BTreeSet::new();
    let mut waters = BTreeSet::new();
    let mut ions = BTreeSet::new();

    for line in text.lines() {
        let is_atom = line.starts_with("ATOM  ");
        let is_hetero = line.starts_with("HETATM");
        if !is_atom && !is_hetero {
            continue;
        }
        let res_name = column(line, 17, 20);
        let chain = column(line, 21, 22);
        let res_seq = column(line, 22, 27);
        let key = (chain.to_string(), res_seq.to_string(), res_name.to_string());

        if is_atom {
            summary.atoms += 1;
        } else {
            summary.hetero_atoms += 1;
        }
        if !chain.is_empty() {
            chains.insert(chain.to_string());
        }
        if WATER_RESIDUES.contains(&res_name) {
            waters.insert(key);
        } else if is_hetero && ION_RESIDUES.contains(&res_name) {
            ions.insert(key);
        } else {
            residues.insert(key);
        }
    }

    summary.residues = residues.len();
    summary.waters = waters.len();
    summary.ions = ions.len();
    summary.chains = chains.into_iter().collect();
    summary
}

fn column(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len()))
        .unwrap_or("")
        .trim()
}

/// Text-only viewer used by the terminal UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryViewer;

#[derive(Debug, Clone)]
pub struct SummaryHandle {
    pub summary: StructureSummary,
    pub style: DisplayStyle,
}

impl SummaryHandle {
    /// One-line description honoring the water and ion toggles.
    pub fn describe(&self) -> String {
        let mut parts = vec![
            format!("{} atoms", self.summary.atoms),
            format!("{} residues", self.summary.residues),
            format!("chains {}", self.summary.chains.join(",")),
        ];
        if self.style.show_water {
            parts.push(format!("{} waters", self.summary.waters));
        }
        if self.style.show_ions {
            parts.push(format!("{} ions", self.summary.ions));
        }
        parts.join(" · ")
    }
}

impl ViewerHandle for SummaryHandle {
    fn restyle(&mut self, style: &DisplayStyle) {
        self.style = *style;
    }
}

impl StructureViewer for SummaryViewer {
    type Handle = SummaryHandle;

    fn load(
        &self,
        structure: &UploadedStructure,
        style: &DisplayStyle,
    ) -> Result<SummaryHandle, MolgenError> {
        let summary = summarize(structure);
        if summary.atoms + summary.hetero_atoms == 0 {
            return Err(MolgenError::InvalidStructure(format!(
                "{} has no ATOM/HETATM records",
                structure.name
            )));
        }
        Ok(SummaryHandle {
            summary,
            style: *style,
        })
    }
}
