use std::cmp::Ordering;
use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::MoleculeId;

/// Descriptors shown first, in this order, when present.
pub const DESCRIPTOR_PRIORITY: &[&str] = &[
    "NumAtoms",
    "MolWt",
    "LogP",
    "TPSA",
    "NumHDonors",
    "NumHAcceptors",
    "NumRotatableBonds",
    "NumAromaticRings",
];

const SUCCESS_STATUS: &str = "success";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeRecord {
    pub molecule_id: MoleculeId,
    pub smiles: String,
    pub descriptors: BTreeMap<String, f64>,
    #[serde(rename = "NumAtoms")]
    pub num_atoms: f64,
    pub docking_score: Option<f64>,
    pub docked_pdb_path: Option<String>,
}

impl MoleculeRecord {
    pub fn descriptor(&self, name: &str) -> Option<f64> {
        self.descriptors.get(name).copied()
    }

    pub fn ordered_descriptors(&self) -> Vec<(&str, f64)> {
        let mut ordered = DESCRIPTOR_PRIORITY
            .iter()
            .filter_map(|name| self.descriptor(name).map(|value| (*name, value)))
            .collect::<Vec<_>>();
        ordered.extend(
            self.descriptors
                .iter()
                .filter(|(name, _)| !DESCRIPTOR_PRIORITY.contains(&name.as_str()))
                .map(|(name, value)| (name.as_str(), *value)),
        );
        ordered
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(MoleculeRecord),
    NotSuccess,
    Incomplete,
}

pub fn classify(value: Value) -> Verdict {
    let Value::Object(object) = value else {
        debug!("discarding non-object record");
        return Verdict::NotSuccess;
    };

    match object.get("status").and_then(Value::as_str) {
        Some(SUCCESS_STATUS) => {}
        status => {
            debug!(status = status.unwrap_or("<missing>"), "discarding record");
            return Verdict::NotSuccess;
        }
    }

    let Some(smiles) = object
        .get("smiles")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|smiles| !smiles.is_empty())
    else {
        warn!("success record without smiles");
        return Verdict::Incomplete;
    };

    let molecule_id = object
        .get("molecule_number")
        .and_then(MoleculeId::from_json)
        .unwrap_or_else(|| MoleculeId::from_smiles(smiles));

    let descriptors = object
        .get("descriptors")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(name, value)| value.as_f64().map(|number| (name.clone(), number)))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    let num_atoms = descriptors.get("NumAtoms").copied().unwrap_or(0.0);
    let docking_score = object
        .get("docking_score")
        .and_then(Value::as_f64)
        .filter(|score| score.is_finite());
    let docked_pdb_path = object
        .get("docked_pdb_path")
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(str::to_string);

    Verdict::Accepted(MoleculeRecord {
        molecule_id,
        smiles: smiles.to_string(),
        descriptors,
        num_atoms,
        docking_score,
        docked_pdb_path,
    })
}

pub fn normalize(value: Value) -> Option<MoleculeRecord> {
    match classify(value) {
        Verdict::Accepted(record) => Some(record),
        Verdict::NotSuccess | Verdict::Incomplete => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    #[default]
    Arrival,
    Smiles,
    NumAtoms,
    DockingScore,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Arrival => "arrival",
            SortKey::Smiles => "smiles",
            SortKey::NumAtoms => "atoms",
            SortKey::DockingScore => "docking",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortKey::Arrival => SortKey::Smiles,
            SortKey::Smiles => SortKey::NumAtoms,
            SortKey::NumAtoms => SortKey::DockingScore,
            SortKey::DockingScore => SortKey::Arrival,
        }
    }
}

/// Stable sort. Records without a docking score stay at the end either way.
pub fn sort_records(records: &mut [MoleculeRecord], key: SortKey, descending: bool) {
    let directed = |ordering: Ordering| {
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    };
    match key {
        SortKey::Arrival => {
            if descending {
                records.reverse();
            }
        }
        SortKey::Smiles => records.sort_by(|a, b| directed(a.smiles.cmp(&b.smiles))),
        SortKey::NumAtoms => {
            records.sort_by(|a, b| directed(a.num_atoms.total_cmp(&b.num_atoms)))
        }
        SortKey::DockingScore => records.sort_by(|a, b| match (a.docking_score, b.docking_score) {
            (Some(x), Some(y)) => directed(x.total_cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
    }
}
