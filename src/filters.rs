use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MolgenError;

pub const DEFAULT_NUM_MOLECULES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterProperty {
    #[serde(rename = "mw")]
    MolecularWeight,
    #[serde(rename = "hbd")]
    HBondDonors,
    #[serde(rename = "hba")]
    HBondAcceptors,
    #[serde(rename = "logp")]
    LogP,
    #[serde(rename = "tpsa")]
    Tpsa,
    #[serde(rename = "num_o")]
    NumOxygen,
    #[serde(rename = "num_n")]
    NumNitrogen,
    #[serde(rename = "num_s")]
    NumSulfur,
    #[serde(rename = "num_cl")]
    NumChlorine,
    #[serde(rename = "num_f")]
    NumFluorine,
    #[serde(rename = "rot_bonds")]
    RotatableBonds,
    #[serde(rename = "max_ring")]
    MaxRingSize,
    #[serde(rename = "num_stereo")]
    NumStereocenters,
    #[serde(rename = "num_aromatic_rings")]
    NumAromaticRings,
}

impl FilterProperty {
    pub const ALL: [FilterProperty; 14] = [
        FilterProperty::MolecularWeight,
        FilterProperty::HBondDonors,
        FilterProperty::HBondAcceptors,
        FilterProperty::LogP,
        FilterProperty::Tpsa,
        FilterProperty::NumOxygen,
        FilterProperty::NumNitrogen,
        FilterProperty::NumSulfur,
        FilterProperty::NumChlorine,
        FilterProperty::NumFluorine,
        FilterProperty::RotatableBonds,
        FilterProperty::MaxRingSize,
        FilterProperty::NumStereocenters,
        FilterProperty::NumAromaticRings,
    ];

    /// Field prefix used in the multipart form (`<name>_min`, `<name>_max`).
    pub fn wire_name(self) -> &'static str {
        match self {
            FilterProperty::MolecularWeight => "mw",
            FilterProperty::HBondDonors => "hbd",
            FilterProperty::HBondAcceptors => "hba",
            FilterProperty::LogP => "logp",
            FilterProperty::Tpsa => "tpsa",
            FilterProperty::NumOxygen => "num_o",
            FilterProperty::NumNitrogen => "num_n",
            FilterProperty::NumSulfur => "num_s",
            FilterProperty::NumChlorine => "num_cl",
            FilterProperty::NumFluorine => "num_f",
            FilterProperty::RotatableBonds => "rot_bonds",
            FilterProperty::MaxRingSize => "max_ring",
            FilterProperty::NumStereocenters => "num_stereo",
            FilterProperty::NumAromaticRings => "num_aromatic_rings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterProperty::MolecularWeight => "Molecular Weight (MW)",
            FilterProperty::HBondDonors => "Hydrogen Bond Donor (HBD)",
            FilterProperty::HBondAcceptors => "Hydrogen Bond Acceptor (HBA)",
            FilterProperty::LogP => "Octanol-water Partition Coefficient (LogP)",
            FilterProperty::Tpsa => "TopoPSA",
            FilterProperty::NumOxygen => "Number of Oxygen atoms",
            FilterProperty::NumNitrogen => "Number of Nitrogen atoms",
            FilterProperty::NumSulfur => "Number of Sulfur atoms",
            FilterProperty::NumChlorine => "Number of Chlorine atoms",
            FilterProperty::NumFluorine => "Number of Fluorine atoms",
            FilterProperty::RotatableBonds => "Number of Rotatable Bonds",
            FilterProperty::MaxRingSize => "Maximum Ring Size",
            FilterProperty::NumStereocenters => "Number of Stereocenters",
            FilterProperty::NumAromaticRings => "Number of Aromatic Rings",
        }
    }

    pub fn default_interval(self) -> Interval {
        match self {
            FilterProperty::MolecularWeight => Interval::raw(250.0, 750.0),
            FilterProperty::LogP => Interval::raw(-2.0, 6.0),
            FilterProperty::Tpsa => Interval::raw(0.0, 100.0),
            _ => Interval::raw(0.0, 10.0),
        }
    }

    /// Slider range offered by the configuration view.
    pub fn range(self) -> Interval {
        match self {
            FilterProperty::MolecularWeight => Interval::raw(0.0, 900.0),
            other => other.default_interval(),
        }
    }

    /// Rule-of-five related properties, shown as the first group.
    pub fn is_ro5(self) -> bool {
        matches!(
            self,
            FilterProperty::MolecularWeight
                | FilterProperty::HBondDonors
                | FilterProperty::HBondAcceptors
                | FilterProperty::LogP
        )
    }
}

impl fmt::Display for FilterProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl FromStr for FilterProperty {
    type Err = MolgenError;

    /// Accepts wire names (`num_aromatic_rings`) as well as camelCase keys
    /// (`numAromaticRings`, `logP`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let folded = value.trim().replace('_', "").to_ascii_lowercase();
        FilterProperty::ALL
            .into_iter()
            .find(|property| property.wire_name().replace('_', "") == folded)
            .ok_or_else(|| MolgenError::InvalidFilter(format!("unknown property `{value}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    min: f64,
    max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

impl Interval {
    const fn raw(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn new(a: f64, b: f64) -> Result<Self, MolgenError> {
        check_finite(a)?;
        check_finite(b)?;
        Ok(if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Raising the lower bound past the upper one swaps the pair.
    pub fn set_min(&mut self, value: f64) -> Result<(), MolgenError> {
        check_finite(value)?;
        if value > self.max {
            self.min = self.max;
            self.max = value;
        } else {
            self.min = value;
        }
        Ok(())
    }

    pub fn set_max(&mut self, value: f64) -> Result<(), MolgenError> {
        check_finite(value)?;
        if value < self.min {
            self.max = self.min;
            self.min = value;
        } else {
            self.max = value;
        }
        Ok(())
    }

    pub fn set(&mut self, bound: Bound, value: f64) -> Result<(), MolgenError> {
        match bound {
            Bound::Min => self.set_min(value),
            Bound::Max => self.set_max(value),
        }
    }
}

fn check_finite(value: f64) -> Result<(), MolgenError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MolgenError::InvalidFilter(format!("bound must be finite, got {value}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterConfig {
    num_molecules: u32,
    bounds: BTreeMap<FilterProperty, Interval>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            num_molecules: DEFAULT_NUM_MOLECULES,
            bounds: FilterProperty::ALL
                .into_iter()
                .map(|property| (property, property.default_interval()))
                .collect(),
        }
    }
}

impl FilterConfig {
    pub fn num_molecules(&self) -> u32 {
        self.num_molecules
    }

    pub fn set_num_molecules(&mut self, value: u32) -> Result<(), MolgenError> {
        if value == 0 {
            return Err(MolgenError::InvalidFilter(
                "num_molecules must be at least 1".to_string(),
            ));
        }
        self.num_molecules = value;
        Ok(())
    }

    pub fn interval(&self, property: FilterProperty) -> Interval {
        self.bounds
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_interval())
    }

    pub fn set_interval(&mut self, property: FilterProperty, interval: Interval) {
        self.bounds.insert(property, interval);
    }

    pub fn set_bound(
        &mut self,
        property: FilterProperty,
        bound: Bound,
        value: f64,
    ) -> Result<(), MolgenError> {
        let mut interval = self.interval(property);
        interval.set(bound, value)?;
        self.bounds.insert(property, interval);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterProperty, Interval)> + '_ {
        FilterProperty::ALL
            .into_iter()
            .map(|property| (property, self.interval(property)))
    }

    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::with_capacity(1 + FilterProperty::ALL.len() * 2);
        fields.push(("num_molecules".to_string(), self.num_molecules.to_string()));
        for (property, interval) in self.iter() {
            let name = property.wire_name();
            fields.push((format!("{name}_min"), format_bound(interval.min())));
            fields.push((format!("{name}_max"), format_bound(interval.max())));
        }
        fields
    }
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn raising_min_above_max_reorders() {
        let mut interval = Interval::new(0.0, 10.0).unwrap();
        interval.set_min(12.0).unwrap();
        assert_eq!(interval.min(), 10.0);
        assert_eq!(interval.max(), 12.0);
    }

    #[test]
    fn lowering_max_below_min_reorders() {
        let mut interval = Interval::new(250.0, 750.0).unwrap();
        interval.set_max(100.0).unwrap();
        assert_eq!(interval.min(), 100.0);
        assert_eq!(interval.max(), 250.0);
    }

    #[test]
    fn inverted_constructor_reorders() {
        let interval = Interval::new(6.0, -2.0).unwrap();
        assert_eq!((interval.min(), interval.max()), (-2.0, 6.0));
    }

    #[test]
    fn non_finite_bound_rejected() {
        let mut interval = Interval::new(0.0, 1.0).unwrap();
        assert_matches!(interval.set_max(f64::NAN), Err(MolgenError::InvalidFilter(_)));
        assert_eq!(interval.max(), 1.0);
    }

    #[test]
    fn parse_property_names() {
        assert_eq!("logP".parse::<FilterProperty>().unwrap(), FilterProperty::LogP);
        assert_eq!(
            "numAromaticRings".parse::<FilterProperty>().unwrap(),
            FilterProperty::NumAromaticRings
        );
        assert_eq!("num_cl".parse::<FilterProperty>().unwrap(), FilterProperty::NumChlorine);
        assert_matches!(
            "qed".parse::<FilterProperty>(),
            Err(MolgenError::InvalidFilter(_))
        );
    }

    #[test]
    fn form_fields_cover_every_property() {
        let config = FilterConfig::default();
        let fields = config.form_fields();
        assert_eq!(fields.len(), 1 + 14 * 2);
        assert_eq!(fields[0], ("num_molecules".to_string(), "10".to_string()));
        assert!(fields.contains(&("mw_min".to_string(), "250".to_string())));
        assert!(fields.contains(&("logp_min".to_string(), "-2".to_string())));
        assert!(fields.contains(&("num_aromatic_rings_max".to_string(), "10".to_string())));
    }

    #[test]
    fn fractional_bounds_keep_precision() {
        let mut config = FilterConfig::default();
        config
            .set_bound(FilterProperty::LogP, Bound::Max, 4.5)
            .unwrap();
        assert!(
            config
                .form_fields()
                .contains(&("logp_max".to_string(), "4.5".to_string()))
        );
    }

    #[test]
    fn zero_molecules_rejected() {
        let mut config = FilterConfig::default();
        assert_matches!(config.set_num_molecules(0), Err(MolgenError::InvalidFilter(_)));
        assert_eq!(config.num_molecules(), DEFAULT_NUM_MOLECULES);
    }
}
