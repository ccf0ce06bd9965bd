use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SelectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    #[default]
    Pdb,
    Cif,
    Bcif,
}

impl StructureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StructureFormat::Pdb => "pdb",
            StructureFormat::Cif => "cif",
            StructureFormat::Bcif => "bcif",
        }
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// UniProt accession (or any upstream sequence key). Treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProteinId(String);

impl ProteinId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProteinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProteinId {
    type Err = SelectorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(SelectorError::InvalidProteinId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// PDB entry id, canonicalised to lower case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StructureId(String);

impl StructureId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self, format: StructureFormat) -> String {
        format!("{}.{}", self.0, format.extension())
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StructureId {
    type Err = SelectorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = normalized.len() == 4
            && normalized.starts_with(|ch: char| ch.is_ascii_digit())
            && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(SelectorError::InvalidStructureId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentalMethod {
    Xray,
    Em,
    Nmr,
    Unknown,
    Other(String),
}

impl ExperimentalMethod {
    /// Maps an RCSB `exptl.method` string. Matching is case-insensitive.
    pub fn from_rcsb(method: &str) -> Self {
        match method.trim().to_uppercase().as_str() {
            "X-RAY DIFFRACTION" => ExperimentalMethod::Xray,
            "ELECTRON MICROSCOPY" => ExperimentalMethod::Em,
            "SOLUTION NMR" => ExperimentalMethod::Nmr,
            "" | "UNKNOWN" => ExperimentalMethod::Unknown,
            other => ExperimentalMethod::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ExperimentalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentalMethod::Xray => write!(f, "X-RAY DIFFRACTION"),
            ExperimentalMethod::Em => write!(f, "ELECTRON MICROSCOPY"),
            ExperimentalMethod::Nmr => write!(f, "SOLUTION NMR"),
            ExperimentalMethod::Unknown => write!(f, "UNKNOWN"),
            ExperimentalMethod::Other(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateStructure {
    pub structure_id: StructureId,
    pub source_rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureMetadata {
    pub method: ExperimentalMethod,
    pub citation_count: u64,
    pub polymer_coverage: f64,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn structure_id_is_lowercased() {
        let id: StructureId = " 1ABC ".parse().unwrap();
        assert_eq!(id.as_str(), "1abc");
        assert_eq!(id.file_name(StructureFormat::Pdb), "1abc.pdb");
    }

    #[test]
    fn structure_id_rejects_bad_shapes() {
        assert_matches!(
            "abcd".parse::<StructureId>(),
            Err(SelectorError::InvalidStructureId(_))
        );
        assert_matches!(
            "1ab".parse::<StructureId>(),
            Err(SelectorError::InvalidStructureId(_))
        );
        assert_matches!(
            "1a-c".parse::<StructureId>(),
            Err(SelectorError::InvalidStructureId(_))
        );
    }

    #[test]
    fn protein_id_is_opaque_but_trimmed() {
        let id: ProteinId = "  P69905-2 ".parse().unwrap();
        assert_eq!(id.as_str(), "P69905-2");
        assert_matches!("   ".parse::<ProteinId>(), Err(SelectorError::InvalidProteinId(_)));
    }

    #[test]
    fn method_mapping() {
        assert_eq!(
            ExperimentalMethod::from_rcsb("x-ray diffraction"),
            ExperimentalMethod::Xray
        );
        assert_eq!(
            ExperimentalMethod::from_rcsb("ELECTRON MICROSCOPY"),
            ExperimentalMethod::Em
        );
        assert_eq!(
            ExperimentalMethod::from_rcsb("SOLUTION NMR"),
            ExperimentalMethod::Nmr
        );
        assert_eq!(
            ExperimentalMethod::from_rcsb("NEUTRON DIFFRACTION"),
            ExperimentalMethod::Other("NEUTRON DIFFRACTION".to_string())
        );
    }
}
