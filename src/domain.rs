use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "RNA")]
    Rna,
    #[serde(rename = "ADT")]
    Adt,
    #[serde(rename = "CRISPR")]
    Crispr,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Rna, Modality::Adt, Modality::Crispr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Rna => "RNA",
            Modality::Adt => "ADT",
            Modality::Crispr => "CRISPR",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ReaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RNA" => Ok(Modality::Rna),
            "ADT" => Ok(Modality::Adt),
            "CRISPR" => Ok(Modality::Crispr),
            _ => Err(ReaderError::ConfigParse(format!("unknown modality '{value}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    Index(i64),
    Name(String),
}

impl Selector {
    pub fn name(value: impl Into<String>) -> Self {
        Selector::Name(value.into())
    }
}

impl From<i64> for Selector {
    fn from(value: i64) -> Self {
        Selector::Index(value)
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Selector::Name(value.to_string())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "{index}"),
            Selector::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl FromStr for Selector {
    type Err = ReaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.parse::<i64>() {
            Ok(index) => Ok(Selector::Index(index)),
            Err(_) => Ok(Selector::Name(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeFactorSource {
    Enabled(bool),
    Column(String),
}

pub const DEFAULT_SIZE_FACTOR_COLUMN: &str = "sizeFactor";

impl SizeFactorSource {
    pub fn column(&self) -> Option<&str> {
        match self {
            SizeFactorSource::Enabled(true) => Some(DEFAULT_SIZE_FACTOR_COLUMN),
            SizeFactorSource::Enabled(false) => None,
            SizeFactorSource::Column(name) => Some(name),
        }
    }
}

impl Default for SizeFactorSource {
    fn default() -> Self {
        SizeFactorSource::Enabled(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayKind {
    DenseArray,
    CompressedSparseMatrix,
    Other(String),
}

impl ArrayKind {
    pub fn from_type(value: &str) -> Self {
        match value {
            "dense_array" => ArrayKind::DenseArray,
            "compressed_sparse_matrix" => ArrayKind::CompressedSparseMatrix,
            other => ArrayKind::Other(other.to_string()),
        }
    }

    pub fn is_matrix_supported(&self) -> bool {
        matches!(self, ArrayKind::DenseArray | ArrayKind::CompressedSparseMatrix)
    }
}

impl fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKind::DenseArray => write!(f, "dense_array"),
            ArrayKind::CompressedSparseMatrix => write!(f, "compressed_sparse_matrix"),
            ArrayKind::Other(other) => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    #[default]
    Hdf5,
    JsonGz,
}

impl FromStr for ListFormat {
    type Err = ReaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hdf5" => Ok(ListFormat::Hdf5),
            "json.gz" => Ok(ListFormat::JsonGz),
            other => Err(ReaderError::UnknownListFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_modality_case_insensitive() {
        let modality: Modality = "adt".parse().unwrap();
        assert_eq!(modality, Modality::Adt);
        assert_eq!(modality.to_string(), "ADT");
    }

    #[test]
    fn parse_selector_prefers_index() {
        assert_eq!("-1".parse::<Selector>().unwrap(), Selector::Index(-1));
        assert_eq!(
            "Antibody Capture".parse::<Selector>().unwrap(),
            Selector::name("Antibody Capture")
        );
    }

    #[test]
    fn parse_list_format_invalid() {
        let err = "yaml".parse::<ListFormat>().unwrap_err();
        assert_matches!(err, ReaderError::UnknownListFormat(_));
    }

    #[test]
    fn array_kind_support() {
        assert!(ArrayKind::from_type("dense_array").is_matrix_supported());
        assert!(ArrayKind::from_type("compressed_sparse_matrix").is_matrix_supported());
        assert!(!ArrayKind::from_type("delayed_array").is_matrix_supported());
    }
}
