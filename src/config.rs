use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::{Modality, Selector, SizeFactorSource};
use crate::error::ReaderError;

pub const DEFAULT_MAX_REDUCED_DIMENSIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PerModality<T> {
    Uniform(T),
    Mapping(BTreeMap<String, T>),
}

impl<T> PerModality<T> {
    pub fn get(&self, key: &str) -> Option<&T> {
        match self {
            PerModality::Uniform(value) => Some(value),
            PerModality::Mapping(values) => values.get(key),
        }
    }

    fn into_modality_keys(self) -> Result<Self, ReaderError> {
        match self {
            PerModality::Uniform(value) => Ok(PerModality::Uniform(value)),
            PerModality::Mapping(values) => values
                .into_iter()
                .map(|(key, value)| {
                    let modality = key.parse::<Modality>()?;
                    Ok((modality.as_str().to_string(), value))
                })
                .collect::<Result<BTreeMap<_, _>, ReaderError>>()
                .map(PerModality::Mapping),
        }
    }
}

impl<T: Default> Default for PerModality<T> {
    fn default() -> Self {
        PerModality::Uniform(T::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatasetOptions {
    pub rna_count_assay: Selector,
    pub adt_count_assay: Selector,
    pub crispr_count_assay: Selector,
    pub rna_experiment: Option<Selector>,
    pub adt_experiment: Option<Selector>,
    pub crispr_experiment: Option<Selector>,
    pub primary_rna_feature_id_column: Option<Selector>,
    pub primary_adt_feature_id_column: Option<Selector>,
    pub primary_crispr_feature_id_column: Option<Selector>,
    pub is_normalized: PerModality<bool>,
    pub size_factors: PerModality<SizeFactorSource>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            rna_count_assay: Selector::Index(0),
            adt_count_assay: Selector::Index(0),
            crispr_count_assay: Selector::Index(0),
            rna_experiment: Some(Selector::Index(-1)),
            adt_experiment: Some(Selector::name("Antibody Capture")),
            crispr_experiment: Some(Selector::name("CRISPR Guide Capture")),
            primary_rna_feature_id_column: None,
            primary_adt_feature_id_column: None,
            primary_crispr_feature_id_column: None,
            is_normalized: PerModality::Uniform(true),
            size_factors: PerModality::default(),
        }
    }
}

impl DatasetOptions {
    pub fn experiment(&self, modality: Modality) -> Option<&Selector> {
        match modality {
            Modality::Rna => self.rna_experiment.as_ref(),
            Modality::Adt => self.adt_experiment.as_ref(),
            Modality::Crispr => self.crispr_experiment.as_ref(),
        }
    }

    pub fn count_assay(&self, modality: Modality) -> &Selector {
        match modality {
            Modality::Rna => &self.rna_count_assay,
            Modality::Adt => &self.adt_count_assay,
            Modality::Crispr => &self.crispr_count_assay,
        }
    }

    pub fn primary_id_column(&self, modality: Modality) -> Option<&Selector> {
        match modality {
            Modality::Rna => self.primary_rna_feature_id_column.as_ref(),
            Modality::Adt => self.primary_adt_feature_id_column.as_ref(),
            Modality::Crispr => self.primary_crispr_feature_id_column.as_ref(),
        }
    }

    pub fn normalized(&self, modality: Modality) -> bool {
        self.is_normalized
            .get(modality.as_str())
            .copied()
            .unwrap_or(true)
    }

    pub fn size_factor_column(&self, modality: Modality) -> Option<&str> {
        self.size_factors
            .get(modality.as_str())
            .and_then(SizeFactorSource::column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultOptions {
    pub primary_assay: PerModality<Selector>,
    #[serde(alias = "isPrimaryNormalized")]
    pub is_normalized: PerModality<bool>,
    pub size_factors: PerModality<SizeFactorSource>,
    pub reduced_dimension_names: Option<Vec<String>>,
    pub max_reduced_dimensions: usize,
}

impl Default for ResultOptions {
    fn default() -> Self {
        Self {
            primary_assay: PerModality::Uniform(Selector::Index(0)),
            is_normalized: PerModality::Uniform(true),
            size_factors: PerModality::default(),
            reduced_dimension_names: None,
            max_reduced_dimensions: DEFAULT_MAX_REDUCED_DIMENSIONS,
        }
    }
}

impl ResultOptions {
    pub fn assay(&self, experiment: &str) -> Option<&Selector> {
        self.primary_assay.get(experiment)
    }

    pub fn normalized(&self, experiment: &str) -> bool {
        self.is_normalized.get(experiment).copied().unwrap_or(true)
    }

    pub fn size_factor_column(&self, experiment: &str) -> Option<&str> {
        self.size_factors
            .get(experiment)
            .and_then(SizeFactorSource::column)
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub dataset: Option<DatasetOptions>,
    #[serde(default)]
    pub result: Option<ResultOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub dataset: DatasetOptions,
    pub result: ResultOptions,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: impl AsRef<Utf8Path>) -> Result<ResolvedConfig, ReaderError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| ReaderError::ConfigRead(path.to_string()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ReaderError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ReaderError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(ReaderError::ConfigParse(format!(
                "unsupported schema version {schema_version}"
            )));
        }

        let mut dataset = config.dataset.unwrap_or_default();
        dataset.is_normalized = dataset.is_normalized.into_modality_keys()?;
        dataset.size_factors = dataset.size_factors.into_modality_keys()?;

        let result = config.result.unwrap_or_default();
        if result.max_reduced_dimensions == 0 {
            return Err(ReaderError::ConfigParse(
                "maxReducedDimensions must be positive".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            dataset,
            result,
        })
    }
}
