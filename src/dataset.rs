use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::DatasetOptions;
use crate::container::ContainerEngine;
use crate::domain::Modality;
use crate::error::ReaderError;
use crate::experiment::{ExperimentNode, ReadOptions, read_experiment};
use crate::matrix::{MatrixEngine, MultiMatrix, NativeEngine};
use crate::modality::{
    MaterializePlan, PrimaryIds, ResolvedExperiment, extract_primary_ids, materialize,
    resolve_experiment,
};
use crate::navigator::Navigator;
use crate::store::StorageBackend;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSummary {
    pub name: String,
    pub features: Table,
    pub assay_names: Vec<String>,
}

pub(crate) fn summarize_experiments(root: &ExperimentNode) -> Vec<ExperimentSummary> {
    ResolvedExperiment::all(root)
        .into_iter()
        .map(|resolved| ExperimentSummary {
            name: resolved.name.to_string(),
            features: resolved.experiment.row_data.clone(),
            assay_names: resolved.experiment.assay_names.clone(),
        })
        .collect()
}

pub(crate) fn cells_of(root: &ExperimentNode) -> Table {
    root.column_data
        .clone()
        .unwrap_or_else(|| Table::new(root.columns))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub experiments: Vec<ExperimentSummary>,
    pub cells: Table,
}

#[derive(Debug)]
pub struct LoadedDataset<M> {
    pub matrix: MultiMatrix<M>,
    pub features: BTreeMap<Modality, Table>,
    pub cells: Table,
    pub primary_ids: BTreeMap<Modality, PrimaryIds>,
}

pub struct DatasetLoader<S, E, M = NativeEngine> {
    path: String,
    navigator: Navigator<S, E>,
    engine: M,
    options: DatasetOptions,
    components: Mutex<Option<Arc<ExperimentNode>>>,
}

impl<S: StorageBackend, E: ContainerEngine> DatasetLoader<S, E, NativeEngine> {
    pub fn new(path: impl Into<String>, backend: S, container_engine: E) -> Self {
        Self::with_matrix_engine(path, backend, container_engine, NativeEngine)
    }
}

impl<S: StorageBackend, E: ContainerEngine, M: MatrixEngine> DatasetLoader<S, E, M> {
    pub fn with_matrix_engine(
        path: impl Into<String>,
        backend: S,
        container_engine: E,
        matrix_engine: M,
    ) -> Self {
        Self {
            path: path.into(),
            navigator: Navigator::new(backend, container_engine),
            engine: matrix_engine,
            options: DatasetOptions::default(),
            components: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: DatasetOptions) {
        self.options = options;
    }

    pub fn navigator(&self) -> &Navigator<S, E> {
        &self.navigator
    }

    pub fn clear(&self) {
        self.navigator.clear();
        *self
            .components
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn components(&self) -> Result<Arc<ExperimentNode>, ReaderError> {
        let mut guard = self
            .components
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = guard.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let options = ReadOptions {
            include_column_data: true,
            include_metadata: false,
            include_reduced_dimension_names: false,
        };
        let node = Arc::new(read_experiment(&self.path, &self.navigator, &options)?);
        *guard = Some(Arc::clone(&node));
        Ok(node)
    }

    fn finish<T>(&self, result: Result<T, ReaderError>, cache: bool) -> Result<T, ReaderError> {
        if !cache {
            self.clear();
        }
        result
    }

    pub fn summary(&self, cache: bool) -> Result<DatasetSummary, ReaderError> {
        let result = self.components().map(|root| DatasetSummary {
            experiments: summarize_experiments(&root),
            cells: cells_of(&root),
        });
        self.finish(result, cache)
    }

    pub fn preview_primary_ids(
        &self,
        cache: bool,
    ) -> Result<BTreeMap<Modality, PrimaryIds>, ReaderError> {
        let result = self.components().map(|root| {
            Modality::ALL
                .into_iter()
                .filter_map(|modality| {
                    let resolved = resolve_experiment(&root, self.options.experiment(modality))?;
                    let ids = extract_primary_ids(
                        &resolved.experiment.row_data,
                        self.options.primary_id_column(modality),
                    )?;
                    Some((modality, ids))
                })
                .collect()
        });
        self.finish(result, cache)
    }

    pub fn load(&self, cache: bool) -> Result<LoadedDataset<M::Matrix>, ReaderError> {
        let result = self.components().and_then(|root| self.load_from(&root));
        self.finish(result, cache)
    }

    fn load_from(&self, root: &ExperimentNode) -> Result<LoadedDataset<M::Matrix>, ReaderError> {
        let mut plans = Vec::new();
        let mut features = BTreeMap::new();
        let mut primary_ids = BTreeMap::new();

        for modality in Modality::ALL {
            let Some(resolved) = resolve_experiment(root, self.options.experiment(modality)) else {
                tracing::debug!(%modality, "modality not present");
                continue;
            };
            tracing::debug!(%modality, experiment = resolved.name, "resolved modality");

            let row_data = &resolved.experiment.row_data;
            features.insert(modality, row_data.clone());
            if let Some(ids) = extract_primary_ids(row_data, self.options.primary_id_column(modality)) {
                primary_ids.insert(modality, ids);
            }
            plans.push(MaterializePlan {
                key: modality.to_string(),
                source: resolved,
                assay: self.options.count_assay(modality).clone(),
                force_integer: true,
                log_normalize: !self.options.normalized(modality),
                size_factor_column: self
                    .options
                    .size_factor_column(modality)
                    .map(str::to_string),
            });
        }

        let matrix = materialize(&plans, &self.navigator, &self.engine)?;
        Ok(LoadedDataset {
            matrix,
            features,
            cells: cells_of(root),
            primary_ids,
        })
    }
}
