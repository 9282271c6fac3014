use std::sync::{Arc, Mutex, PoisonError};

use crate::array::DenseArray;
use crate::config::ResultOptions;
use crate::container::ContainerEngine;
use crate::dataset::{ExperimentSummary, cells_of, summarize_experiments};
use crate::error::ReaderError;
use crate::experiment::{ExperimentNode, ReadOptions, read_experiment, read_reduced_dimension};
use crate::list::ListValue;
use crate::matrix::{MatrixEngine, MultiMatrix, NativeEngine};
use crate::modality::{MaterializePlan, ResolvedExperiment, materialize};
use crate::navigator::Navigator;
use crate::store::StorageBackend;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub experiments: Vec<ExperimentSummary>,
    pub cells: Table,
    pub reduced_dimension_names: Vec<String>,
    pub other_metadata: ListValue,
}

#[derive(Debug)]
pub struct LoadedResult<M> {
    pub matrix: MultiMatrix<M>,
    pub features: Vec<(String, Table)>,
    pub cells: Table,
    pub reduced_dimensions: Vec<(String, DenseArray)>,
    pub other_metadata: ListValue,
}

pub struct ResultLoader<S, E, M = NativeEngine> {
    path: String,
    navigator: Navigator<S, E>,
    engine: M,
    options: ResultOptions,
    components: Mutex<Option<Arc<ExperimentNode>>>,
}

impl<S: StorageBackend, E: ContainerEngine> ResultLoader<S, E, NativeEngine> {
    pub fn new(path: impl Into<String>, backend: S, container_engine: E) -> Self {
        Self::with_matrix_engine(path, backend, container_engine, NativeEngine)
    }
}

impl<S: StorageBackend, E: ContainerEngine, M: MatrixEngine> ResultLoader<S, E, M> {
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
            options: ResultOptions::default(),
            components: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &ResultOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ResultOptions) {
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
        let node = Arc::new(read_experiment(
            &self.path,
            &self.navigator,
            &ReadOptions::default(),
        )?);
        *guard = Some(Arc::clone(&node));
        Ok(node)
    }

    fn finish<T>(&self, result: Result<T, ReaderError>, cache: bool) -> Result<T, ReaderError> {
        if !cache {
            self.clear();
        }
        result
    }

    pub fn summary(&self, cache: bool) -> Result<ResultSummary, ReaderError> {
        let result = self.components().map(|root| ResultSummary {
            experiments: summarize_experiments(&root),
            cells: cells_of(&root),
            reduced_dimension_names: root.reduced_dimension_names.clone().unwrap_or_default(),
            other_metadata: root.metadata.clone().unwrap_or_else(ListValue::empty),
        });
        self.finish(result, cache)
    }

    pub fn load(&self, cache: bool) -> Result<LoadedResult<M::Matrix>, ReaderError> {
        let result = self.components().and_then(|root| self.load_from(&root));
        self.finish(result, cache)
    }

    fn load_from(&self, root: &ExperimentNode) -> Result<LoadedResult<M::Matrix>, ReaderError> {
        let mut reduced_dimensions = Vec::new();
        if let Some(available) = &root.reduced_dimension_names {
            let requested = self
                .options
                .reduced_dimension_names
                .as_ref()
                .unwrap_or(available);
            for name in requested {
                let block = read_reduced_dimension(
                    &root.path,
                    name,
                    &self.navigator,
                    Some(self.options.max_reduced_dimensions),
                )?;
                reduced_dimensions.push((name.clone(), block));
            }
        }

        let mut plans = Vec::new();
        let mut features = Vec::new();
        for resolved in ResolvedExperiment::all(root) {
            let Some(assay) = self.options.assay(resolved.name) else {
                tracing::debug!(experiment = resolved.name, "no assay requested, skipping");
                continue;
            };
            let normalized = self.options.normalized(resolved.name);
            features.push((resolved.name.to_string(), resolved.experiment.row_data.clone()));
            plans.push(MaterializePlan {
                key: resolved.name.to_string(),
                source: resolved,
                assay: assay.clone(),
                force_integer: !normalized,
                log_normalize: !normalized,
                size_factor_column: self
                    .options
                    .size_factor_column(resolved.name)
                    .map(str::to_string),
            });
        }

        let matrix = materialize(&plans, &self.navigator, &self.engine)?;
        Ok(LoadedResult {
            matrix,
            features,
            cells: cells_of(root),
            reduced_dimensions,
            other_metadata: root.metadata.clone().unwrap_or_else(ListValue::empty),
        })
    }
}
