use std::thread;

use crate::array::{DenseArray, array_kind, read_dense_array, read_matrix_payload};
use crate::container::ContainerEngine;
use crate::domain::{ArrayKind, Selector};
use crate::error::{Partial, ReaderError, SkippedPart};
use crate::list::{ListValue, read_structured_list};
use crate::matrix::MatrixEngine;
use crate::navigator::{Navigator, ObjectDescriptor};
use crate::store::{StorageBackend, join_path};
use crate::table::{Table, read_table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub include_column_data: bool,
    pub include_metadata: bool,
    pub include_reduced_dimension_names: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            include_column_data: true,
            include_metadata: true,
            include_reduced_dimension_names: true,
        }
    }
}

// Alternative experiments share the parent's columns.
const ALTERNATIVE_OPTIONS: ReadOptions = ReadOptions {
    include_column_data: false,
    include_metadata: false,
    include_reduced_dimension_names: false,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeExperiment {
    pub name: String,
    pub index: usize,
    pub experiment: ExperimentNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentNode {
    pub path: String,
    pub rows: usize,
    pub columns: usize,
    pub row_data: Table,
    pub assay_names: Vec<String>,
    pub column_data: Option<Table>,
    pub metadata: Option<ListValue>,
    pub is_single_cell: bool,
    pub main_experiment_name: Option<String>,
    pub alternative_experiments: Vec<AlternativeExperiment>,
    pub reduced_dimension_names: Option<Vec<String>>,
    pub skipped: Vec<SkippedPart>,
}

impl ExperimentNode {
    pub fn main_key(&self) -> &str {
        self.main_experiment_name.as_deref().unwrap_or("")
    }

    pub fn alternative(&self, name: &str) -> Option<&AlternativeExperiment> {
        self.alternative_experiments
            .iter()
            .find(|alternative| alternative.name == name)
    }

    pub fn skipped(&self) -> &[SkippedPart] {
        &self.skipped
    }
}

fn dimensions(path: &str, meta: &ObjectDescriptor) -> Result<(usize, usize), ReaderError> {
    match meta
        .summarized_experiment
        .as_ref()
        .map(|se| se.dimensions.as_slice())
    {
        Some([rows, columns]) => Ok((*rows, *columns)),
        _ => Err(ReaderError::MissingDimensions(path.to_string())),
    }
}

pub fn read_experiment<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
    options: &ReadOptions,
) -> Result<ExperimentNode, ReaderError> {
    let meta = navigator.fetch_metadata(path)?;
    let mut node = read_summarized_experiment(path, &meta, navigator, options)?;

    let Some(sce) = meta.single_cell_experiment else {
        return Ok(node);
    };
    let listing = navigator.list_children(path)?;

    node.is_single_cell = true;
    node.main_experiment_name = sce.main_experiment_name;
    if listing.iter().any(|child| child == "alternative_experiments") {
        read_alternative_experiments(path, navigator, &mut node)?;
    }
    if options.include_reduced_dimension_names {
        let names = if listing.iter().any(|child| child == "reduced_dimensions") {
            dense_reduced_dimension_names(path, navigator)?
        } else {
            Vec::new()
        };
        node.reduced_dimension_names = Some(names);
    }

    Ok(node)
}

fn read_summarized_experiment<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    meta: &ObjectDescriptor,
    navigator: &Navigator<S, E>,
    options: &ReadOptions,
) -> Result<ExperimentNode, ReaderError> {
    let (rows, columns) = dimensions(path, meta)?;
    let listing = navigator.list_children(path)?;
    let has = |name: &str| listing.iter().any(|child| child == name);
    let (has_row_data, has_assays) = (has("row_data"), has("assays"));
    let has_column_data = options.include_column_data.then(|| has("column_data"));
    let has_metadata = options.include_metadata.then(|| has("other_data"));

    let (row_data, assay_names, column_data, metadata) = thread::scope(|scope| {
        let row_data = scope.spawn(|| {
            if has_row_data {
                read_table(&join_path(path, "row_data"), navigator)
            } else {
                Ok(Table::new(rows))
            }
        });
        let assay_names = scope.spawn(|| {
            if has_assays {
                supported_assay_names(path, navigator)
            } else {
                Ok(Vec::new())
            }
        });
        let column_data = scope.spawn(|| match has_column_data {
            None => Ok(None),
            Some(true) => read_table(&join_path(path, "column_data"), navigator).map(Some),
            Some(false) => Ok(Some(Table::new(columns))),
        });
        let metadata = scope.spawn(|| match has_metadata {
            None => Ok(None),
            Some(true) => read_structured_list(&join_path(path, "other_data"), navigator).map(Some),
            Some(false) => Ok(Some(ListValue::empty())),
        });
        (
            join_part(row_data, path, "row_data"),
            join_part(assay_names, path, "assays"),
            join_part(column_data, path, "column_data"),
            join_part(metadata, path, "other_data"),
        )
    });

    Ok(ExperimentNode {
        path: path.to_string(),
        rows,
        columns,
        row_data: row_data?,
        assay_names: assay_names?,
        column_data: column_data?,
        metadata: metadata?,
        is_single_cell: false,
        main_experiment_name: None,
        alternative_experiments: Vec::new(),
        reduced_dimension_names: None,
        skipped: Vec::new(),
    })
}

fn join_part<T>(
    handle: thread::ScopedJoinHandle<'_, Result<T, ReaderError>>,
    path: &str,
    part: &str,
) -> Result<T, ReaderError> {
    handle.join().unwrap_or_else(|_| {
        Err(ReaderError::Structure {
            path: join_path(path, part),
            message: "reader thread panicked".to_string(),
        })
    })
}

fn supported_assay_names<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
) -> Result<Vec<String>, ReaderError> {
    let base = join_path(path, "assays");
    let names = navigator.fetch_names(&join_path(&base, "names.json"))?;
    let mut supported = Vec::with_capacity(names.len());
    for (index, name) in names.into_iter().enumerate() {
        let kind = array_kind(&join_path(&base, &index.to_string()), navigator)?;
        if kind.is_matrix_supported() {
            supported.push(name);
        } else {
            tracing::debug!(assay = %name, %kind, "assay type not supported, hiding it");
        }
    }
    Ok(supported)
}

fn read_alternative_experiments<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
    node: &mut ExperimentNode,
) -> Result<(), ReaderError> {
    let base = join_path(path, "alternative_experiments");
    let names = navigator.fetch_names(&join_path(&base, "names.json"))?;
    let paths = (0..names.len())
        .map(|index| join_path(&base, &index.to_string()))
        .collect::<Vec<_>>();

    let results = thread::scope(|scope| {
        let handles = paths
            .iter()
            .map(|alt_path| {
                scope.spawn(move || {
                    let meta = navigator.fetch_metadata(alt_path)?;
                    read_summarized_experiment(alt_path, &meta, navigator, &ALTERNATIVE_OPTIONS)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(ReaderError::Structure {
                        path: base.clone(),
                        message: "alternative experiment reader panicked".to_string(),
                    })
                })
            })
            .collect::<Vec<_>>()
    });

    for (index, ((name, alt_path), result)) in names.into_iter().zip(&paths).zip(results).enumerate() {
        match Partial::recover(alt_path, result) {
            Partial::Value(experiment) => node.alternative_experiments.push(AlternativeExperiment {
                name,
                index,
                experiment,
            }),
            Partial::Skipped(skipped) => {
                tracing::warn!(
                    index,
                    reason = %skipped.reason,
                    "failed to extract features for alternative experiment"
                );
                node.skipped.push(skipped);
            }
        }
    }
    Ok(())
}

fn dense_reduced_dimension_names<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
) -> Result<Vec<String>, ReaderError> {
    let base = join_path(path, "reduced_dimensions");
    let names = navigator.fetch_names(&join_path(&base, "names.json"))?;
    let mut dense = Vec::with_capacity(names.len());
    for (index, name) in names.into_iter().enumerate() {
        if array_kind(&join_path(&base, &index.to_string()), navigator)? == ArrayKind::DenseArray {
            dense.push(name);
        }
    }
    Ok(dense)
}

// Positions count every declared assay, including those hidden from `assay_names`.
pub fn read_assay<S, E, M>(
    path: &str,
    assay: &Selector,
    navigator: &Navigator<S, E>,
    engine: &M,
    force_integer: bool,
) -> Result<M::Matrix, ReaderError>
where
    S: StorageBackend,
    E: ContainerEngine,
    M: MatrixEngine,
{
    let base = join_path(path, "assays");
    let names = if navigator.has_child(path, "assays")? {
        navigator.fetch_names(&join_path(&base, "names.json"))?
    } else {
        Vec::new()
    };

    let index = match assay {
        Selector::Name(name) => names
            .iter()
            .position(|existing| existing == name)
            .ok_or_else(|| ReaderError::AssayNotFound(name.clone()))?,
        Selector::Index(index) => usize::try_from(*index)
            .ok()
            .filter(|position| *position < names.len())
            .ok_or(ReaderError::AssayOutOfRange(*index))?,
    };

    read_matrix_payload(&join_path(&base, &index.to_string()), navigator, engine, force_integer)
}

pub fn read_reduced_dimension<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    name: &str,
    navigator: &Navigator<S, E>,
    max_dimensions: Option<usize>,
) -> Result<DenseArray, ReaderError> {
    let base = join_path(path, "reduced_dimensions");
    let names = if navigator.has_child(path, "reduced_dimensions")? {
        navigator.fetch_names(&join_path(&base, "names.json"))?
    } else {
        Vec::new()
    };
    let index = names
        .iter()
        .position(|existing| existing == name)
        .ok_or_else(|| ReaderError::ReducedDimensionNotFound(name.to_string()))?;

    let block = join_path(&base, &index.to_string());
    match array_kind(&block, navigator)? {
        ArrayKind::DenseArray => read_dense_array(&block, navigator, max_dimensions),
        other => Err(ReaderError::UnsupportedReducedDimension(other.to_string())),
    }
}

pub fn read_column_data<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
) -> Result<Table, ReaderError> {
    let meta = navigator.fetch_metadata(path)?;
    let (_, columns) = dimensions(path, &meta)?;
    if navigator.has_child(path, "column_data")? {
        read_table(&join_path(path, "column_data"), navigator)
    } else {
        Ok(Table::new(columns))
    }
}
