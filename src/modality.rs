use crate::container::ContainerEngine;
use crate::domain::Selector;
use crate::error::{Partial, ReaderError};
use crate::experiment::{ExperimentNode, read_assay, read_column_data};
use crate::matrix::{CountMatrix, MatrixEngine, MultiMatrix};
use crate::navigator::Navigator;
use crate::store::StorageBackend;
use crate::table::Table;

pub type PrimaryIds = Vec<Option<String>>;

#[derive(Debug, Clone, Copy)]
pub struct ResolvedExperiment<'a> {
    pub name: &'a str,
    pub experiment: &'a ExperimentNode,
    pub is_main: bool,
}

impl<'a> ResolvedExperiment<'a> {
    pub fn main(root: &'a ExperimentNode) -> Self {
        Self {
            name: root.main_key(),
            experiment: root,
            is_main: true,
        }
    }

    pub fn all(root: &'a ExperimentNode) -> Vec<Self> {
        std::iter::once(Self::main(root))
            .chain(root.alternative_experiments.iter().map(|alternative| Self {
                name: alternative.name.as_str(),
                experiment: &alternative.experiment,
                is_main: false,
            }))
            .collect()
    }
}

// Non-negative indices count only the alternatives that were read successfully.
pub fn resolve_experiment<'a>(
    root: &'a ExperimentNode,
    selector: Option<&Selector>,
) -> Option<ResolvedExperiment<'a>> {
    let alternative = match selector? {
        Selector::Index(index) if *index < 0 => return Some(ResolvedExperiment::main(root)),
        Selector::Index(index) => usize::try_from(*index)
            .ok()
            .and_then(|position| root.alternative_experiments.get(position))?,
        Selector::Name(name) if name == root.main_key() => {
            return Some(ResolvedExperiment::main(root));
        }
        Selector::Name(name) => root.alternative(name)?,
    };
    Some(ResolvedExperiment {
        name: alternative.name.as_str(),
        experiment: &alternative.experiment,
        is_main: false,
    })
}

pub fn extract_primary_ids(row_data: &Table, column: Option<&Selector>) -> Option<PrimaryIds> {
    let selected = match column {
        Some(Selector::Name(name)) => row_data.column(name),
        Some(Selector::Index(index)) => usize::try_from(*index)
            .ok()
            .and_then(|position| row_data.column_at(position)),
        None => None,
    };
    if let Some(labels) = selected.and_then(|column| column.to_labels()) {
        return Some(labels);
    }
    row_data
        .row_names()
        .map(|names| names.iter().cloned().map(Some).collect())
}

pub fn size_factors_from(column_data: &Table, column: &str, expected: usize) -> Option<Vec<f64>> {
    let Some(found) = column_data.column(column) else {
        tracing::debug!(column, "no size factor column");
        return None;
    };
    let Some(numbers) = found.to_numbers() else {
        tracing::warn!(column, kind = found.type_name(), "ignoring non-numeric size factors");
        return None;
    };
    if numbers.len() != expected {
        tracing::warn!(column, expected, actual = numbers.len(), "ignoring size factors of wrong length");
        return None;
    }
    let factors = numbers.into_iter().collect::<Option<Vec<_>>>();
    if factors.is_none() {
        tracing::warn!(column, "ignoring size factors with missing entries");
    }
    factors
}

#[derive(Debug, Clone)]
pub struct MaterializePlan<'a> {
    pub key: String,
    pub source: ResolvedExperiment<'a>,
    pub assay: Selector,
    pub force_integer: bool,
    pub log_normalize: bool,
    pub size_factor_column: Option<String>,
}

// On error every matrix built so far is freed.
pub fn materialize<S, E, M>(
    plans: &[MaterializePlan<'_>],
    navigator: &Navigator<S, E>,
    engine: &M,
) -> Result<MultiMatrix<M::Matrix>, ReaderError>
where
    S: StorageBackend,
    E: ContainerEngine,
    M: MatrixEngine,
{
    let mut output = MultiMatrix::new();
    for plan in plans {
        match materialize_one(plan, navigator, engine) {
            Ok((counts, normalized)) => {
                output.add(&plan.key, counts);
                if let Some(normalized) = normalized {
                    output.add_normalized(&plan.key, normalized)?;
                }
            }
            Err(err) => {
                output.free();
                return Err(err);
            }
        }
    }
    Ok(output)
}

fn materialize_one<S, E, M>(
    plan: &MaterializePlan<'_>,
    navigator: &Navigator<S, E>,
    engine: &M,
) -> Result<(M::Matrix, Option<M::Matrix>), ReaderError>
where
    S: StorageBackend,
    E: ContainerEngine,
    M: MatrixEngine,
{
    let experiment = plan.source.experiment;
    tracing::debug!(key = %plan.key, experiment = plan.source.name, assay = %plan.assay, "loading assay");
    let counts = read_assay(&experiment.path, &plan.assay, navigator, engine, plan.force_integer)?;
    if !plan.log_normalize {
        return Ok((counts, None));
    }

    let factors = plan
        .size_factor_column
        .as_deref()
        .and_then(|column| source_size_factors(plan, column, counts.ncols(), navigator));
    let normalized = engine.log_normalize(&counts, factors.as_deref())?;
    Ok((counts, Some(normalized)))
}

fn source_size_factors<S: StorageBackend, E: ContainerEngine>(
    plan: &MaterializePlan<'_>,
    column: &str,
    expected: usize,
    navigator: &Navigator<S, E>,
) -> Option<Vec<f64>> {
    let experiment = plan.source.experiment;
    if let Some(column_data) = &experiment.column_data {
        return size_factors_from(column_data, column, expected);
    }
    match Partial::recover(&experiment.path, read_column_data(&experiment.path, navigator)) {
        Partial::Value(column_data) => size_factors_from(&column_data, column, expected),
        Partial::Skipped(skipped) => {
            tracing::warn!(
                path = %skipped.path,
                reason = %skipped.reason,
                "ignoring size factors, column annotations unreadable"
            );
            None
        }
    }
}
