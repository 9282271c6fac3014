use crate::container::{Container, ContainerEngine, NodeKind, RawValues, required_attribute, string_attribute};
use crate::error::{Partial, ReaderError, SkippedPart};
use crate::navigator::Navigator;
use crate::store::{StorageBackend, join_path};
use crate::values::{Values, substitute_placeholder};

const PLACEHOLDER_ATTRIBUTE: &str = "missing-value-placeholder";
const DEFAULT_FACTOR_PLACEHOLDER: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    String(Values<String>),
    Integer(Values<i32>),
    Number(Values<f64>),
    Boolean(Values<bool>),
    Factor(Values<String>),
    Table(Box<Table>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::String(values) | Column::Factor(values) => values.len(),
            Column::Integer(values) => values.len(),
            Column::Number(values) => values.len(),
            Column::Boolean(values) => values.len(),
            Column::Table(table) => table.number_of_rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::String(_) => "string",
            Column::Integer(_) => "integer",
            Column::Number(_) => "number",
            Column::Boolean(_) => "boolean",
            Column::Factor(_) => "factor",
            Column::Table(_) => "table",
        }
    }

    pub fn to_labels(&self) -> Option<Vec<Option<String>>> {
        fn render<T: ToString>(values: &Values<T>) -> Vec<Option<String>> {
            values.iter().map(|x| x.map(ToString::to_string)).collect()
        }
        match self {
            Column::String(values) | Column::Factor(values) => Some(render(values)),
            Column::Integer(values) => Some(render(values)),
            Column::Number(values) => Some(render(values)),
            Column::Boolean(values) => Some(render(values)),
            Column::Table(_) => None,
        }
    }

    pub fn to_numbers(&self) -> Option<Vec<Option<f64>>> {
        match self {
            Column::Integer(values) => Some(values.iter().map(|x| x.map(|x| *x as f64)).collect()),
            Column::Number(values) => Some(values.iter().map(|x| x.copied()).collect()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    row_count: usize,
    row_names: Option<Vec<String>>,
    columns: Vec<(String, Column)>,
    skipped: Vec<SkippedPart>,
}

impl Table {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            row_names: None,
            columns: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn with_row_names(mut self, row_names: Vec<String>) -> Result<Self, ReaderError> {
        if row_names.len() != self.row_count {
            return Err(ReaderError::LengthMismatch {
                column: "row names".to_string(),
                expected: self.row_count,
                actual: row_names.len(),
            });
        }
        self.row_names = Some(row_names);
        Ok(self)
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), ReaderError> {
        let name = name.into();
        if column.len() != self.row_count {
            return Err(ReaderError::LengthMismatch {
                column: name,
                expected: self.row_count,
                actual: column.len(),
            });
        }
        self.columns.push((name, column));
        Ok(())
    }

    pub fn number_of_rows(&self) -> usize {
        self.row_count
    }

    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn row_names(&self) -> Option<&[String]> {
        self.row_names.as_deref()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(existing, _)| existing == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, column)| column)
    }

    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index).map(|(_, column)| column)
    }

    pub fn skipped(&self) -> &[SkippedPart] {
        &self.skipped
    }
}

pub fn read_table<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
) -> Result<Table, ReaderError> {
    let handle = navigator.open(&join_path(path, "basic_columns.h5"))?;

    let row_count = required_attribute(&handle, "data_frame", "row-count")?
        .first_integer()
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| ReaderError::Structure {
            path: path.to_string(),
            message: "invalid row count".to_string(),
        })?;
    let column_names = handle
        .read("data_frame/column_names")?
        .into_strings("column_names")?;

    let mut table = Table::new(row_count);
    if handle.child_kind("data_frame", "row_names")?.is_some() {
        let row_names = handle.read("data_frame/row_names")?.into_strings("row_names")?;
        table = table.with_row_names(row_names)?;
    }

    let stored = match handle.child_kind("data_frame", "data")? {
        Some(NodeKind::Group) => handle.children("data_frame/data")?,
        _ => Vec::new(),
    };

    for (index, name) in column_names.into_iter().enumerate() {
        let key = index.to_string();
        let kind = stored
            .iter()
            .find(|(child, _)| *child == key)
            .map(|(_, kind)| *kind);
        let node = format!("data_frame/data/{key}");

        let column = match kind {
            Some(NodeKind::Dataset) => read_atomic_column(&handle, &node)?,
            Some(NodeKind::Group) => read_factor_column(&handle, &node)?,
            None => {
                let nested_path = join_path(&join_path(path, "other_columns"), &key);
                match Partial::recover(&nested_path, read_nested_table(&nested_path, row_count, navigator)) {
                    Partial::Value(nested) => Column::Table(Box::new(nested)),
                    Partial::Skipped(skipped) => {
                        tracing::warn!(
                            path = %skipped.path,
                            reason = %skipped.reason,
                            "failed to extract nested data frame"
                        );
                        table.skipped.push(skipped);
                        continue;
                    }
                }
            }
        };

        table.push_column(name, column)?;
    }

    Ok(table)
}

fn read_nested_table<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    row_count: usize,
    navigator: &Navigator<S, E>,
) -> Result<Table, ReaderError> {
    let nested = read_table(path, navigator)?;
    if nested.number_of_rows() != row_count {
        return Err(ReaderError::LengthMismatch {
            column: path.to_string(),
            expected: row_count,
            actual: nested.number_of_rows(),
        });
    }
    Ok(nested)
}

fn read_atomic_column<C: Container>(handle: &C, node: &str) -> Result<Column, ReaderError> {
    let kind = string_attribute(handle, node, "type")?;
    let placeholder = handle.attribute(node, PLACEHOLDER_ATTRIBUTE)?;
    let raw = handle.read(node)?;

    let column = match kind.as_str() {
        "integer" => Column::Integer(integer_values(raw, node, placeholder.as_ref())?),
        "number" => Column::Number(number_values(raw, node, placeholder.as_ref())?),
        "string" => Column::String(string_values(raw, node, placeholder.as_ref())?),
        "boolean" => Column::Boolean(boolean_values(raw, node, placeholder.as_ref())?),
        other => return Err(ReaderError::UnknownColumnType(other.to_string())),
    };
    Ok(column)
}

fn read_factor_column<C: Container>(handle: &C, node: &str) -> Result<Column, ReaderError> {
    let kind = string_attribute(handle, node, "type")?;
    if kind != "factor" {
        return Err(ReaderError::UnknownColumnType(kind));
    }

    let codes_node = format!("{node}/codes");
    let levels = handle
        .read(&format!("{node}/levels"))?
        .into_strings("levels")?;
    let codes = handle.read(&codes_node)?.into_integers(&codes_node)?;
    let placeholder = handle
        .attribute(&codes_node, PLACEHOLDER_ATTRIBUTE)?
        .and_then(|values| values.first_integer())
        .unwrap_or(DEFAULT_FACTOR_PLACEHOLDER);

    Ok(Column::Factor(factor_values(codes, &levels, Some(placeholder), node)?))
}

pub(crate) fn integer_values(
    raw: RawValues,
    node: &str,
    placeholder: Option<&RawValues>,
) -> Result<Values<i32>, ReaderError> {
    let values = raw
        .into_integers(node)?
        .into_iter()
        .map(|x| {
            i32::try_from(x).map_err(|_| ReaderError::Structure {
                path: node.to_string(),
                message: format!("integer {x} does not fit in 32 bits"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let values = Values::Dense(values);
    let placeholder = placeholder
        .and_then(RawValues::first_integer)
        .and_then(|x| i32::try_from(x).ok());
    Ok(match placeholder {
        Some(placeholder) => substitute_placeholder(values, &placeholder),
        None => values,
    })
}

pub(crate) fn number_values(
    raw: RawValues,
    node: &str,
    placeholder: Option<&RawValues>,
) -> Result<Values<f64>, ReaderError> {
    let values = Values::Dense(raw.into_floats(node)?);
    Ok(match placeholder.and_then(RawValues::first_float) {
        Some(placeholder) => substitute_placeholder(values, &placeholder),
        None => values,
    })
}

pub(crate) fn string_values(
    raw: RawValues,
    node: &str,
    placeholder: Option<&RawValues>,
) -> Result<Values<String>, ReaderError> {
    let values = Values::Dense(raw.into_strings(node)?);
    Ok(match placeholder.and_then(RawValues::first_string) {
        Some(placeholder) => substitute_placeholder(values, &placeholder.to_string()),
        None => values,
    })
}

// Placeholder is matched against the raw integer codes.
pub(crate) fn boolean_values(
    raw: RawValues,
    node: &str,
    placeholder: Option<&RawValues>,
) -> Result<Values<bool>, ReaderError> {
    let codes = Values::Dense(raw.into_integers(node)?);
    let codes = match placeholder.and_then(RawValues::first_integer) {
        Some(placeholder) => substitute_placeholder(codes, &placeholder),
        None => codes,
    };
    Ok(codes.map(|x| x != 0))
}

pub(crate) fn factor_values(
    codes: Vec<i64>,
    levels: &[String],
    placeholder: Option<i64>,
    node: &str,
) -> Result<Values<String>, ReaderError> {
    let labels = codes
        .into_iter()
        .map(|code| {
            if Some(code) == placeholder {
                return Ok(None);
            }
            usize::try_from(code)
                .ok()
                .and_then(|code| levels.get(code))
                .map(|level| Some(level.clone()))
                .ok_or_else(|| ReaderError::Structure {
                    path: node.to_string(),
                    message: format!("factor code {code} out of range for {} levels", levels.len()),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Values::from_options(labels))
}
