use crate::container::{Container, ContainerEngine, node_path, required_attribute, string_attribute};
use crate::domain::ArrayKind;
use crate::error::ReaderError;
use crate::matrix::{CompressedBuffers, CompressedLayout, DenseLayout, MatrixEngine};
use crate::navigator::Navigator;
use crate::store::{StorageBackend, join_path};
use crate::values::{Values, substitute_placeholder};

const PLACEHOLDER_ATTRIBUTE: &str = "missing-value-placeholder";
const DENSE_GROUP: &str = "dense_array";
const SPARSE_GROUP: &str = "compressed_sparse_matrix";

#[derive(Debug, Clone, PartialEq)]
pub struct DenseArray {
    pub rows: usize,
    pub columns: usize,
    pub values: Vec<Values<f64>>,
}

impl DenseArray {
    pub fn column(&self, index: usize) -> Option<&Values<f64>> {
        self.values.get(index)
    }
}

pub fn array_kind<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
) -> Result<ArrayKind, ReaderError> {
    Ok(ArrayKind::from_type(&navigator.fetch_metadata(path)?.kind))
}

fn is_transposed<C: Container>(handle: &C) -> Result<bool, ReaderError> {
    Ok(handle
        .attribute(DENSE_GROUP, "transposed")?
        .and_then(|flag| flag.first_integer())
        .is_some_and(|flag| flag != 0))
}

fn matrix_shape(path: &str, dims: &[usize]) -> Result<(usize, usize), ReaderError> {
    match dims {
        [first, second] => Ok((*first, *second)),
        _ => Err(ReaderError::Structure {
            path: path.to_string(),
            message: format!("expected a two-dimensional array, found {} dimensions", dims.len()),
        }),
    }
}

// Transposed payloads are read one column slice at a time; columns past
// `max_columns` are never fetched.
pub fn read_dense_array<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
    max_columns: Option<usize>,
) -> Result<DenseArray, ReaderError> {
    let handle = navigator.open(&join_path(path, "array.h5"))?;
    let data = node_path(DENSE_GROUP, "data");
    let (first, second) = matrix_shape(path, &handle.shape(&data)?)?;
    let transposed = is_transposed(&handle)?;
    let placeholder = handle
        .attribute(&data, PLACEHOLDER_ATTRIBUTE)?
        .and_then(|values| values.first_float());

    let (rows, total_columns) = if transposed { (second, first) } else { (first, second) };
    let columns = max_columns.map_or(total_columns, |cap| cap.min(total_columns));

    let mut values = Vec::with_capacity(columns);
    if transposed {
        for c in 0..columns {
            let slice = handle.read_range(&data, c * rows, rows)?.into_floats(&data)?;
            if slice.len() != rows {
                return Err(ReaderError::Structure {
                    path: path.to_string(),
                    message: format!("column {c} has {} values, expected {rows}", slice.len()),
                });
            }
            values.push(Values::Dense(slice));
        }
    } else {
        let flat = handle.read(&data)?.into_floats(&data)?;
        if flat.len() != rows * total_columns {
            return Err(ReaderError::Structure {
                path: path.to_string(),
                message: format!(
                    "payload has {} values, expected {rows} x {total_columns}",
                    flat.len()
                ),
            });
        }
        for c in 0..columns {
            let column = (0..rows).map(|r| flat[r * total_columns + c]).collect();
            values.push(Values::Dense(column));
        }
    }

    if let Some(placeholder) = placeholder {
        values = values
            .into_iter()
            .map(|column| substitute_placeholder(column, &placeholder))
            .collect();
    }

    Ok(DenseArray {
        rows,
        columns,
        values,
    })
}

pub fn read_matrix_payload<S, E, M>(
    path: &str,
    navigator: &Navigator<S, E>,
    engine: &M,
    force_integer: bool,
) -> Result<M::Matrix, ReaderError>
where
    S: StorageBackend,
    E: ContainerEngine,
    M: MatrixEngine,
{
    match array_kind(path, navigator)? {
        ArrayKind::DenseArray => {
            let handle = navigator.open(&join_path(path, "array.h5"))?;
            let data = node_path(DENSE_GROUP, "data");
            if handle.has_attribute(&data, PLACEHOLDER_ATTRIBUTE)? {
                return Err(ReaderError::MissingValuesUnsupported(path.to_string()));
            }
            let (first, second) = matrix_shape(path, &handle.shape(&data)?)?;
            let values = handle.read(&data)?.into_floats(&data)?;
            if is_transposed(&handle)? {
                engine.from_dense(second, first, values, DenseLayout::ColumnMajor, force_integer)
            } else {
                engine.from_dense(first, second, values, DenseLayout::RowMajor, force_integer)
            }
        }
        ArrayKind::CompressedSparseMatrix => {
            let handle = navigator.open(&join_path(path, "matrix.h5"))?;
            let data = node_path(SPARSE_GROUP, "data");
            if handle.has_attribute(&data, PLACEHOLDER_ATTRIBUTE)? {
                return Err(ReaderError::MissingValuesUnsupported(path.to_string()));
            }

            let shape = required_attribute(&handle, SPARSE_GROUP, "shape")?.into_integers("shape")?;
            let dims = shape
                .iter()
                .map(|&extent| usize::try_from(extent))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ReaderError::Structure {
                    path: path.to_string(),
                    message: err.to_string(),
                })?;
            let (rows, columns) = matrix_shape(path, &dims)?;

            let layout_name = string_attribute(&handle, SPARSE_GROUP, "layout")?;
            let layout = CompressedLayout::parse(&layout_name).ok_or_else(|| ReaderError::Structure {
                path: path.to_string(),
                message: format!("unknown sparse layout '{layout_name}'"),
            })?;

            let buffers = CompressedBuffers {
                values: handle.read(&data)?.into_floats(&data)?,
                indices: read_offsets(&handle, &node_path(SPARSE_GROUP, "indices"), path)?,
                indptr: read_offsets(&handle, &node_path(SPARSE_GROUP, "indptr"), path)?,
            };
            engine.from_compressed(rows, columns, buffers, layout, force_integer)
        }
        other => Err(ReaderError::UnsupportedAssayType(other.to_string())),
    }
}

fn read_offsets<C: Container>(handle: &C, node: &str, path: &str) -> Result<Vec<usize>, ReaderError> {
    handle
        .read(node)?
        .into_integers(node)?
        .into_iter()
        .map(|offset| {
            usize::try_from(offset).map_err(|_| ReaderError::Structure {
                path: path.to_string(),
                message: format!("negative offset {offset} in '{node}'"),
            })
        })
        .collect()
}
