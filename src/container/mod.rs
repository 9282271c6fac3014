#[cfg(feature = "hdf5")]
pub mod h5;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Dataset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum RawValues {
    Integer(Vec<i64>),
    Float(#[serde(with = "float_bits")] Vec<f64>),
    String(Vec<String>),
}

impl RawValues {
    pub fn len(&self) -> usize {
        match self {
            RawValues::Integer(values) => values.len(),
            RawValues::Float(values) => values.len(),
            RawValues::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RawValues::Integer(_) => "integer",
            RawValues::Float(_) => "float",
            RawValues::String(_) => "string",
        }
    }

    pub fn slice(&self, start: usize, len: usize) -> RawValues {
        let end = (start + len).min(self.len());
        let start = start.min(end);
        match self {
            RawValues::Integer(values) => RawValues::Integer(values[start..end].to_vec()),
            RawValues::Float(values) => RawValues::Float(values[start..end].to_vec()),
            RawValues::String(values) => RawValues::String(values[start..end].to_vec()),
        }
    }

    pub fn into_integers(self, context: &str) -> Result<Vec<i64>, ReaderError> {
        match self {
            RawValues::Integer(values) => Ok(values),
            other => Err(type_error(context, "integer", &other)),
        }
    }

    pub fn into_floats(self, context: &str) -> Result<Vec<f64>, ReaderError> {
        match self {
            RawValues::Float(values) => Ok(values),
            RawValues::Integer(values) => Ok(values.into_iter().map(|x| x as f64).collect()),
            other => Err(type_error(context, "numeric", &other)),
        }
    }

    pub fn into_strings(self, context: &str) -> Result<Vec<String>, ReaderError> {
        match self {
            RawValues::String(values) => Ok(values),
            other => Err(type_error(context, "string", &other)),
        }
    }

    pub fn first_integer(&self) -> Option<i64> {
        match self {
            RawValues::Integer(values) => values.first().copied(),
            RawValues::Float(values) => values.first().map(|x| *x as i64),
            RawValues::String(_) => None,
        }
    }

    pub fn first_float(&self) -> Option<f64> {
        match self {
            RawValues::Integer(values) => values.first().map(|x| *x as f64),
            RawValues::Float(values) => values.first().copied(),
            RawValues::String(_) => None,
        }
    }

    pub fn first_string(&self) -> Option<&str> {
        match self {
            RawValues::String(values) => values.first().map(String::as_str),
            _ => None,
        }
    }
}

fn type_error(context: &str, expected: &str, actual: &RawValues) -> ReaderError {
    ReaderError::Container(format!(
        "'{context}' holds {} values, expected {expected}",
        actual.type_name()
    ))
}

pub trait Container {
    fn children(&self, group: &str) -> Result<Vec<(String, NodeKind)>, ReaderError>;

    fn attribute(&self, node: &str, name: &str) -> Result<Option<RawValues>, ReaderError>;

    fn shape(&self, dataset: &str) -> Result<Vec<usize>, ReaderError>;

    // Row-major.
    fn read(&self, dataset: &str) -> Result<RawValues, ReaderError>;

    fn read_range(&self, dataset: &str, start: usize, len: usize) -> Result<RawValues, ReaderError> {
        Ok(self.read(dataset)?.slice(start, len))
    }

    fn child_kind(&self, group: &str, name: &str) -> Result<Option<NodeKind>, ReaderError> {
        Ok(self
            .children(group)?
            .into_iter()
            .find(|(child, _)| child == name)
            .map(|(_, kind)| kind))
    }

    fn has_attribute(&self, node: &str, name: &str) -> Result<bool, ReaderError> {
        Ok(self.attribute(node, name)?.is_some())
    }
}

pub trait ContainerEngine: Send + Sync {
    type Handle: Container;

    fn open(&self, bytes: Vec<u8>) -> Result<Self::Handle, ReaderError>;
}

pub fn node_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

pub(crate) fn required_attribute<C: Container>(
    handle: &C,
    node: &str,
    name: &str,
) -> Result<RawValues, ReaderError> {
    handle.attribute(node, name)?.ok_or_else(|| {
        ReaderError::Container(format!("'{node}' is missing the '{name}' attribute"))
    })
}

pub(crate) fn string_attribute<C: Container>(
    handle: &C,
    node: &str,
    name: &str,
) -> Result<String, ReaderError> {
    let values = required_attribute(handle, node, name)?;
    values
        .first_string()
        .map(str::to_string)
        .ok_or_else(|| ReaderError::Container(format!("'{node}' attribute '{name}' is not a string")))
}

mod float_bits {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|x| x.to_bits())
            .collect::<Vec<u64>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let bits = Vec::<u64>::deserialize(deserializer)?;
        Ok(bits.into_iter().map(f64::from_bits).collect())
    }
}
