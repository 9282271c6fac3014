use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::{Map, Value};

use crate::container::{Container, ContainerEngine, NodeKind, node_path, string_attribute};
use crate::domain::ListFormat;
use crate::error::ReaderError;
use crate::navigator::Navigator;
use crate::store::{StorageBackend, join_path};
use crate::table::{boolean_values, factor_values, integer_values, number_values, string_values};
use crate::values::Values;

const PLACEHOLDER_ATTRIBUTE: &str = "missing-value-placeholder";

#[derive(Debug, Clone, PartialEq)]
pub enum Atomic<T> {
    Scalar(Option<T>),
    Vector(Values<T>),
}

impl<T> Atomic<T> {
    fn from_values(values: Values<T>, scalar: bool) -> Self {
        if scalar {
            Atomic::Scalar(values.into_options().into_iter().next().flatten())
        } else {
            Atomic::Vector(values)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListValue {
    Named(Vec<(String, ListValue)>),
    Unnamed(Vec<ListValue>),
    Nothing,
    Factor(Values<String>),
    String(Atomic<String>),
    Boolean(Atomic<bool>),
    Integer(Atomic<i32>),
    Number(Atomic<f64>),
}

impl ListValue {
    pub fn empty() -> Self {
        ListValue::Named(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&ListValue> {
        match self {
            ListValue::Named(entries) => entries
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            ListValue::Named(entries) => entries.iter().map(|(key, _)| key.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, ListValue::Nothing)
    }
}

pub fn read_structured_list<S: StorageBackend, E: ContainerEngine>(
    path: &str,
    navigator: &Navigator<S, E>,
) -> Result<ListValue, ReaderError> {
    let meta = navigator.fetch_metadata(path)?;
    let format = meta
        .simple_list
        .and_then(|list| list.format)
        .map(|format| format.parse::<ListFormat>())
        .transpose()?
        .unwrap_or_default();

    match format {
        ListFormat::Hdf5 => {
            let handle = navigator.open(&join_path(path, "list.h5"))?;
            decode_binary(&handle, "simple_list", true)
        }
        ListFormat::JsonGz => {
            let file = join_path(path, "list.json.gz");
            let bytes = navigator.get(&file)?;
            let mut text = String::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_string(&mut text)
                .map_err(|err| ReaderError::Decompress {
                    path: file.clone(),
                    message: err.to_string(),
                })?;
            let parsed: Value = serde_json::from_str(&text).map_err(|err| ReaderError::Json {
                path: file.clone(),
                message: err.to_string(),
            })?;
            decode_json(&parsed, &file, true)
        }
    }
}

fn unknown_type(kind: &str, root: bool) -> Result<ListValue, ReaderError> {
    if root {
        return Err(ReaderError::UnknownListType(kind.to_string()));
    }
    tracing::warn!(kind, "simple list containing this type is not yet supported");
    Ok(ListValue::Nothing)
}

fn decode_binary<C: Container>(handle: &C, node: &str, root: bool) -> Result<ListValue, ReaderError> {
    let object = string_attribute(handle, node, "uzuki_object")?;
    match object.as_str() {
        "list" => {
            let data = node_path(node, "data");
            let count = match handle.child_kind(node, "data")? {
                Some(NodeKind::Group) => handle.children(&data)?.len(),
                _ => 0,
            };
            if handle.child_kind(node, "names")?.is_some() {
                let names = handle
                    .read(&node_path(node, "names"))?
                    .into_strings("names")?;
                let entries = names
                    .into_iter()
                    .enumerate()
                    .map(|(index, name)| {
                        let child = node_path(&data, &index.to_string());
                        decode_binary(handle, &child, false).map(|value| (name, value))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ListValue::Named(entries))
            } else {
                let items = (0..count)
                    .map(|index| decode_binary(handle, &node_path(&data, &index.to_string()), false))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ListValue::Unnamed(items))
            }
        }
        "nothing" => Ok(ListValue::Nothing),
        "vector" => decode_binary_vector(handle, node, root),
        other => unknown_type(other, root),
    }
}

fn decode_binary_vector<C: Container>(
    handle: &C,
    node: &str,
    root: bool,
) -> Result<ListValue, ReaderError> {
    let kind = string_attribute(handle, node, "uzuki_type")?;
    let data = node_path(node, "data");
    let scalar = handle.shape(&data)?.is_empty();
    let placeholder = handle.attribute(&data, PLACEHOLDER_ATTRIBUTE)?;

    let value = match kind.as_str() {
        "string" | "date" | "date-time" => ListValue::String(Atomic::from_values(
            string_values(handle.read(&data)?, &data, placeholder.as_ref())?,
            scalar,
        )),
        "boolean" => ListValue::Boolean(Atomic::from_values(
            boolean_values(handle.read(&data)?, &data, placeholder.as_ref())?,
            scalar,
        )),
        "integer" => ListValue::Integer(Atomic::from_values(
            integer_values(handle.read(&data)?, &data, placeholder.as_ref())?,
            scalar,
        )),
        "number" => ListValue::Number(Atomic::from_values(
            number_values(handle.read(&data)?, &data, placeholder.as_ref())?,
            scalar,
        )),
        "factor" => {
            let levels = handle
                .read(&node_path(node, "levels"))?
                .into_strings("levels")?;
            let codes = handle.read(&data)?.into_integers(&data)?;
            let placeholder = placeholder.and_then(|values| values.first_integer());
            ListValue::Factor(factor_values(codes, &levels, placeholder, &data)?)
        }
        other => return unknown_type(other, root),
    };
    Ok(value)
}

fn malformed(path: &str, message: impl Into<String>) -> ReaderError {
    ReaderError::MalformedList {
        path: path.to_string(),
        message: message.into(),
    }
}

fn decode_json(value: &Value, path: &str, root: bool) -> Result<ListValue, ReaderError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed(path, "expected a JSON object"))?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(path, "missing 'type' field"))?;

    match kind {
        "list" => decode_json_list(object, path),
        "nothing" => Ok(ListValue::Nothing),
        "factor" => {
            let levels = object
                .get("levels")
                .and_then(Value::as_array)
                .ok_or_else(|| malformed(path, "factor without levels"))?
                .iter()
                .map(|level| {
                    level
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| malformed(path, "factor levels must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let (elements, _) = json_elements(object);
            let labels = elements
                .into_iter()
                .map(|element| {
                    if element.is_null() {
                        return Ok(None);
                    }
                    element
                        .as_u64()
                        .and_then(|code| levels.get(code as usize))
                        .map(|level| Some(level.clone()))
                        .ok_or_else(|| malformed(path, format!("invalid factor code {element}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListValue::Factor(Values::from_options(labels)))
        }
        "number" => {
            let (elements, scalar) = json_elements(object);
            let numbers = elements
                .into_iter()
                .map(|element| match element {
                    Value::Null => Ok(None),
                    Value::Number(number) => Ok(number.as_f64()),
                    Value::String(sentinel) => Ok(Some(match sentinel.as_str() {
                        "Inf" => f64::INFINITY,
                        "-Inf" => f64::NEG_INFINITY,
                        _ => f64::NAN,
                    })),
                    other => Err(malformed(path, format!("invalid number {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListValue::Number(Atomic::from_values(Values::from_options(numbers), scalar)))
        }
        "integer" => {
            let (elements, scalar) = json_elements(object);
            let integers = elements
                .into_iter()
                .map(|element| match element {
                    Value::Null => Ok(None),
                    other => other
                        .as_i64()
                        .and_then(|x| i32::try_from(x).ok())
                        .map(Some)
                        .ok_or_else(|| malformed(path, format!("invalid integer {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListValue::Integer(Atomic::from_values(Values::from_options(integers), scalar)))
        }
        "string" | "date" | "date-time" => {
            let (elements, scalar) = json_elements(object);
            let strings = elements
                .into_iter()
                .map(|element| match element {
                    Value::Null => Ok(None),
                    Value::String(text) => Ok(Some(text.clone())),
                    other => Err(malformed(path, format!("invalid string {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListValue::String(Atomic::from_values(Values::from_options(strings), scalar)))
        }
        "boolean" => {
            let (elements, scalar) = json_elements(object);
            let booleans = elements
                .into_iter()
                .map(|element| match element {
                    Value::Null => Ok(None),
                    Value::Bool(flag) => Ok(Some(*flag)),
                    other => Err(malformed(path, format!("invalid boolean {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListValue::Boolean(Atomic::from_values(Values::from_options(booleans), scalar)))
        }
        other => unknown_type(other, root),
    }
}

fn decode_json_list(object: &Map<String, Value>, path: &str) -> Result<ListValue, ReaderError> {
    let items: &[Value] = match object.get("values") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return Err(malformed(path, "list values must be an array")),
        None => &[],
    };

    match object.get("names") {
        Some(names) => {
            let names = names
                .as_array()
                .ok_or_else(|| malformed(path, "list names must be an array"))?;
            if names.len() != items.len() {
                return Err(malformed(path, "list names and values differ in length"));
            }
            let entries = names
                .iter()
                .zip(items)
                .map(|(name, item)| {
                    let name = name
                        .as_str()
                        .ok_or_else(|| malformed(path, "list names must be strings"))?;
                    decode_json(item, path, false).map(|value| (name.to_string(), value))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListValue::Named(entries))
        }
        None => {
            let values = items
                .iter()
                .map(|item| decode_json(item, path, false))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListValue::Unnamed(values))
        }
    }
}

fn json_elements(object: &Map<String, Value>) -> (Vec<&Value>, bool) {
    match object.get("values") {
        Some(Value::Array(items)) => (items.iter().collect(), false),
        Some(scalar) => (vec![scalar], true),
        None => (Vec::new(), false),
    }
}
