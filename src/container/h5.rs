use std::io::Write;

use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use tempfile::NamedTempFile;

use crate::container::{Container, ContainerEngine, NodeKind, RawValues};
use crate::error::ReaderError;

type FixedAsciiString = FixedAscii<[u8; 1024]>;
type FixedUnicodeString = FixedUnicode<[u8; 1024]>;

fn h5err(err: hdf5::Error) -> ReaderError {
    ReaderError::Container(format!("HDF5 error: {err}"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Engine;

impl Hdf5Engine {
    pub fn new() -> Self {
        Self
    }
}

impl ContainerEngine for Hdf5Engine {
    type Handle = Hdf5Handle;

    fn open(&self, bytes: Vec<u8>) -> Result<Self::Handle, ReaderError> {
        // libhdf5 only opens files by name.
        let mut backing = NamedTempFile::new()
            .map_err(|err| ReaderError::Container(format!("cannot stage HDF5 file: {err}")))?;
        backing
            .write_all(&bytes)
            .and_then(|_| backing.flush())
            .map_err(|err| ReaderError::Container(format!("cannot stage HDF5 file: {err}")))?;
        let file = hdf5::File::open(backing.path())
            .map_err(|err| ReaderError::Container(format!("cannot open HDF5 file: {err}")))?;
        Ok(Hdf5Handle {
            file,
            _backing: backing,
        })
    }
}

#[derive(Debug)]
pub struct Hdf5Handle {
    file: hdf5::File,
    _backing: NamedTempFile,
}

impl Hdf5Handle {
    fn group(&self, path: &str) -> Result<hdf5::Group, ReaderError> {
        let path = if path.is_empty() { "/" } else { path };
        self.file.group(path).map_err(h5err)
    }

    fn dataset(&self, path: &str) -> Result<hdf5::Dataset, ReaderError> {
        self.file.dataset(path).map_err(h5err)
    }

    fn kind(&self, node: &str) -> Result<NodeKind, ReaderError> {
        if node.is_empty() || self.file.group(node).is_ok() {
            return Ok(NodeKind::Group);
        }
        if self.file.dataset(node).is_ok() {
            return Ok(NodeKind::Dataset);
        }
        Err(ReaderError::Container(format!("no node at '{node}'")))
    }
}

impl Container for Hdf5Handle {
    fn children(&self, group: &str) -> Result<Vec<(String, NodeKind)>, ReaderError> {
        let group = self.group(group)?;
        let names = group.member_names().map_err(h5err)?;
        Ok(names
            .into_iter()
            .map(|name| {
                let kind = if group.dataset(&name).is_ok() {
                    NodeKind::Dataset
                } else {
                    NodeKind::Group
                };
                (name, kind)
            })
            .collect())
    }

    fn attribute(&self, node: &str, name: &str) -> Result<Option<RawValues>, ReaderError> {
        match self.kind(node)? {
            NodeKind::Group => location_attribute(&self.group(node)?, name),
            NodeKind::Dataset => location_attribute(&self.dataset(node)?, name),
        }
    }

    fn shape(&self, dataset: &str) -> Result<Vec<usize>, ReaderError> {
        Ok(self.dataset(dataset)?.shape())
    }

    fn read(&self, dataset: &str) -> Result<RawValues, ReaderError> {
        read_values(&self.dataset(dataset)?, dataset)
    }
}

fn location_attribute(
    location: &hdf5::Location,
    name: &str,
) -> Result<Option<RawValues>, ReaderError> {
    let names = location.attr_names().map_err(h5err)?;
    if !names.iter().any(|existing| existing == name) {
        return Ok(None);
    }
    let attribute = location.attr(name).map_err(h5err)?;
    read_values(&attribute, name).map(Some)
}

fn read_values(container: &hdf5::Container, context: &str) -> Result<RawValues, ReaderError> {
    let descriptor = container
        .dtype()
        .and_then(|dtype| dtype.to_descriptor())
        .map_err(h5err)?;

    match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
            Ok(RawValues::Integer(container.read_raw::<i64>().map_err(h5err)?))
        }
        TypeDescriptor::Float(_) => Ok(RawValues::Float(container.read_raw::<f64>().map_err(h5err)?)),
        TypeDescriptor::VarLenUnicode => Ok(RawValues::String(
            container
                .read_raw::<VarLenUnicode>()
                .map_err(h5err)?
                .iter()
                .map(|value| value.as_str().to_string())
                .collect(),
        )),
        TypeDescriptor::VarLenAscii => Ok(RawValues::String(
            container
                .read_raw::<VarLenAscii>()
                .map_err(h5err)?
                .iter()
                .map(|value| value.as_str().to_string())
                .collect(),
        )),
        TypeDescriptor::FixedAscii(_) => Ok(RawValues::String(
            container
                .read_raw::<FixedAsciiString>()
                .map_err(h5err)?
                .iter()
                .map(|value| value.as_str().to_string())
                .collect(),
        )),
        TypeDescriptor::FixedUnicode(_) => Ok(RawValues::String(
            container
                .read_raw::<FixedUnicodeString>()
                .map_err(h5err)?
                .iter()
                .map(|value| value.as_str().to_string())
                .collect(),
        )),
        other => Err(ReaderError::Container(format!(
            "'{context}' has unsupported HDF5 type {other:?}"
        ))),
    }
}
