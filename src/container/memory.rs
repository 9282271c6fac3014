use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::container::{Container, ContainerEngine, NodeKind, RawValues};
use crate::error::ReaderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum MemoryNode {
    Group(MemoryGroup),
    Dataset(MemoryDataset),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryGroup {
    #[serde(default)]
    pub attributes: Vec<(String, RawValues)>,
    #[serde(default)]
    pub children: Vec<(String, MemoryNode)>,
}

impl MemoryGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, values: RawValues) -> Self {
        self.attributes.push((name.to_string(), values));
        self
    }

    pub fn group(mut self, name: &str, group: MemoryGroup) -> Self {
        self.children.push((name.to_string(), MemoryNode::Group(group)));
        self
    }

    pub fn dataset(mut self, name: &str, dataset: MemoryDataset) -> Self {
        self.children.push((name.to_string(), MemoryNode::Dataset(dataset)));
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDataset {
    pub shape: Vec<usize>,
    pub values: RawValues,
    #[serde(default)]
    pub attributes: Vec<(String, RawValues)>,
}

impl MemoryDataset {
    pub fn new(values: RawValues) -> Self {
        Self {
            shape: vec![values.len()],
            values,
            attributes: Vec::new(),
        }
    }

    pub fn scalar(values: RawValues) -> Self {
        Self {
            shape: Vec::new(),
            values,
            attributes: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }

    pub fn attribute(mut self, name: &str, values: RawValues) -> Self {
        self.attributes.push((name.to_string(), values));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    open: Arc<AtomicUsize>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl ContainerEngine for MemoryEngine {
    type Handle = MemoryHandle;

    fn open(&self, bytes: Vec<u8>) -> Result<Self::Handle, ReaderError> {
        let root: MemoryGroup = serde_json::from_slice(&bytes)
            .map_err(|err| ReaderError::Container(format!("invalid container: {err}")))?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryHandle {
            root,
            open: Arc::clone(&self.open),
        })
    }
}

#[derive(Debug)]
pub struct MemoryHandle {
    root: MemoryGroup,
    open: Arc<AtomicUsize>,
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

enum NodeRef<'a> {
    Group(&'a MemoryGroup),
    Dataset(&'a MemoryDataset),
}

impl MemoryHandle {
    fn lookup(&self, path: &str) -> Result<NodeRef<'_>, ReaderError> {
        let mut current = NodeRef::Group(&self.root);
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            let group = match current {
                NodeRef::Group(group) => group,
                NodeRef::Dataset(_) => return Err(missing(path)),
            };
            let child = group
                .children
                .iter()
                .find(|(name, _)| name == segment)
                .map(|(_, node)| node)
                .ok_or_else(|| missing(path))?;
            current = match child {
                MemoryNode::Group(group) => NodeRef::Group(group),
                MemoryNode::Dataset(dataset) => NodeRef::Dataset(dataset),
            };
        }
        Ok(current)
    }

    fn dataset(&self, path: &str) -> Result<&MemoryDataset, ReaderError> {
        match self.lookup(path)? {
            NodeRef::Dataset(dataset) => Ok(dataset),
            NodeRef::Group(_) => Err(ReaderError::Container(format!("'{path}' is not a dataset"))),
        }
    }
}

fn missing(path: &str) -> ReaderError {
    ReaderError::Container(format!("no node at '{path}'"))
}

impl Container for MemoryHandle {
    fn children(&self, group: &str) -> Result<Vec<(String, NodeKind)>, ReaderError> {
        match self.lookup(group)? {
            NodeRef::Group(group) => Ok(group
                .children
                .iter()
                .map(|(name, node)| {
                    let kind = match node {
                        MemoryNode::Group(_) => NodeKind::Group,
                        MemoryNode::Dataset(_) => NodeKind::Dataset,
                    };
                    (name.clone(), kind)
                })
                .collect()),
            NodeRef::Dataset(_) => Err(ReaderError::Container(format!("'{group}' is not a group"))),
        }
    }

    fn attribute(&self, node: &str, name: &str) -> Result<Option<RawValues>, ReaderError> {
        let attributes = match self.lookup(node)? {
            NodeRef::Group(group) => &group.attributes,
            NodeRef::Dataset(dataset) => &dataset.attributes,
        };
        Ok(attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.clone()))
    }

    fn shape(&self, dataset: &str) -> Result<Vec<usize>, ReaderError> {
        Ok(self.dataset(dataset)?.shape.clone())
    }

    fn read(&self, dataset: &str) -> Result<RawValues, ReaderError> {
        Ok(self.dataset(dataset)?.values.clone())
    }

    fn read_range(&self, dataset: &str, start: usize, len: usize) -> Result<RawValues, ReaderError> {
        Ok(self.dataset(dataset)?.values.slice(start, len))
    }
}
