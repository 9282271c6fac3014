use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;

use crate::container::ContainerEngine;
use crate::error::ReaderError;
use crate::store::{StorageBackend, join_path};

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub summarized_experiment: Option<SummarizedExperimentMeta>,
    #[serde(default)]
    pub single_cell_experiment: Option<SingleCellExperimentMeta>,
    #[serde(default)]
    pub simple_list: Option<SimpleListMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizedExperimentMeta {
    #[serde(default)]
    pub dimensions: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SingleCellExperimentMeta {
    #[serde(default)]
    pub main_experiment_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleListMeta {
    #[serde(default)]
    pub format: Option<String>,
}

// Only JSON documents and listings are cached; container bytes are refetched.
pub struct Navigator<S, E> {
    backend: S,
    engine: E,
    content: RwLock<HashMap<String, Arc<Value>>>,
    listing: RwLock<HashMap<String, Arc<Vec<String>>>>,
}

impl<S: StorageBackend, E: ContainerEngine> Navigator<S, E> {
    pub fn new(backend: S, engine: E) -> Self {
        Self {
            backend,
            engine,
            content: RwLock::new(HashMap::new()),
            listing: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn fetch_json(&self, path: &str) -> Result<Arc<Value>, ReaderError> {
        let cached = self
            .content
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        if let Some(value) = cached {
            tracing::debug!(path, "json cache hit");
            return Ok(value);
        }

        let bytes = self.backend.get(path)?;
        let parsed: Value = serde_json::from_slice(&bytes).map_err(|err| ReaderError::Json {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        let parsed = Arc::new(parsed);
        self.content
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_insert_with(|| Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn fetch_metadata(&self, path: &str) -> Result<ObjectDescriptor, ReaderError> {
        let object_path = join_path(path, "OBJECT");
        let value = self.fetch_json(&object_path)?;
        ObjectDescriptor::deserialize(value.as_ref()).map_err(|err| ReaderError::Json {
            path: object_path,
            message: err.to_string(),
        })
    }

    pub fn list_children(&self, path: &str) -> Result<Arc<Vec<String>>, ReaderError> {
        let cached = self
            .listing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        if let Some(listed) = cached {
            tracing::debug!(path, "listing cache hit");
            return Ok(listed);
        }

        let listed = Arc::new(self.backend.list(path)?);
        self.listing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_insert_with(|| Arc::clone(&listed));
        Ok(listed)
    }

    pub fn has_child(&self, path: &str, name: &str) -> Result<bool, ReaderError> {
        Ok(self.list_children(path)?.iter().any(|child| child == name))
    }

    pub fn fetch_names(&self, path: &str) -> Result<Vec<String>, ReaderError> {
        let value = self.fetch_json(path)?;
        Vec::<String>::deserialize(value.as_ref()).map_err(|err| ReaderError::Json {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    pub fn get(&self, path: &str) -> Result<Vec<u8>, ReaderError> {
        self.backend.get(path)
    }

    pub fn open(&self, path: &str) -> Result<E::Handle, ReaderError> {
        let bytes = self.backend.get(path)?;
        self.engine.open(bytes)
    }

    pub fn clear(&self) {
        self.content
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.listing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::memory::MemoryEngine;
    use crate::store::MemoryStore;

    #[test]
    fn json_is_fetched_once_until_cleared() {
        let mut store = MemoryStore::new();
        store.insert(
            "obj/OBJECT",
            br#"{"type": "summarized_experiment", "summarized_experiment": {"dimensions": [3, 2]}}"#
                .to_vec(),
        );
        let navigator = Navigator::new(store, MemoryEngine::new());

        let first = navigator.fetch_metadata("obj").unwrap();
        let second = navigator.fetch_metadata("obj").unwrap();
        assert_eq!(first.kind, "summarized_experiment");
        assert_eq!(second.summarized_experiment.unwrap().dimensions, vec![3, 2]);
        assert_eq!(navigator.backend().fetch_count("obj/OBJECT"), 1);

        navigator.clear();
        navigator.fetch_metadata("obj").unwrap();
        assert_eq!(navigator.backend().fetch_count("obj/OBJECT"), 2);
    }

    #[test]
    fn retrieval_failures_propagate() {
        let navigator = Navigator::new(MemoryStore::new(), MemoryEngine::new());
        let err = navigator.fetch_json("missing/OBJECT").unwrap_err();
        assert!(matches!(err, ReaderError::Storage { .. }));
    }
}
