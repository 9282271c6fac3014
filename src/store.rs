use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ReaderError;

pub trait StorageBackend: Send + Sync {
    fn get(&self, path: &str) -> Result<Vec<u8>, ReaderError>;
    fn list(&self, path: &str) -> Result<Vec<String>, ReaderError>;
}

pub fn join_path(base: &str, segment: &str) -> String {
    match (base.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base.trim_end_matches('/'), segment),
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: Utf8PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Utf8PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

impl StorageBackend for LocalStore {
    fn get(&self, path: &str) -> Result<Vec<u8>, ReaderError> {
        let full = self.resolve(path);
        fs::read(full.as_std_path()).map_err(|err| ReaderError::Storage {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    fn list(&self, path: &str) -> Result<Vec<String>, ReaderError> {
        let full = self.resolve(path);
        let entries = fs::read_dir(full.as_std_path()).map_err(|err| ReaderError::Storage {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ReaderError::Storage {
                path: path.to_string(),
                message: err.to_string(),
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Vec<u8>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches
            .lock()
            .map(|guard| guard.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl StorageBackend for MemoryStore {
    fn get(&self, path: &str) -> Result<Vec<u8>, ReaderError> {
        if let Ok(mut guard) = self.fetches.lock() {
            *guard.entry(path.to_string()).or_insert(0) += 1;
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ReaderError::Storage {
                path: path.to_string(),
                message: "no such file".to_string(),
            })
    }

    fn list(&self, path: &str) -> Result<Vec<String>, ReaderError> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path.trim_end_matches('/'))
        };
        let children = self
            .files
            .keys()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>();
        if children.is_empty() {
            return Err(ReaderError::Storage {
                path: path.to_string(),
                message: "no such directory".to_string(),
            });
        }
        Ok(children.into_iter().collect())
    }
}
