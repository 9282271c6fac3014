pub mod array;
pub mod config;
pub mod container;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod experiment;
pub mod list;
pub mod matrix;
pub mod modality;
pub mod navigator;
pub mod result;
pub mod store;
pub mod table;
pub mod values;

pub use config::{ConfigLoader, DatasetOptions, PerModality, ResultOptions};
pub use dataset::{DatasetLoader, DatasetSummary, LoadedDataset};
pub use domain::{Modality, Selector, SizeFactorSource};
pub use error::{ReaderError, SkippedPart};
pub use matrix::{CanonicalMatrix, MatrixEngine, MultiMatrix, NativeEngine};
pub use navigator::Navigator;
pub use result::{LoadedResult, ResultLoader, ResultSummary};
pub use store::{LocalStore, MemoryStore, StorageBackend};
