use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReaderError {
    #[error("failed to fetch '{path}': {message}")]
    Storage { path: String, message: String },

    #[error("failed to parse JSON at '{path}': {message}")]
    Json { path: String, message: String },

    #[error("failed to decompress '{path}': {message}")]
    Decompress { path: String, message: String },

    #[error("container error: {0}")]
    Container(String),

    #[error("malformed object at '{path}': {message}")]
    Structure { path: String, message: String },

    #[error("object at '{0}' does not declare its dimensions")]
    MissingDimensions(String),

    #[error("data frame column has unknown type '{0}'")]
    UnknownColumnType(String),

    #[error("column '{column}' has length {actual}, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("simple list contains unknown type '{0}'")]
    UnknownListType(String),

    #[error("non-standard simple list at '{path}': {message}")]
    MalformedList { path: String, message: String },

    #[error("unknown simple list format '{0}'")]
    UnknownListFormat(String),

    #[error("assay type '{0}' is currently not supported")]
    UnsupportedAssayType(String),

    #[error("reduced dimensions of type '{0}' are not yet supported")]
    UnsupportedReducedDimension(String),

    #[error("missing values in '{0}' are not yet supported")]
    MissingValuesUnsupported(String),

    #[error("assay '{0}' not found")]
    AssayNotFound(String),

    #[error("assay {0} out of range")]
    AssayOutOfRange(i64),

    #[error("reduced dimension '{0}' not found")]
    ReducedDimensionNotFound(String),

    #[error("matrix construction failed: {0}")]
    Matrix(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(String),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPart {
    pub path: String,
    pub reason: String,
}

#[derive(Debug)]
pub enum Partial<T> {
    Value(T),
    Skipped(SkippedPart),
}

impl<T> Partial<T> {
    pub fn recover(path: &str, result: Result<T, ReaderError>) -> Self {
        match result {
            Ok(value) => Partial::Value(value),
            Err(err) => Partial::Skipped(SkippedPart {
                path: path.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}
