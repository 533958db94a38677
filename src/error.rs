use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpliceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not parse column '{column}' value '{value}'")]
    Parse { column: String, value: String },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("invalid locus '{name}': start {start} > end {end}")]
    InvalidLocus { name: String, start: i64, end: i64 },

    #[error("unknown splicing event type '{0}'")]
    UnknownEventType(String),

    #[error("invalid share record: {0}")]
    InvalidShare(String),

    #[error("malformed line: {0}")]
    MalformedLine(String),

    #[error("link refers to unknown node '{0}'")]
    UnknownNode(String),
}

pub type Result<T> = std::result::Result<T, SpliceError>;
