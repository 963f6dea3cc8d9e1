use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no history for {node} in window {window}")]
    NotFound { node: String, window: u64 },
    #[error("history read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid history payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}
