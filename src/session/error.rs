use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session configuration stored")]
    NotConfigured,
    #[error("invalid session configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session has no nodes")]
    NoNodes,
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("node {node} shadows unknown node {reference}")]
    UnknownShadowReference { node: String, reference: String },
    #[error("node {0} cannot shadow a node that is itself shadowed")]
    ChainedShadow(String),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
