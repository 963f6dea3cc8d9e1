mod directory;
mod error;
mod wire;

use async_trait::async_trait;

use crate::playback::Sample;

pub use directory::DirectorySource;
pub use error::SourceError;

/// Remote predictor history, one window per call.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch(&self, node_id: &str, window: u64) -> Result<Vec<Sample>, SourceError>;
}
