use std::path::PathBuf;

use async_trait::async_trait;

use super::error::SourceError;
use super::wire::parse_history;
use super::HistorySource;
use crate::playback::Sample;

/// Serves windows from `<root>/<node_id>/<window>.json`.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn window_path(&self, node_id: &str, window: u64) -> PathBuf {
        self.root.join(node_id).join(format!("{}.json", window))
    }
}

#[async_trait]
impl HistorySource for DirectorySource {
    async fn fetch(&self, node_id: &str, window: u64) -> Result<Vec<Sample>, SourceError> {
        let path = self.window_path(node_id, window);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound {
                    node: node_id.to_string(),
                    window,
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(parse_history(node_id, &content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_window_file() {
        let dir = tempfile::tempdir().unwrap();
        let node_dir = dir.path().join("Node_002");
        std::fs::create_dir_all(&node_dir).unwrap();
        std::fs::write(
            node_dir.join("115.json"),
            r#"[{"Timestamp": 9, "Latitude": 36.75, "Longitude": 3.06,
                 "predicted_lat": 36.75, "predicted_lon": 3.06}]"#,
        )
        .unwrap();

        let source = DirectorySource::new(dir.path().to_path_buf());
        let samples = source.fetch("Node_002", 115).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, 9);

        assert!(matches!(
            source.fetch("Node_002", 116).await,
            Err(SourceError::NotFound { window: 116, .. })
        ));
    }
}
