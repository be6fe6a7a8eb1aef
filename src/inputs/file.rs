use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::SnapshotSource;
use crate::domain::{CycleOutcome, SensorSnapshot};

/// Reads a JSON snapshot file each cycle and optionally writes the outcome
/// as JSON next to it.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    snapshot_path: PathBuf,
    output_path: Option<PathBuf>,
}

impl FileSnapshotSource {
    pub fn new(snapshot_path: impl Into<PathBuf>, output_path: Option<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            output_path,
        }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn read_snapshot(&self) -> Result<SensorSnapshot> {
        let raw = tokio::fs::read_to_string(&self.snapshot_path)
            .await
            .with_context(|| format!("reading snapshot {}", self.snapshot_path.display()))?;
        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing snapshot {}", self.snapshot_path.display()))?;
        Ok(snapshot)
    }

    async fn publish(&self, outcome: &CycleOutcome) -> Result<()> {
        let Some(path) = &self.output_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(outcome)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing outcome {}", path.display()))?;
        debug!(path = %path.display(), "outcome written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MissingInput;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_snapshot_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"indoor_temp": 21.0, "outdoor_temp": -2.0, "target_temp": 21.0,
                "summer_threshold": 18.0, "prices": [1.0, 2.0]}}"#
        )
        .unwrap();

        let source = FileSnapshotSource::new(file.path(), None);
        let snapshot = source.read_snapshot().await.unwrap();
        assert_eq!(snapshot.outdoor_temp, Some(-2.0));
        assert_eq!(snapshot.prices, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSnapshotSource::new(dir.path().join("absent.json"), None);
        let err = source.read_snapshot().await.unwrap_err();
        assert!(err.to_string().contains("reading snapshot"));
    }

    #[tokio::test]
    async fn test_publishes_outcome_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("outcome.json");
        let source = FileSnapshotSource::new(dir.path().join("in.json"), Some(out.clone()));

        let outcome = CycleOutcome::Unavailable {
            timestamp: Utc::now(),
            missing: vec![MissingInput::OutdoorTemp],
        };
        source.publish(&outcome).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(written["status"], "unavailable");
        assert_eq!(written["missing"][0], "outdoor_temp");
    }
}
