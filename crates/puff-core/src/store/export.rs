// # Status Snapshot Export
//
// Writes the status snapshot as JSON for consumers outside the process
// (dashboards, the web UI). Read-only from the monitor's point of view.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "generated_at": "2025-01-09T12:00:00Z",
//   "statuses": [
//     {
//       "domain": "example.com",
//       "registered": false,
//       "redemption": false,
//       "pending_delete": false,
//       "last_checked": "2025-01-09T12:00:00Z",
//       "first_flagged_at": "2025-01-09T11:55:00Z",
//       "check_count": 2,
//       "needs_notification": false,
//       "is_final_notice": false,
//       "final_noticed": false
//     }
//   ]
// }
// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::status::DomainStatus;
use crate::Error;

/// Snapshot file format version
const SNAPSHOT_FILE_VERSION: &str = "1.0";

/// Serializable snapshot file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Format version
    pub version: String,
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Records in snapshot order
    pub statuses: Vec<DomainStatus>,
}

/// Write a status snapshot to `path` atomically
pub async fn write_snapshot(path: impl AsRef<Path>, statuses: &[DomainStatus]) -> Result<(), Error> {
    let file = SnapshotFile {
        version: SNAPSHOT_FILE_VERSION.to_string(),
        generated_at: Utc::now(),
        statuses: statuses.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file)?;

    write_atomic(path.as_ref(), json.as_bytes()).await?;
    tracing::trace!("Status snapshot written to {}", path.as_ref().display());
    Ok(())
}

/// Read a snapshot back (used by tooling and tests)
pub async fn read_snapshot(path: impl AsRef<Path>) -> Result<SnapshotFile, Error> {
    let content = fs::read_to_string(path.as_ref()).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Write bytes to a sibling temp file, then rename over `path`
///
/// Parent directories are created when missing.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).await.map_err(|e| {
            Error::source(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path(path);
    {
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            Error::source(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        file.write_all(bytes).await?;
        file.flush().await?;
    }

    fs::rename(&temp_path, path).await.map_err(|e| {
        Error::source(format!(
            "Failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })?;

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
