//! Append-only graph snapshots.
//!
//! After every successful augmentation the full store is written to a new
//! `kg-<UTC timestamp>.nt` file. Files are opened with create-new semantics so
//! an existing snapshot is never overwritten; a name collision gets a numeric
//! suffix instead.

use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use crate::error::{GraphError, GraphResult};

use super::store::GraphStore;

const SNAPSHOT_PREFIX: &str = "kg-";
const SNAPSHOT_EXT: &str = "nt";

/// Writes timestamped N-Triples snapshots into one directory.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Create the writer, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> GraphResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| GraphError::Snapshot {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize the current store into a fresh snapshot file.
    pub fn write(&self, store: &GraphStore) -> GraphResult<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{SNAPSHOT_PREFIX}{stamp}.{SNAPSHOT_EXT}")
            } else {
                format!("{SNAPSHOT_PREFIX}{stamp}-{attempt}.{SNAPSHOT_EXT}")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    let mut out = BufWriter::new(file);
                    let written =
                        store
                            .write_ntriples(&mut out)
                            .map_err(|source| GraphError::Snapshot {
                                path: path.display().to_string(),
                                source,
                            })?;
                    tracing::info!(path = %path.display(), triples = written, "snapshot written");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => {
                    return Err(GraphError::Snapshot {
                        path: path.display().to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// All snapshot files in the directory, oldest first.
    pub fn list(&self) -> GraphResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| GraphError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;
        let mut snapshots: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_snapshot(p))
            .collect();
        snapshots.sort_by(|a, b| snapshot_order(a).cmp(&snapshot_order(b)));
        Ok(snapshots)
    }

    /// The most recent snapshot, if any.
    pub fn latest(&self) -> GraphResult<Option<PathBuf>> {
        Ok(self.list()?.pop())
    }
}

fn is_snapshot(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX));
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXT);
    name_ok && ext_ok
}

/// Sort key: timestamp, then collision suffix (so `-10` sorts after `-9`).
fn snapshot_order(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .trim_start_matches(SNAPSHOT_PREFIX);
    match stem.split_once('-') {
        Some((stamp, suffix)) => (stamp.to_string(), suffix.parse().unwrap_or(0)),
        None => (stem.to_string(), 0),
    }
}
