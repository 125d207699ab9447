use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use multipad_core::EditorKind;

use crate::util::write_atomic;

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Serialisable editor kind recorded in the snapshot.
/// 快照中記錄的可序列化編輯器種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Text,
    Xml,
}

impl From<EditorKind> for SnapshotKind {
    fn from(kind: EditorKind) -> Self {
        match kind {
            EditorKind::Text => SnapshotKind::Text,
            EditorKind::Xml => SnapshotKind::Xml,
        }
    }
}

impl From<SnapshotKind> for EditorKind {
    fn from(kind: SnapshotKind) -> Self {
        match kind {
            SnapshotKind::Text => EditorKind::Text,
            SnapshotKind::Xml => EditorKind::Xml,
        }
    }
}

/// One open file recorded in the snapshot.
/// 快照中記錄的一個開啟檔案。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub path: PathBuf,
    pub kind: SnapshotKind,
}

/// Persistence-only projection of workspace identity: open files and the
/// active selection. Undo/redo history is never captured.
/// 工作區身分的持久化投影：開啟檔案與作用中選擇；絕不包含復原歷史。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub format_version: u32,
    #[serde(default)]
    pub open_files: Vec<SnapshotEntry>,
    #[serde(default)]
    pub active_file: Option<PathBuf>,
}

impl WorkspaceSnapshot {
    pub fn new(open_files: Vec<SnapshotEntry>, active_file: Option<PathBuf>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            open_files,
            active_file,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.open_files.is_empty()
    }
}

/// Error type for snapshot persistence.
/// 快照持久化時可能出現的錯誤。
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot file IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid snapshot payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Stores the workspace snapshot on disk as versioned JSON.
/// 以版本化 JSON 形式將工作區快照存放於磁碟。
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot from disk. A missing file returns `Ok(None)`.
    /// 從磁碟載入快照；檔案不存在時回傳 `Ok(None)`。
    pub fn load(&self) -> Result<Option<WorkspaceSnapshot>, SnapshotError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let snapshot: WorkspaceSnapshot = serde_json::from_str(&contents)?;
                Ok(Some(snapshot))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SnapshotError::Io(err)),
        }
    }

    /// Persists the snapshot using atomic writes.
    /// 以原子寫入方式儲存快照。
    pub fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_snapshot_loads_as_none() {
        let tmp = tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn snapshot_round_trips() {
        let tmp = tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("state.json"));
        let snapshot = WorkspaceSnapshot::new(
            vec![
                SnapshotEntry {
                    path: PathBuf::from("notes.txt"),
                    kind: SnapshotKind::Text,
                },
                SnapshotEntry {
                    path: PathBuf::from("doc.xml"),
                    kind: SnapshotKind::Xml,
                },
            ],
            Some(PathBuf::from("doc.xml")),
        );

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.format_version, SNAPSHOT_FORMAT_VERSION);
    }

    #[test]
    fn corrupt_snapshot_is_an_invalid_payload() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let err = SnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidPayload(_)));
    }
}
