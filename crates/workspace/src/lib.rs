//! Workspace/session management primitives for MultiPad.
//! 管理 MultiPad 多文件工作區、快照持久化與稽核觀察者的模組。

mod util;

pub mod observers;
pub mod snapshot;
pub mod workspace;

pub use observers::{AuditRecord, LogObserver, StatisticsObserver, TrailError};
pub use snapshot::{
    SnapshotEntry, SnapshotError, SnapshotKind, SnapshotStore, WorkspaceSnapshot,
    SNAPSHOT_FORMAT_VERSION,
};
pub use workspace::{
    EditorListEntry, RestoreIssue, RestoreReport, Workspace, WorkspaceError,
};
