use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use multipad_core::{EditOp, Editor, EditorError, EditorEvent, EditorKind, Observer, ObserverBus};

use crate::snapshot::{SnapshotEntry, WorkspaceSnapshot};

/// 尚不存在的 XML 檔案以最小文件起始，讓結構編輯有掛載點。 /
/// A missing XML file starts from a minimal document so structural edits
/// have an anchor.
const EMPTY_XML_DOCUMENT: &str = r#"<root id="root"/>"#;

/// Errors raised by workspace operations.
/// 工作區操作相關的錯誤。
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("no editor open for {0:?}")]
    NotOpen(PathBuf),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One file skipped during best-effort restoration.
/// 還原過程中被略過的一個檔案。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreIssue {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of a best-effort snapshot restoration.
/// 快照盡力還原的結果。
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub opened: usize,
    pub issues: Vec<RestoreIssue>,
}

/// Entry produced for editor-list display.
/// 供編輯器清單顯示使用的條目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorListEntry {
    pub path: PathBuf,
    pub kind: EditorKind,
    pub active: bool,
    pub dirty: bool,
}

/// The set of currently open editors plus the active-selection pointer.
/// 目前開啟的編輯器集合與作用中選擇指標。
///
/// 工作區與其編輯器共用一個觀察者匯流排；內部編輯器映射絕不對外曝露，
/// 持久化只透過不透明的快照值進行（備忘錄紀律）。 / The workspace shares one
/// observer bus with every editor it hosts; the internal editor map is never
/// exposed, persistence goes only through the opaque snapshot value.
#[derive(Debug)]
pub struct Workspace {
    editors: BTreeMap<PathBuf, Editor>,
    active: Option<PathBuf>,
    bus: ObserverBus,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            editors: BTreeMap::new(),
            active: None,
            bus: ObserverBus::new(),
        }
    }

    /// 訂閱工作區（及其所有編輯器）的生命週期事件。 / Subscribes an observer to workspace and editor lifecycle events.
    pub fn register_observer(&self, observer: Rc<RefCell<dyn Observer>>) {
        self.bus.register(observer);
    }

    pub fn open_count(&self) -> usize {
        self.editors.len()
    }

    /// 已開啟則僅切換作用中（不重新載入）；否則依副檔名建立編輯器並載入。 /
    /// Makes the path active when already open (no reload); otherwise builds
    /// an editor via the extension-keyed factory, loading an empty document
    /// when the file does not exist, and emits `Opened`.
    pub fn open_or_create(&mut self, path: impl Into<PathBuf>) -> Result<(), WorkspaceError> {
        let path = path.into();
        if self.editors.contains_key(&path) {
            self.active = Some(path);
            return Ok(());
        }
        let kind = EditorKind::from_path(&path);
        self.open_internal(path, kind)
    }

    /// 無論磁碟內容為何，都以全新空文件建立編輯器。 / Builds a fresh empty editor regardless of any on-disk content.
    pub fn init(&mut self, path: impl Into<PathBuf>) -> Result<(), WorkspaceError> {
        let path = path.into();
        if let Some(editor) = self.editors.remove(&path) {
            editor.close();
        }
        let kind = EditorKind::from_path(&path);
        let content = match kind {
            EditorKind::Text => "",
            EditorKind::Xml => EMPTY_XML_DOCUMENT,
        };
        let editor = Editor::open(path.clone(), kind, content, self.bus.clone())?;
        self.editors.insert(path.clone(), editor);
        self.bus.notify(&EditorEvent::now(&path, EditOp::Opened));
        self.active = Some(path);
        Ok(())
    }

    fn open_internal(&mut self, path: PathBuf, kind: EditorKind) -> Result<(), WorkspaceError> {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => match kind {
                EditorKind::Text => String::new(),
                EditorKind::Xml => EMPTY_XML_DOCUMENT.to_string(),
            },
            Err(err) => return Err(WorkspaceError::Io(err)),
        };
        let editor = Editor::open(path.clone(), kind, &content, self.bus.clone())?;
        self.editors.insert(path.clone(), editor);
        self.bus.notify(&EditorEvent::now(&path, EditOp::Opened));
        self.active = Some(path);
        Ok(())
    }

    /// 關閉編輯器並丟棄其歷史；若其為作用中則不自動遞補。 /
    /// Closes the editor, discarding its history; when it was active, no
    /// other editor is auto-promoted.
    pub fn close(&mut self, path: &Path) -> Result<(), WorkspaceError> {
        let editor = self
            .editors
            .remove(path)
            .ok_or_else(|| WorkspaceError::NotOpen(path.to_path_buf()))?;
        editor.close();
        if self.active.as_deref() == Some(path) {
            self.active = None;
        }
        Ok(())
    }

    pub fn set_active(&mut self, path: &Path) -> Result<(), WorkspaceError> {
        if !self.editors.contains_key(path) {
            return Err(WorkspaceError::NotOpen(path.to_path_buf()));
        }
        self.active = Some(path.to_path_buf());
        Ok(())
    }

    /// 無作用中編輯器是合法、可查詢的狀態，不是錯誤。 / Having no active editor is a valid, checkable state, not an error.
    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    pub fn active_editor(&self) -> Option<&Editor> {
        self.active.as_ref().and_then(|path| self.editors.get(path))
    }

    pub fn active_editor_mut(&mut self) -> Option<&mut Editor> {
        match &self.active {
            Some(path) => self.editors.get_mut(path),
            None => None,
        }
    }

    pub fn editor(&self, path: &Path) -> Option<&Editor> {
        self.editors.get(path)
    }

    pub fn editor_mut(&mut self, path: &Path) -> Option<&mut Editor> {
        self.editors.get_mut(path)
    }

    /// 供顯示用的開啟編輯器清單。 / Open-editor listing for display purposes.
    pub fn editor_list(&self) -> Vec<EditorListEntry> {
        self.editors
            .values()
            .map(|editor| EditorListEntry {
                path: editor.path().to_path_buf(),
                kind: editor.kind(),
                active: self.active.as_deref() == Some(editor.path()),
                dirty: editor.is_dirty(),
            })
            .collect()
    }

    /// 產生不透明的持久化投影；不含復原歷史。 / Produces the opaque persistence projection; no undo history.
    pub fn capture_snapshot(&self) -> WorkspaceSnapshot {
        let open_files = self
            .editors
            .values()
            .map(|editor| SnapshotEntry {
                path: editor.path().to_path_buf(),
                kind: editor.kind().into(),
            })
            .collect();
        WorkspaceSnapshot::new(open_files, self.active.clone())
    }

    /// 盡力還原：載入失敗的檔案記錄警告後略過，絕不中止整體還原。 /
    /// Best-effort restoration: files that fail to load are skipped with a
    /// recorded warning; the restore as a whole never aborts.
    pub fn restore_state(&mut self, snapshot: &WorkspaceSnapshot) -> RestoreReport {
        let mut report = RestoreReport::default();
        for entry in &snapshot.open_files {
            if !entry.path.exists() {
                report.issues.push(RestoreIssue {
                    path: entry.path.clone(),
                    message: "file no longer exists on disk".to_string(),
                });
                continue;
            }
            match self.open_internal(entry.path.clone(), entry.kind.into()) {
                Ok(()) => report.opened += 1,
                Err(err) => report.issues.push(RestoreIssue {
                    path: entry.path.clone(),
                    message: err.to_string(),
                }),
            }
        }
        // 記錄的作用中檔案只有在成功重新開啟時才恢復。 / The recorded active file is restored only when it reopened.
        self.active = snapshot
            .active_file
            .as_ref()
            .filter(|path| self.editors.contains_key(*path))
            .cloned();
        report
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
