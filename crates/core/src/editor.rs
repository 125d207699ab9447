use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::command::{EditCommand, EditError, History};
use crate::event::{EditOp, EditorEvent, ObserverBus};
use crate::text::TextDocument;
use crate::xml::{XmlDocument, XmlError};

/// 編輯器變體，依副檔名決定。 / Editor variant, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    Text,
    Xml,
}

impl EditorKind {
    /// 工廠鍵：`.xml` 開 XML 編輯器，其餘為純文字。 / Factory key: `.xml` opens an XML editor, anything else a text editor.
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => EditorKind::Xml,
            _ => EditorKind::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EditorKind::Text => "text",
            EditorKind::Xml => "xml",
        }
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 封閉的文件模型集合。 / Closed set of document models.
#[derive(Debug, Clone)]
pub enum Document {
    Text(TextDocument),
    Xml(XmlDocument),
}

impl Document {
    /// 依變體解析內容。 / Parses content according to the variant.
    pub fn parse(kind: EditorKind, content: &str) -> Result<Self, XmlError> {
        match kind {
            EditorKind::Text => Ok(Document::Text(TextDocument::from_content(content))),
            EditorKind::Xml => Ok(Document::Xml(XmlDocument::parse(content)?)),
        }
    }

    pub fn kind(&self) -> EditorKind {
        match self {
            Document::Text(_) => EditorKind::Text,
            Document::Xml(_) => EditorKind::Xml,
        }
    }

    /// 將文件模型序列化回文字。 / Serialises the document model back to text.
    pub fn serialize(&self) -> String {
        match self {
            Document::Text(doc) => doc.serialize(),
            Document::Xml(doc) => doc.serialize(),
        }
    }

    /// 唯讀文字抽取，供拼字檢查等純文字分析使用。 / Read-only text extraction for spell-check style analysis.
    ///
    /// XML 文件回傳走訪順序中的各元素文字。 / For XML documents this yields
    /// each element's text in traversal order.
    pub fn extract_text(&self) -> String {
        match self {
            Document::Text(doc) => doc.serialize(),
            Document::Xml(doc) => {
                let mut out = String::new();
                for item in doc.traverse() {
                    if let Some(text) = item.text {
                        if !out.is_empty() {
                            out.push('\n');
                        }
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }
}

/// 編輯器載入或儲存時可能發生的錯誤。 / Errors raised while loading or saving an editor.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("XML parse error: {0}")]
    Parse(#[from] XmlError),
    #[error(transparent)]
    Edit(#[from] EditError),
}

/// 一份開啟的文件及其專屬復原歷史。 / A single open document plus its own undo/redo history.
///
/// 每次成功的 load/save/applyEdit/close 都會向共享匯流排發佈事件。 /
/// Every successful load/save/applyEdit/close publishes an event to the
/// shared observer bus.
#[derive(Debug)]
pub struct Editor {
    path: PathBuf,
    document: Document,
    history: History,
    dirty: bool,
    bus: ObserverBus,
}

impl Editor {
    /// 解析內容並開啟編輯器，發佈 `Loaded` 事件。 / Parses the content and opens the editor, emitting `Loaded`.
    pub fn open(
        path: impl Into<PathBuf>,
        kind: EditorKind,
        content: &str,
        bus: ObserverBus,
    ) -> Result<Self, EditorError> {
        let path = path.into();
        let document = Document::parse(kind, content)?;
        let editor = Self {
            path,
            document,
            history: History::new(),
            dirty: false,
            bus,
        };
        editor.emit(EditOp::Loaded);
        Ok(editor)
    }

    /// 所屬檔案路徑，工作區以此作為身分鍵。 / The owning file path, used by the workspace as the identity key.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> EditorKind {
        self.document.kind()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// 是否有未儲存的變更。 / Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    /// 目前內容的序列化文字。 / The current contents as serialised text.
    pub fn contents(&self) -> String {
        self.document.serialize()
    }

    /// 透過命令歷史套用一個可反轉的編輯。 / Applies a reversible edit through the command history.
    pub fn apply_edit(&mut self, command: EditCommand) -> Result<(), EditError> {
        self.history.apply(&mut self.document, command)?;
        self.dirty = true;
        self.emit(EditOp::Edited);
        Ok(())
    }

    pub fn undo(&mut self) -> Result<(), EditError> {
        self.history.undo(&mut self.document)?;
        self.dirty = true;
        self.emit(EditOp::Undone);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), EditError> {
        self.history.redo(&mut self.document)?;
        self.dirty = true;
        self.emit(EditOp::Redone);
        Ok(())
    }

    /// 將文件寫回磁碟並發佈 `Saved` 事件。 / Writes the document back to disk and emits `Saved`.
    pub fn save(&mut self) -> Result<(), EditorError> {
        let serialized = self.document.serialize();
        // 先寫入暫存檔再重新命名，避免出現部分寫入的情況。 / Use a temporary file plus rename to guard against partial writes.
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("tmp_multipad");
        {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(serialized.as_bytes())?;
            tmp_file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.dirty = false;
        self.emit(EditOp::Saved);
        Ok(())
    }

    /// 關閉編輯器：發佈 `Closed` 並丟棄歷史。 / Closes the editor, emitting `Closed` and discarding the history.
    pub fn close(self) {
        self.emit(EditOp::Closed);
    }

    fn emit(&self, op: EditOp) {
        self.bus.notify(&EditorEvent::now(&self.path, op));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::event::{Observer, ObserverError};

    #[test]
    fn kind_from_path_keys_on_extension() {
        assert_eq!(EditorKind::from_path(Path::new("a.xml")), EditorKind::Xml);
        assert_eq!(EditorKind::from_path(Path::new("a.XML")), EditorKind::Xml);
        assert_eq!(EditorKind::from_path(Path::new("a.txt")), EditorKind::Text);
        assert_eq!(EditorKind::from_path(Path::new("noext")), EditorKind::Text);
    }

    #[test]
    fn open_rejects_malformed_xml() {
        let err = Editor::open(
            "broken.xml",
            EditorKind::Xml,
            "<root id=\"r\"><a id=\"x\"></root>",
            ObserverBus::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EditorError::Parse(_)));
    }

    #[test]
    fn save_round_trips_text_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut editor = Editor::open(
            &path,
            EditorKind::Text,
            "alpha\r\nbeta\r\n",
            ObserverBus::new(),
        )
        .unwrap();
        editor
            .apply_edit(EditCommand::InsertLine {
                line: 3,
                text: "gamma".into(),
            })
            .unwrap();
        editor.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "alpha\r\nbeta\r\ngamma\r\n");
        assert!(!editor.is_dirty());
    }

    #[test]
    fn save_round_trips_xml_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        let input = r#"<root id="root"><a id="a">hi</a></root>"#;
        let mut editor = Editor::open(&path, EditorKind::Xml, input, ObserverBus::new()).unwrap();
        editor.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), input);
    }

    struct Counter {
        ops: Rc<RefCell<Vec<EditOp>>>,
    }

    impl Observer for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn on_event(&mut self, event: &EditorEvent) -> Result<(), ObserverError> {
            self.ops.borrow_mut().push(event.op);
            Ok(())
        }
    }

    #[test]
    fn lifecycle_operations_emit_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let ops = Rc::new(RefCell::new(Vec::new()));
        let bus = ObserverBus::new();
        bus.register(Rc::new(RefCell::new(Counter { ops: Rc::clone(&ops) })));

        let mut editor = Editor::open(&path, EditorKind::Text, "", bus).unwrap();
        editor
            .apply_edit(EditCommand::InsertLine {
                line: 1,
                text: "x".into(),
            })
            .unwrap();
        editor.undo().unwrap();
        editor.redo().unwrap();
        editor.save().unwrap();
        editor.close();

        assert_eq!(
            *ops.borrow(),
            vec![
                EditOp::Loaded,
                EditOp::Edited,
                EditOp::Undone,
                EditOp::Redone,
                EditOp::Saved,
                EditOp::Closed,
            ]
        );
    }

    #[test]
    fn failed_edit_emits_no_event_and_stays_clean() {
        let ops = Rc::new(RefCell::new(Vec::new()));
        let bus = ObserverBus::new();
        bus.register(Rc::new(RefCell::new(Counter { ops: Rc::clone(&ops) })));
        let mut editor = Editor::open("a.txt", EditorKind::Text, "a\n", bus).unwrap();

        let err = editor
            .apply_edit(EditCommand::DeleteLine {
                line: 9,
                removed: None,
            })
            .unwrap_err();
        assert!(matches!(err, EditError::Text(_)));
        assert!(!editor.is_dirty());
        assert_eq!(*ops.borrow(), vec![EditOp::Loaded]);
    }
}
