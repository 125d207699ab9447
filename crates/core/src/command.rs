use thiserror::Error;

use crate::editor::{Document, EditorKind};
use crate::text::{TextDocument, TextError};
use crate::xml::{DetachedSubtree, XmlDocument, XmlElement, XmlError};

/// 套用或反轉命令時可能發生的錯誤。 / Errors raised while applying or reverting a command.
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Text(#[from] TextError),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("{found} editor cannot apply a {expected} command")]
    KindMismatch {
        expected: EditorKind,
        found: EditorKind,
    },
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error("command has not been applied yet")]
    NotApplied,
}

/// 可反轉的編輯命令；每個變體攜帶套用與反轉所需的全部資料。 /
/// A reversible edit command; each variant carries exactly the data needed
/// to apply and reverse itself. Variants without a natural inverse capture
/// the prior state at apply time.
#[derive(Debug, Clone)]
pub enum EditCommand {
    InsertLine {
        line: usize,
        text: String,
    },
    DeleteLine {
        line: usize,
        removed: Option<String>,
    },
    ReplaceLines {
        start: usize,
        count: usize,
        new_lines: Vec<String>,
        old_lines: Option<Vec<String>>,
    },
    XmlInsertBefore {
        target_id: String,
        element: XmlElement,
    },
    XmlAppendChild {
        parent_id: String,
        element: XmlElement,
    },
    XmlDelete {
        id: String,
        removed: Option<DetachedSubtree>,
    },
    XmlEditId {
        old_id: String,
        new_id: String,
    },
    XmlEditText {
        id: String,
        text: Option<String>,
        prior: Option<Option<String>>,
    },
}

impl EditCommand {
    /// 此命令預期的編輯器種類。 / The editor kind this command targets.
    pub fn target_kind(&self) -> EditorKind {
        match self {
            EditCommand::InsertLine { .. }
            | EditCommand::DeleteLine { .. }
            | EditCommand::ReplaceLines { .. } => EditorKind::Text,
            _ => EditorKind::Xml,
        }
    }

    /// 正向執行命令，必要時擷取反轉所需的狀態。 / Executes the command, capturing inverse state where needed.
    pub fn apply(&mut self, document: &mut Document) -> Result<(), EditError> {
        match self {
            EditCommand::InsertLine { line, text } => {
                text_document(document)?.insert_line(*line, text.clone())?;
            }
            EditCommand::DeleteLine { line, removed } => {
                *removed = Some(text_document(document)?.remove_line(*line)?);
            }
            EditCommand::ReplaceLines {
                start,
                count,
                new_lines,
                old_lines,
            } => {
                *old_lines =
                    Some(text_document(document)?.replace_range(*start, *count, new_lines.clone())?);
            }
            EditCommand::XmlInsertBefore { target_id, element } => {
                xml_document(document)?.insert_before(target_id, element.clone())?;
            }
            EditCommand::XmlAppendChild { parent_id, element } => {
                xml_document(document)?.append_child(parent_id, element.clone())?;
            }
            EditCommand::XmlDelete { id, removed } => {
                *removed = Some(xml_document(document)?.delete(id)?);
            }
            EditCommand::XmlEditId { old_id, new_id } => {
                xml_document(document)?.edit_id(old_id, new_id)?;
            }
            EditCommand::XmlEditText { id, text, prior } => {
                *prior = Some(xml_document(document)?.edit_text(id, text.clone())?);
            }
        }
        Ok(())
    }

    /// 反轉命令，將文件還原到套用前的狀態。 / Reverts the command, restoring the pre-apply state.
    pub fn revert(&mut self, document: &mut Document) -> Result<(), EditError> {
        match self {
            EditCommand::InsertLine { line, .. } => {
                text_document(document)?.remove_line(*line)?;
            }
            EditCommand::DeleteLine { line, removed } => {
                let text = removed.clone().ok_or(EditError::NotApplied)?;
                text_document(document)?.insert_line(*line, text)?;
            }
            EditCommand::ReplaceLines {
                start,
                new_lines,
                old_lines,
                ..
            } => {
                let old = old_lines.clone().ok_or(EditError::NotApplied)?;
                text_document(document)?.replace_range(*start, new_lines.len(), old)?;
            }
            EditCommand::XmlInsertBefore { element, .. }
            | EditCommand::XmlAppendChild { element, .. } => {
                xml_document(document)?.delete(&element.id)?;
            }
            EditCommand::XmlDelete { removed, .. } => {
                let captured = removed.clone().ok_or(EditError::NotApplied)?;
                xml_document(document)?.insert_at(
                    &captured.parent_id,
                    captured.position,
                    captured.element,
                )?;
            }
            EditCommand::XmlEditId { old_id, new_id } => {
                xml_document(document)?.edit_id(new_id, old_id)?;
            }
            EditCommand::XmlEditText { id, prior, .. } => {
                let prior = prior.clone().ok_or(EditError::NotApplied)?;
                xml_document(document)?.edit_text(id, prior)?;
            }
        }
        Ok(())
    }
}

fn text_document(document: &mut Document) -> Result<&mut TextDocument, EditError> {
    match document {
        Document::Text(doc) => Ok(doc),
        Document::Xml(_) => Err(EditError::KindMismatch {
            expected: EditorKind::Text,
            found: EditorKind::Xml,
        }),
    }
}

fn xml_document(document: &mut Document) -> Result<&mut XmlDocument, EditError> {
    match document {
        Document::Xml(doc) => Ok(doc),
        Document::Text(_) => Err(EditError::KindMismatch {
            expected: EditorKind::Xml,
            found: EditorKind::Text,
        }),
    }
}

/// 單一編輯器的復原/重做歷史。 / Per-editor undo/redo history.
///
/// 兩個堆疊只存在於記憶體中，編輯器關閉即丟棄，絕不持久化。 /
/// Both stacks live only in memory; the history is discarded when the editor
/// closes and is never persisted.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<EditCommand>,
    redo: Vec<EditCommand>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否有已套用而未復原的命令。 / Whether at least one applied command is pending.
    pub fn is_dirty(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// 執行新命令並推入復原堆疊；重做堆疊作廢。 / Executes a new command, pushing it onto the undo stack and
    /// discarding the divergent redo timeline.
    pub fn apply(
        &mut self,
        document: &mut Document,
        mut command: EditCommand,
    ) -> Result<(), EditError> {
        command.apply(document)?;
        self.undo.push(command);
        self.redo.clear();
        Ok(())
    }

    /// 復原最近一個命令。 / Undoes the most recent command.
    pub fn undo(&mut self, document: &mut Document) -> Result<(), EditError> {
        let mut command = self.undo.pop().ok_or(EditError::NothingToUndo)?;
        match command.revert(document) {
            Ok(()) => {
                self.redo.push(command);
                Ok(())
            }
            Err(err) => {
                // 失敗時命令放回原堆疊，歷史保持一致。 / On failure the command goes back so the history stays consistent.
                self.undo.push(command);
                Err(err)
            }
        }
    }

    /// 重做最近一個被復原的命令。 / Redoes the most recently undone command.
    pub fn redo(&mut self, document: &mut Document) -> Result<(), EditError> {
        let mut command = self.redo.pop().ok_or(EditError::NothingToRedo)?;
        match command.apply(document) {
            Ok(()) => {
                self.undo.push(command);
                Ok(())
            }
            Err(err) => {
                self.redo.push(command);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_doc(content: &str) -> Document {
        Document::Text(TextDocument::from_content(content))
    }

    fn xml_doc(content: &str) -> Document {
        Document::Xml(XmlDocument::parse(content).unwrap())
    }

    fn contents(document: &Document) -> String {
        document.serialize()
    }

    #[test]
    fn apply_then_equal_undos_restores_original_state() {
        let mut document = text_doc("a\nb\n");
        let mut history = History::new();
        let before = contents(&document);

        history
            .apply(&mut document, EditCommand::InsertLine { line: 3, text: "c".into() })
            .unwrap();
        history
            .apply(&mut document, EditCommand::DeleteLine { line: 1, removed: None })
            .unwrap();
        history
            .apply(
                &mut document,
                EditCommand::ReplaceLines {
                    start: 1,
                    count: 2,
                    new_lines: vec!["X".into()],
                    old_lines: None,
                },
            )
            .unwrap();
        assert_eq!(contents(&document), "X\n");

        history.undo(&mut document).unwrap();
        history.undo(&mut document).unwrap();
        history.undo(&mut document).unwrap();
        assert_eq!(contents(&document), before);
        assert!(!history.is_dirty());
    }

    #[test]
    fn redo_after_undo_reproduces_post_apply_state() {
        let mut document = text_doc("one\n");
        let mut history = History::new();
        history
            .apply(
                &mut document,
                EditCommand::ReplaceLines {
                    start: 1,
                    count: 1,
                    new_lines: vec!["uno".into(), "dos".into()],
                    old_lines: None,
                },
            )
            .unwrap();
        let after = contents(&document);

        history.undo(&mut document).unwrap();
        assert_eq!(contents(&document), "one\n");
        history.redo(&mut document).unwrap();
        assert_eq!(contents(&document), after);
    }

    #[test]
    fn new_apply_discards_redo_stack() {
        let mut document = text_doc("a\n");
        let mut history = History::new();
        history
            .apply(&mut document, EditCommand::InsertLine { line: 2, text: "b".into() })
            .unwrap();
        history.undo(&mut document).unwrap();
        history
            .apply(&mut document, EditCommand::InsertLine { line: 2, text: "c".into() })
            .unwrap();

        let err = history.redo(&mut document).unwrap_err();
        assert!(matches!(err, EditError::NothingToRedo));
    }

    #[test]
    fn undo_on_empty_history_is_informational() {
        let mut document = text_doc("");
        let mut history = History::new();
        assert!(matches!(
            history.undo(&mut document),
            Err(EditError::NothingToUndo)
        ));
    }

    #[test]
    fn xml_commands_round_trip_through_undo_redo() {
        let mut document = xml_doc(r#"<root id="root"><a id="a">old</a></root>"#);
        let mut history = History::new();
        let before = contents(&document);

        history
            .apply(
                &mut document,
                EditCommand::XmlInsertBefore {
                    target_id: "a".into(),
                    element: XmlElement::new("item", "b"),
                },
            )
            .unwrap();
        history
            .apply(
                &mut document,
                EditCommand::XmlEditText {
                    id: "a".into(),
                    text: Some("new".into()),
                    prior: None,
                },
            )
            .unwrap();
        history
            .apply(
                &mut document,
                EditCommand::XmlEditId {
                    old_id: "b".into(),
                    new_id: "bee".into(),
                },
            )
            .unwrap();
        history
            .apply(&mut document, EditCommand::XmlDelete { id: "bee".into(), removed: None })
            .unwrap();
        let after = contents(&document);

        for _ in 0..4 {
            history.undo(&mut document).unwrap();
        }
        assert_eq!(contents(&document), before);

        for _ in 0..4 {
            history.redo(&mut document).unwrap();
        }
        assert_eq!(contents(&document), after);
    }

    #[test]
    fn failed_apply_leaves_history_and_document_untouched() {
        let mut document = xml_doc(r#"<root id="root"><a id="a"/></root>"#);
        let mut history = History::new();
        let before = contents(&document);

        let err = history
            .apply(
                &mut document,
                EditCommand::XmlAppendChild {
                    parent_id: "root".into(),
                    element: XmlElement::new("item", "a"),
                },
            )
            .unwrap_err();
        assert!(matches!(err, EditError::Xml(XmlError::DuplicateId(_))));
        assert_eq!(contents(&document), before);
        assert!(!history.is_dirty());
    }

    #[test]
    fn text_command_on_xml_editor_is_a_kind_mismatch() {
        let mut document = xml_doc(r#"<root id="root"/>"#);
        let mut history = History::new();
        let err = history
            .apply(&mut document, EditCommand::InsertLine { line: 1, text: "x".into() })
            .unwrap_err();
        assert!(matches!(
            err,
            EditError::KindMismatch {
                expected: EditorKind::Text,
                found: EditorKind::Xml,
            }
        ));
    }
}
