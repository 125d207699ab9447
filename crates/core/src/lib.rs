//! MultiPad 編輯引擎核心：文件模型、可反轉命令、編輯器抽象與事件匯流排。
//! Core of the MultiPad editing engine: document models, reversible commands,
//! the editor abstraction and the lifecycle event bus.

pub mod command;
pub mod editor;
pub mod event;
pub mod text;
pub mod xml;

pub use command::{EditCommand, EditError, History};
pub use editor::{Document, Editor, EditorError, EditorKind};
pub use event::{EditOp, EditorEvent, Observer, ObserverBus, ObserverError};
pub use text::{LineEnding, TextDocument, TextError};
pub use xml::{DetachedSubtree, TraverseItem, XmlDocument, XmlElement, XmlError};
