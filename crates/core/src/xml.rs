use std::collections::{HashMap, HashSet};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// 元素在節點倉儲中的插槽索引。 / Slot index of an element inside the node arena.
type NodeId = usize;

/// XML 文件樹操作錯誤。 / Errors raised by the XML document tree.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("element {0:?} not found")]
    NotFound(String),
    #[error("duplicate element id {0:?}")]
    DuplicateId(String),
    #[error("the root element cannot be deleted")]
    RootDeletionForbidden,
    #[error("the root element cannot have siblings")]
    RootSibling,
    #[error("failed to parse XML: {0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("element <{0}> is missing the id attribute")]
    MissingId(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("unexpected content after the root element")]
    TrailingContent,
}

/// 一個脫離文件樹的自有元素，用於插入負載與刪除反向操作的擷取。 /
/// An owned, detached element used as insertion payload and as the captured
/// inverse of a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub id: String,
    pub tag: String,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(tag: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

#[derive(Debug, Clone)]
struct XmlNode {
    id: String,
    tag: String,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// 自刪除操作擷取的子樹與其原始位置。 / A subtree captured by a delete, with its original location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSubtree {
    pub element: XmlElement,
    pub parent_id: String,
    pub position: usize,
}

/// 以插槽倉儲為後盾的單根 XML 元素樹。 / Single-rooted XML element tree backed by a slot arena.
///
/// 父指標一律以插槽索引表示，識別碼索引提供 O(1) 查找；識別碼在整棵樹中唯一。 /
/// Parent back-references are slot indices (never owning pointers) and the id
/// index gives O(1) lookup; ids are unique across the whole tree.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Option<XmlNode>>,
    free: Vec<NodeId>,
    index: HashMap<String, NodeId>,
    root: NodeId,
}

impl XmlDocument {
    /// 以單一根元素建立文件。 / Creates a document with a single root element.
    pub fn with_root(tag: impl Into<String>, id: impl Into<String>) -> Self {
        let node = XmlNode {
            id: id.into(),
            tag: tag.into(),
            text: None,
            parent: None,
            children: Vec::new(),
        };
        let mut index = HashMap::new();
        index.insert(node.id.clone(), 0);
        Self {
            nodes: vec![Some(node)],
            free: Vec::new(),
            index,
            root: 0,
        }
    }

    /// 從自有元素樹建立文件，檢查識別碼唯一性。 / Builds a document from an owned element tree, checking id uniqueness.
    pub fn from_element(root: XmlElement) -> Result<Self, XmlError> {
        let mut ids = Vec::new();
        root.collect_ids(&mut ids);
        let mut seen = HashSet::new();
        for id in &ids {
            if !seen.insert(*id) {
                return Err(XmlError::DuplicateId((*id).to_string()));
            }
        }
        let XmlElement {
            id,
            tag,
            text,
            children,
        } = root;
        let mut doc = Self::with_root(tag, id);
        if let Some(node) = doc.nodes[doc.root].as_mut() {
            node.text = text;
        }
        for child in children {
            let root_slot = doc.root;
            doc.attach(child, root_slot, usize::MAX);
        }
        Ok(doc)
    }

    /// 解析 XML 文字為文件樹。 / Parses XML text into a document tree.
    ///
    /// 標籤不匹配、缺少 id 屬性或識別碼重複都視為解析錯誤。 /
    /// Mismatched tags, missing id attributes and duplicate ids are all parse
    /// errors; the element order of the input is preserved.
    pub fn parse(content: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    if root.is_some() && stack.is_empty() {
                        return Err(XmlError::TrailingContent);
                    }
                    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let id = match start.try_get_attribute("id")? {
                        Some(attr) => attr.unescape_value()?.into_owned(),
                        None => return Err(XmlError::MissingId(tag)),
                    };
                    stack.push(XmlElement::new(tag, id));
                }
                Event::Empty(start) => {
                    if root.is_some() && stack.is_empty() {
                        return Err(XmlError::TrailingContent);
                    }
                    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let id = match start.try_get_attribute("id")? {
                        Some(attr) => attr.unescape_value()?.into_owned(),
                        None => return Err(XmlError::MissingId(tag)),
                    };
                    let element = XmlElement::new(tag, id);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Event::End(_) => {
                    let finished = match stack.pop() {
                        Some(element) => element,
                        None => return Err(XmlError::TrailingContent),
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => root = Some(finished),
                    }
                }
                Event::Text(text) => {
                    let value = text.unescape()?.into_owned();
                    if let Some(current) = stack.last_mut() {
                        match &mut current.text {
                            Some(existing) => existing.push_str(&value),
                            None => current.text = Some(value),
                        }
                    } else if !value.trim().is_empty() {
                        return Err(XmlError::TrailingContent);
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        match &mut current.text {
                            Some(existing) => existing.push_str(&value),
                            None => current.text = Some(value),
                        }
                    }
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        let root = root.ok_or(XmlError::NoRoot)?;
        Self::from_element(root)
    }

    /// 將文件序列化回 XML 文字，保留子元素順序與文字內容。 / Serialises the document back to XML, preserving child order and text.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_element(self.root, &mut out);
        out
    }

    fn write_element(&self, slot: NodeId, out: &mut String) {
        let Some(node) = self.nodes[slot].as_ref() else {
            return;
        };
        out.push('<');
        out.push_str(&node.tag);
        out.push_str(" id=\"");
        out.push_str(&escape(&node.id));
        out.push('"');
        if node.text.is_none() && node.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &node.text {
            out.push_str(&escape(text));
        }
        for &child in &node.children {
            self.write_element(child, out);
        }
        out.push_str("</");
        out.push_str(&node.tag);
        out.push('>');
    }

    /// 根元素的識別碼。 / Returns the root element's id.
    pub fn root_id(&self) -> &str {
        // 根插槽恆為有效。 / The root slot is always occupied.
        self.nodes[self.root]
            .as_ref()
            .map(|node| node.id.as_str())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// 取得指定元素的文字內容。 / Returns the text content of an element.
    pub fn text_of(&self, id: &str) -> Result<Option<&str>, XmlError> {
        let slot = self.lookup(id)?;
        Ok(self.nodes[slot].as_ref().and_then(|n| n.text.as_deref()))
    }

    /// 回傳指定元素的子識別碼序列。 / Returns the ordered child ids of an element.
    pub fn children_of(&self, id: &str) -> Result<Vec<&str>, XmlError> {
        let slot = self.lookup(id)?;
        let node = self.node(slot);
        Ok(node
            .children
            .iter()
            .filter_map(|&child| self.nodes[child].as_ref())
            .map(|child| child.id.as_str())
            .collect())
    }

    /// 將新元素插入為目標元素的前一個同層節點。 / Inserts the element as the sibling immediately preceding the target.
    pub fn insert_before(&mut self, target_id: &str, element: XmlElement) -> Result<(), XmlError> {
        let target = self.lookup(target_id)?;
        let parent = self.node(target).parent.ok_or(XmlError::RootSibling)?;
        self.check_new_ids(&element)?;
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&child| child == target)
            .unwrap_or(0);
        self.attach(element, parent, position);
        Ok(())
    }

    /// 將新元素附加為指定父元素的最後一個子節點。 / Appends the element as the last child of the given parent.
    pub fn append_child(&mut self, parent_id: &str, element: XmlElement) -> Result<(), XmlError> {
        let parent = self.lookup(parent_id)?;
        self.check_new_ids(&element)?;
        self.attach(element, parent, usize::MAX);
        Ok(())
    }

    /// 依父識別碼與位置插回一棵子樹，供刪除的反向操作使用。 / Reinserts a subtree at an explicit parent/position; the inverse of delete.
    pub fn insert_at(
        &mut self,
        parent_id: &str,
        position: usize,
        element: XmlElement,
    ) -> Result<(), XmlError> {
        let parent = self.lookup(parent_id)?;
        self.check_new_ids(&element)?;
        self.attach(element, parent, position);
        Ok(())
    }

    /// 刪除以指定識別碼為根的子樹並回傳擷取結果。 / Deletes the subtree rooted at the id, returning the captured subtree.
    pub fn delete(&mut self, id: &str) -> Result<DetachedSubtree, XmlError> {
        let slot = self.lookup(id)?;
        if slot == self.root {
            return Err(XmlError::RootDeletionForbidden);
        }
        // 非根節點必有父節點。 / Non-root nodes always have a parent.
        let parent = self.node(slot).parent.ok_or(XmlError::RootDeletionForbidden)?;
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&child| child == slot)
            .unwrap_or(0);
        if let Some(parent_node) = self.nodes[parent].as_mut() {
            parent_node.children.retain(|&child| child != slot);
        }
        let parent_id = self.node(parent).id.clone();
        let element = self.detach(slot);
        Ok(DetachedSubtree {
            element,
            parent_id,
            position,
        })
    }

    /// 就地更名元素識別碼，不更動結構。 / Renames an element id in place without structural change.
    pub fn edit_id(&mut self, old_id: &str, new_id: &str) -> Result<(), XmlError> {
        let slot = self.lookup(old_id)?;
        if new_id != old_id && self.index.contains_key(new_id) {
            return Err(XmlError::DuplicateId(new_id.to_string()));
        }
        self.index.remove(old_id);
        self.index.insert(new_id.to_string(), slot);
        if let Some(node) = self.nodes[slot].as_mut() {
            node.id = new_id.to_string();
        }
        Ok(())
    }

    /// 取代元素文字內容並回傳先前的值。 / Replaces the element's text content, returning the prior value.
    pub fn edit_text(
        &mut self,
        id: &str,
        text: Option<String>,
    ) -> Result<Option<String>, XmlError> {
        let slot = self.lookup(id)?;
        let node = self.nodes[slot]
            .as_mut()
            .ok_or_else(|| XmlError::NotFound(id.to_string()))?;
        Ok(std::mem::replace(&mut node.text, text))
    }

    /// 深度優先、父先於子的惰性走訪。 / Lazy depth-first, parent-before-children traversal.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse {
            doc: self,
            stack: vec![(self.root, 0)],
        }
    }

    fn lookup(&self, id: &str) -> Result<NodeId, XmlError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| XmlError::NotFound(id.to_string()))
    }

    fn node(&self, slot: NodeId) -> &XmlNode {
        // 僅以索引查得的插槽呼叫，一定有值。 / Only called with slots obtained from the index.
        self.nodes[slot].as_ref().expect("arena slot is occupied")
    }

    /// 插入前完整驗證：子樹內不可重複，也不可與既有識別碼衝突。 /
    /// Full validation before any mutation: the incoming subtree must be
    /// internally unique and collision-free against the existing index.
    fn check_new_ids(&self, element: &XmlElement) -> Result<(), XmlError> {
        let mut ids = Vec::new();
        element.collect_ids(&mut ids);
        let mut seen = HashSet::new();
        for id in ids {
            if self.index.contains_key(id) || !seen.insert(id) {
                return Err(XmlError::DuplicateId(id.to_string()));
            }
        }
        Ok(())
    }

    fn alloc(&mut self, node: XmlNode) -> NodeId {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(node);
            slot
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn attach(&mut self, element: XmlElement, parent: NodeId, position: usize) -> NodeId {
        let slot = self.alloc(XmlNode {
            id: element.id.clone(),
            tag: element.tag,
            text: element.text,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.index.insert(element.id, slot);
        for child in element.children {
            self.attach(child, slot, usize::MAX);
        }
        if let Some(parent_node) = self.nodes[parent].as_mut() {
            let at = position.min(parent_node.children.len());
            parent_node.children.insert(at, slot);
        }
        slot
    }

    fn detach(&mut self, slot: NodeId) -> XmlElement {
        let node = self.nodes[slot].take().expect("arena slot is occupied");
        self.index.remove(&node.id);
        self.free.push(slot);
        let mut element = XmlElement::new(node.tag, node.id);
        element.text = node.text;
        for child in node.children {
            element.children.push(self.detach(child));
        }
        element
    }
}

/// 走訪產出的元素檢視。 / Element view yielded by traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraverseItem<'a> {
    pub id: &'a str,
    pub tag: &'a str,
    pub text: Option<&'a str>,
    pub depth: usize,
}

/// `XmlDocument::traverse` 的迭代器。 / Iterator returned by [`XmlDocument::traverse`].
pub struct Traverse<'a> {
    doc: &'a XmlDocument,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = TraverseItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (slot, depth) = self.stack.pop()?;
        let node = self.doc.nodes[slot].as_ref()?;
        for &child in node.children.iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some(TraverseItem {
            id: &node.id,
            tag: &node.tag,
            text: node.text.as_deref(),
            depth,
        })
    }
}
