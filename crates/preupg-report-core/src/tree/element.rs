use std::borrow::Cow;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{TreeError, XCCDF_NS};

/// How far below an element a lookup descends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Direct children only (`./tag`).
    Children,
    /// Any descendant, in document order (`.//tag`).
    Descendants,
}

/// Content of an element: nested elements and character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A namespace-resolved XML element.
///
/// `name` keeps the qualified name exactly as it was read so that
/// serialization reproduces the source prefixes; `namespace` holds the URI
/// the prefix resolved to at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// True when this element is `tag` in the XCCDF namespace.
    pub fn is(&self, tag: &str) -> bool {
        self.namespace.as_deref() == Some(XCCDF_NS) && self.local_name() == tag
    }

    pub fn get(&self, attr: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == attr)
            .map(|(_, value)| value.as_str())
    }

    pub fn set(&mut self, attr: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == attr) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((attr.to_string(), value)),
        }
    }

    /// Character data before the first child element, if any.
    ///
    /// Text that follows a child element belongs to that position and is
    /// not part of this value.
    pub fn text(&self) -> Option<String> {
        match self.children.first() {
            Some(Node::Text(leading)) => Some(leading.clone()),
            _ => None,
        }
    }

    /// Every direct text chunk of this element joined in document order.
    pub fn all_text(&self) -> Option<String> {
        let mut text: Option<String> = None;
        for child in &self.children {
            if let Node::Text(chunk) = child {
                text.get_or_insert_with(String::new).push_str(chunk);
            }
        }
        text
    }

    /// Replace the character data before the first child element.
    pub fn set_text(&mut self, text: impl Into<String>) {
        if matches!(self.children.first(), Some(Node::Text(_))) {
            self.children.remove(0);
        }
        let text = text.into();
        if !text.is_empty() {
            self.children.insert(0, Node::Text(text));
        }
    }

    pub fn push_text(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(chunk);
        } else {
            self.children.push(Node::Text(chunk.to_string()));
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn find(&self, tag: &str, depth: Depth) -> Option<&Element> {
        self.find_all(tag, depth).into_iter().next()
    }

    pub fn find_all(&self, tag: &str, depth: Depth) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect(tag, depth, &mut found);
        found
    }

    fn collect<'a>(&'a self, tag: &str, depth: Depth, found: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.is(tag) {
                found.push(child);
            }
            if depth == Depth::Descendants {
                child.collect(tag, depth, found);
            }
        }
    }

    /// Elements matching `./parent_tag/tag`.
    pub fn find_grandchildren(&self, parent_tag: &str, tag: &str) -> Vec<&Element> {
        self.elements()
            .filter(|parent| parent.is(parent_tag))
            .flat_map(|parent| parent.elements().filter(|child| child.is(tag)))
            .collect()
    }

    /// Attribute `attr` of the first child `tag`, or an empty string.
    pub fn attribute(&self, tag: &str, attr: &str) -> String {
        self.find(tag, Depth::Children)
            .and_then(|child| child.get(attr))
            .unwrap_or_default()
            .to_string()
    }

    /// Trimmed text of the first child `tag`, or an empty string.
    pub fn child_text(&self, tag: &str) -> String {
        self.find(tag, Depth::Children)
            .and_then(Element::all_text)
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }

    /// Apply `visit` to every element matching `tag` at `depth`, in document order.
    pub fn for_each_mut(&mut self, tag: &str, depth: Depth, visit: &mut impl FnMut(&mut Element)) {
        for child in self.elements_mut() {
            if child.is(tag) {
                visit(child);
            }
            if depth == Depth::Descendants {
                child.for_each_mut(tag, depth, visit);
            }
        }
    }

    /// Mutable counterpart of [`Element::find_grandchildren`].
    pub fn for_each_grandchild_mut(
        &mut self,
        parent_tag: &str,
        tag: &str,
        visit: &mut impl FnMut(&mut Element),
    ) {
        for parent in self.elements_mut().filter(|parent| parent.is(parent_tag)) {
            for child in parent.elements_mut().filter(|child| child.is(tag)) {
                visit(child);
            }
        }
    }

    /// Position of the first direct child element matching `predicate`
    /// within `children`.
    pub fn position(&self, predicate: impl Fn(&Element) -> bool) -> Option<usize> {
        self.children.iter().position(|child| match child {
            Node::Element(element) => predicate(element),
            Node::Text(_) => false,
        })
    }
}

type Scope = Vec<(String, String)>;

/// Parse a complete document and return its root element.
pub(crate) fn parse(content: &str) -> Result<Element, TreeError> {
    let mut reader = Reader::from_str(content);
    let mut open: Vec<Element> = Vec::new();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let element = open_element(&start, &mut scopes)?;
                open.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, &mut scopes)?;
                scopes.pop();
                attach(&mut open, &mut root, element)?;
            }
            Event::End(_) => {
                let element = open.pop().ok_or_else(|| {
                    TreeError::Malformed("closing tag without matching start".into())
                })?;
                scopes.pop();
                attach(&mut open, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(parent) = open.last_mut() {
                    parent.push_text(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(parent) = open.last_mut() {
                    parent.push_text(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(TreeError::Malformed(format!(
            "element `{}` is never closed",
            unclosed.name
        )));
    }
    root.ok_or(TreeError::EmptyDocument)
}

fn open_element(start: &BytesStart<'_>, scopes: &mut Vec<Scope>) -> Result<Element, TreeError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    let mut declared = Scope::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            declared.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value.clone()));
        }
        attributes.push((key, value));
    }
    scopes.push(declared);

    let prefix = name.split_once(':').map(|(prefix, _)| prefix).unwrap_or("");
    let namespace = scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter().rev())
        .find(|(declared, _)| declared == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty());

    Ok(Element {
        name,
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    open: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), TreeError> {
    match open.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(TreeError::Malformed(
                "document has more than one root element".into(),
            ))
        }
    }
    Ok(())
}

/// Serialize `root` as a UTF-8 document with an XML declaration.
pub(crate) fn serialize(root: &Element) -> Result<Vec<u8>, TreeError> {
    let mut bytes = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n".to_vec();
    let mut writer = Writer::new(&mut bytes);
    write_element(&mut writer, root)?;
    Ok(bytes)
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
) -> Result<(), TreeError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(nested) => write_element(writer, nested)?,
            Node::Text(text) => {
                let escaped: Cow<'_, str> = quick_xml::escape::partial_escape(text.as_str());
                writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
