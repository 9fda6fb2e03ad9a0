//! Minimal element tree written to and read from XML.
//!
//! Output is deterministic: attributes and children keep insertion order,
//! the declaration is always emitted and nesting is indented by four spaces.
//! Leaf elements keep their text on one line.

use crate::codec::SerializationError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// An XML element with attributes, optional text and child elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Tag name
    pub tag: String,
    /// Attributes, in order
    pub attributes: Vec<(String, String)>,
    /// Text content of a leaf element
    pub text: Option<String>,
    /// Child elements, in order
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Builder-style text setter.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Append a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Text content, empty when absent.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Value of an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with `tag`. Grandchildren are never searched.
    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Every direct child with `tag`.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Render as an indented UTF-8 XML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn to_xml_string(&self) -> Result<String, SerializationError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        self.write_into(&mut writer)?;
        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| SerializationError::Xml(e.to_string()))?;
        xml.push('\n');
        Ok(xml)
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), SerializationError> {
        let mut start = BytesStart::new(self.tag.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        let text = self.text.as_deref().filter(|text| !text.is_empty());
        if self.children.is_empty() && text.is_none() {
            return writer.write_event(Event::Empty(start)).map_err(xml_error);
        }
        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        if let Some(text) = text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.tag.as_str())))
            .map_err(xml_error)
    }

    /// Parse the root element of an XML document.
    ///
    /// Whitespace between child elements is ignored; text of leaf elements
    /// is kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or a document without a root.
    pub fn from_xml_str(xml: &str) -> Result<Self, SerializationError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<(Element, String)> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => stack.push((element_from_start(&start)?, String::new())),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    if let Some((_, buffer)) = stack.last_mut() {
                        buffer.push_str(&text.unescape().map_err(xml_error)?);
                    }
                }
                Event::CData(data) => {
                    if let Some((_, buffer)) = stack.last_mut() {
                        let raw = String::from_utf8(data.into_inner().into_owned())
                            .map_err(|e| SerializationError::Xml(e.to_string()))?;
                        buffer.push_str(&raw);
                    }
                }
                Event::End(_) => {
                    let (mut element, text) = stack
                        .pop()
                        .ok_or_else(|| SerializationError::Xml("unbalanced end tag".to_string()))?;
                    if element.children.is_empty() {
                        if !text.is_empty() {
                            element.text = Some(text);
                        }
                    } else if !text.trim().is_empty() {
                        element.text = Some(text.trim().to_string());
                    }
                    attach(&mut stack, &mut root, element);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SerializationError::Xml("unclosed element".to_string()));
        }
        root.ok_or_else(|| SerializationError::Xml("document has no root element".to_string()))
    }
}

fn attach(stack: &mut [(Element, String)], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some((parent, _)) => parent.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, SerializationError> {
    let tag = String::from_utf8(start.name().as_ref().to_vec())
        .map_err(|e| SerializationError::Xml(e.to_string()))?;
    let mut element = Element::new(tag);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| SerializationError::Xml(e.to_string()))?;
        let key = String::from_utf8(attribute.key.as_ref().to_vec())
            .map_err(|e| SerializationError::Xml(e.to_string()))?;
        let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

#[allow(clippy::needless_pass_by_value)]
fn xml_error(error: quick_xml::Error) -> SerializationError {
    SerializationError::Xml(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        let mut root = Element::new("Asset").with_attribute("id", "a&b");
        root.push(Element::new("name").with_text("einar <hero>"));
        root.push(Element::new("empty"));
        let mut nested = Element::new("author");
        nested.push(Element::new("name").with_text("Ada"));
        root.push(nested);
        root
    }

    #[test]
    fn test_pretty_printed_layout() {
        let xml = sample().to_xml_string().unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <Asset id=\"a&amp;b\">\n    \
             <name>einar &lt;hero&gt;</name>\n    \
             <empty/>\n    \
             <author>\n        \
             <name>Ada</name>\n    \
             </author>\n\
             </Asset>\n"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let element = sample();
        let parsed = Element::from_xml_str(&element.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, element);
        assert_eq!(parsed.attribute("id"), Some("a&b"));
    }

    #[test]
    fn test_child_lookup_is_direct_only() {
        let element = sample();
        assert_eq!(element.child("name").unwrap().text(), "einar <hero>");
        assert_eq!(element.children_named("name").count(), 1);
        assert_eq!(element.child("author").unwrap().child("name").unwrap().text(), "Ada");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Element::from_xml_str("").is_err());
        assert!(Element::from_xml_str("<Asset><name>x</Asset>").is_err());
    }
}
