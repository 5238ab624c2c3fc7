//! Owned XML element tree for GMP responses
//!
//! GMP answers every command with a single root element, e.g.
//!
//! ```xml
//! <get_alerts_response status="200" status_text="OK">
//!   <alert id="...">
//!     <name>Foo</name>
//!   </alert>
//!   <alerts start="1" max="10"/>
//!   <alert_count>1<filtered>1</filtered><page>1</page></alert_count>
//! </get_alerts_response>
//! ```
//!
//! Resolvers walk this tree and pull out scalar fields, so the tree is kept
//! small and owned: name, attributes, direct text and child elements.

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Malformed XML: {0}")]
    Malformed(String),
    #[error("XML document has no root element")]
    Empty,
}

/// A single XML element with its attributes, text and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a complete document and return its root element
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(Self::from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let element = Self::from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XmlError::Malformed(e.to_string())),
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Malformed("unclosed element".into()));
        }
        root.ok_or(XmlError::Empty)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut element = Self::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::Malformed(e.to_string()))?
                .to_string();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct text content, trimmed
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// All direct children with the given tag name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant along a slash separated path (`"owner/name"`)
    pub fn child(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |element, segment| {
                element.children.iter().find(|c| c.name == segment)
            })
    }

    /// Text of the element at `path`; empty text is treated as absent
    pub fn child_text(&self, path: &str) -> Option<&str> {
        self.child(path)
            .map(XmlElement::text)
            .filter(|text| !text.is_empty())
    }

    pub fn child_int(&self, path: &str) -> Option<i64> {
        self.child_text(path).and_then(|t| t.parse().ok())
    }

    /// GMP encodes booleans as `0`/`1`
    pub fn child_bool(&self, path: &str) -> Option<bool> {
        self.child_text(path).and_then(parse_bool)
    }

    pub fn child_datetime(&self, path: &str) -> Option<DateTime<Utc>> {
        self.child_text(path).and_then(parse_datetime)
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::Malformed("multiple root elements".into())),
    }
    Ok(())
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROLES: &str = r#"
        <get_roles_response status="200" status_text="OK">
          <role id="8e2ff9b6-4a43-4a8a-b14f-2c3a5ef9f6d1">
            <owner><name>myuser</name></owner>
            <name>test &amp; more</name>
            <comment/>
            <creation_time>2020-09-04T12:53:52Z</creation_time>
            <writable>1</writable>
            <in_use>0</in_use>
          </role>
          <roles start="1" max="10"/>
          <role_count>1<filtered>1</filtered><page>1</page></role_count>
        </get_roles_response>
    "#;

    #[test]
    fn test_parse_tree() {
        let root = XmlElement::parse(ROLES).unwrap();
        assert_eq!(root.name(), "get_roles_response");
        assert_eq!(root.attr("status"), Some("200"));

        let role = root.child("role").unwrap();
        assert_eq!(role.attr("id"), Some("8e2ff9b6-4a43-4a8a-b14f-2c3a5ef9f6d1"));
        assert_eq!(role.child_text("name"), Some("test & more"));
        assert_eq!(role.child_text("owner/name"), Some("myuser"));
        assert_eq!(role.child_text("comment"), None);
        assert_eq!(role.child_bool("writable"), Some(true));
        assert_eq!(role.child_bool("in_use"), Some(false));
    }

    #[test]
    fn test_mixed_content_counts() {
        let root = XmlElement::parse(ROLES).unwrap();
        let count = root.child("role_count").unwrap();
        assert_eq!(count.text(), "1");
        assert_eq!(count.child_int("filtered"), Some(1));
        assert_eq!(root.child("roles").and_then(|r| r.attr("max")), Some("10"));
    }

    #[test]
    fn test_datetime() {
        let root = XmlElement::parse(ROLES).unwrap();
        let created = root.child("role").unwrap().child_datetime("creation_time").unwrap();
        assert_eq!(created.to_rfc3339(), "2020-09-04T12:53:52+00:00");
    }

    #[test]
    fn test_children_named_keeps_order() {
        let root = XmlElement::parse("<r><a id=\"1\"/><b/><a id=\"2\"/></r>").unwrap();
        let ids: Vec<_> = root.children_named("a").filter_map(|a| a.attr("id")).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            XmlElement::parse("<a><b></a>"),
            Err(XmlError::Malformed(_))
        ));
        assert!(matches!(XmlElement::parse(""), Err(XmlError::Empty)));
        assert!(matches!(XmlElement::parse("<a>"), Err(XmlError::Malformed(_))));
    }
}
