//! GMP command builder
//!
//! Commands are small XML documents such as
//! `<delete_alert alert_id="..." ultimate="0"/>`. They are built as a tree and
//! serialized with quick-xml, which takes care of escaping attribute values
//! and text.

use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Element(Command),
    Text(String),
}

/// A GMP command element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn child(mut self, child: Command) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Shorthand for `<name>text</name>`
    pub fn text_child(self, name: &str, text: impl Into<String>) -> Self {
        self.child(Command::new(name).text(text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Text content of the first child element with the given name
    #[cfg(test)]
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.children.iter().find_map(|node| match node {
            Node::Element(c) if c.name == name => Some(c.inner_text()),
            _ => None,
        })
    }

    #[cfg(test)]
    fn inner_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Serialize the command into `out`
    pub fn write_to<W: io::Write>(&self, out: W) -> io::Result<()> {
        self.write(&mut Writer::new(out))
    }

    #[cfg(test)]
    pub fn to_xml(&self) -> String {
        let mut buf = Vec::new();
        self.write_to(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn write<W: io::Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start));
        }

        writer.write_event(Event::Start(start))?;
        for node in &self.children {
            match node {
                Node::Element(child) => child.write(writer)?,
                Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))
    }
}
