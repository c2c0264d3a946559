//! Minimal XML element tree on top of quick-xml
//!
//! Container files are small, so they are read into an owned tree and queried
//! by local element name. Namespace prefixes are dropped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::parser::error::ParseError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Trimmed text content directly inside this element
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Attribute value, trimmed. Empty values count as absent.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn required_attribute(&self, name: &str) -> Result<&str, ParseError> {
        self.attribute(name)
            .ok_or_else(|| ParseError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    /// First direct child named `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All elements named `name` below this one, in document order
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }
}

/// Remove a leading byte order mark and `<?xml ...?>` declaration
pub fn strip_declaration(content: &str) -> &str {
    let content = content.trim_start_matches('\u{feff}').trim();
    if content.starts_with("<?xml") {
        if let Some(end) = content.find("?>") {
            return content[end + 2..].trim_start();
        }
    }
    content
}

/// Parse a whole document and return its root element
pub fn parse_document(content: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(strip_declaration(content));
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(invalid("more than one root element"));
                }
                stack.push(element_from(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or_else(|| invalid("unexpected end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|err| invalid(err.to_string()))?;
                let text = text.trim();
                match stack.last_mut() {
                    Some(parent) => parent.text.push_str(text),
                    None if !text.is_empty() => {
                        return Err(invalid("text outside the root element"));
                    }
                    None => {}
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {} // comments, processing instructions, doctype
            Err(err) => return Err(invalid(err.to_string())),
        }
    }

    if let Some(open) = stack.last() {
        return Err(invalid(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| invalid("no root element"))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(invalid("more than one root element")),
        None => *root = Some(element),
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, ParseError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| invalid(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| invalid(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn invalid(reason: impl Into<String>) -> ParseError {
    ParseError::InvalidXml(reason.into())
}
