//! Reading and writing the on-disk menu markup.
//!
//! Parsing produces a plain [`Element`] tree that is discarded once the
//! document arena has been built from it; writing goes the other way. Tag
//! names are matched by local name, so `<ob:menu>` and `<menu>` are the same
//! element. Attribute order and unknown attributes are kept.

use std::io;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::error::ParseError;

const INDENT_WIDTH: usize = 2;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as it appeared in the source.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Namespace prefix of the name, if it has one.
    pub fn prefix(&self) -> Option<&str> {
        self.name.rsplit_once(':').map(|(prefix, _)| prefix)
    }
}

/// Parses markup into its root element.
pub fn parse_element_tree(xml: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let element = start_element(e).map_err(|msg| ParseError::new(position, msg))?;
                stack.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let element = start_element(e).map_err(|msg| ParseError::new(position, msg))?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::End(_)) => {
                let Some(element) = stack.pop() else {
                    return Err(ParseError::new(position, "unexpected closing tag"));
                };
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::Text(ref t)) => {
                let text = t
                    .unescape()
                    .map_err(|err| ParseError::new(position, err.to_string()))?;
                append_text(&mut stack, &text);
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                append_text(&mut stack, &text);
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ParseError::new(reader.buffer_position(), err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::new(
            reader.buffer_position(),
            format!("unclosed element <{}>", open.name),
        ));
    }
    root.ok_or_else(|| ParseError::new(reader.buffer_position(), "no root element"))
}

fn start_element(e: &BytesStart) -> Result<Element, String> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| format!("attribute error: {err}"))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| format!("attribute {key}: {err}"))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: usize,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(ParseError::new(position, "more than one root element")),
    }
    Ok(())
}

// Text outside the root element is ignored.
fn append_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}

/// Serializes with an XML declaration and two-space indentation. Text stays
/// inline with its element so indentation never changes content.
pub fn write_element_tree(root: &Element) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(io::Error::other)?;
    write_element(&mut writer, root).map_err(io::Error::other)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text.as_deref().filter(|text| !text.is_empty());
    if element.children.is_empty() && text.is_none() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}
