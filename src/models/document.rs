//! Generic XML element tree for parsed feeds.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Key prefix for attributes when an element is converted to JSON.
const ATTRIBUTE_PREFIX: char = '@';

/// Key holding text content of an element that also has children.
const TEXT_KEY: &str = "#text";

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    pub root: XmlElement,
}

/// One XML element with its attributes, text and child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl FeedDocument {
    /// Parse a feed body into an element tree.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event().map_err(AppError::xml)? {
                Event::Start(start) => stack.push(XmlElement::from_start(&start)?),
                Event::Empty(start) => {
                    let element = XmlElement::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| AppError::xml("unexpected closing tag"))?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(AppError::xml)?;
                    Self::push_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data).map_err(AppError::xml)?;
                    Self::push_text(&mut stack, text)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(AppError::xml(format!("unclosed element <{}>", open.name)));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| AppError::xml("document has no root element"))
    }

    fn attach(
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_some() => {
                return Err(AppError::xml(format!(
                    "multiple root elements (found <{}>)",
                    element.name
                )));
            }
            None => *root = Some(element),
        }
        Ok(())
    }

    fn push_text(stack: &mut [XmlElement], text: &str) -> Result<()> {
        match stack.last_mut() {
            Some(current) => current.text.push_str(text),
            None if text.trim().is_empty() => {}
            None => return Err(AppError::xml("text outside of root element")),
        }
        Ok(())
    }
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

        let mut attributes = BTreeMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(AppError::xml)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(AppError::xml)?.into_owned();
            attributes.insert(key, value);
        }

        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name.
    pub fn children_named<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a XmlElement> + use<'a, 'b> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Convert the element to a JSON value.
    ///
    /// Text-only elements become strings. Anything with attributes or
    /// children becomes an object: attributes under `@name`, children under
    /// their element name (repeated children collapse into an array) and
    /// remaining text under `#text`.
    pub fn to_value(&self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            return Value::String(self.text.clone());
        }

        let mut map = Map::new();
        for (key, value) in &self.attributes {
            map.insert(
                format!("{ATTRIBUTE_PREFIX}{key}"),
                Value::String(value.clone()),
            );
        }

        for child in &self.children {
            insert_repeated(&mut map, &child.name, child.to_value());
        }

        if !self.text.is_empty() {
            map.insert(TEXT_KEY.to_string(), Value::String(self.text.clone()));
        }

        Value::Object(map)
    }
}

/// Insert a value, turning repeated keys into arrays.
pub(crate) fn insert_repeated(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.remove(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(Value::Array(mut items)) => {
            items.push(value);
            map.insert(key.to_string(), Value::Array(items));
        }
        Some(existing) => {
            map.insert(key.to_string(), Value::Array(vec![existing, value]));
        }
    }
}
