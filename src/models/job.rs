//! Job posting record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::document::{XmlElement, insert_repeated};

/// One job posting from the feed.
///
/// `id` and `status` are lifted out of the feed entry; every other child
/// element is carried opaquely in `fields` and serialized flat next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style helper for an extra field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build a record from a feed entry element.
    pub fn from_element(element: &XmlElement) -> Result<Self> {
        let id = single_text(element, "id")?.trim().to_string();
        if id.is_empty() {
            return Err(AppError::malformed(format!(
                "<{}> has an empty <id>",
                element.name
            )));
        }
        let status = single_text(element, "status")?.trim().to_string();

        let mut fields = Map::new();
        for (key, value) in &element.attributes {
            fields.insert(format!("@{key}"), Value::String(value.clone()));
        }
        for child in &element.children {
            if child.name == "id" || child.name == "status" {
                continue;
            }
            insert_repeated(&mut fields, &child.name, child.to_value());
        }

        Ok(Self { id, status, fields })
    }

    /// Whether this record differs meaningfully from a previously seen one.
    ///
    /// `status` always counts; `compare_fields` names extra fields that do.
    pub fn differs_from(&self, previous: &JobRecord, compare_fields: &[String]) -> bool {
        self.status != previous.status
            || compare_fields
                .iter()
                .any(|name| self.fields.get(name) != previous.fields.get(name))
    }
}

fn single_text<'a>(element: &'a XmlElement, name: &str) -> Result<&'a str> {
    let mut matches = element.children_named(name);
    let first = matches.next().ok_or_else(|| {
        AppError::malformed(format!("<{}> is missing <{}>", element.name, name))
    })?;
    if matches.next().is_some() {
        return Err(AppError::malformed(format!(
            "<{}> has more than one <{}>",
            element.name, name
        )));
    }
    if !first.children.is_empty() {
        return Err(AppError::malformed(format!(
            "<{}> must be a text value",
            name
        )));
    }
    Ok(&first.text)
}
