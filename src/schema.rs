//! Runtime schema construction from a caller-supplied field list.
//!
//! One "listing" is an object with one required string-typed property per
//! requested field; the container wraps an ordered sequence of listings under
//! a fixed key. Both are plain JSON schema values built at request time, no
//! per-field code generation involved.

use crate::ScrapeError;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Key under which every backend is asked to return the extracted records.
pub const CONTAINER_KEY: &str = "listings";

/// A listing schema and its container, built together and immutable once
/// built. Discarded after the request completes.
#[derive(Debug, Clone)]
pub struct ExtractionSchema {
    fields: Vec<String>,
    listing: Value,
    container: Value,
}

impl ExtractionSchema {
    /// Builds the pair of schemas from an ordered set of field names.
    /// Fails with a `SchemaError` on an empty list or duplicate names.
    pub fn build<I, S>(field_names: I) -> Result<Self, ScrapeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = field_names.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(ScrapeError::SchemaError(
                "field list must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.trim().is_empty() {
                return Err(ScrapeError::SchemaError(
                    "field names must not be blank".to_string(),
                ));
            }
            if !seen.insert(field.as_str()) {
                return Err(ScrapeError::SchemaError(format!(
                    "duplicate field name: {field}"
                )));
            }
        }

        let mut properties = Map::new();
        for field in &fields {
            properties.insert(field.clone(), json!({ "type": "string" }));
        }

        let listing = json!({
            "type": "object",
            "properties": properties,
            "required": fields,
            "additionalProperties": false,
        });

        let container = json!({
            "type": "object",
            "properties": {
                CONTAINER_KEY: {
                    "type": "array",
                    "items": listing.clone(),
                },
            },
            "required": [CONTAINER_KEY],
            "additionalProperties": false,
        });

        Ok(Self {
            fields,
            listing,
            container,
        })
    }

    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    pub fn listing_schema(&self) -> &Value {
        &self.listing
    }

    pub fn container_schema(&self) -> &Value {
        &self.container
    }

    /// Textual description of the expected JSON shape, for backends that
    /// cannot accept the schema as a binding constraint.
    pub fn shape_description(&self) -> String {
        let field_lines = self
            .fields
            .iter()
            .map(|field| format!("            \"{field}\": \"string\""))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            "{{\n    \"{CONTAINER_KEY}\": [\n        {{\n{field_lines}\n        }}\n    ]\n}}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_property_per_field() {
        let schema = ExtractionSchema::build(["Name of item", "Price"]).unwrap();

        let properties = schema.listing_schema()["properties"].as_object().unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["Name of item"]["type"], "string");
        assert_eq!(properties["Price"]["type"], "string");

        let required = schema.listing_schema()["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
    }

    #[test]
    fn container_wraps_listings_under_fixed_key() {
        let schema = ExtractionSchema::build(["Price"]).unwrap();
        let container = schema.container_schema();
        assert_eq!(container["properties"][CONTAINER_KEY]["type"], "array");
        assert_eq!(
            container["properties"][CONTAINER_KEY]["items"],
            *schema.listing_schema()
        );
        assert_eq!(container["required"][0], CONTAINER_KEY);
    }

    #[test]
    fn empty_field_list_is_rejected() {
        let err = ExtractionSchema::build(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ScrapeError::SchemaError(_)));
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let err = ExtractionSchema::build(["Price", "Price"]).unwrap_err();
        assert!(matches!(err, ScrapeError::SchemaError(_)));
    }

    #[test]
    fn identical_input_produces_identical_schemas() {
        let a = ExtractionSchema::build(["Title", "Author", "Year"]).unwrap();
        let b = ExtractionSchema::build(["Title", "Author", "Year"]).unwrap();
        assert_eq!(a.listing_schema(), b.listing_schema());
        assert_eq!(a.container_schema(), b.container_schema());
        assert_eq!(a.shape_description(), b.shape_description());
    }

    #[test]
    fn shape_description_names_every_field() {
        let schema = ExtractionSchema::build(["Name of item", "Price"]).unwrap();
        let description = schema.shape_description();
        assert!(description.contains("\"Name of item\": \"string\""));
        assert!(description.contains("\"Price\": \"string\""));
        assert!(description.contains(CONTAINER_KEY));
    }
}
