//! Schema synthesis from JSON examples.
//!
//! A template may declare the expected model-response shape with a
//! `schema` fence holding a JSON example. Synthesis turns that example
//! into a structural [`SchemaNode`]: string values double as field
//! documentation, arrays take their element shape from the first element,
//! and every non-string scalar deliberately widens to an undescribed
//! string leaf.

use serde_json::Value;
use std::collections::BTreeMap;

/// Structural description of an expected response shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// Mapping of field name to field schema
    Object(BTreeMap<String, SchemaNode>),

    /// Homogeneous array of the element schema
    Array(Box<SchemaNode>),

    /// String leaf, optionally carrying a human-readable description
    Str { description: Option<String> },
}

impl SchemaNode {
    /// Undescribed string leaf.
    pub fn untyped() -> Self {
        SchemaNode::Str { description: None }
    }

    /// Synthesize a schema from a JSON example.
    ///
    /// Pure and deterministic: the same input always yields a structurally
    /// identical schema, and the input is never mutated.
    pub fn synthesize(example: &Value) -> Self {
        match example {
            Value::Array(items) => match items.first() {
                // Element shape comes from the first element only
                Some(first) => SchemaNode::Array(Box::new(Self::synthesize(first))),
                None => SchemaNode::Array(Box::new(Self::untyped())),
            },
            Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::synthesize(value)))
                    .collect();
                SchemaNode::Object(fields)
            }
            // The example text doubles as the field's documentation
            Value::String(text) => SchemaNode::Str {
                description: Some(text.clone()),
            },
            // Numbers, booleans and nulls widen to an untyped string leaf
            _ => Self::untyped(),
        }
    }

    /// Structurally validate a JSON value against this schema.
    ///
    /// Honors the documented widening: any scalar satisfies a string leaf.
    /// Objects must carry every declared field; extra fields are allowed.
    pub fn validate(&self, value: &Value) -> bool {
        match (self, value) {
            (SchemaNode::Object(fields), Value::Object(map)) => fields
                .iter()
                .all(|(key, schema)| map.get(key).is_some_and(|v| schema.validate(v))),
            (SchemaNode::Array(element), Value::Array(items)) => {
                items.iter().all(|item| element.validate(item))
            }
            (SchemaNode::Str { .. }, Value::String(_))
            | (SchemaNode::Str { .. }, Value::Number(_))
            | (SchemaNode::Str { .. }, Value::Bool(_)) => true,
            _ => false,
        }
    }

    /// Render the schema as a JSON value suitable for prompt instructions.
    ///
    /// Leaves become their description (or "string"), so the model sees
    /// `{"field": "what goes here"}`.
    pub fn shape_json(&self) -> Value {
        match self {
            SchemaNode::Object(fields) => {
                let map = fields
                    .iter()
                    .map(|(key, schema)| (key.clone(), schema.shape_json()))
                    .collect();
                Value::Object(map)
            }
            SchemaNode::Array(element) => Value::Array(vec![element.shape_json()]),
            SchemaNode::Str { description } => {
                Value::String(description.clone().unwrap_or_else(|| "string".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_synthesis_is_idempotent() {
        let example = json!({"a": "x"});
        let first = SchemaNode::synthesize(&example);
        let second = SchemaNode::synthesize(&example);
        assert_eq!(first, second);
    }

    #[test]
    fn test_string_example_becomes_description() {
        let schema = SchemaNode::synthesize(&json!("the project name"));
        assert_eq!(
            schema,
            SchemaNode::Str {
                description: Some("the project name".to_string())
            }
        );
    }

    #[test]
    fn test_array_takes_first_element_shape() {
        let schema = SchemaNode::synthesize(&json!({"items": ["d"]}));
        let expected_element = SchemaNode::Str {
            description: Some("d".to_string()),
        };
        match schema {
            SchemaNode::Object(fields) => {
                assert_eq!(
                    fields.get("items"),
                    Some(&SchemaNode::Array(Box::new(expected_element)))
                );
            }
            other => panic!("expected object schema, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_array_yields_untyped_element() {
        let schema = SchemaNode::synthesize(&json!([]));
        assert_eq!(schema, SchemaNode::Array(Box::new(SchemaNode::untyped())));
    }

    #[test]
    fn test_scalars_widen_to_untyped_string() {
        assert_eq!(SchemaNode::synthesize(&json!(42)), SchemaNode::untyped());
        assert_eq!(SchemaNode::synthesize(&json!(true)), SchemaNode::untyped());
        assert_eq!(SchemaNode::synthesize(&json!(null)), SchemaNode::untyped());
    }

    #[test]
    fn test_validate_described_string_array() {
        let schema = SchemaNode::synthesize(&json!({"items": ["d"]}));
        assert!(schema.validate(&json!({"items": ["foo", "bar"]})));
        // Non-string scalars pass only because of the documented widening:
        // every scalar satisfies a string leaf.
        assert!(schema.validate(&json!({"items": [1, 2]})));
        assert!(!schema.validate(&json!({"items": "not an array"})));
        assert!(!schema.validate(&json!({})));
    }

    #[test]
    fn test_validate_allows_extra_fields() {
        let schema = SchemaNode::synthesize(&json!({"a": "x"}));
        assert!(schema.validate(&json!({"a": "v", "b": 1})));
    }

    #[test]
    fn test_shape_json() {
        let schema = SchemaNode::synthesize(&json!({"name": "the name", "tags": ["a tag"]}));
        assert_eq!(
            schema.shape_json(),
            json!({"name": "the name", "tags": ["a tag"]})
        );
    }
}
