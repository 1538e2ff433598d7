// crates/bloxgate-registry/src/schema.rs
// ============================================================================
// Module: Input Schemas
// Description: Declared per-tool argument shapes with semantic types.
// Purpose: Give the transport a schema to publish and the boundary to check.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Schemas are data, not code: each tool declares named fields with a
//! semantic type, a required marker, and an optional default. The same
//! declaration drives boundary validation and the `list_tools` exposure, so
//! the catalog a client sees is exactly what the validator enforces.

use serde_json::Map;
use serde_json::Value;
use serde_json::json;

/// Semantic argument types understood by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticType {
    /// Free-form string.
    String,
    /// Whole number.
    Integer,
    /// True/false flag.
    Boolean,
    /// IPv4 or IPv6 network in CIDR notation.
    Cidr,
    /// Single IPv4 or IPv6 address.
    IpAddress,
    /// JSON object with arbitrary members.
    Mapping,
    /// Ordered sequence with uniformly typed elements.
    Sequence(Box<SemanticType>),
    /// String restricted to an enumerated value set.
    Enum(&'static [&'static str]),
}

impl SemanticType {
    /// Returns the wire name published in `list_tools`.
    #[must_use]
    pub fn wire_name(&self) -> String {
        match self {
            Self::String => "string".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Cidr => "cidr".to_string(),
            Self::IpAddress => "ip_address".to_string(),
            Self::Mapping => "mapping".to_string(),
            Self::Sequence(element) => format!("sequence<{}>", element.wire_name()),
            Self::Enum(_) => "enum".to_string(),
        }
    }
}

/// One declared argument field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name as the client sends it.
    pub name: &'static str,
    /// Semantic type enforced at the boundary.
    pub ty: SemanticType,
    /// Whether the field must be present.
    pub required: bool,
    /// Default applied when an optional field is absent.
    pub default: Option<Value>,
    /// Human description published to clients.
    pub description: &'static str,
}

impl FieldSpec {
    /// Declares a required field.
    #[must_use]
    pub const fn required(name: &'static str, ty: SemanticType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            description,
        }
    }

    /// Declares an optional field without a default.
    #[must_use]
    pub const fn optional(name: &'static str, ty: SemanticType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            description,
        }
    }

    /// Declares an optional field with a default value.
    #[must_use]
    pub fn with_default(
        name: &'static str,
        ty: SemanticType,
        default: Value,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: Some(default),
            description,
        }
    }
}

/// Declared argument shape of one tool.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    /// Declared fields, in publication order.
    pub fields: Vec<FieldSpec>,
}

impl InputSchema {
    /// Creates an empty schema (tools without arguments).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: Vec::new(),
        }
    }

    /// Appends a field declaration.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Renders the schema for `list_tools` consumers.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut spec = Map::new();
            spec.insert("type".to_string(), json!(field.ty.wire_name()));
            spec.insert("description".to_string(), json!(field.description));
            if let SemanticType::Enum(values) = &field.ty {
                spec.insert("enum".to_string(), json!(values));
            }
            if let Some(default) = &field.default {
                spec.insert("default".to_string(), default.clone());
            }
            properties.insert(field.name.to_string(), Value::Object(spec));
            if field.required {
                required.push(json!(field.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn wire_form_lists_required_fields_and_enums() {
        let schema = InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Network in CIDR notation",
            ))
            .field(FieldSpec::with_default(
                "limit",
                SemanticType::Integer,
                json!(100),
                "Maximum results",
            ))
            .field(FieldSpec::optional(
                "size",
                SemanticType::Enum(&["S", "M", "L"]),
                "Endpoint size",
            ));
        let wire = schema.to_wire();
        assert_eq!(wire["required"], json!(["address"]));
        assert_eq!(wire["properties"]["address"]["type"], json!("cidr"));
        assert_eq!(wire["properties"]["limit"]["default"], json!(100));
        assert_eq!(wire["properties"]["size"]["enum"], json!(["S", "M", "L"]));
        assert_eq!(wire["additionalProperties"], json!(false));
    }

    #[test]
    fn sequence_wire_names_nest() {
        let ty = SemanticType::Sequence(Box::new(SemanticType::IpAddress));
        assert_eq!(ty.wire_name(), "sequence<ip_address>");
    }
}
