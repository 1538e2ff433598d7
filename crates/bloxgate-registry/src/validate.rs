// crates/bloxgate-registry/src/validate.rs
// ============================================================================
// Module: Argument Validation
// Description: Boundary checks of tool arguments against declared schemas.
// Purpose: Reject malformed calls before any handler or upstream work.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Validation is strict and fail-closed: unknown fields are rejected,
//! required fields must be present, enumerated values must match exactly,
//! and address-typed fields must parse. Defaults are applied here so the
//! cache fingerprint of an absent optional equals that of its default.

use std::net::IpAddr;

use serde_json::Map;
use serde_json::Value;

use crate::error::ToolError;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

/// Validates raw arguments and returns the defaulted argument map.
///
/// # Errors
///
/// Returns [`ToolError::SchemaViolation`] for unknown fields, missing
/// required fields, and type or value violations.
pub fn validate_arguments(
    schema: &InputSchema,
    arguments: &Value,
) -> Result<Map<String, Value>, ToolError> {
    let supplied = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        _ => {
            return Err(violation("arguments must be a JSON object"));
        }
    };

    for key in supplied.keys() {
        if schema.get(key).is_none() {
            return Err(violation(&format!("unknown field: {key}")));
        }
    }

    let mut validated = Map::new();
    for field in &schema.fields {
        // Explicit null counts as absent, matching optional semantics.
        let value = supplied.get(field.name).filter(|value| !value.is_null());
        match value {
            Some(value) => {
                check_type(field.name, &field.ty, value)?;
                validated.insert(field.name.to_string(), value.clone());
            }
            None if field.required => {
                return Err(violation(&format!("missing required field: {}", field.name)));
            }
            None => {
                if let Some(default) = &field.default {
                    validated.insert(field.name.to_string(), default.clone());
                }
            }
        }
    }
    Ok(validated)
}

/// Checks one value against its declared semantic type.
fn check_type(name: &str, ty: &SemanticType, value: &Value) -> Result<(), ToolError> {
    match ty {
        SemanticType::String => {
            if !value.is_string() {
                return Err(type_violation(name, "a string"));
            }
        }
        SemanticType::Integer => {
            if !value.is_i64() && !value.is_u64() {
                return Err(type_violation(name, "an integer"));
            }
        }
        SemanticType::Boolean => {
            if !value.is_boolean() {
                return Err(type_violation(name, "a boolean"));
            }
        }
        SemanticType::Cidr => {
            let text = value.as_str().ok_or_else(|| type_violation(name, "a CIDR string"))?;
            if !is_valid_cidr(text) {
                return Err(violation(&format!(
                    "field {name} must be CIDR notation, got: {text}"
                )));
            }
        }
        SemanticType::IpAddress => {
            let text = value.as_str().ok_or_else(|| type_violation(name, "an IP address"))?;
            if text.parse::<IpAddr>().is_err() {
                return Err(violation(&format!(
                    "field {name} must be an IP address, got: {text}"
                )));
            }
        }
        SemanticType::Mapping => {
            if !value.is_object() {
                return Err(type_violation(name, "an object"));
            }
        }
        SemanticType::Sequence(element) => {
            let items = value.as_array().ok_or_else(|| type_violation(name, "a sequence"))?;
            for item in items {
                check_type(name, element, item)?;
            }
        }
        SemanticType::Enum(allowed) => {
            let text = value.as_str().ok_or_else(|| type_violation(name, "an enum string"))?;
            if !allowed.contains(&text) {
                return Err(violation(&format!(
                    "field {name} must be one of {allowed:?}, got: {text}"
                )));
            }
        }
    }
    Ok(())
}

/// Returns whether a string is valid CIDR notation.
fn is_valid_cidr(text: &str) -> bool {
    let Some((address, prefix)) = text.split_once('/') else {
        return false;
    };
    let Ok(address) = address.parse::<IpAddr>() else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match address {
        IpAddr::V4(_) => prefix <= 32,
        IpAddr::V6(_) => prefix <= 128,
    }
}

fn violation(message: &str) -> ToolError {
    ToolError::SchemaViolation {
        message: message.to_string(),
    }
}

fn type_violation(name: &str, expected: &str) -> ToolError {
    violation(&format!("field {name} must be {expected}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;
    use crate::schema::FieldSpec;

    fn subnet_schema() -> InputSchema {
        InputSchema::new()
            .field(FieldSpec::required("address", SemanticType::Cidr, "Network CIDR"))
            .field(FieldSpec::required("space", SemanticType::String, "IP space id"))
            .field(FieldSpec::optional("comment", SemanticType::String, "Description"))
            .field(FieldSpec::with_default(
                "limit",
                SemanticType::Integer,
                json!(100),
                "Maximum results",
            ))
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = validate_arguments(
            &subnet_schema(),
            &json!({"address": "10.0.0.0/24", "space": "x", "bogus": 1}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field: bogus"));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let err = validate_arguments(&subnet_schema(), &json!({"address": "10.0.0.0/24"}))
            .unwrap_err();
        assert!(err.to_string().contains("missing required field: space"));
    }

    #[test]
    fn defaults_fill_absent_optionals() {
        let validated = validate_arguments(
            &subnet_schema(),
            &json!({"address": "10.0.0.0/24", "space": "x"}),
        )
        .unwrap();
        assert_eq!(validated.get("limit"), Some(&json!(100)));
        assert!(validated.get("comment").is_none());
    }

    #[test]
    fn explicit_default_and_absent_validate_identically() {
        let a = validate_arguments(
            &subnet_schema(),
            &json!({"address": "10.0.0.0/24", "space": "x"}),
        )
        .unwrap();
        let b = validate_arguments(
            &subnet_schema(),
            &json!({"address": "10.0.0.0/24", "space": "x", "limit": 100}),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn null_counts_as_absent() {
        let validated = validate_arguments(
            &subnet_schema(),
            &json!({"address": "10.0.0.0/24", "space": "x", "comment": null}),
        )
        .unwrap();
        assert!(validated.get("comment").is_none());
    }

    #[test]
    fn cidr_and_ip_values_must_parse() {
        let schema = InputSchema::new()
            .field(FieldSpec::required("address", SemanticType::Cidr, "CIDR"))
            .field(FieldSpec::optional("ip", SemanticType::IpAddress, "Address"));
        assert!(validate_arguments(&schema, &json!({"address": "10.0.0.0/24"})).is_ok());
        assert!(validate_arguments(&schema, &json!({"address": "10.0.0.0/33"})).is_err());
        assert!(validate_arguments(&schema, &json!({"address": "not-a-cidr"})).is_err());
        assert!(
            validate_arguments(&schema, &json!({"address": "2001:db8::/64", "ip": "2001:db8::1"}))
                .is_ok()
        );
        assert!(
            validate_arguments(&schema, &json!({"address": "10.0.0.0/24", "ip": "999.1.1.1"}))
                .is_err()
        );
    }

    #[test]
    fn enums_and_sequences_are_enforced() {
        let schema = InputSchema::new()
            .field(FieldSpec::required(
                "size",
                SemanticType::Enum(&["S", "M", "L"]),
                "Endpoint size",
            ))
            .field(FieldSpec::optional(
                "neighbour_ips",
                SemanticType::Sequence(Box::new(SemanticType::IpAddress)),
                "BGP neighbours",
            ));
        assert!(validate_arguments(&schema, &json!({"size": "M"})).is_ok());
        assert!(validate_arguments(&schema, &json!({"size": "XL"})).is_err());
        assert!(
            validate_arguments(
                &schema,
                &json!({"size": "S", "neighbour_ips": ["169.254.21.1", "169.254.22.1"]})
            )
            .is_ok()
        );
        assert!(
            validate_arguments(&schema, &json!({"size": "S", "neighbour_ips": ["bad"]})).is_err()
        );
    }

    #[test]
    fn floats_are_not_integers() {
        let schema = InputSchema::new().field(FieldSpec::required(
            "limit",
            SemanticType::Integer,
            "Maximum results",
        ));
        assert!(validate_arguments(&schema, &json!({"limit": 10.5})).is_err());
        assert!(validate_arguments(&schema, &json!({"limit": 10})).is_ok());
    }
}
