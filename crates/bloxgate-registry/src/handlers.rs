// crates/bloxgate-registry/src/handlers.rs
// ============================================================================
// Module: Handler Classes
// Description: Data-configured handlers for the standard tool shapes.
// Purpose: One implementation per shape; tools differ only in data.
// Dependencies: async-trait, bloxgate-upstream, serde_json
// ============================================================================

//! ## Overview
//! Nearly every tool is one of five shapes: collection list, get-by-id,
//! create, update, delete. Each shape is implemented once and configured
//! per tool with paths, filter rules, and body field mappings. Compound and
//! derived tools with real logic live next to their catalog module.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use bloxgate_resilience::CallError;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamClient;
use serde_json::Map;
use serde_json::Value;

use crate::context::CallScope;
use crate::descriptor::ToolHandler;
use crate::error::ToolError;

// ============================================================================
// SECTION: Argument Helpers
// ============================================================================

/// Reads a string argument.
pub(crate) fn arg_str<'a>(arguments: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(Value::as_str)
}

/// Reads an integer argument.
pub(crate) fn arg_u64(arguments: &Map<String, Value>, name: &str) -> Option<u64> {
    arguments.get(name).and_then(Value::as_u64)
}

/// Reads a required string argument.
///
/// Validation guarantees presence; this guard keeps handlers fail-closed if
/// a descriptor and its schema ever drift apart.
pub(crate) fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, ToolError> {
    arg_str(arguments, name).ok_or_else(|| ToolError::SchemaViolation {
        message: format!("missing required field: {name}"),
    })
}

/// The default list page size exposed by every collection tool.
pub(crate) const DEFAULT_LIST_LIMIT: u64 = 100;

/// Translates an upstream 404 into a semantic not-found result.
pub(crate) fn map_not_found(
    result: Result<Value, ToolError>,
    label: &str,
    id: &str,
) -> Result<Value, ToolError> {
    match result {
        Err(ToolError::Call(CallError::UpstreamClient {
            status: 404,
            ..
        })) => Err(ToolError::NotFound {
            message: format!("{label} {id} not found"),
        }),
        other => other,
    }
}

/// Inserts a value at a dotted target path, creating nested objects.
fn insert_at(body: &mut Map<String, Value>, target: &str, value: Value) {
    match target.split_once('.') {
        None => {
            body.insert(target.to_string(), value);
        }
        Some((head, rest)) => {
            let nested = body
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(nested) = nested {
                insert_at(nested, rest, value);
            }
        }
    }
}

// ============================================================================
// SECTION: Filter Rules
// ============================================================================

/// Comparison operator in an upstream `_filter` expression.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FilterOp {
    /// Exact match: `field=='value'`.
    Eq,
    /// Substring match: `field~'value'`.
    Contains,
}

/// Maps one tool argument into a `_filter` clause.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FilterRule {
    /// Tool argument name.
    pub arg: &'static str,
    /// Upstream field the clause targets.
    pub field: &'static str,
    /// Comparison operator.
    pub op: FilterOp,
}

/// Builds the combined `_filter` expression from present arguments.
fn build_filter(rules: &[FilterRule], arguments: &Map<String, Value>) -> Option<String> {
    let clauses: Vec<String> = rules
        .iter()
        .filter_map(|rule| {
            arg_str(arguments, rule.arg).map(|value| match rule.op {
                FilterOp::Eq => format!("{}=='{value}'", rule.field),
                FilterOp::Contains => format!("{}~'{value}'", rule.field),
            })
        })
        .collect();
    if clauses.is_empty() { None } else { Some(clauses.join(" and ")) }
}

// ============================================================================
// SECTION: Collection List
// ============================================================================

/// Collection list with optional filter clauses and extra query params.
pub(crate) struct ListHandler {
    /// Target service.
    pub service: ServiceKind,
    /// Collection path.
    pub path: &'static str,
    /// Filter clause rules applied to present arguments.
    pub filters: &'static [FilterRule],
    /// Arguments passed through as raw query parameters.
    pub query_args: &'static [(&'static str, &'static str)],
}

#[async_trait]
impl ToolHandler for ListHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let limit = arg_u64(arguments, "limit").unwrap_or(DEFAULT_LIST_LIMIT);
        let filter = build_filter(self.filters, arguments);
        let mut request =
            UpstreamClient::list_collection(self.service, self.path, filter.as_deref(), limit);
        for (arg, param) in self.query_args {
            if let Some(value) = arg_str(arguments, arg) {
                request = request.with_query(*param, value);
            }
        }
        scope.upstream(request).await
    }
}

// ============================================================================
// SECTION: Get By Id
// ============================================================================

/// Single-resource read; 404 becomes a semantic not-found.
pub(crate) struct GetHandler {
    /// Target service.
    pub service: ServiceKind,
    /// Collection path.
    pub path: &'static str,
    /// Argument carrying the upstream identifier.
    pub id_arg: &'static str,
    /// Resource label used in not-found messages.
    pub label: &'static str,
}

#[async_trait]
impl ToolHandler for GetHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let id = required_str(arguments, self.id_arg)?;
        let request = UpstreamClient::get_resource(self.service, self.path, id);
        map_not_found(scope.upstream(request).await, self.label, id)
    }
}

// ============================================================================
// SECTION: Create
// ============================================================================

/// One argument copied into the request body, possibly nested.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyField {
    /// Tool argument name.
    pub arg: &'static str,
    /// Dotted body target, e.g. `rdata.address`.
    pub target: &'static str,
}

/// Resource creation from mapped arguments plus fixed literals.
pub(crate) struct CreateHandler {
    /// Target service.
    pub service: ServiceKind,
    /// Collection path.
    pub path: &'static str,
    /// Arguments copied into the body when present.
    pub fields: &'static [BodyField],
    /// Fixed body members, e.g. the DNS record type.
    pub literals: &'static [(&'static str, &'static str)],
}

impl CreateHandler {
    /// Builds the request body from arguments and literals.
    pub(crate) fn body(&self, arguments: &Map<String, Value>) -> Value {
        let mut body = Map::new();
        for field in self.fields {
            if let Some(value) = arguments.get(field.arg) {
                insert_at(&mut body, field.target, value.clone());
            }
        }
        for (target, value) in self.literals {
            insert_at(&mut body, target, Value::String((*value).to_string()));
        }
        Value::Object(body)
    }
}

#[async_trait]
impl ToolHandler for CreateHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let request =
            UpstreamClient::create_resource(self.service, self.path, self.body(arguments));
        scope.upstream(request).await
    }
}

// ============================================================================
// SECTION: Update
// ============================================================================

/// Partial update of one resource from present arguments.
pub(crate) struct UpdateHandler {
    /// Target service.
    pub service: ServiceKind,
    /// Collection path.
    pub path: &'static str,
    /// Argument carrying the upstream identifier.
    pub id_arg: &'static str,
    /// Arguments copied into the update document when present.
    pub fields: &'static [BodyField],
    /// Resource label used in not-found messages.
    pub label: &'static str,
}

#[async_trait]
impl ToolHandler for UpdateHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let id = required_str(arguments, self.id_arg)?;
        let mut updates = Map::new();
        for field in self.fields {
            if let Some(value) = arguments.get(field.arg) {
                insert_at(&mut updates, field.target, value.clone());
            }
        }
        let request = UpstreamClient::update_resource(
            self.service,
            self.path,
            id,
            Value::Object(updates),
        );
        map_not_found(scope.upstream(request).await, self.label, id)
    }
}

// ============================================================================
// SECTION: Delete
// ============================================================================

/// Resource deletion returning the upstream acknowledgment.
pub(crate) struct DeleteHandler {
    /// Target service.
    pub service: ServiceKind,
    /// Collection path; empty when the id is a full path.
    pub path: &'static str,
    /// Argument carrying the upstream identifier.
    pub id_arg: &'static str,
    /// Resource label used in not-found messages.
    pub label: &'static str,
}

#[async_trait]
impl ToolHandler for DeleteHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let id = required_str(arguments, self.id_arg)?;
        let request = UpstreamClient::delete_resource(self.service, self.path, id);
        map_not_found(scope.upstream(request).await, self.label, id)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn filters_join_present_arguments() {
        const RULES: &[FilterRule] = &[
            FilterRule {
                arg: "space_filter",
                field: "space",
                op: FilterOp::Eq,
            },
            FilterRule {
                arg: "address_filter",
                field: "address",
                op: FilterOp::Eq,
            },
        ];
        let arguments = json!({"space_filter": "ipam/ip_space/x", "address_filter": "10.0.0.0/8"});
        let filter = build_filter(RULES, arguments.as_object().unwrap()).unwrap();
        assert_eq!(filter, "space=='ipam/ip_space/x' and address=='10.0.0.0/8'");

        let arguments = json!({"address_filter": "10.0.0.0/8"});
        let filter = build_filter(RULES, arguments.as_object().unwrap()).unwrap();
        assert_eq!(filter, "address=='10.0.0.0/8'");

        assert!(build_filter(RULES, &Map::new()).is_none());
    }

    #[test]
    fn contains_filter_uses_tilde() {
        const RULES: &[FilterRule] = &[FilterRule {
            arg: "name_filter",
            field: "name",
            op: FilterOp::Contains,
        }];
        let arguments = json!({"name_filter": "corp"});
        let filter = build_filter(RULES, arguments.as_object().unwrap()).unwrap();
        assert_eq!(filter, "name~'corp'");
    }

    #[test]
    fn create_body_maps_nested_targets_and_literals() {
        let handler = CreateHandler {
            service: ServiceKind::InfobloxApi,
            path: "/dns/record",
            fields: &[
                BodyField {
                    arg: "name",
                    target: "name_in_zone",
                },
                BodyField {
                    arg: "zone",
                    target: "zone",
                },
                BodyField {
                    arg: "ip_address",
                    target: "rdata.address",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
            ],
            literals: &[("type", "A")],
        };
        let arguments = json!({"name": "www", "zone": "zone-1", "ip_address": "192.168.1.10"});
        let body = handler.body(arguments.as_object().unwrap());
        assert_eq!(
            body,
            json!({
                "name_in_zone": "www",
                "zone": "zone-1",
                "rdata": {"address": "192.168.1.10"},
                "type": "A",
            })
        );
    }
}
