// crates/bloxgate-registry/src/catalog/insights.rs
// ============================================================================
// Module: Security Insights Tools
// Description: Insight listing, detail, and triage tools.
// Purpose: Expose the Insights API to RPC clients.
// Dependencies: bloxgate-upstream, serde_json
// ============================================================================

//! ## Overview
//! Insights describe live security events; none of these reads are cached.
//! Sub-resource reads (indicators, events, assets) share one handler
//! configured with the collection suffix.

use std::sync::Arc;

use async_trait::async_trait;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamRequest;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::catalog::limit_field;
use crate::context::CallScope;
use crate::descriptor::CachePolicy;
use crate::descriptor::ToolClass;
use crate::descriptor::ToolDescriptor;
use crate::descriptor::ToolHandler;
use crate::error::RegistryError;
use crate::error::ToolError;
use crate::handlers::DEFAULT_LIST_LIMIT;
use crate::handlers::GetHandler;
use crate::handlers::ListHandler;
use crate::handlers::arg_str;
use crate::handlers::arg_u64;
use crate::handlers::map_not_found;
use crate::handlers::required_str;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

const SERVICE: ServiceKind = ServiceKind::InsightsApi;

#[allow(clippy::too_many_lines, reason = "One registration call per tool.")]
pub(crate) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolDescriptor {
        name: "list_security_insights",
        description: "List security insights, optionally by status or priority.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "status",
                SemanticType::Enum(&["Active", "Closed"]),
                "Insight lifecycle status",
            ))
            .field(FieldSpec::optional(
                "threat_type",
                SemanticType::String,
                "Restrict to one threat type",
            ))
            .field(FieldSpec::optional(
                "priority",
                SemanticType::String,
                "Restrict to one priority, e.g. HIGH",
            ))
            .field(limit_field()),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/insights",
            filters: &[],
            query_args: &[
                ("status", "status"),
                ("threat_type", "threat_type"),
                ("priority", "priority"),
            ],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_security_insight_details",
        description: "Fetch one security insight by id.",
        schema: InputSchema::new().field(FieldSpec::required(
            "insight_id",
            SemanticType::String,
            "Insight id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(GetHandler {
            service: SERVICE,
            path: "/insights",
            id_arg: "insight_id",
            label: "insight",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_security_insight_status",
        description: "Move an insight between Active and Closed.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "insight_id",
                SemanticType::String,
                "Insight id",
            ))
            .field(FieldSpec::required(
                "status",
                SemanticType::Enum(&["Active", "Closed"]),
                "New lifecycle status",
            ))
            .field(FieldSpec::optional(
                "comment",
                SemanticType::String,
                "Triage note recorded with the change",
            )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateInsightStatusHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "get_insight_threat_indicators",
        description: "List the threat indicators behind one insight.",
        schema: insight_subresource_schema(),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(InsightSubresourceHandler {
            suffix: "indicators",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_insight_security_events",
        description: "List the security events behind one insight.",
        schema: insight_subresource_schema(),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(InsightSubresourceHandler {
            suffix: "events",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_insight_affected_assets",
        description: "List the assets affected by one insight.",
        schema: insight_subresource_schema(),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(InsightSubresourceHandler {
            suffix: "assets",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_insight_comments_history",
        description: "List the triage comments and status transitions of one insight.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "insight_id",
                SemanticType::String,
                "Insight id",
            ))
            .field(FieldSpec::optional(
                "start_date",
                SemanticType::String,
                "Range start, ISO 8601",
            ))
            .field(FieldSpec::optional(
                "end_date",
                SemanticType::String,
                "Range end, ISO 8601",
            )),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(InsightCommentsHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "list_policy_analytics_insights",
        description: "List policy analytics insights for configuration compliance.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "status",
                SemanticType::Enum(&["OPEN", "RESOLVED", "CLOSED"]),
                "Insight lifecycle status",
            ))
            .field(limit_field()),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/config-insights/analytics",
            filters: &[],
            query_args: &[("status", "status")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_policy_analytics_insight_details",
        description: "Fetch one policy analytics insight by id.",
        schema: InputSchema::new().field(FieldSpec::required(
            "analytic_insight_id",
            SemanticType::String,
            "Analytics insight id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(GetHandler {
            service: SERVICE,
            path: "/config-insights/analytics",
            id_arg: "analytic_insight_id",
            label: "analytics insight",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_policy_compliance_insights",
        description: "List policy compliance check insights.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "check_type",
                SemanticType::String,
                "Restrict to one check type, e.g. security",
            ))
            .field(limit_field()),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/config-insights/policy-check",
            filters: &[],
            query_args: &[("check_type", "check_type")],
        }),
    })?;

    Ok(())
}

/// Shared schema for insight sub-resource reads.
fn insight_subresource_schema() -> InputSchema {
    InputSchema::new()
        .field(FieldSpec::required(
            "insight_id",
            SemanticType::String,
            "Insight id",
        ))
        .field(limit_field())
}

/// Reads one insight sub-collection: indicators, events, or assets.
struct InsightSubresourceHandler {
    /// Sub-collection path segment.
    suffix: &'static str,
}

#[async_trait]
impl ToolHandler for InsightSubresourceHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let insight_id = required_str(arguments, "insight_id")?;
        let limit = arg_u64(arguments, "limit").unwrap_or(DEFAULT_LIST_LIMIT);
        let path = format!("/insights/{}/{}", insight_id.trim_matches('/'), self.suffix);
        let request =
            UpstreamRequest::get(SERVICE, path).with_query("_limit", limit.to_string());
        map_not_found(scope.upstream(request).await, "insight", insight_id)
    }
}

/// Reads an insight's comment history with an optional date range.
struct InsightCommentsHandler;

#[async_trait]
impl ToolHandler for InsightCommentsHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let insight_id = required_str(arguments, "insight_id")?;
        let path = format!("/insights/{}/comments", insight_id.trim_matches('/'));
        let mut request = UpstreamRequest::get(SERVICE, path);
        if let Some(start_date) = arg_str(arguments, "start_date") {
            request = request.with_query("start_date", start_date);
        }
        if let Some(end_date) = arg_str(arguments, "end_date") {
            request = request.with_query("end_date", end_date);
        }
        map_not_found(scope.upstream(request).await, "insight", insight_id)
    }
}

/// Status transitions go through the bulk status endpoint.
struct UpdateInsightStatusHandler;

#[async_trait]
impl ToolHandler for UpdateInsightStatusHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let insight_id = required_str(arguments, "insight_id")?;
        let status = required_str(arguments, "status")?;
        let mut body = json!({
            "insight_ids": [insight_id],
            "status": status,
        });
        if let Some(comment) = arg_str(arguments, "comment") {
            body["comment"] = json!(comment);
        }
        let request = UpstreamRequest {
            service: SERVICE,
            method: bloxgate_upstream::HttpMethod::Put,
            path: "/insights/status".to_string(),
            query: Vec::new(),
            body: Some(body),
        };
        map_not_found(scope.upstream(request).await, "insight", insight_id)
    }
}
