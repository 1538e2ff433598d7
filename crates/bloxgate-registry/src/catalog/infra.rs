// crates/bloxgate-registry/src/catalog/infra.rs
// ============================================================================
// Module: VPN Infrastructure Tools
// Description: Universal service, endpoint, and consolidated configure tools.
// Purpose: Expose NIOSXaaS VPN provisioning to RPC clients.
// Dependencies: bloxgate-upstream, serde_json
// ============================================================================

//! ## Overview
//! VPN provisioning centers on the consolidated configure endpoint, which
//! applies a composite document (service, credentials, endpoints, access
//! locations) as one upstream transaction. While a transaction is applying,
//! the upstream answers 409; the pipeline's retry policy absorbs that.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamClient;
use bloxgate_upstream::UpstreamRequest;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::context::CallScope;
use crate::descriptor::CachePolicy;
use crate::descriptor::ToolClass;
use crate::descriptor::ToolDescriptor;
use crate::descriptor::ToolHandler;
use crate::error::RegistryError;
use crate::error::ToolError;
use crate::handlers::arg_str;
use crate::handlers::required_str;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

const SERVICE: ServiceKind = ServiceKind::NiosxaasApi;

// ============================================================================
// SECTION: Registration
// ============================================================================

#[allow(clippy::too_many_lines, reason = "One registration call per tool.")]
pub(crate) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolDescriptor {
        name: "list_supported_sizes",
        description: "List supported VPN endpoint sizes.",
        schema: InputSchema::new(),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(SimpleGetHandler {
            path: "/supportedsizes",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_cloud_regions",
        description: "List available regions for a cloud provider.",
        schema: InputSchema::new().field(FieldSpec::with_default(
            "provider",
            SemanticType::Enum(&["AWS", "Azure", "GCP"]),
            json!("AWS"),
            "Cloud provider",
        )),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(CloudRegionsHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "list_service_capabilities",
        description: "List available universal service capabilities.",
        schema: InputSchema::new(),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(SimpleGetHandler {
            path: "/capabilities",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "configure_vpn_infrastructure",
        description: "Apply a composite VPN document (service, credentials, endpoints, \
                      access locations) through the consolidated configure endpoint.",
        schema: InputSchema::new().field(FieldSpec::required(
            "vpn_payload",
            SemanticType::Mapping,
            "Consolidated configure document with a universal_service section",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(ConfigureVpnHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "get_vpn_endpoint_cnames",
        description: "Fetch a VPN endpoint's CNAMEs for customer gateway creation.",
        schema: InputSchema::new().field(FieldSpec::optional(
            "endpoint_id",
            SemanticType::String,
            "Endpoint id; the first endpoint is used when absent",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Read,
        handler: Arc::new(EndpointCnamesHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "update_vpn_access_location",
        description: "Update an access location's tunnel configuration after the \
                      cloud side of the VPN exists.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "access_location_id",
                SemanticType::String,
                "Access location id",
            ))
            .field(FieldSpec::optional(
                "tunnel_configs",
                SemanticType::Sequence(Box::new(SemanticType::Mapping)),
                "Replacement tunnel configs with access_ip members",
            )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateAccessLocationHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_vpn_service",
        description: "Delete a universal service and its VPN infrastructure by name.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "service_name",
                SemanticType::String,
                "Exact universal service name",
            ))
            .field(FieldSpec::with_default(
                "confirm",
                SemanticType::Boolean,
                json!(false),
                "Must be true to actually delete",
            )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteVpnServiceHandler),
    })?;

    Ok(())
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Bodyless GET against a fixed infra path.
struct SimpleGetHandler {
    /// Service-relative path.
    path: &'static str,
}

#[async_trait]
impl ToolHandler for SimpleGetHandler {
    async fn invoke(
        &self,
        _arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        scope.upstream(UpstreamRequest::get(SERVICE, self.path)).await
    }
}

/// Region listing; the upstream models this as a POST with the provider.
struct CloudRegionsHandler;

#[async_trait]
impl ToolHandler for CloudRegionsHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let provider = arg_str(arguments, "provider").unwrap_or("AWS");
        let request = UpstreamRequest::post(
            SERVICE,
            "/cloudproviderregions",
            json!({"provider": provider}),
        );
        scope.upstream(request).await
    }
}

/// Submits the composite document to the consolidated endpoint.
struct ConfigureVpnHandler;

#[async_trait]
impl ToolHandler for ConfigureVpnHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let payload = arguments
            .get("vpn_payload")
            .and_then(Value::as_object)
            .ok_or_else(|| ToolError::SchemaViolation {
                message: "missing required field: vpn_payload".to_string(),
            })?;
        // Partial documents are the dominant failure mode; reject them
        // before the upstream starts a transaction it cannot finish.
        if !payload.contains_key("universal_service") {
            return Err(ToolError::SchemaViolation {
                message: "vpn_payload requires a universal_service section".to_string(),
            });
        }
        scope.emit_progress("submitting consolidated configuration").await;
        let request =
            UpstreamClient::consolidated_configure(Value::Object(payload.clone()));
        scope.upstream(request).await
    }
}

/// Reads endpoint CNAMEs, defaulting to the first endpoint.
struct EndpointCnamesHandler;

#[async_trait]
impl ToolHandler for EndpointCnamesHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        if let Some(endpoint_id) = arg_str(arguments, "endpoint_id") {
            let request = UpstreamClient::get_resource(SERVICE, "/endpoints", endpoint_id);
            return scope.upstream(request).await;
        }
        let listing = scope
            .upstream(UpstreamClient::list_collection(SERVICE, "/endpoints", None, 1))
            .await?;
        listing["results"]
            .as_array()
            .and_then(|results| results.first().cloned())
            .ok_or_else(|| ToolError::NotFound {
                message: "no vpn endpoints exist".to_string(),
            })
    }
}

/// Updates an access location through the consolidated endpoint.
struct UpdateAccessLocationHandler;

#[async_trait]
impl ToolHandler for UpdateAccessLocationHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let id = required_str(arguments, "access_location_id")?;
        let mut update = json!({"id": id});
        if let Some(tunnel_configs) = arguments.get("tunnel_configs") {
            update["tunnel_configs"] = tunnel_configs.clone();
        }
        let payload = json!({
            "access_locations": {"create": [], "update": [update], "delete": []},
        });
        scope.upstream(UpstreamClient::consolidated_configure(payload)).await
    }
}

/// Deletes a universal service by name, behind an explicit confirmation.
struct DeleteVpnServiceHandler;

#[async_trait]
impl ToolHandler for DeleteVpnServiceHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let name = required_str(arguments, "service_name")?;
        let confirmed = arguments
            .get("confirm")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !confirmed {
            return Ok(json!({
                "status": "confirmation_required",
                "message": format!(
                    "Deletion of '{name}' requires explicit confirmation. \
                     Set confirm to true to proceed."
                ),
                "warning": "This operation is irreversible and deletes all associated \
                            VPN infrastructure.",
            }));
        }

        let filter = format!("name=='{name}'");
        let services = scope
            .upstream(UpstreamClient::list_collection(
                SERVICE,
                "/universalservices",
                Some(&filter),
                10,
            ))
            .await?;
        let service_id = services["results"]
            .as_array()
            .and_then(|results| results.first())
            .and_then(|service| service["id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| ToolError::NotFound {
                message: format!("universal service '{name}' not found"),
            })?;

        let ack = scope
            .upstream(UpstreamClient::delete_resource(
                SERVICE,
                "/universalservices",
                &service_id,
            ))
            .await?;
        Ok(json!({
            "status": "deleted",
            "service_name": name,
            "service_id": service_id,
            "upstream": ack,
        }))
    }
}
