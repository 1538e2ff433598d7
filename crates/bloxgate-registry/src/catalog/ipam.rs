// crates/bloxgate-registry/src/catalog/ipam.rs
// ============================================================================
// Module: IPAM Tools
// Description: IP space, subnet, address, host, range, and block tools.
// Purpose: Expose BloxOne DDI IPAM collections to RPC clients.
// Dependencies: bloxgate-upstream, serde_json
// ============================================================================

//! ## Overview
//! IPAM is the largest domain: spaces, subnets, fixed addresses, hosts,
//! ranges, and address blocks, each with the standard list/create/update/
//! delete shapes, plus the derived subnet-utilization read that joins
//! subnets with their address usage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamClient;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::catalog::VOLATILE_TTL;
use crate::catalog::comment_field;
use crate::catalog::limit_field;
use crate::context::CallScope;
use crate::descriptor::CachePolicy;
use crate::descriptor::ToolClass;
use crate::descriptor::ToolDescriptor;
use crate::descriptor::ToolHandler;
use crate::error::RegistryError;
use crate::error::ToolError;
use crate::handlers::BodyField;
use crate::handlers::CreateHandler;
use crate::handlers::DEFAULT_LIST_LIMIT;
use crate::handlers::DeleteHandler;
use crate::handlers::FilterOp;
use crate::handlers::FilterRule;
use crate::handlers::GetHandler;
use crate::handlers::ListHandler;
use crate::handlers::UpdateHandler;
use crate::handlers::arg_str;
use crate::handlers::arg_u64;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

const SERVICE: ServiceKind = ServiceKind::InfobloxApi;

// ============================================================================
// SECTION: Registration
// ============================================================================

#[allow(clippy::too_many_lines, reason = "One registration call per tool.")]
pub(crate) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolDescriptor {
        name: "list_ip_spaces",
        description: "List IP address spaces in BloxOne DDI IPAM.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match spaces whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/ipam/ip_space",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_subnets",
        description: "List subnets, optionally scoped to a space or CIDR.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "space_filter",
                SemanticType::String,
                "Restrict to one IP space id",
            ))
            .field(FieldSpec::optional(
                "address_filter",
                SemanticType::Cidr,
                "Restrict to one network address",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/ipam/subnet",
            filters: &[
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
            ],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_subnet",
        description: "Create a subnet in an IP space.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Network address in CIDR notation",
            ))
            .field(FieldSpec::required(
                "space",
                SemanticType::String,
                "IP space id the subnet belongs to",
            ))
            .field(comment_field())
            .field(FieldSpec::optional(
                "dhcp_host",
                SemanticType::String,
                "DHCP host id serving this subnet",
            )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/ipam/subnet",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "space",
                    target: "space",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
                BodyField {
                    arg: "dhcp_host",
                    target: "dhcp_host",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_subnet",
        description: "Update a subnet's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "subnet_id",
                SemanticType::String,
                "Subnet id to update",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/ipam/subnet",
            id_arg: "subnet_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "subnet",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_subnet",
        description: "Delete a subnet (moves it to the recycle bin).",
        schema: InputSchema::new().field(FieldSpec::required(
            "subnet_id",
            SemanticType::String,
            "Subnet id to delete",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/ipam/subnet",
            id_arg: "subnet_id",
            label: "subnet",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_subnet_utilization",
        description: "List subnets with address counts and utilization percentages.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "space_filter",
                SemanticType::String,
                "Restrict to one IP space id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(SubnetUtilizationHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "list_ip_addresses",
        description: "List tracked IP addresses, optionally by address or state.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "address_filter",
                SemanticType::IpAddress,
                "Restrict to one address",
            ))
            .field(FieldSpec::optional(
                "state_filter",
                SemanticType::String,
                "Restrict to one usage state, e.g. used or free",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/ipam/address",
            filters: &[
                FilterRule {
                    arg: "address_filter",
                    field: "address",
                    op: FilterOp::Eq,
                },
                FilterRule {
                    arg: "state_filter",
                    field: "state",
                    op: FilterOp::Eq,
                },
            ],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "reserve_fixed_address",
        description: "Reserve a fixed IP address in a space.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::IpAddress,
                "Address to reserve",
            ))
            .field(FieldSpec::required(
                "space",
                SemanticType::String,
                "IP space id the address belongs to",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/ipam/fixed_address",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "space",
                    target: "space",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_fixed_address",
        description: "Fetch one fixed address by id.",
        schema: InputSchema::new().field(FieldSpec::required(
            "address_id",
            SemanticType::String,
            "Fixed address id",
        )),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(GetHandler {
            service: SERVICE,
            path: "/ipam/fixed_address",
            id_arg: "address_id",
            label: "fixed address",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_fixed_address",
        description: "Update a fixed address's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address_id",
                SemanticType::String,
                "Fixed address id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/ipam/fixed_address",
            id_arg: "address_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "fixed address",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_fixed_address",
        description: "Delete a fixed address reservation.",
        schema: InputSchema::new().field(FieldSpec::required(
            "address_id",
            SemanticType::String,
            "Fixed address id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/ipam/fixed_address",
            id_arg: "address_id",
            label: "fixed address",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_ipam_hosts",
        description: "List IPAM hosts (equipment with assigned addresses).",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match hosts whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/ipam/host",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_ipam_host",
        description: "Create an IPAM host with its address associations.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "Host name (FQDN)",
            ))
            .field(FieldSpec::required(
                "addresses",
                SemanticType::Sequence(Box::new(SemanticType::Mapping)),
                "Address configs with address and space members",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/ipam/host",
            fields: &[
                BodyField {
                    arg: "name",
                    target: "name",
                },
                BodyField {
                    arg: "addresses",
                    target: "addresses",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_ipam_host",
        description: "Fetch one IPAM host by id.",
        schema: InputSchema::new().field(FieldSpec::required(
            "host_id",
            SemanticType::String,
            "IPAM host id",
        )),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(GetHandler {
            service: SERVICE,
            path: "/ipam/host",
            id_arg: "host_id",
            label: "ipam host",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_ipam_host",
        description: "Update an IPAM host's name or description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "host_id",
                SemanticType::String,
                "IPAM host id",
            ))
            .field(FieldSpec::optional(
                "name",
                SemanticType::String,
                "New host name",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/ipam/host",
            id_arg: "host_id",
            fields: &[
                BodyField {
                    arg: "name",
                    target: "name",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            label: "ipam host",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_ipam_host",
        description: "Delete an IPAM host and its DNS and IP associations.",
        schema: InputSchema::new().field(FieldSpec::required(
            "host_id",
            SemanticType::String,
            "IPAM host id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/ipam/host",
            id_arg: "host_id",
            label: "ipam host",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_ip_ranges",
        description: "List DHCP ranges, optionally scoped to a space.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "space_filter",
                SemanticType::String,
                "Restrict to one IP space id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/ipam/range",
            filters: &[FilterRule {
                arg: "space_filter",
                field: "space",
                op: FilterOp::Eq,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_ip_range",
        description: "Create an address range in a space.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "start",
                SemanticType::IpAddress,
                "First address of the range",
            ))
            .field(FieldSpec::required(
                "end",
                SemanticType::IpAddress,
                "Last address of the range",
            ))
            .field(FieldSpec::required(
                "space",
                SemanticType::String,
                "IP space id the range belongs to",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/ipam/range",
            fields: &[
                BodyField {
                    arg: "start",
                    target: "start",
                },
                BodyField {
                    arg: "end",
                    target: "end",
                },
                BodyField {
                    arg: "space",
                    target: "space",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_ip_range",
        description: "Update a range's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "range_id",
                SemanticType::String,
                "Range id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/ipam/range",
            id_arg: "range_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "range",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_ip_range",
        description: "Delete an address range.",
        schema: InputSchema::new().field(FieldSpec::required(
            "range_id",
            SemanticType::String,
            "Range id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/ipam/range",
            id_arg: "range_id",
            label: "range",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_address_blocks",
        description: "List address blocks, optionally scoped to a space.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "space_filter",
                SemanticType::String,
                "Restrict to one IP space id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/ipam/address_block",
            filters: &[FilterRule {
                arg: "space_filter",
                field: "space",
                op: FilterOp::Eq,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_address_block",
        description: "Create an address block in a space.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Block address in CIDR notation",
            ))
            .field(FieldSpec::required(
                "space",
                SemanticType::String,
                "IP space id the block belongs to",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/ipam/address_block",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "space",
                    target: "space",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_address_block",
        description: "Update an address block's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "block_id",
                SemanticType::String,
                "Address block id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/ipam/address_block",
            id_arg: "block_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "address block",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_address_block",
        description: "Delete an address block.",
        schema: InputSchema::new().field(FieldSpec::required(
            "block_id",
            SemanticType::String,
            "Address block id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/ipam/address_block",
            id_arg: "block_id",
            label: "address block",
        }),
    })?;

    Ok(())
}

// ============================================================================
// SECTION: Derived Reads
// ============================================================================

/// Joins subnets with tracked addresses into a utilization view.
struct SubnetUtilizationHandler;

#[async_trait]
impl ToolHandler for SubnetUtilizationHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let limit = arg_u64(arguments, "limit").unwrap_or(DEFAULT_LIST_LIMIT);
        let filter = arg_str(arguments, "space_filter").map(|space| format!("space=='{space}'"));

        let subnets = scope
            .upstream(UpstreamClient::list_collection(
                SERVICE,
                "/ipam/subnet",
                filter.as_deref(),
                limit,
            ))
            .await?;
        let addresses = scope
            .upstream_keyed(
                "addresses",
                UpstreamClient::list_collection(
                    SERVICE,
                    "/ipam/address",
                    filter.as_deref(),
                    // Address collections dwarf subnet collections.
                    limit.saturating_mul(100),
                ),
            )
            .await?;

        Ok(compose_utilization(&subnets, &addresses))
    }
}

/// Folds subnet and address listings into per-subnet utilization.
fn compose_utilization(subnets: &Value, addresses: &Value) -> Value {
    let empty = Vec::new();
    let subnets = subnets["results"].as_array().unwrap_or(&empty);
    let addresses = addresses["results"].as_array().unwrap_or(&empty);

    let results: Vec<Value> = subnets
        .iter()
        .map(|subnet| {
            let cidr = subnet["address"].as_str().unwrap_or_default();
            let capacity = ipv4_capacity(cidr);
            let used = addresses
                .iter()
                .filter(|address| {
                    address["address"]
                        .as_str()
                        .is_some_and(|candidate| ipv4_contains(cidr, candidate))
                })
                .count() as u64;
            let utilization = capacity
                .filter(|capacity| *capacity > 0)
                .map(|capacity| (used as f64 / capacity as f64) * 100.0);
            json!({
                "id": subnet["id"],
                "address": subnet["address"],
                "space": subnet["space"],
                "comment": subnet["comment"],
                "capacity": capacity,
                "used": used,
                "utilization_percent": utilization,
            })
        })
        .collect();
    json!({"results": results})
}

/// Returns the usable host capacity of an IPv4 CIDR, `None` for IPv6.
fn ipv4_capacity(cidr: &str) -> Option<u64> {
    let (address, prefix) = cidr.split_once('/')?;
    address.parse::<Ipv4Addr>().ok()?;
    let prefix = prefix.parse::<u32>().ok()?;
    if prefix > 32 {
        return None;
    }
    Some(1u64 << (32 - prefix))
}

/// Returns whether an IPv4 address falls inside an IPv4 CIDR.
fn ipv4_contains(cidr: &str, candidate: &str) -> bool {
    let Some((network, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(network), Ok(candidate)) =
        (network.parse::<Ipv4Addr>(), candidate.parse::<Ipv4Addr>())
    else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u32>() else {
        return false;
    };
    if prefix > 32 {
        return false;
    }
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    (u32::from(network) & mask) == (u32::from(candidate) & mask)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn utilization_counts_addresses_inside_each_subnet() {
        let subnets = json!({"results": [
            {"id": "s1", "address": "10.0.0.0/24", "space": "sp", "comment": null},
            {"id": "s2", "address": "192.168.1.0/30", "space": "sp", "comment": null},
        ]});
        let addresses = json!({"results": [
            {"address": "10.0.0.5"},
            {"address": "10.0.0.9"},
            {"address": "172.16.0.1"},
        ]});
        let composed = compose_utilization(&subnets, &addresses);
        let results = composed["results"].as_array().unwrap();
        assert_eq!(results[0]["used"], json!(2));
        assert_eq!(results[0]["capacity"], json!(256));
        assert_eq!(results[1]["used"], json!(0));
        assert_eq!(results[1]["capacity"], json!(4));
    }

    #[test]
    fn cidr_containment_is_mask_based() {
        assert!(ipv4_contains("10.0.0.0/8", "10.255.255.255"));
        assert!(!ipv4_contains("10.0.0.0/8", "11.0.0.1"));
        assert!(ipv4_contains("0.0.0.0/0", "203.0.113.9"));
        assert!(!ipv4_contains("bad", "10.0.0.1"));
    }
}
