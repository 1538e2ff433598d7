// crates/bloxgate-registry/src/catalog/dhcp.rs
// ============================================================================
// Module: DHCP Tools
// Description: DHCP host, hardware, HA group, and option code tools.
// Purpose: Expose BloxOne DDI DHCP configuration to RPC clients.
// Dependencies: bloxgate-upstream, serde_json
// ============================================================================

use std::sync::Arc;

use bloxgate_upstream::ServiceKind;

use crate::catalog::VOLATILE_TTL;
use crate::catalog::comment_field;
use crate::catalog::limit_field;
use crate::descriptor::CachePolicy;
use crate::descriptor::ToolClass;
use crate::descriptor::ToolDescriptor;
use crate::error::RegistryError;
use crate::handlers::BodyField;
use crate::handlers::CreateHandler;
use crate::handlers::DeleteHandler;
use crate::handlers::FilterOp;
use crate::handlers::FilterRule;
use crate::handlers::GetHandler;
use crate::handlers::ListHandler;
use crate::handlers::UpdateHandler;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

const SERVICE: ServiceKind = ServiceKind::InfobloxApi;

#[allow(clippy::too_many_lines, reason = "One registration call per tool.")]
pub(crate) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolDescriptor {
        name: "list_dhcp_hosts",
        description: "List DHCP serving hosts.",
        schema: InputSchema::new().field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dhcp/host",
            filters: &[],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_dhcp_host",
        description: "Fetch one DHCP host by id.",
        schema: InputSchema::new().field(FieldSpec::required(
            "host_id",
            SemanticType::String,
            "DHCP host id",
        )),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(GetHandler {
            service: SERVICE,
            path: "/dhcp/host",
            id_arg: "host_id",
            label: "dhcp host",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_dhcp_host",
        description: "Update a DHCP host's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "host_id",
                SemanticType::String,
                "DHCP host id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/dhcp/host",
            id_arg: "host_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "dhcp host",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_hardware",
        description: "List hardware entries (MAC-addressed equipment).",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match entries whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dhcp/hardware",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_hardware",
        description: "Create a hardware entry for a MAC address.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "mac_address",
                SemanticType::String,
                "MAC address, e.g. 00:1a:2b:3c:4d:5e",
            ))
            .field(FieldSpec::optional(
                "name",
                SemanticType::String,
                "Host name for the entry",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/dhcp/hardware",
            fields: &[
                BodyField {
                    arg: "mac_address",
                    target: "address",
                },
                BodyField {
                    arg: "name",
                    target: "name",
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
        name: "update_hardware",
        description: "Update a hardware entry's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "hardware_id",
                SemanticType::String,
                "Hardware entry id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/dhcp/hardware",
            id_arg: "hardware_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "hardware entry",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_hardware",
        description: "Delete a hardware entry.",
        schema: InputSchema::new().field(FieldSpec::required(
            "hardware_id",
            SemanticType::String,
            "Hardware entry id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/dhcp/hardware",
            id_arg: "hardware_id",
            label: "hardware entry",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_ha_groups",
        description: "List DHCP high-availability groups.",
        schema: InputSchema::new().field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dhcp/ha_group",
            filters: &[],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_ha_group",
        description: "Fetch one HA group by id.",
        schema: InputSchema::new().field(FieldSpec::required(
            "group_id",
            SemanticType::String,
            "HA group id",
        )),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(GetHandler {
            service: SERVICE,
            path: "/dhcp/ha_group",
            id_arg: "group_id",
            label: "ha group",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_option_codes",
        description: "List DHCP option codes.",
        schema: InputSchema::new().field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dhcp/option_code",
            filters: &[],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_option_code",
        description: "Create a custom DHCP option code.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "code",
                SemanticType::Integer,
                "Option code number",
            ))
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "Option name",
            ))
            .field(FieldSpec::required(
                "type",
                SemanticType::String,
                "Value type, e.g. string, ip-address, uint32",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/dhcp/option_code",
            fields: &[
                BodyField {
                    arg: "code",
                    target: "code",
                },
                BodyField {
                    arg: "name",
                    target: "name",
                },
                BodyField {
                    arg: "type",
                    target: "type",
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
        name: "update_option_code",
        description: "Update a custom option code's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "code_id",
                SemanticType::String,
                "Option code id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/dhcp/option_code",
            id_arg: "code_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "option code",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_option_code",
        description: "Delete a custom DHCP option code.",
        schema: InputSchema::new().field(FieldSpec::required(
            "code_id",
            SemanticType::String,
            "Option code id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/dhcp/option_code",
            id_arg: "code_id",
            label: "option code",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_hardware_filters",
        description: "List DHCP hardware filters.",
        schema: InputSchema::new().field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dhcp/hardware_filter",
            filters: &[],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_hardware_filter",
        description: "Create a MAC-based DHCP hardware filter.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "Filter name",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/dhcp/hardware_filter",
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
            literals: &[("protocol", "mac")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_hardware_filter",
        description: "Update a hardware filter's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "filter_id",
                SemanticType::String,
                "Hardware filter id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/dhcp/hardware_filter",
            id_arg: "filter_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "hardware filter",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_hardware_filter",
        description: "Delete a hardware filter (moves it to the recycle bin).",
        schema: InputSchema::new().field(FieldSpec::required(
            "filter_id",
            SemanticType::String,
            "Hardware filter id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/dhcp/hardware_filter",
            id_arg: "filter_id",
            label: "hardware filter",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_option_filters",
        description: "List DHCP option filters.",
        schema: InputSchema::new().field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dhcp/option_filter",
            filters: &[],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_option_filter",
        description: "Create a DHCP option filter.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "Filter name",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/dhcp/option_filter",
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
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "update_option_filter",
        description: "Update an option filter's description.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "filter_id",
                SemanticType::String,
                "Option filter id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(UpdateHandler {
            service: SERVICE,
            path: "/dhcp/option_filter",
            id_arg: "filter_id",
            fields: &[BodyField {
                arg: "comment",
                target: "comment",
            }],
            label: "option filter",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_option_filter",
        description: "Delete an option filter (moves it to the recycle bin).",
        schema: InputSchema::new().field(FieldSpec::required(
            "filter_id",
            SemanticType::String,
            "Option filter id",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            path: "/dhcp/option_filter",
            id_arg: "filter_id",
            label: "option filter",
        }),
    })?;

    Ok(())
}
