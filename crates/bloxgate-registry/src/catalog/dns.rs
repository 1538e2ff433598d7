// crates/bloxgate-registry/src/catalog/dns.rs
// ============================================================================
// Module: DNS Tools
// Description: DNS record, zone, and view tools.
// Purpose: Expose BloxOne DDI DNS data and configuration to RPC clients.
// Dependencies: bloxgate-upstream, serde_json
// ============================================================================

//! ## Overview
//! Record creation is one shape repeated per record type: common fields
//! plus type-specific rdata members and a fixed `type` literal. The rdata
//! member names follow the upstream API exactly.

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
use crate::handlers::ListHandler;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

const SERVICE: ServiceKind = ServiceKind::InfobloxApi;

/// Common schema fields shared by every record-create tool.
fn record_schema_base() -> InputSchema {
    InputSchema::new()
        .field(FieldSpec::required(
            "name",
            SemanticType::String,
            "Record name within the zone, e.g. www",
        ))
        .field(FieldSpec::required(
            "zone",
            SemanticType::String,
            "Zone id the record belongs to",
        ))
}

/// Common trailing fields shared by every record-create tool.
fn record_schema_tail(schema: InputSchema) -> InputSchema {
    schema
        .field(FieldSpec::optional(
            "ttl",
            SemanticType::Integer,
            "Time to live in seconds",
        ))
        .field(FieldSpec::optional(
            "view",
            SemanticType::String,
            "DNS view id",
        ))
        .field(comment_field())
}

#[allow(clippy::too_many_lines, reason = "One registration call per tool.")]
pub(crate) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolDescriptor {
        name: "list_dns_records",
        description: "List DNS records, optionally by zone or type.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "zone_filter",
                SemanticType::String,
                "Restrict to one zone id",
            ))
            .field(FieldSpec::optional(
                "type_filter",
                SemanticType::String,
                "Restrict to one record type, e.g. A",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dns/record",
            filters: &[
                FilterRule {
                    arg: "zone_filter",
                    field: "zone",
                    op: FilterOp::Eq,
                },
                FilterRule {
                    arg: "type_filter",
                    field: "type",
                    op: FilterOp::Eq,
                },
            ],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_a_record",
        description: "Create an A record pointing a name at an IPv4 address.",
        schema: record_schema_tail(record_schema_base().field(FieldSpec::required(
            "ip_address",
            SemanticType::IpAddress,
            "IPv4 address the record resolves to",
        ))),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "A")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_aaaa_record",
        description: "Create an AAAA record pointing a name at an IPv6 address.",
        schema: record_schema_tail(record_schema_base().field(FieldSpec::required(
            "ip_address",
            SemanticType::IpAddress,
            "IPv6 address the record resolves to",
        ))),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "AAAA")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_cname_record",
        description: "Create a CNAME record aliasing a name to a canonical name.",
        schema: record_schema_tail(record_schema_base().field(FieldSpec::required(
            "canonical_name",
            SemanticType::String,
            "Canonical name the alias points to",
        ))),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "canonical_name",
                    target: "rdata.cname",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "CNAME")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_mx_record",
        description: "Create an MX record routing mail for a name.",
        schema: record_schema_tail(
            record_schema_base()
                .field(FieldSpec::required(
                    "exchange",
                    SemanticType::String,
                    "Mail exchange host name",
                ))
                .field(FieldSpec::required(
                    "preference",
                    SemanticType::Integer,
                    "Preference; lower wins",
                )),
        ),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "exchange",
                    target: "rdata.exchange",
                },
                BodyField {
                    arg: "preference",
                    target: "rdata.preference",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "MX")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_txt_record",
        description: "Create a TXT record carrying free-form text.",
        schema: record_schema_tail(record_schema_base().field(FieldSpec::required(
            "text",
            SemanticType::String,
            "Text payload",
        ))),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "text",
                    target: "rdata.text",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "TXT")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_ptr_record",
        description: "Create a PTR record for reverse resolution.",
        schema: record_schema_tail(record_schema_base().field(FieldSpec::required(
            "dname",
            SemanticType::String,
            "Domain name the reverse entry points to",
        ))),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "dname",
                    target: "rdata.dname",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "PTR")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_srv_record",
        description: "Create an SRV record advertising a service endpoint.",
        schema: record_schema_tail(
            record_schema_base()
                .field(FieldSpec::required(
                    "priority",
                    SemanticType::Integer,
                    "Priority; lower wins",
                ))
                .field(FieldSpec::required(
                    "weight",
                    SemanticType::Integer,
                    "Load-balancing weight",
                ))
                .field(FieldSpec::required(
                    "port",
                    SemanticType::Integer,
                    "Service port",
                ))
                .field(FieldSpec::required(
                    "target",
                    SemanticType::String,
                    "Target host name",
                )),
        ),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "priority",
                    target: "rdata.priority",
                },
                BodyField {
                    arg: "weight",
                    target: "rdata.weight",
                },
                BodyField {
                    arg: "port",
                    target: "rdata.port",
                },
                BodyField {
                    arg: "target",
                    target: "rdata.target",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "SRV")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_ns_record",
        description: "Create an NS record delegating a name to a name server.",
        schema: record_schema_tail(record_schema_base().field(FieldSpec::required(
            "dname",
            SemanticType::String,
            "Name server host name",
        ))),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "dname",
                    target: "rdata.dname",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "NS")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_caa_record",
        description: "Create a CAA record authorizing certificate issuers.",
        schema: record_schema_tail(
            record_schema_base()
                .field(FieldSpec::with_default(
                    "flags",
                    SemanticType::Integer,
                    serde_json::json!(0),
                    "0 non-critical, 128 critical",
                ))
                .field(FieldSpec::required(
                    "tag",
                    SemanticType::Enum(&["issue", "issuewild", "iodef"]),
                    "CAA property tag",
                ))
                .field(FieldSpec::required(
                    "value",
                    SemanticType::String,
                    "CA domain or report URI",
                )),
        ),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "flags",
                    target: "rdata.flags",
                },
                BodyField {
                    arg: "tag",
                    target: "rdata.tag",
                },
                BodyField {
                    arg: "value",
                    target: "rdata.value",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "CAA")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_naptr_record",
        description: "Create a NAPTR record for ENUM/SIP name authority pointers.",
        schema: record_schema_tail(
            record_schema_base()
                .field(FieldSpec::required(
                    "order",
                    SemanticType::Integer,
                    "Order of processing, 0-65535",
                ))
                .field(FieldSpec::required(
                    "preference",
                    SemanticType::Integer,
                    "Preference among records with the same order",
                ))
                .field(FieldSpec::required(
                    "flags",
                    SemanticType::String,
                    "Flags, e.g. S, A, U, P",
                ))
                .field(FieldSpec::required(
                    "services",
                    SemanticType::String,
                    "Service parameters, e.g. E2U+sip",
                ))
                .field(FieldSpec::required(
                    "regexp",
                    SemanticType::String,
                    "Substitution expression",
                ))
                .field(FieldSpec::required(
                    "replacement",
                    SemanticType::String,
                    "Replacement pattern or domain",
                )),
        ),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
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
                    arg: "order",
                    target: "rdata.order",
                },
                BodyField {
                    arg: "preference",
                    target: "rdata.preference",
                },
                BodyField {
                    arg: "flags",
                    target: "rdata.flags",
                },
                BodyField {
                    arg: "services",
                    target: "rdata.services",
                },
                BodyField {
                    arg: "regexp",
                    target: "rdata.regexp",
                },
                BodyField {
                    arg: "replacement",
                    target: "rdata.replacement",
                },
                BodyField {
                    arg: "ttl",
                    target: "ttl",
                },
                BodyField {
                    arg: "view",
                    target: "view",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[("type", "NAPTR")],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "delete_dns_record",
        description: "Delete a DNS record (moves it to the recycle bin).",
        schema: InputSchema::new().field(FieldSpec::required(
            "record_id",
            SemanticType::String,
            "Full record id, e.g. dns/record/abc",
        )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(DeleteHandler {
            service: SERVICE,
            // Record ids are full service-relative paths.
            path: "",
            id_arg: "record_id",
            label: "dns record",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_auth_zones",
        description: "List authoritative DNS zones.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "fqdn_filter",
                SemanticType::String,
                "Match zones whose FQDN contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dns/auth_zone",
            filters: &[FilterRule {
                arg: "fqdn_filter",
                field: "fqdn",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_auth_zone",
        description: "Create an authoritative DNS zone.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "fqdn",
                SemanticType::String,
                "Fully qualified zone name, e.g. example.com",
            ))
            .field(FieldSpec::with_default(
                "primary_type",
                SemanticType::Enum(&["cloud", "external"]),
                serde_json::json!("cloud"),
                "Where the zone's primary is served",
            ))
            .field(FieldSpec::optional(
                "view",
                SemanticType::String,
                "DNS view id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/dns/auth_zone",
            fields: &[
                BodyField {
                    arg: "fqdn",
                    target: "fqdn",
                },
                BodyField {
                    arg: "primary_type",
                    target: "primary_type",
                },
                BodyField {
                    arg: "view",
                    target: "view",
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
        name: "create_forward_zone",
        description: "Create a forward DNS zone.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "fqdn",
                SemanticType::String,
                "Fully qualified zone name, e.g. example.com",
            ))
            .field(FieldSpec::with_default(
                "forward_only",
                SemanticType::Boolean,
                serde_json::json!(true),
                "Forward without recursion",
            ))
            .field(FieldSpec::optional(
                "view",
                SemanticType::String,
                "DNS view id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/dns/forward_zone",
            fields: &[
                BodyField {
                    arg: "fqdn",
                    target: "fqdn",
                },
                BodyField {
                    arg: "forward_only",
                    target: "forward_only",
                },
                BodyField {
                    arg: "view",
                    target: "view",
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
        name: "list_forward_zones",
        description: "List forward DNS zones.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "fqdn_filter",
                SemanticType::String,
                "Match zones whose FQDN contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dns/forward_zone",
            filters: &[FilterRule {
                arg: "fqdn_filter",
                field: "fqdn",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_dns_views",
        description: "List DNS views.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match views whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/dns/view",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    Ok(())
}
