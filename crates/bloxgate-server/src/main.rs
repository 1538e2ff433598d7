// crates/bloxgate-server/src/main.rs
// ============================================================================
// Module: Gateway Binary
// Description: Bootstrap, listener lifecycle, and graceful shutdown.
// Purpose: Wire every component and run the gateway.
// Dependencies: all bloxgate crates, tokio
// ============================================================================

//! ## Overview
//! Bootstrap is strictly ordered: configuration, logging, upstream client,
//! resilience pipeline, registry, then the two listeners. Every component
//! is constructed here and passed down explicitly; nothing reaches for
//! global state. On SIGINT/SIGTERM the listeners stop, in-flight calls are
//! cancelled, and the span exporter is flushed before exit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitCode;
use std::sync::Arc;

use bloxgate_admin::AdminState;
use bloxgate_config::GatewayConfig;
use bloxgate_mcp::McpServerState;
use bloxgate_mcp::SessionTable;
use bloxgate_observe::HealthEvaluator;
use bloxgate_observe::HttpSpanExporter;
use bloxgate_observe::MetricsCollector;
use bloxgate_observe::NoopSpanSink;
use bloxgate_observe::SpanSink;
use bloxgate_observe::init_logging;
use bloxgate_registry::RegistryDefaults;
use bloxgate_registry::ToolRegistry;
use bloxgate_resilience::BreakerConfig;
use bloxgate_resilience::CacheSettings;
use bloxgate_resilience::CallPipeline;
use bloxgate_resilience::CircuitBreakers;
use bloxgate_resilience::RetryPolicy;
use bloxgate_resilience::ToolCache;
use bloxgate_upstream::UpstreamClient;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal bootstrap failures.
#[derive(Debug, Error)]
enum BootstrapError {
    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(#[from] bloxgate_config::ConfigError),
    /// Logging was already initialized.
    #[error("logging error: {0}")]
    Logging(#[from] bloxgate_observe::LoggingError),
    /// The upstream client could not be constructed.
    #[error("upstream client error: {0}")]
    Upstream(#[from] bloxgate_upstream::UpstreamError),
    /// The tool catalog failed to assemble.
    #[error("registry error: {0}")]
    Registry(#[from] bloxgate_registry::RegistryError),
    /// A listener could not bind its address.
    #[error("bind error on {address}: {source}")]
    Bind {
        /// Address that failed to bind.
        address: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("bloxgate: failed to start runtime: {err}");
            return ExitCode::from(1);
        }
    };
    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("bloxgate: {err}");
            ExitCode::from(1)
        }
    }
}

/// Builds every component and serves until shutdown.
async fn run() -> Result<(), BootstrapError> {
    let config = GatewayConfig::from_env()?;
    init_logging(config.telemetry.log_format)?;
    tracing::info!(event = "gateway_starting", version = env!("CARGO_PKG_VERSION"));

    // Observability first: everything below reports into it.
    let metrics = Arc::new(MetricsCollector::new());
    let exporter = config
        .telemetry
        .trace_endpoint
        .as_ref()
        .map(|endpoint| HttpSpanExporter::start(endpoint.clone()));
    let spans: Arc<dyn SpanSink> = match &exporter {
        Some(exporter) => Arc::clone(exporter) as Arc<dyn SpanSink>,
        None => Arc::new(NoopSpanSink),
    };

    // Upstream client and the resilience pipeline around it.
    let client = Arc::new(UpstreamClient::new(
        &config.upstream.base_url,
        &config.upstream.api_key,
    )?);
    let breakers = Arc::new(CircuitBreakers::new(BreakerConfig {
        failure_threshold: config.resilience.breaker_failure_threshold,
        reset_timeout: config.resilience.breaker_reset_timeout,
    }));
    let cache = Arc::new(ToolCache::new(CacheSettings {
        enabled: config.cache.enabled,
        default_ttl: config.cache.default_ttl,
        max_entries_per_tool: config.cache.max_entries_per_tool,
    }));
    let pipeline = Arc::new(CallPipeline::new(
        client,
        Arc::clone(&breakers),
        cache,
        RetryPolicy::new(config.resilience.retry_max_attempts),
        config.resilience.request_timeout,
        Arc::clone(&metrics),
        Arc::clone(&spans),
    ));

    // The tool registry, assembled once.
    let registry = Arc::new(ToolRegistry::with_catalog(RegistryDefaults {
        default_cache_ttl: config.cache.default_ttl,
    })?);
    tracing::info!(event = "catalog_registered", tools = registry.len());

    // Transport and admin state.
    let sessions = Arc::new(SessionTable::new(
        config.session.idle_timeout,
        Arc::clone(&metrics),
    ));
    let mcp_state = Arc::new(McpServerState {
        registry,
        pipeline,
        sessions: Arc::clone(&sessions),
        metrics: Arc::clone(&metrics),
        spans,
        queue_depth: config.session.outbound_queue_depth,
    });
    let admin_state = Arc::new(AdminState {
        metrics: Arc::clone(&metrics),
        breakers,
        evaluator: HealthEvaluator::new(config.telemetry.cache_hit_rate_floor),
    });

    // Listeners.
    let rpc_listener = tokio::net::TcpListener::bind(config.server.rpc_bind)
        .await
        .map_err(|source| BootstrapError::Bind {
            address: config.server.rpc_bind.to_string(),
            source,
        })?;
    let admin_listener = tokio::net::TcpListener::bind(config.admin.admin_bind)
        .await
        .map_err(|source| BootstrapError::Bind {
            address: config.admin.admin_bind.to_string(),
            source,
        })?;
    tracing::info!(
        event = "gateway_listening",
        rpc = %config.server.rpc_bind,
        admin = %config.admin.admin_bind,
    );

    let shutdown = CancellationToken::new();
    let sweeper = bloxgate_mcp::spawn_idle_sweeper(Arc::clone(&mcp_state));

    let rpc_shutdown = shutdown.clone();
    let rpc_task = tokio::spawn(async move {
        axum::serve(rpc_listener, bloxgate_mcp::router(mcp_state))
            .with_graceful_shutdown(async move { rpc_shutdown.cancelled().await })
            .await
    });
    let admin_shutdown = shutdown.clone();
    let admin_task = tokio::spawn(async move {
        axum::serve(admin_listener, bloxgate_admin::router(admin_state))
            .with_graceful_shutdown(async move { admin_shutdown.cancelled().await })
            .await
    });

    wait_for_signal().await;
    tracing::info!(event = "gateway_stopping");

    // Stop accepting new work, then cancel in-flight calls with a grace
    // period.
    shutdown.cancel();
    sessions.close_all();
    let _ = tokio::time::timeout(config.session.shutdown_grace, async {
        let _ = rpc_task.await;
        let _ = admin_task.await;
    })
    .await;
    sweeper.abort();

    if let Some(exporter) = exporter {
        exporter.shutdown().await;
    }
    tracing::info!(event = "gateway_stopped");
    Ok(())
}

/// Waits for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
