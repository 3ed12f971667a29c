//! doccache: main entry point.
//!
//! Loads configuration, wires the runtime with inert collaborator
//! stand-ins (spec §1 Non-goals: the vector index, the LLM client, and the
//! HTTP/MCP transport are all external collaborators), and exposes the
//! resulting `CacheRuntime` for an embedding process to drive.

use std::path::PathBuf;
use std::sync::Arc;

use doccache_core::ai::NullLlmClient;
use doccache_core::orchestrator::NullEnrichmentJobRunner;
use doccache_core::queue::AdmissionQueue;
use doccache_core::workspace::NullVectorIndex;
use doccache_core::{init_logging, CacheConfig, CacheError, CacheRuntime};

#[tokio::main]
async fn main() -> Result<(), CacheError> {
    init_logging();

    tracing::info!("doccache v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("DOCCACHE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = CacheConfig::load(&config_path)?;
    tracing::info!("configuration loaded from: {}", config_path.display());

    let runtime = CacheRuntime::new(
        config,
        NullVectorIndex,
        NullLlmClient,
        Arc::new(NullEnrichmentJobRunner),
    )
    .await?;

    tracing::info!(
        "runtime initialized; admission queue depth={}",
        runtime.queue.depth().await
    );
    tracing::warn!(
        "no vector index or LLM backend configured; running with inert stand-ins until wired up"
    );

    // Transport (HTTP/WebSocket/MCP framing) is an external collaborator
    // (spec §1); this binary keeps the runtime alive for an embedding
    // process to drive through `CacheRuntime::search`.
    std::future::pending::<()>().await;
    Ok(())
}
