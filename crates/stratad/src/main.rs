//! stratad — runs the demo protocol pipeline over strata packets and
//! prints a JSON summary.
//!
//!   stratad [PACKETS]
//!
//! Everything else comes from the config file (see `config.rs`).

use std::sync::Arc;

use anyhow::{Context, Result};

use strata_core::PacketContext;

mod config;
mod pipeline;
mod proto;

use config::StrataConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = StrataConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = StrataConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        StrataConfig::default()
    });

    let mut pipeline_config = config.pipeline.clone();
    if let Some(arg) = std::env::args().nth(1) {
        pipeline_config.packets = arg
            .parse()
            .with_context(|| format!("invalid packet count: {arg}"))?;
    }

    let registry = proto::registry().context("failed to build serializer registry")?;
    let ctx = Arc::new(PacketContext::new(registry, config.chunks.clone()));
    tracing::info!(
        packets = pipeline_config.packets,
        receivers = pipeline_config.receivers,
        implicit_serialization = config.chunks.implicit_serialization,
        "stratad starting"
    );

    let summary = pipeline::run(ctx, &pipeline_config).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
