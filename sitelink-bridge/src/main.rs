use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use sitelink_bridge::{Bridge, BridgeArgs, GatewayConfig};
use sitelink_common::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse();

    let mut config = GatewayConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if args.check {
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", args.config))?;
        print_summary(&config);
        return Ok(());
    }

    init_tracing(&config.logging).context("Failed to initialize tracing")?;

    tracing::info!(
        config = ?args.config,
        station = %config.station.id,
        snmp_agents = config.snmp.len(),
        device = config.device.is_some(),
        "Starting sitelink-bridge"
    );

    let bridge = Bridge::from_config(&config).context("Failed to build bridge")?;
    bridge.start().await.context("Failed to start bridge")?;

    tracing::info!("Bridge running. Press Ctrl+C to stop.");

    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }

    tracing::info!("Shutting down...");
    bridge.stop().await.context("Failed to stop bridge")?;

    tracing::info!("Goodbye!");

    Ok(())
}

fn print_summary(config: &GatewayConfig) {
    println!("Configuration OK");
    println!("  station:  {} ({})", config.station.id, config.station.name());
    println!("  backend:  {}", config.cloud.base_url);
    match &config.device {
        Some(device) => println!(
            "  device:   {} via {}",
            device.name,
            device.connection.describe()
        ),
        None => println!("  device:   none"),
    }
    for snmp in &config.snmp {
        println!(
            "  snmp:     {} at {} ({})",
            snmp.name,
            snmp.target(),
            snmp.device_type.as_deref().unwrap_or("standard MIBs only")
        );
    }
    println!(
        "  loops:    metrics every {}s, commands every {}s",
        config.intervals.metrics_secs, config.intervals.commands_secs
    );
}
