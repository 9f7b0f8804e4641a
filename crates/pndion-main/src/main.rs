// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PNDion.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! PNDion - entry point.
//!
//! One invocation performs one full export run: the host automation
//! platform triggers the binary (e.g. from an automation or a
//! shell_command) and reads the results back from the published
//! `pnd_*` entity states.

use anyhow::Result;
use clap::Parser;
use pndion_ha::{HomeAssistantClient, StatePublisher};
use pndion_portal::{RunContext, run_once};
use pndion_types::load_config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pndion")]
#[command(version)]
#[command(about = "Fetch PND portal exports and publish them to Home Assistant", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "/data/pndion.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    info!("🚀 Starting PNDion {}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration summary:");
    info!("   Portal user: {}", config.portal.username);
    info!("   Device selector: {}", config.portal.device_selector);
    info!("   Data interval: {}", config.portal.data_interval);
    info!("   Working directory: {}", config.working_dir().display());
    if !config.runtime.instance_id.is_empty() {
        info!("   Instance id: {}", config.runtime.instance_id);
    }
    info!(
        "   Download failure policy: {:?}",
        config.runtime.download_failure_policy
    );

    let ha_client = if std::env::var("SUPERVISOR_TOKEN").is_ok() {
        info!("🏠 Initializing HA client using Supervisor API...");
        HomeAssistantClient::from_supervisor()?
    } else {
        info!("🏠 Initializing HA client from configuration...");
        HomeAssistantClient::from_config(
            config.home_assistant.base_url.clone(),
            config.home_assistant.token.clone(),
        )?
    };

    let publisher = StatePublisher::new(Arc::new(ha_client), config.suffix());
    let ctx = RunContext::new(config, publisher);

    if let Err(e) = run_once(&ctx).await {
        error!("Run failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
