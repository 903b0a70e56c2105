/* src/main.rs */

mod bind_config;
mod cleaner;
mod config;
mod dnssec;
mod domain;
mod error;
mod generator;
mod records;
mod reload;
mod walker;
mod zone_content;
mod zone_writer;

use crate::config::AppConfig;
use crate::dnssec::BindToolchain;
use crate::generator::{OutputSettings, RunOutcome, ZoneGenerator};
use crate::reload::CommandReloader;
use crate::zone_content::CatalogueZoneProvider;
use dotenvy::dotenv;
use fancy_log::{LogLevel, log, set_log_level};
use lazy_motd::lazy_motd;
use std::env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --- Initialization ---
    dotenv().ok();
    let level = env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();
    let log_level = match level.as_str() {
        "debug" => LogLevel::Debug,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    };
    set_log_level(log_level);
    lazy_motd!();

    if let Err(e) = run().await {
        log(LogLevel::Error, &format!("Zone generation failed: {}", e));
        return Err(e.into());
    }
    Ok(())
}

async fn run() -> error::Result<()> {
    // --- Load Config ---
    let config = AppConfig::load_or_create_default()?;
    let domains = domain::load_catalogue(&config.catalogue).await?;
    log(
        LogLevel::Info,
        &format!(
            "Loaded {} domains from {:?}",
            domains.len(),
            config.catalogue
        ),
    );

    // --- Wire Collaborators ---
    let settings = OutputSettings::from(&config);
    let nameservers = settings
        .peers
        .nameservers
        .iter()
        .map(|ns| ns.name.clone())
        .collect();
    let provider = CatalogueZoneProvider::new(
        &domains,
        config.default_ttl,
        nameservers,
        &config.system_ips,
    );
    let toolchain = BindToolchain::new(config.bindconf_directory.clone(), config.dnssec.clone());
    let reloader = CommandReloader::parse(&config.reload_command)?;
    let generator = ZoneGenerator::new(settings, provider, toolchain, reloader);

    // --- Generate ---
    match generator.run(domains).await? {
        RunOutcome::NoDomains => {}
        RunOutcome::Written { zones, removed } => log(
            LogLevel::Info,
            &format!(
                "{} zones published, {} stale zone files removed",
                zones, removed
            ),
        ),
    }

    Ok(())
}
