/* src/generator.rs */

use crate::bind_config::{BindConfig, TransferPeers};
use crate::cleaner;
use crate::config::AppConfig;
use crate::dnssec::SigningToolchain;
use crate::domain::{Domain, DomainForest};
use crate::error::{Result, ZoneGenError};
use crate::reload::DaemonReloader;
use crate::walker::ZoneTreeWalker;
use crate::zone_content::ZoneContentProvider;
use crate::zone_writer::ZONE_DIR;
use fancy_log::{LogLevel, log};
use std::path::PathBuf;
use tokio::fs;

/// Where a run writes and who may transfer the zones.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub root: PathBuf,
    pub config_file: String,
    pub peers: TransferPeers,
}

impl From<&AppConfig> for OutputSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            root: config.bindconf_directory.clone(),
            config_file: config.bindconf_file.clone(),
            peers: config.transfer_peers(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Catalogue was empty; nothing was touched and no reload was requested.
    NoDomains,
    Written { zones: usize, removed: usize },
}

/// One clean-slate regeneration: cleanup, zone files, master config, reload.
pub struct ZoneGenerator<P, T, R> {
    settings: OutputSettings,
    provider: P,
    toolchain: T,
    reloader: R,
}

impl<P, T, R> ZoneGenerator<P, T, R>
where
    P: ZoneContentProvider,
    T: SigningToolchain,
    R: DaemonReloader,
{
    pub fn new(settings: OutputSettings, provider: P, toolchain: T, reloader: R) -> Self {
        Self {
            settings,
            provider,
            toolchain,
            reloader,
        }
    }

    pub async fn run(&self, domains: Vec<Domain>) -> Result<RunOutcome> {
        let root = &self.settings.root;
        log(
            LogLevel::Info,
            &format!("Zone generation started - Rebuilding {}", self.settings.config_file),
        );

        if domains.is_empty() {
            log(
                LogLevel::Info,
                "No domains found for nameserver-config, skipping...",
            );
            return Ok(RunOutcome::NoDomains);
        }

        let forest = DomainForest::build(domains)?;
        let removed = cleaner::clean_all(&root.join(ZONE_DIR)).await;

        if !fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
            log(LogLevel::Info, &format!("mkdir {}", root.display()));
            fs::create_dir_all(root)
                .await
                .map_err(|e| ZoneGenError::DirectoryCreation {
                    path: root.clone(),
                    source: e,
                })?;
        }

        let config_path = root.join(&self.settings.config_file);
        let created = chrono::Local::now().format("%d.%m.%Y %H:%M").to_string();
        let mut config = BindConfig::new(&config_path, &created);

        let walker = ZoneTreeWalker::new(
            root,
            &forest,
            &self.provider,
            &self.toolchain,
            &self.settings.peers,
        );
        for &index in forest.roots() {
            if let Some(stanza) = walker.resolve(index).await?.stanza {
                config = config.push(stanza);
            }
        }

        let zones = config.zones();
        fs::write(&config_path, config.into_text())
            .await
            .map_err(|e| ZoneGenError::FileWrite {
                path: config_path.clone(),
                source: e,
            })?;
        log(
            LogLevel::Info,
            &format!("{} written", self.settings.config_file),
        );

        self.reloader.reload().await?;
        log(
            LogLevel::Info,
            &format!("Zone generation finished - {} zones", zones),
        );

        Ok(RunOutcome::Written { zones, removed })
    }
}
