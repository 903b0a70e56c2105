/* src/config.rs */

use crate::bind_config::{Nameserver, TransferPeers};
use crate::error::{Result, ZoneGenError};
use fancy_log::{LogLevel, log};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_CONFIG_TEMPLATE: &str = r#"
# Directory BIND reads its config from. Zone files go into `domains/` below it,
# DNSSEC keys are kept at its root.
bindconf_directory = "/etc/bind/"

# Name of the generated master config inside bindconf_directory.
# Include it from named.conf.local.
bindconf_file = "lazy_bind.conf"

# Snapshot of the hosted domains, exported by the panel.
catalogue = "/var/lib/lazy-bind/domains.json"

# Issued once after a successful run.
reload_command = "rndc reload"

# TTL in seconds for zones that do not set their own.
default_ttl = 3600

# Addresses of this host, published in the system hostname zone.
system_ips = ["192.0.2.10"]

# Extra hosts allowed to pull zones via AXFR.
axfr_servers = []

[[nameservers]]
name = "ns1.example.net"
ips = ["192.0.2.53"]

[dnssec]
algorithm = "ECDSAP384SHA384"
key_bits = 4096
nsec3_iterations = 150
keygen_binary = "dnssec-keygen"
signzone_binary = "dnssec-signzone"
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bindconf_directory: PathBuf,
    #[serde(default = "default_bindconf_file")]
    pub bindconf_file: String,
    pub catalogue: PathBuf,
    #[serde(default = "default_reload_command")]
    pub reload_command: String,
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,
    #[serde(default)]
    pub system_ips: Vec<String>,
    #[serde(default)]
    pub axfr_servers: Vec<String>,
    #[serde(default)]
    pub nameservers: Vec<NameserverConfig>,
    #[serde(default)]
    pub dnssec: DnssecConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NameserverConfig {
    pub name: String,
    #[serde(default)]
    pub ips: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DnssecConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,
    #[serde(default = "default_nsec3_iterations")]
    pub nsec3_iterations: u32,
    #[serde(default = "default_keygen_binary")]
    pub keygen_binary: String,
    #[serde(default = "default_signzone_binary")]
    pub signzone_binary: String,
}

impl Default for DnssecConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            key_bits: default_key_bits(),
            nsec3_iterations: default_nsec3_iterations(),
            keygen_binary: default_keygen_binary(),
            signzone_binary: default_signzone_binary(),
        }
    }
}

fn default_bindconf_file() -> String {
    "lazy_bind.conf".to_string()
}

fn default_reload_command() -> String {
    "rndc reload".to_string()
}

fn default_ttl() -> u32 {
    3600
}

fn default_algorithm() -> String {
    "ECDSAP384SHA384".to_string()
}

fn default_key_bits() -> u32 {
    4096
}

fn default_nsec3_iterations() -> u32 {
    150
}

fn default_keygen_binary() -> String {
    "dnssec-keygen".to_string()
}

fn default_signzone_binary() -> String {
    "dnssec-signzone".to_string()
}

impl AppConfig {
    /// Loads config from `CONFIG_PATH` or defaults to `~/lazy-bind/config.toml`.
    pub fn load_or_create_default() -> Result<Self> {
        let config_path = match env::var("CONFIG_PATH").ok().filter(|s| !s.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir()
                .ok_or_else(|| ZoneGenError::Config("Could not find home directory".to_string()))?
                .join("lazy-bind")
                .join("config.toml"),
        };

        if !config_path.exists() {
            log(
                LogLevel::Warn,
                &format!(
                    "Config file not found. Creating default at {:?}",
                    config_path
                ),
            );
            let created = config_path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE));
            if let Err(e) = created {
                return Err(ZoneGenError::FileWrite {
                    path: config_path,
                    source: e,
                });
            }
        }

        log(
            LogLevel::Info,
            &format!("Loading config from {:?}", config_path),
        );
        let config_str = fs::read_to_string(&config_path)
            .map_err(|e| ZoneGenError::Config(format!("{:?}: {}", config_path, e)))?;
        Self::parse(&config_str)
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(config_str).map_err(|e| ZoneGenError::Config(e.to_string()))?;

        if config.bindconf_file.is_empty() || config.bindconf_file.contains('/') {
            return Err(ZoneGenError::Config(format!(
                "bindconf_file must be a plain file name, got {:?}",
                config.bindconf_file
            )));
        }

        if config.nameservers.is_empty() && config.axfr_servers.is_empty() {
            log(
                LogLevel::Warn,
                "No nameservers or AXFR servers configured, zones will not allow transfers.",
            );
        }

        Ok(config)
    }

    pub fn transfer_peers(&self) -> TransferPeers {
        TransferPeers {
            nameservers: self
                .nameservers
                .iter()
                .map(|ns| Nameserver {
                    name: ns.name.clone(),
                    ips: ns.ips.clone(),
                })
                .collect(),
            axfr: self.axfr_servers.clone(),
        }
    }
}
