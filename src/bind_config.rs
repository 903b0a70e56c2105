/* src/bind_config.rs */

use crate::domain::Domain;
use fancy_log::{LogLevel, log};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Nameserver {
    pub name: String,
    pub ips: Vec<String>,
}

/// Hosts allowed to pull zones, in configured order.
#[derive(Debug, Clone, Default)]
pub struct TransferPeers {
    pub nameservers: Vec<Nameserver>,
    pub axfr: Vec<String>,
}

impl TransferPeers {
    pub fn is_empty(&self) -> bool {
        self.nameservers.is_empty() && self.axfr.is_empty()
    }

    fn addresses(&self) -> impl Iterator<Item = &str> {
        self.nameservers
            .iter()
            .flat_map(|ns| ns.ips.iter())
            .chain(self.axfr.iter())
            .map(String::as_str)
    }
}

/// Renders the `zone` clause for one published zone.
pub fn stanza(domain: &Domain, zone_path: &Path, peers: &TransferPeers) -> String {
    log(
        LogLevel::Debug,
        &format!("Generating dns config for {}", domain.domain),
    );

    let mut text = format!(
        "# Domain ID: {} - CustomerID: {} - CustomerLogin: {}\n",
        domain.id, domain.customer_id, domain.login_name
    );
    text.push_str(&format!("zone \"{}\" in {{\n", domain.domain));
    text.push_str("\ttype master;\n");
    text.push_str(&format!("\tfile \"{}\";\n", zone_path.display()));
    text.push_str("\tallow-query { any; };\n");

    if !peers.is_empty() {
        text.push_str("\tallow-transfer {\n");
        for address in peers.addresses() {
            text.push_str(&format!("\t\t{};\n", address));
        }
        text.push_str("\t};\n");
    }

    text.push_str("};\n\n");
    text
}

/// The master config text of one run, built up stanza by stanza.
#[derive(Debug)]
pub struct BindConfig {
    text: String,
    zones: usize,
}

impl BindConfig {
    pub fn new(config_path: &Path, created: &str) -> Self {
        let text = format!(
            "# {}\n# Created {}\n# Do NOT manually edit this file, all changes will be deleted after the next domain change at the panel.\n\n",
            config_path.display(),
            created
        );
        Self { text, zones: 0 }
    }

    pub fn push(mut self, stanza: String) -> Self {
        self.text.push_str(&stanza);
        self.zones += 1;
        self
    }

    pub fn zones(&self) -> usize {
        self.zones
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
