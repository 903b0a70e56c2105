/* src/domain.rs */

use crate::error::{Result, ZoneGenError};
use crate::records::ZoneRecords;
use fancy_log::{LogLevel, log};
use hickory_proto::rr::Name;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Identifier of a catalogue row. `Synthetic` is the `"none"` sentinel used
/// for records the panel fabricates, like its own hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "RawDomainId")]
pub enum DomainId {
    Stored(u64),
    Synthetic,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDomainId {
    Number(u64),
    Text(String),
}

impl TryFrom<RawDomainId> for DomainId {
    type Error = String;

    fn try_from(raw: RawDomainId) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawDomainId::Number(id) => Ok(DomainId::Stored(id)),
            RawDomainId::Text(text) if text == "none" => Ok(DomainId::Synthetic),
            RawDomainId::Text(text) => text
                .parse()
                .map(DomainId::Stored)
                .map_err(|_| format!("invalid domain id {:?}", text)),
        }
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainId::Stored(id) => write!(f, "{}", id),
            DomainId::Synthetic => f.write_str("none"),
        }
    }
}

/// One hosted domain as exported by the panel.
#[derive(Debug, Deserialize, Clone)]
pub struct Domain {
    pub id: DomainId,
    pub domain: String,
    #[serde(default)]
    pub customer_id: u64,
    #[serde(default)]
    pub login_name: String,
    /// 0 for a standalone zone, otherwise the id whose zone this domain is merged into.
    #[serde(default)]
    pub parent_sub_to: u64,
    /// Pre-existing zone file, relative to the bind config directory or absolute.
    #[serde(default)]
    pub zonefile: String,
    #[serde(default)]
    pub dnssec: bool,
    #[serde(default)]
    pub system_hostname: bool,
    #[serde(default)]
    pub records: ZoneRecords,
}

impl Domain {
    pub fn is_sub_to(&self) -> bool {
        self.parent_sub_to > 0
    }

    pub fn has_custom_zonefile(&self) -> bool {
        !self.zonefile.is_empty()
    }
}

/// Reads the catalogue snapshot, a JSON array in catalogue order.
pub async fn load_catalogue(path: &Path) -> Result<Vec<Domain>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ZoneGenError::Catalogue {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    serde_json::from_str(&raw).map_err(|e| ZoneGenError::Catalogue {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Checks that a name is a valid DNS name before it reaches paths or tool arguments.
pub fn validate_domain_name(name: &str) -> Result<()> {
    let invalid = |reason: String| ZoneGenError::InvalidDomainName {
        name: name.to_string(),
        reason,
    };
    let hostname_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if name.is_empty() || name.starts_with(['-', '.']) || !hostname_chars {
        return Err(invalid("not a hostname".to_string()));
    }
    Name::from_ascii(name)
        .map(|_| ())
        .map_err(|e| invalid(e.to_string()))
}

// Values that end up inside quoted strings or comments of the master config.
fn validate_config_text(domain: &Domain, field: &'static str, value: &str) -> Result<()> {
    match value.chars().find(|c| c.is_control() || matches!(c, '"' | '\\')) {
        Some(c) => Err(ZoneGenError::InvalidField {
            domain: domain.domain.clone(),
            field,
            reason: format!("contains forbidden character {:?}", c),
        }),
        None => Ok(()),
    }
}

/// Arena over the catalogue: records in catalogue order plus an id index and
/// a children index, both resolved once before traversal.
#[derive(Debug)]
pub struct DomainForest {
    domains: Vec<Domain>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl DomainForest {
    pub fn build(mut domains: Vec<Domain>) -> Result<Self> {
        let mut index: HashMap<u64, usize> = HashMap::new();
        for (i, domain) in domains.iter_mut().enumerate() {
            // `example.com.` and `example.com` name the same zone file and keys.
            let trimmed = domain.domain.trim_end_matches('.').len();
            domain.domain.truncate(trimmed);
            validate_domain_name(&domain.domain)?;
            validate_config_text(domain, "login_name", &domain.login_name)?;
            validate_config_text(domain, "zonefile", &domain.zonefile)?;

            if let DomainId::Stored(id) = domain.id {
                if index.insert(id, i).is_some() {
                    return Err(ZoneGenError::DuplicateDomainId(id));
                }
            }
        }

        let mut children = vec![Vec::new(); domains.len()];
        let mut roots = Vec::new();

        for (i, domain) in domains.iter().enumerate() {
            if !domain.is_sub_to() {
                roots.push(i);
                continue;
            }
            match index.get(&domain.parent_sub_to) {
                Some(&parent) => children[parent].push(i),
                None => log(
                    LogLevel::Warn,
                    &format!(
                        "Domain {} is sub-to unknown domain {}, skipping it",
                        domain.domain, domain.parent_sub_to
                    ),
                ),
            }
        }

        Self::check_acyclic(&domains, &index)?;

        Ok(Self {
            domains,
            children,
            roots,
        })
    }

    // Follows each parent chain; a chain that revisits a domain never reaches a root.
    fn check_acyclic(domains: &[Domain], index: &HashMap<u64, usize>) -> Result<()> {
        for start in 0..domains.len() {
            let mut seen = HashSet::new();
            let mut current = start;
            while domains[current].is_sub_to() {
                if !seen.insert(current) {
                    let id = match domains[current].id {
                        DomainId::Stored(id) => id,
                        DomainId::Synthetic => 0,
                    };
                    return Err(ZoneGenError::CyclicDomainGraph(id));
                }
                match index.get(&domains[current].parent_sub_to) {
                    Some(&parent) => current = parent,
                    None => break,
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> &Domain {
        &self.domains[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    /// Standalone domains in catalogue order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }
}
