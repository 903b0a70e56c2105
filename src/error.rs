/* src/error.rs */

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can make a generation run fail.
#[derive(Debug, Error)]
pub enum ZoneGenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load domain catalogue {path:?}: {reason}")]
    Catalogue { path: PathBuf, reason: String },

    #[error("Invalid domain name {name:?}: {reason}")]
    InvalidDomainName { name: String, reason: String },

    #[error("Invalid {field} of domain {domain}: {reason}")]
    InvalidField { domain: String, field: &'static str, reason: String },

    #[error("Domain id {0} appears more than once in the catalogue")]
    DuplicateDomainId(u64),

    #[error("Domain {0} is not in the catalogue")]
    UnknownDomain(u64),

    #[error("Domain {0} is part of a sub-to cycle")]
    CyclicDomainGraph(u64),

    #[error("Failed to create directory {path:?}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("DNSSEC key generation failed for {domain}: {reason}")]
    KeyGeneration { domain: String, reason: String },

    #[error("Zone signing failed for {domain}: {reason}")]
    Signing { domain: String, reason: String },

    #[error("Daemon reload failed: {0}")]
    Reload(String),
}

pub type Result<T> = std::result::Result<T, ZoneGenError>;
