/* src/records.rs */

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, Clone)]
pub struct SOARecord {
    pub mname: String,
    pub rname: String,
    pub serial: Option<u32>,
    pub refresh: Option<u32>,
    pub retry: Option<u32>,
    pub expire: Option<u32>,
    pub minimum: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MXRecord {
    pub preference: u16,
    pub exchange: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RecordSet {
    #[serde(default)]
    pub a: Vec<String>,
    #[serde(default)]
    pub aaaa: Vec<String>,
    #[serde(default)]
    pub cname: Vec<String>,
    #[serde(default)]
    pub mx: Vec<MXRecord>,
    #[serde(default)]
    pub txt: Vec<String>,
    #[serde(default)]
    pub ns: Vec<String>,
}

impl RecordSet {
    pub fn has_addresses(&self) -> bool {
        !self.a.is_empty() || !self.aaaa.is_empty()
    }
}

/// Zone data of one catalogue domain.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ZoneRecords {
    pub ttl: Option<u32>,
    pub soa: Option<SOARecord>,
    #[serde(default)]
    pub apex: RecordSet,
    // Keyed by relative label, ordered so output is stable between runs.
    #[serde(default)]
    pub subdomains: BTreeMap<String, RecordSet>,
}
