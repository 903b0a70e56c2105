/* src/zone_content.rs */

use crate::domain::{Domain, DomainId};
use crate::error::{Result, ZoneGenError};
use crate::records::{RecordSet, SOARecord};
use fancy_log::{LogLevel, log};
use hickory_proto::rr::{Name, RecordType};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// What the content provider is asked to render. Stored rows are looked up
/// by id, synthetic ones are handed over as they are.
#[derive(Debug, Clone, Copy)]
pub enum ZoneSubject<'a> {
    Stored(u64),
    Synthetic(&'a Domain),
}

impl<'a> ZoneSubject<'a> {
    pub fn of(domain: &'a Domain) -> Self {
        match domain.id {
            DomainId::Stored(id) => ZoneSubject::Stored(id),
            DomainId::Synthetic => ZoneSubject::Synthetic(domain),
        }
    }
}

/// Source of the serialized resource records of one domain.
pub trait ZoneContentProvider {
    /// Renders the records of `subject`. With `as_subzone` the output is meant
    /// to be appended to an ancestor's zone, so it carries no zone header,
    /// SOA or apex NS records.
    fn zone_content(
        &self,
        subject: ZoneSubject<'_>,
        system_hostname: bool,
        as_subzone: bool,
    ) -> Result<String>;
}

/// Renders zones from the record sets carried in the catalogue.
pub struct CatalogueZoneProvider {
    domains: HashMap<u64, Domain>,
    default_ttl: u32,
    nameservers: Vec<String>,
    system_ips: Vec<IpAddr>,
    serial: u32,
}

impl CatalogueZoneProvider {
    pub fn new(
        catalogue: &[Domain],
        default_ttl: u32,
        nameservers: Vec<String>,
        system_ips: &[String],
    ) -> Self {
        let domains = catalogue
            .iter()
            .filter_map(|d| match d.id {
                DomainId::Stored(id) => Some((id, d.clone())),
                DomainId::Synthetic => None,
            })
            .collect();

        let system_ips = system_ips
            .iter()
            .filter_map(|ip| match ip.parse::<IpAddr>() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    log(
                        LogLevel::Warn,
                        &format!("Ignoring invalid system IP {:?}", ip),
                    );
                    None
                }
            })
            .collect();

        Self {
            domains,
            default_ttl,
            nameservers,
            system_ips,
            serial: todays_serial(),
        }
    }

    /// Pins the SOA serial used when a domain does not carry its own.
    #[cfg(test)]
    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    fn render(&self, domain: &Domain, system_hostname: bool, as_subzone: bool) -> Result<String> {
        let origin = fqdn(&domain.domain).ok_or_else(|| ZoneGenError::InvalidDomainName {
            name: domain.domain.clone(),
            reason: "not a valid DNS name".to_string(),
        })?;
        let records = &domain.records;
        let ttl = records.ttl.unwrap_or(self.default_ttl);
        let mut lines = Vec::new();

        if !as_subzone {
            lines.push(format!("$TTL {}", ttl));
            lines.push(format!("$ORIGIN {}", origin));
            lines.push(self.soa_line(&origin, records.soa.as_ref(), ttl));

            let nameservers = if records.apex.ns.is_empty() {
                &self.nameservers
            } else {
                &records.apex.ns
            };
            for ns in nameservers {
                push_name(&mut lines, &origin, ttl, RecordType::NS, ns);
            }
        }

        let mut apex = records.apex.clone();
        apex.ns.clear();
        if system_hostname && !apex.has_addresses() {
            for ip in &self.system_ips {
                match ip {
                    IpAddr::V4(v4) => apex.a.push(v4.to_string()),
                    IpAddr::V6(v6) => apex.aaaa.push(v6.to_string()),
                }
            }
        }
        push_record_set(&mut lines, &origin, ttl, &apex);

        for (label, set) in &records.subdomains {
            match fqdn(&format!("{}.{}", label, domain.domain)) {
                Some(owner) => push_record_set(&mut lines, &owner, ttl, set),
                None => log(
                    LogLevel::Warn,
                    &format!("Skipping invalid label {:?} in {}", label, domain.domain),
                ),
            }
        }

        if lines.is_empty() {
            return Ok(String::new());
        }
        let mut content = lines.join("\n");
        content.push('\n');
        Ok(content)
    }

    fn soa_line(&self, origin: &str, soa: Option<&SOARecord>, ttl: u32) -> String {
        let default_mname = self
            .nameservers
            .first()
            .cloned()
            .unwrap_or_else(|| format!("ns1.{}", origin));
        let default_rname = format!("hostmaster.{}", origin);

        let (mname, rname) = match soa {
            Some(soa) => (soa.mname.as_str(), soa.rname.as_str()),
            None => (default_mname.as_str(), default_rname.as_str()),
        };
        let field = |pick: fn(&SOARecord) -> Option<u32>, fallback: u32| {
            soa.and_then(pick).unwrap_or(fallback)
        };

        format!(
            "{}\t{}\tIN\t{}\t{} {} ( {} {} {} {} {} )",
            origin,
            ttl,
            RecordType::SOA,
            fqdn(mname).unwrap_or_else(|| mname.to_string()),
            fqdn(rname).unwrap_or_else(|| rname.to_string()),
            field(|s| s.serial, self.serial),
            field(|s| s.refresh, 3600),
            field(|s| s.retry, 900),
            field(|s| s.expire, 1_209_600),
            field(|s| s.minimum, 3600),
        )
    }
}

impl ZoneContentProvider for CatalogueZoneProvider {
    fn zone_content(
        &self,
        subject: ZoneSubject<'_>,
        system_hostname: bool,
        as_subzone: bool,
    ) -> Result<String> {
        let domain = match subject {
            ZoneSubject::Stored(id) => self
                .domains
                .get(&id)
                .ok_or(ZoneGenError::UnknownDomain(id))?,
            ZoneSubject::Synthetic(domain) => domain,
        };
        self.render(domain, system_hostname, as_subzone)
    }
}

fn todays_serial() -> u32 {
    chrono::Local::now()
        .format("%Y%m%d01")
        .to_string()
        .parse()
        .unwrap_or(1)
}

/// Absolute form of `name`, with the trailing dot.
fn fqdn(name: &str) -> Option<String> {
    let mut name = Name::from_ascii(name).ok()?;
    name.set_fqdn(true);
    Some(name.to_ascii())
}

fn record_line(owner: &str, ttl: u32, rtype: RecordType, rdata: &str) -> String {
    format!("{}\t{}\tIN\t{}\t{}", owner, ttl, rtype, rdata)
}

fn push_name(lines: &mut Vec<String>, owner: &str, ttl: u32, rtype: RecordType, target: &str) {
    match fqdn(target) {
        Some(target) => lines.push(record_line(owner, ttl, rtype, &target)),
        None => log(
            LogLevel::Warn,
            &format!("Skipping {} record {} -> {:?}: invalid name", rtype, owner, target),
        ),
    }
}

fn push_record_set(lines: &mut Vec<String>, owner: &str, ttl: u32, set: &RecordSet) {
    for value in &set.a {
        match value.parse::<Ipv4Addr>() {
            Ok(ip) => lines.push(record_line(owner, ttl, RecordType::A, &ip.to_string())),
            Err(_) => log(
                LogLevel::Warn,
                &format!("Skipping A record {} -> {:?}: invalid address", owner, value),
            ),
        }
    }
    for value in &set.aaaa {
        match value.parse::<Ipv6Addr>() {
            Ok(ip) => lines.push(record_line(owner, ttl, RecordType::AAAA, &ip.to_string())),
            Err(_) => log(
                LogLevel::Warn,
                &format!("Skipping AAAA record {} -> {:?}: invalid address", owner, value),
            ),
        }
    }
    for target in &set.cname {
        push_name(lines, owner, ttl, RecordType::CNAME, target);
    }
    for mx in &set.mx {
        match fqdn(&mx.exchange) {
            Some(exchange) => lines.push(record_line(
                owner,
                ttl,
                RecordType::MX,
                &format!("{} {}", mx.preference, exchange),
            )),
            None => log(
                LogLevel::Warn,
                &format!("Skipping MX record {} -> {:?}: invalid name", owner, mx.exchange),
            ),
        }
    }
    for text in &set.txt {
        lines.push(record_line(owner, ttl, RecordType::TXT, &quote_txt(text)));
    }
    for ns in &set.ns {
        push_name(lines, owner, ttl, RecordType::NS, ns);
    }
}

// Character-strings are capped at 255 octets, longer values become several.
// Anything outside printable ASCII is written as `\DDD`.
fn quote_txt(text: &str) -> String {
    let escaped: Vec<String> = text
        .bytes()
        .map(|b| match b {
            b'"' | b'\\' => format!("\\{}", b as char),
            0x20..=0x7e => (b as char).to_string(),
            _ => format!("\\{:03}", b),
        })
        .collect();

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut octets = 0;
    for piece in escaped {
        if octets == 255 {
            chunks.push(format!("\"{}\"", current));
            current.clear();
            octets = 0;
        }
        current.push_str(&piece);
        octets += 1;
    }
    chunks.push(format!("\"{}\"", current));
    chunks.join(" ")
}
