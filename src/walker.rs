/* src/walker.rs */

use crate::bind_config::{TransferPeers, stanza};
use crate::dnssec::{DnssecKeyManager, SigningToolchain};
use crate::domain::{DomainForest, DomainId};
use crate::error::{Result, ZoneGenError};
use crate::zone_content::{ZoneContentProvider, ZoneSubject};
use crate::zone_writer::ZoneFileWriter;
use fancy_log::{LogLevel, log};
use std::collections::HashSet;
use std::path::Path;

/// Outcome of resolving one domain: standalone zones yield a config stanza,
/// sub-to domains yield records for their ancestor's zone.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub stanza: Option<String>,
    pub inline: String,
}

/// Resolves the domain forest into written zone files, one per standalone
/// domain, with sub-to descendants folded in.
pub struct ZoneTreeWalker<'a, P, T> {
    root: &'a Path,
    forest: &'a DomainForest,
    provider: &'a P,
    peers: &'a TransferPeers,
    keys: DnssecKeyManager<'a, T>,
    writer: ZoneFileWriter<'a, T>,
}

impl<'a, P: ZoneContentProvider, T: SigningToolchain> ZoneTreeWalker<'a, P, T> {
    pub fn new(
        root: &'a Path,
        forest: &'a DomainForest,
        provider: &'a P,
        toolchain: &'a T,
        peers: &'a TransferPeers,
    ) -> Self {
        Self {
            root,
            forest,
            provider,
            peers,
            keys: DnssecKeyManager::new(root, toolchain),
            writer: ZoneFileWriter::new(root, toolchain),
        }
    }

    pub async fn resolve(&self, index: usize) -> Result<Resolution> {
        let mut visiting = HashSet::new();
        self.walk(index, &mut visiting).await
    }

    async fn walk(&self, index: usize, visiting: &mut HashSet<usize>) -> Result<Resolution> {
        let domain = self.forest.get(index);
        if !visiting.insert(index) {
            let id = match domain.id {
                DomainId::Stored(id) => id,
                DomainId::Synthetic => 0,
            };
            return Err(ZoneGenError::CyclicDomainGraph(id));
        }

        if domain.has_custom_zonefile() {
            if domain.is_sub_to() {
                log(
                    LogLevel::Warn,
                    &format!(
                        "Ignoring zonefile {} of {}, it is merged into domain {}",
                        domain.zonefile, domain.domain, domain.parent_sub_to
                    ),
                );
                return Ok(Resolution::default());
            }
            log(
                LogLevel::Info,
                &format!(
                    "Added zonefile {} for domain {} - Note that you will also have to handle ALL records for ALL subdomains.",
                    domain.zonefile, domain.domain
                ),
            );
            return Ok(Resolution {
                stanza: Some(stanza(domain, &self.root.join(&domain.zonefile), self.peers)),
                inline: String::new(),
            });
        }

        let mut subzones = String::new();
        for &child in self.forest.children(index) {
            let resolved = Box::pin(self.walk(child, visiting)).await?;
            subzones.push_str(&resolved.inline);
        }

        let subject = ZoneSubject::of(domain);

        if domain.is_sub_to() {
            if domain.dnssec {
                log(
                    LogLevel::Debug,
                    &format!(
                        "DNSSEC flag of {} ignored, signing happens at domain {}",
                        domain.domain, domain.parent_sub_to
                    ),
                );
            }
            let mut inline = self
                .provider
                .zone_content(subject, domain.system_hostname, true)?;
            inline.push_str(&subzones);
            return Ok(Resolution {
                stanza: None,
                inline,
            });
        }

        let mut content = self
            .provider
            .zone_content(subject, domain.system_hostname, false)?;
        if domain.dnssec {
            let keys = self.keys.ensure_keys(&domain.domain).await?;
            content.push_str(&keys.include_directives());
        }
        content.push_str(&subzones);

        let zonefile = self.writer.write(domain, &content).await?;
        Ok(Resolution {
            stanza: Some(stanza(domain, &self.root.join(zonefile), self.peers)),
            inline: String::new(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dnssec::tests::FakeToolchain;
    use crate::domain::Domain;
    use crate::domain::tests::domain;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Emits one comment line per domain so tests can follow where content lands.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) calls: AtomicUsize,
    }

    impl ZoneContentProvider for FakeProvider {
        fn zone_content(
            &self,
            subject: ZoneSubject<'_>,
            _system_hostname: bool,
            as_subzone: bool,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = match subject {
                ZoneSubject::Stored(id) => id.to_string(),
                ZoneSubject::Synthetic(domain) => domain.domain.clone(),
            };
            let kind = if as_subzone { "sub" } else { "zone" };
            Ok(format!("; {} records of {}\n", kind, name))
        }
    }

    async fn resolve_all(
        root: &Path,
        domains: Vec<Domain>,
        provider: &FakeProvider,
        toolchain: &FakeToolchain,
    ) -> Vec<Resolution> {
        let forest = DomainForest::build(domains).unwrap();
        let peers = TransferPeers::default();
        let walker = ZoneTreeWalker::new(root, &forest, provider, toolchain, &peers);
        let mut out = Vec::new();
        for &index in forest.roots() {
            out.push(walker.resolve(index).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn nested_sub_to_domains_fold_into_root_zone() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let provider = FakeProvider::default();
        let toolchain = FakeToolchain::new(dir.path());

        let resolved = resolve_all(
            dir.path(),
            vec![
                domain(1, "a.example", 0),
                domain(2, "b.a.example", 1),
                domain(3, "c.b.a.example", 2),
            ],
            &provider,
            &toolchain,
        )
        .await;

        assert_eq!(resolved.len(), 1);
        let stanza = resolved[0].stanza.as_ref().unwrap();
        assert!(stanza.contains("zone \"a.example\" in {"));
        assert!(resolved[0].inline.is_empty());

        let zones = dir.path().join("domains");
        assert_eq!(
            std::fs::read_to_string(zones.join("a.example.zone")).unwrap(),
            "; zone records of 1\n; sub records of 2\n; sub records of 3\n"
        );
        assert_eq!(std::fs::read_dir(&zones).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn siblings_keep_catalogue_order() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let provider = FakeProvider::default();
        let toolchain = FakeToolchain::new(dir.path());

        resolve_all(
            dir.path(),
            vec![
                domain(1, "a.example", 0),
                domain(5, "z.a.example", 1),
                domain(4, "y.a.example", 1),
                domain(6, "x.y.a.example", 4),
            ],
            &provider,
            &toolchain,
        )
        .await;

        assert_eq!(
            std::fs::read_to_string(dir.path().join("domains/a.example.zone")).unwrap(),
            "; zone records of 1\n; sub records of 5\n; sub records of 4\n; sub records of 6\n"
        );
    }

    #[tokio::test]
    async fn custom_zonefile_skips_generation() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let provider = FakeProvider::default();
        let toolchain = FakeToolchain::new(dir.path());
        let mut custom = domain(1, "custom.example", 0);
        custom.zonefile = "/var/named/custom.example.db".to_string();
        custom.dnssec = true;

        let resolved = resolve_all(
            dir.path(),
            vec![custom, domain(2, "sub.custom.example", 1)],
            &provider,
            &toolchain,
        )
        .await;

        let stanza = resolved[0].stanza.as_ref().unwrap();
        assert!(stanza.contains("\tfile \"/var/named/custom.example.db\";\n"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(toolchain.keygens(), 0);
        assert_eq!(toolchain.signs(), 0);
        assert!(!dir.path().join("domains").exists());
    }

    #[tokio::test]
    async fn dnssec_root_includes_keys_and_references_signed_file() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let provider = FakeProvider::default();
        let toolchain = FakeToolchain::new(dir.path());
        let mut signed = domain(1, "signed.example", 0);
        signed.dnssec = true;
        let mut sub = domain(2, "www.signed.example", 1);
        sub.dnssec = true;

        let resolved = resolve_all(dir.path(), vec![signed, sub], &provider, &toolchain).await;

        assert_eq!(toolchain.keygens(), 2);
        assert_eq!(toolchain.signs(), 1);

        let expected = dir.path().join("domains/signed.example.zone.signed");
        let stanza = resolved[0].stanza.as_ref().unwrap();
        assert!(stanza.contains(&format!("\tfile \"{}\";", expected.display())));

        let unsigned =
            std::fs::read_to_string(dir.path().join("domains/signed.example.zone")).unwrap();
        let lines: Vec<&str> = unsigned.lines().collect();
        assert_eq!(lines[0], "; zone records of 1");
        assert!(lines[1].starts_with("$INCLUDE ") && lines[1].contains("Ksigned.example.+"));
        assert!(lines[2].starts_with("$INCLUDE "));
        assert_eq!(lines[3], "; sub records of 2");
    }

    #[tokio::test]
    async fn synthetic_domain_is_rendered_by_value() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let provider = FakeProvider::default();
        let toolchain = FakeToolchain::new(dir.path());
        let mut panel = domain(0, "panel.example.net", 0);
        panel.id = DomainId::Synthetic;
        panel.system_hostname = true;

        let resolved = resolve_all(dir.path(), vec![panel], &provider, &toolchain).await;

        assert!(resolved[0].stanza.as_ref().unwrap().starts_with("# Domain ID: none - "));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("domains/panel.example.net.zone")).unwrap(),
            "; zone records of panel.example.net\n"
        );
    }
}
