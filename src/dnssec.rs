/* src/dnssec.rs */

use crate::config::DnssecConfig;
use crate::error::{Result, ZoneGenError};
use fancy_log::{LogLevel, log};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    ZoneSigning,
    KeySigning,
}

impl KeyRole {
    /// DNSKEY flags field written by dnssec-keygen for this role.
    fn from_flags(flags: u16) -> Option<Self> {
        match flags {
            256 => Some(KeyRole::ZoneSigning),
            257 => Some(KeyRole::KeySigning),
            _ => None,
        }
    }
}

/// The external tools that create keys and sign zones.
pub trait SigningToolchain {
    /// Creates one key of `role` for `domain` in the bind config directory.
    fn generate_key(&self, domain: &str, role: KeyRole) -> impl Future<Output = Result<()>>;

    /// Signs `zone_file` (relative to the bind config directory), producing
    /// `<zone_file>.signed` next to it.
    fn sign_zone(&self, domain: &str, zone_file: &str, salt: &str)
    -> impl Future<Output = Result<()>>;
}

/// Runs BIND's dnssec-keygen and dnssec-signzone inside the bind config directory.
pub struct BindToolchain {
    root: PathBuf,
    config: DnssecConfig,
}

impl BindToolchain {
    pub fn new(root: PathBuf, config: DnssecConfig) -> Self {
        Self { root, config }
    }
}

impl SigningToolchain for BindToolchain {
    async fn generate_key(&self, domain: &str, role: KeyRole) -> Result<()> {
        let bits = self.config.key_bits.to_string();
        let mut args = vec!["-v", "0", "-a", self.config.algorithm.as_str(), "-b", bits.as_str()];
        if role == KeyRole::KeySigning {
            args.extend(["-f", "KSK"]);
        }
        args.extend(["-n", "ZONE", domain]);

        run_tool(&self.config.keygen_binary, &args, &self.root)
            .await
            .map_err(|reason| ZoneGenError::KeyGeneration {
                domain: domain.to_string(),
                reason,
            })
    }

    async fn sign_zone(&self, domain: &str, zone_file: &str, salt: &str) -> Result<()> {
        let iterations = self.config.nsec3_iterations.to_string();
        let args = [
            "-v",
            "0",
            "-3",
            salt,
            "-H",
            iterations.as_str(),
            "-t",
            "-o",
            domain,
            zone_file,
        ];

        run_tool(&self.config.signzone_binary, &args, &self.root)
            .await
            .map_err(|reason| ZoneGenError::Signing {
                domain: domain.to_string(),
                reason,
            })
    }
}

// Arguments go straight to the process, no shell is involved.
async fn run_tool(program: &str, args: &[&str], cwd: &Path) -> std::result::Result<(), String> {
    log(
        LogLevel::Debug,
        &format!("Running {} {} in {}", program, args.join(" "), cwd.display()),
    );
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| format!("failed to start {}: {}", program, e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

/// Key files of one zone, referenced from the zone via `$INCLUDE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub ksk: PathBuf,
    pub zsk: PathBuf,
}

impl KeyPair {
    pub fn include_directives(&self) -> String {
        format!(
            "$INCLUDE {}\n$INCLUDE {}\n",
            self.ksk.display(),
            self.zsk.display()
        )
    }
}

/// Makes sure every signed zone has a key-signing and a zone-signing key.
pub struct DnssecKeyManager<'a, T> {
    root: &'a Path,
    toolchain: &'a T,
}

impl<'a, T: SigningToolchain> DnssecKeyManager<'a, T> {
    pub fn new(root: &'a Path, toolchain: &'a T) -> Self {
        Self { root, toolchain }
    }

    /// Returns the key pair of `domain`, generating whichever role is missing.
    pub async fn ensure_keys(&self, domain: &str) -> Result<KeyPair> {
        let mut keys = self.scan(domain).await?;

        let missing: Vec<KeyRole> = [KeyRole::ZoneSigning, KeyRole::KeySigning]
            .into_iter()
            .filter(|role| find_role(&keys, *role).is_none())
            .collect();

        if !missing.is_empty() {
            for role in missing {
                log(
                    LogLevel::Info,
                    &format!("Generating {:?} key for {}", role, domain),
                );
                self.toolchain.generate_key(domain, role).await?;
            }
            keys = self.scan(domain).await?;
        }

        let role_path = |role: KeyRole| {
            find_role(&keys, role).ok_or_else(|| ZoneGenError::KeyGeneration {
                domain: domain.to_string(),
                reason: format!("no {:?} key found after generation", role),
            })
        };

        Ok(KeyPair {
            ksk: role_path(KeyRole::KeySigning)?,
            zsk: role_path(KeyRole::ZoneSigning)?,
        })
    }

    // `K<domain>.+<alg>+<tag>.key`, the `.+` keeps example.com from matching example.com.au.
    async fn scan(&self, domain: &str) -> Result<Vec<(PathBuf, Option<KeyRole>)>> {
        let prefix = format!("k{}.+", domain.to_lowercase());
        let mut entries = match tokio::fs::read_dir(self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ZoneGenError::KeyGeneration {
                    domain: domain.to_string(),
                    reason: format!("cannot list {}: {}", self.root.display(), e),
                });
            }
        };

        let mut keys = Vec::new();
        let read_err = |e: std::io::Error| ZoneGenError::KeyGeneration {
            domain: domain.to_string(),
            reason: e.to_string(),
        };
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !name.starts_with(&prefix) || !name.ends_with(".key") {
                continue;
            }
            let path = entry.path();
            let content = tokio::fs::read_to_string(&path).await.map_err(read_err)?;
            keys.push((path, parse_role(&content)));
        }
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keys)
    }
}

fn find_role(keys: &[(PathBuf, Option<KeyRole>)], role: KeyRole) -> Option<PathBuf> {
    keys.iter()
        .find(|(_, r)| *r == Some(role))
        .map(|(path, _)| path.clone())
}

/// Reads the role from the DNSKEY record in a `.key` file.
fn parse_role(content: &str) -> Option<KeyRole> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'))
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            tokens.find(|t| t.eq_ignore_ascii_case("DNSKEY"))?;
            tokens.next()?.parse().ok().and_then(KeyRole::from_flags)
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stands in for the BIND tools: writes key files and copies zones to `.signed`.
    pub(crate) struct FakeToolchain {
        root: PathBuf,
        pub(crate) keygen_calls: AtomicUsize,
        pub(crate) sign_calls: AtomicUsize,
        pub(crate) fail_keygen: bool,
        pub(crate) fail_sign: bool,
    }

    impl FakeToolchain {
        pub(crate) fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                keygen_calls: AtomicUsize::new(0),
                sign_calls: AtomicUsize::new(0),
                fail_keygen: false,
                fail_sign: false,
            }
        }

        pub(crate) fn keygens(&self) -> usize {
            self.keygen_calls.load(Ordering::SeqCst)
        }

        pub(crate) fn signs(&self) -> usize {
            self.sign_calls.load(Ordering::SeqCst)
        }
    }

    impl SigningToolchain for FakeToolchain {
        async fn generate_key(&self, domain: &str, role: KeyRole) -> Result<()> {
            let call = self.keygen_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_keygen {
                return Err(ZoneGenError::KeyGeneration {
                    domain: domain.to_string(),
                    reason: "dnssec-keygen exited with exit status: 1".to_string(),
                });
            }
            let flags = match role {
                KeyRole::ZoneSigning => 256,
                KeyRole::KeySigning => 257,
            };
            let stem = format!("K{}.+014+{:05}", domain, 10000 + call);
            std::fs::write(
                self.root.join(format!("{}.key", stem)),
                format!("; generated\n{}. IN DNSKEY {} 3 14 AAAA\n", domain, flags),
            )
            .unwrap();
            std::fs::write(self.root.join(format!("{}.private", stem)), "secret").unwrap();
            Ok(())
        }

        async fn sign_zone(&self, domain: &str, zone_file: &str, salt: &str) -> Result<()> {
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_sign {
                return Err(ZoneGenError::Signing {
                    domain: domain.to_string(),
                    reason: "dnssec-signzone exited with exit status: 1".to_string(),
                });
            }
            assert_eq!(salt.len(), 16);
            let unsigned = std::fs::read_to_string(self.root.join(zone_file)).unwrap();
            std::fs::write(
                self.root.join(format!("{}.signed", zone_file)),
                format!("; signed\n{}", unsigned),
            )
            .unwrap();
            Ok(())
        }
    }

    #[test]
    fn roles_come_from_dnskey_flags() {
        let ksk = "; This is a key-signing key, keyid 1.\nexample.com. IN DNSKEY 257 3 14 AAAA";
        let zsk = "example.com. 3600 IN DNSKEY 256 3 14 AAAA";
        assert_eq!(parse_role(ksk), Some(KeyRole::KeySigning));
        assert_eq!(parse_role(zsk), Some(KeyRole::ZoneSigning));
        assert_eq!(parse_role("; nothing here"), None);
    }

    #[tokio::test]
    async fn fresh_domain_generates_one_pair() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let toolchain = FakeToolchain::new(dir.path());
        let keys = DnssecKeyManager::new(dir.path(), &toolchain);

        let pair = keys.ensure_keys("example.com").await.unwrap();
        assert_eq!(toolchain.keygens(), 2);
        let ksk = std::fs::read_to_string(&pair.ksk).unwrap();
        let zsk = std::fs::read_to_string(&pair.zsk).unwrap();
        assert_eq!(parse_role(&ksk), Some(KeyRole::KeySigning));
        assert_eq!(parse_role(&zsk), Some(KeyRole::ZoneSigning));

        let again = keys.ensure_keys("example.com").await.unwrap();
        assert_eq!(toolchain.keygens(), 2);
        assert_eq!(again, pair);
    }

    #[tokio::test]
    async fn similar_names_do_not_share_keys() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let toolchain = FakeToolchain::new(dir.path());
        let keys = DnssecKeyManager::new(dir.path(), &toolchain);

        keys.ensure_keys("example.com.au").await.unwrap();
        let pair = keys.ensure_keys("example.com").await.unwrap();
        assert_eq!(toolchain.keygens(), 4);
        assert!(pair.ksk.to_string_lossy().contains("Kexample.com.+"));
    }

    #[tokio::test]
    async fn only_missing_role_is_generated() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        std::fs::write(
            dir.path().join("Kexample.com.+014+00001.key"),
            "example.com. IN DNSKEY 257 3 14 AAAA\n",
        )
        .unwrap();
        let toolchain = FakeToolchain::new(dir.path());
        let keys = DnssecKeyManager::new(dir.path(), &toolchain);

        let pair = keys.ensure_keys("example.com").await.unwrap();
        assert_eq!(toolchain.keygens(), 1);
        assert_eq!(pair.ksk, dir.path().join("Kexample.com.+014+00001.key"));
    }

    #[tokio::test]
    async fn keygen_failure_propagates() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let mut toolchain = FakeToolchain::new(dir.path());
        toolchain.fail_keygen = true;
        let keys = DnssecKeyManager::new(dir.path(), &toolchain);

        let err = keys.ensure_keys("example.com").await.unwrap_err();
        assert!(matches!(err, ZoneGenError::KeyGeneration { .. }));
    }

    #[test]
    fn include_directives_list_both_keys() {
        let pair = KeyPair {
            ksk: PathBuf::from("/etc/bind/Kexample.com.+014+00002.key"),
            zsk: PathBuf::from("/etc/bind/Kexample.com.+014+00001.key"),
        };
        assert_eq!(
            pair.include_directives(),
            "$INCLUDE /etc/bind/Kexample.com.+014+00002.key\n$INCLUDE /etc/bind/Kexample.com.+014+00001.key\n"
        );
    }

    #[tokio::test]
    async fn bind_toolchain_reports_missing_binary() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let config = DnssecConfig {
            keygen_binary: "lazy-bind-no-such-keygen".to_string(),
            ..DnssecConfig::default()
        };
        let toolchain = BindToolchain::new(dir.path().to_path_buf(), config);
        let err = toolchain
            .generate_key("example.com", KeyRole::KeySigning)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start lazy-bind-no-such-keygen"));
    }
}
