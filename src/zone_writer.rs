/* src/zone_writer.rs */

use crate::dnssec::SigningToolchain;
use crate::domain::Domain;
use crate::error::{Result, ZoneGenError};
use fancy_log::{LogLevel, log};
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const ZONE_DIR: &str = "domains";

/// Writes zone files below `<root>/domains/` and signs them when asked to.
pub struct ZoneFileWriter<'a, T> {
    root: &'a Path,
    toolchain: &'a T,
}

impl<'a, T: SigningToolchain> ZoneFileWriter<'a, T> {
    pub fn new(root: &'a Path, toolchain: &'a T) -> Self {
        Self { root, toolchain }
    }

    /// Writes `content` for `domain` and returns the path, relative to the
    /// root, that the master config has to reference. For signed zones that
    /// is the `.signed` output, not the file written here.
    pub async fn write(&self, domain: &Domain, content: &str) -> Result<PathBuf> {
        self.ensure_zone_dir().await?;

        let relative = format!("{}/{}.zone", ZONE_DIR, domain.domain);
        let zonefile = self.root.join(&relative);
        fs::write(&zonefile, content)
            .await
            .map_err(|e| ZoneGenError::FileWrite {
                path: zonefile.clone(),
                source: e,
            })?;

        let referenced = if domain.dnssec {
            let salt = random_salt();
            log(
                LogLevel::Info,
                &format!("Signing {} with salt {}", domain.domain, salt),
            );
            self.toolchain
                .sign_zone(&domain.domain, &relative, &salt)
                .await?;
            format!("{}.signed", relative)
        } else {
            relative
        };

        log(
            LogLevel::Info,
            &format!("`{}` written", zonefile.display()),
        );
        Ok(PathBuf::from(referenced))
    }

    async fn ensure_zone_dir(&self) -> Result<()> {
        let dir = self.root.join(ZONE_DIR);
        if fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            return Ok(());
        }
        log(LogLevel::Info, &format!("mkdir {}", dir.display()));
        if let Err(e) = fs::create_dir_all(&dir).await {
            return Err(ZoneGenError::DirectoryCreation { path: dir, source: e });
        }
        Ok(())
    }
}

/// 8 random bytes as 16 hex digits, a fresh NSEC3 salt per signing.
fn random_salt() -> String {
    let bytes: [u8; 8] = rand::thread_rng().r#gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnssec::tests::FakeToolchain;
    use crate::domain::tests::domain;

    #[tokio::test]
    async fn creates_zone_dir_and_writes_verbatim() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let toolchain = FakeToolchain::new(dir.path());
        let writer = ZoneFileWriter::new(dir.path(), &toolchain);

        let path = writer
            .write(&domain(1, "example.com", 0), "; zone\n")
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("domains/example.com.zone"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("domains/example.com.zone")).unwrap(),
            "; zone\n"
        );
        assert_eq!(toolchain.signs(), 0);
    }

    #[tokio::test]
    async fn signed_zone_references_signed_output() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let toolchain = FakeToolchain::new(dir.path());
        let writer = ZoneFileWriter::new(dir.path(), &toolchain);
        let mut signed = domain(1, "example.com", 0);
        signed.dnssec = true;

        let path = writer.write(&signed, "; zone\n").await.unwrap();
        assert_eq!(path, PathBuf::from("domains/example.com.zone.signed"));
        assert_eq!(toolchain.signs(), 1);
        assert!(dir.path().join("domains/example.com.zone").exists());
        assert!(dir.path().join("domains/example.com.zone.signed").exists());
    }

    #[tokio::test]
    async fn signing_failure_propagates() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let mut toolchain = FakeToolchain::new(dir.path());
        toolchain.fail_sign = true;
        let writer = ZoneFileWriter::new(dir.path(), &toolchain);
        let mut signed = domain(1, "example.com", 0);
        signed.dnssec = true;

        let err = writer.write(&signed, "; zone\n").await.unwrap_err();
        assert!(matches!(err, ZoneGenError::Signing { .. }));
    }

    #[tokio::test]
    async fn unwritable_root_is_a_directory_error() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, "file").unwrap();
        let toolchain = FakeToolchain::new(&root);
        let writer = ZoneFileWriter::new(&root, &toolchain);

        let err = writer
            .write(&domain(1, "example.com", 0), "; zone\n")
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneGenError::DirectoryCreation { .. }));
    }

    #[test]
    fn salts_are_hex_and_fresh() {
        let a = random_salt();
        let b = random_salt();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
