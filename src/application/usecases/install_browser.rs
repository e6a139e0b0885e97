// Use case: install_browser.

use crate::application::context::AppContext;
use metrics::counter;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Installs the browser package unless the same build is already on the device.
pub struct InstallBrowserUseCase;

#[derive(Debug)]
pub enum InstallBrowserError {
    PackageMissing(PathBuf),
    Hash(String),
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { hash: String },
    Unchanged { hash: String },
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl InstallBrowserUseCase {
    /// Hex SHA-256 of the package file.
    pub async fn package_hash(package: &Path) -> Result<String, InstallBrowserError> {
        let path = package.to_path_buf();
        let hashed = tokio::task::spawn_blocking(move || sha256_file(&path))
            .await
            .map_err(|e| InstallBrowserError::Hash(e.to_string()))?;

        hashed.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => InstallBrowserError::PackageMissing(package.to_path_buf()),
            _ => InstallBrowserError::Hash(e.to_string()),
        })
    }

    /// Whether `hash` differs from the last recorded install.
    pub async fn needs_install(ctx: &AppContext, hash: &str) -> bool {
        ctx.status.lock().await.needs_install(hash)
    }

    /// Install `package` if its hash changed since the last install.
    #[instrument(skip(ctx))]
    pub async fn execute(
        ctx: &AppContext,
        package: &Path,
        hash: &str,
    ) -> Result<InstallOutcome, InstallBrowserError> {
        // Step 1: Skip the install when the device already has this build.
        if !Self::needs_install(ctx, hash).await {
            debug!("browser_package_unchanged");
            return Ok(InstallOutcome::Unchanged {
                hash: hash.to_string(),
            });
        }

        // Step 2: Push and install the package.
        ctx.device
            .install(package)
            .await
            .map_err(|e| InstallBrowserError::Device(e.to_string()))?;

        // Step 3: Remember the build; persisted at shutdown.
        ctx.status.lock().await.record_install(hash);
        counter!("browser_installs_total").increment(1);
        info!(package = %package.display(), hash, "browser_installed");

        Ok(InstallOutcome::Installed {
            hash: hash.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::test_support::test_context;

    #[tokio::test]
    async fn given_known_bytes_when_hashed_should_match_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("1.apk");
        std::fs::write(&package, b"abc").unwrap();

        let hash = InstallBrowserUseCase::package_hash(&package).await.unwrap();

        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn given_missing_package_when_hashed_should_report_missing() {
        let dir = tempfile::tempdir().unwrap();

        let err = InstallBrowserUseCase::package_hash(&dir.path().join("none.apk"))
            .await
            .unwrap_err();

        assert!(matches!(err, InstallBrowserError::PackageMissing(_)));
    }

    #[tokio::test]
    async fn given_same_hash_twice_when_installing_should_install_once() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _queue, device) = test_context(dir.path());
        let package = dir.path().join("1.apk");

        let first = InstallBrowserUseCase::execute(&ctx, &package, "aa").await.unwrap();
        let second = InstallBrowserUseCase::execute(&ctx, &package, "aa").await.unwrap();
        let third = InstallBrowserUseCase::execute(&ctx, &package, "bb").await.unwrap();

        assert!(matches!(first, InstallOutcome::Installed { .. }));
        assert!(matches!(second, InstallOutcome::Unchanged { .. }));
        assert!(matches!(third, InstallOutcome::Installed { .. }));
        assert_eq!(device.install_count(), 2);
        assert_eq!(ctx.status.lock().await.last_apk.as_deref(), Some("bb"));
    }

    #[tokio::test]
    async fn given_failed_install_when_installing_should_not_record_hash() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _queue, device) = test_context(dir.path());
        device.fail_on("pm install");

        let err = InstallBrowserUseCase::execute(&ctx, &dir.path().join("1.apk"), "aa")
            .await
            .unwrap_err();

        assert!(matches!(err, InstallBrowserError::Device(_)));
        assert!(ctx.status.lock().await.last_apk.is_none());
    }
}
