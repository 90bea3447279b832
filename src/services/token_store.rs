use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::Mutex;

use crate::ports::storage::TokenStore;

/// Key/value storage kept in a small JSON file, the CLI stand-in for
/// extension-local storage.
pub struct FileTokenStore {
    path: PathBuf,
    // serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .wrap_err_with(|| format!("Failed to parse {}", self.path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(error) => {
                Err(error).wrap_err_with(|| format!("Failed to read {}", self.path.display()))
            }
        }
    }

    async fn write(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        tokio::fs::write(&self.path, contents)
            .await
            .wrap_err_with(|| format!("Failed to write {}", self.path.display()))?;
        self.restrict_permissions().await
    }

    /// The file holds a bearer token: owner read/write only.
    #[cfg(unix)]
    async fn restrict_permissions(&self) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
            .await
            .wrap_err_with(|| format!("Failed to restrict {}", self.path.display()))
    }

    #[cfg(not(unix))]
    async fn restrict_permissions(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.read().await?;
        values.insert(key.to_string(), value.to_string());
        self.write(&values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.read().await?;
        if values.remove(key).is_some() {
            self.write(&values).await?;
        }
        Ok(())
    }
}
