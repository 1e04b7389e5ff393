//! YAML-file backed server registry.
//!
//! ```yaml
//! servers:
//!   - username: alice
//!     password: "$argon2id$v=19$m=19456,t=2,p=1$..."
//!     id: 1
//!     name: alpha
//!     type: kvm
//!     location: Tokyo
//!     region: jp
//!   - username: bob
//!     password: "$argon2id$..."
//!     disabled: true
//!     id: 2
//!     name: beta
//! ```
//!
//! The file is read again on every call, so edits show up on the next
//! reconciliation without a restart.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use nodestatus_realtime::{RegistryClient, RegistryError};
use nodestatus_types::{NodeDirectory, NodeRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    servers: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    username: String,
    /// Argon2 PHC string.
    password: String,
    #[serde(default)]
    disabled: bool,
    id: i64,
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    region: String,
}

impl Account {
    fn record(&self) -> NodeRecord {
        NodeRecord::new(self.id, self.name.clone())
            .with_kind(self.kind.clone())
            .with_location(self.location.clone())
            .with_region(self.region.clone())
    }
}

/// Registry reading node accounts from a YAML file.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    /// Creates a registry over `path`. The file is not read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, Account>, RegistryError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RegistryError::Unavailable(format!("{}: {e}", self.path.display()))
        })?;
        let file: RegistryFile = if raw.trim().is_empty() {
            RegistryFile::default()
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|e| RegistryError::Invalid(format!("{}: {e}", self.path.display())))?
        };

        let mut accounts = BTreeMap::new();
        for account in file.servers {
            let username = account.username.trim().to_string();
            if username.is_empty() {
                return Err(RegistryError::Invalid("blank username".into()));
            }
            if accounts.contains_key(&username) {
                return Err(RegistryError::Invalid(format!(
                    "duplicate username {username}"
                )));
            }
            accounts.insert(username, account);
        }
        Ok(accounts)
    }
}

#[async_trait]
impl RegistryClient for FileRegistry {
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, RegistryError> {
        let accounts = self.load().await?;
        let Some(account) = accounts.get(username) else {
            debug!(username = %username, "Unknown username");
            return Ok(false);
        };
        if account.disabled {
            debug!(username = %username, "Account disabled");
            return Ok(false);
        }

        let hash = account.password.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| RegistryError::Unavailable(format!("password check aborted: {e}")))?
    }

    async fn list_enabled_servers(&self) -> Result<NodeDirectory, RegistryError> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|(_, account)| !account.disabled)
            .map(|(username, account)| {
                let record = account.record();
                (username, record)
            })
            .collect())
    }
}

/// Hashes a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, RegistryError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RegistryError::Invalid(e.to_string()))
}

/// Checks `password` against a PHC string. A malformed hash is an error, a
/// mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, RegistryError> {
    let parsed = PasswordHash::new(hash).map_err(|e| RegistryError::Invalid(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_registry(dir: &Path, body: &str) -> FileRegistry {
        let path = dir.join("servers.yaml");
        std::fs::write(&path, body).unwrap();
        FileRegistry::new(path)
    }

    fn sample(alice: &str, bob: &str) -> String {
        format!(
            r#"
servers:
  - username: alice
    password: "{alice}"
    id: 1
    name: alpha
    type: kvm
    location: Tokyo
    region: jp
  - username: bob
    password: "{bob}"
    disabled: true
    id: 2
    name: beta
"#
        )
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
        assert!(verify_password("s3cret", "not-a-hash").is_err());
    }

    #[tokio::test]
    async fn test_list_enabled_servers() {
        let dir = tempfile::tempdir().unwrap();
        let hash = hash_password("pw").unwrap();
        let registry = write_registry(dir.path(), &sample(&hash, &hash));

        let servers = registry.list_enabled_servers().await.unwrap();
        assert_eq!(servers.len(), 1);
        let alice = &servers["alice"];
        assert_eq!(alice.id, 1);
        assert_eq!(alice.kind, "kvm");
        assert_eq!(alice.region, "jp");
    }

    #[tokio::test]
    async fn test_authenticate() {
        let dir = tempfile::tempdir().unwrap();
        let registry = write_registry(
            dir.path(),
            &sample(&hash_password("s3cret").unwrap(), &hash_password("hunter2").unwrap()),
        );

        assert!(registry.authenticate("alice", "s3cret").await.unwrap());
        assert!(!registry.authenticate("alice", "nope").await.unwrap());
        assert!(!registry.authenticate("carol", "s3cret").await.unwrap());
        // Disabled accounts never authenticate.
        assert!(!registry.authenticate("bob", "hunter2").await.unwrap());
    }

    #[tokio::test]
    async fn test_edits_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let hash = hash_password("pw").unwrap();
        let registry = write_registry(dir.path(), "servers: []\n");
        assert!(registry.list_enabled_servers().await.unwrap().is_empty());

        std::fs::write(registry.path(), sample(&hash, &hash)).unwrap();
        assert_eq!(registry.list_enabled_servers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path().join("absent.yaml"));

        let err = registry.list_enabled_servers().await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let registry = write_registry(
            dir.path(),
            r#"
servers:
  - {username: alice, password: x, id: 1, name: a}
  - {username: alice, password: y, id: 2, name: b}
"#,
        );

        let err = registry.list_enabled_servers().await.unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = write_registry(dir.path(), "");
        assert!(registry.list_enabled_servers().await.unwrap().is_empty());
    }
}
