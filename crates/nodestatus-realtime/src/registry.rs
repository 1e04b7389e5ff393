//! Registry client interface.
//!
//! The registry is the source of truth for which nodes exist and how they
//! authenticate. Storage, hashing and CRUD validation live behind this trait.

use async_trait::async_trait;
use nodestatus_types::NodeDirectory;

use crate::error::RegistryError;

/// Access to the node registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Checks a username/password pair.
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, RegistryError>;

    /// Lists enabled nodes keyed by username. Disabled nodes are excluded.
    async fn list_enabled_servers(&self) -> Result<NodeDirectory, RegistryError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use nodestatus_types::NodeRecord;
    use parking_lot::RwLock;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Account {
        password: String,
        record: NodeRecord,
        disabled: bool,
    }

    /// In-memory registry for tests.
    #[derive(Default)]
    pub(crate) struct FakeRegistry {
        accounts: RwLock<BTreeMap<String, Account>>,
        unavailable: AtomicBool,
    }

    impl FakeRegistry {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn add(&self, username: &str, password: &str, record: NodeRecord) {
            self.accounts.write().insert(
                username.to_string(),
                Account {
                    password: password.to_string(),
                    record,
                    disabled: false,
                },
            );
        }

        pub(crate) fn remove(&self, username: &str) {
            self.accounts.write().remove(username);
        }

        pub(crate) fn disable(&self, username: &str) {
            if let Some(account) = self.accounts.write().get_mut(username) {
                account.disabled = true;
            }
        }

        pub(crate) fn enable(&self, username: &str) {
            if let Some(account) = self.accounts.write().get_mut(username) {
                account.disabled = false;
            }
        }

        pub(crate) fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        fn check_available(&self) -> Result<(), RegistryError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(RegistryError::Unavailable("registry offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn authenticate(&self, username: &str, password: &str) -> Result<bool, RegistryError> {
            self.check_available()?;
            Ok(self
                .accounts
                .read()
                .get(username)
                .is_some_and(|account| account.password == password))
        }

        async fn list_enabled_servers(&self) -> Result<NodeDirectory, RegistryError> {
            self.check_available()?;
            Ok(self
                .accounts
                .read()
                .iter()
                .filter(|(_, account)| !account.disabled)
                .map(|(username, account)| (username.clone(), account.record.clone()))
                .collect())
        }
    }
}
