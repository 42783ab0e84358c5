//! Storage account context
//!
//! Addresses a storage account with its shared key. Construction never
//! touches the network; a bad key only surfaces on the first request.

use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder, ContainerClient};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{ApimBackupError, Result};

/// Account name and key for the backup storage account
#[derive(Clone)]
pub struct StorageContext {
    account_name: String,
    account_key: Zeroizing<String>,
}

impl StorageContext {
    /// Build a context from an account name and access key
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Result<Self> {
        let account_name = account_name.into();
        let account_key = Zeroizing::new(account_key.into());

        if account_name.trim().is_empty() {
            return Err(ApimBackupError::invalid_argument(
                "Storage account name cannot be empty",
            ));
        }
        if account_key.trim().is_empty() {
            return Err(ApimBackupError::invalid_argument(
                "Storage account key cannot be empty",
            ));
        }

        Ok(Self {
            account_name,
            account_key,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn account_key(&self) -> &str {
        self.account_key.as_str()
    }

    fn credentials(&self) -> StorageCredentials {
        StorageCredentials::access_key(self.account_name.clone(), self.account_key.to_string())
    }

    pub fn blob_service_client(&self) -> BlobServiceClient {
        ClientBuilder::new(self.account_name.clone(), self.credentials()).blob_service_client()
    }

    pub fn container_client(&self, container_name: &str) -> ContainerClient {
        ClientBuilder::new(self.account_name.clone(), self.credentials())
            .container_client(container_name)
    }
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .finish()
    }
}
