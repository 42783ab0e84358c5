//! Blob storage operations used by the backup workflow
//!
//! `StorageOperations` is the seam the workflow talks to; `AzureBlobStorage`
//! implements it on top of `azure_storage_blobs` with shared key auth.

use async_trait::async_trait;
use azure_storage_blobs::blob::BlobType;
use azure_storage_blobs::prelude::PublicAccess;
use futures::TryStreamExt;

use crate::blob::models::{BlobEntry, BlobKind};
use crate::blob::storage::StorageContext;
use crate::error::{ApimBackupError, Result};
use crate::utils::datetime::offset_to_utc;

/// Container and blob operations scoped to one storage account
#[async_trait]
pub trait StorageOperations: Send + Sync {
    /// Names of every container in the account
    async fn list_containers(&self) -> Result<Vec<String>>;

    /// Create a container with private (no anonymous) access
    async fn create_container(&self, container_name: &str) -> Result<()>;

    /// Every blob in the container, across all result pages
    async fn list_blobs(&self, container_name: &str) -> Result<Vec<BlobEntry>>;

    /// Delete a single blob
    async fn delete_blob(&self, container_name: &str, blob_name: &str) -> Result<()>;
}

/// Azure Blob Storage implementation
pub struct AzureBlobStorage {
    context: StorageContext,
}

impl AzureBlobStorage {
    pub fn new(context: StorageContext) -> Self {
        Self { context }
    }
}

fn blob_kind(blob_type: &BlobType) -> BlobKind {
    match blob_type {
        BlobType::BlockBlob => BlobKind::BlockBlob,
        BlobType::PageBlob => BlobKind::PageBlob,
        BlobType::AppendBlob => BlobKind::AppendBlob,
    }
}

#[async_trait]
impl StorageOperations for AzureBlobStorage {
    async fn list_containers(&self) -> Result<Vec<String>> {
        let mut stream = self
            .context
            .blob_service_client()
            .list_containers()
            .into_stream();
        let mut names = Vec::new();

        while let Some(page) = stream.try_next().await.map_err(|e| {
            ApimBackupError::storage(format!(
                "Failed to list containers in '{}': {e}",
                self.context.account_name()
            ))
        })? {
            names.extend(page.containers.into_iter().map(|container| container.name));
        }

        tracing::debug!(
            account = self.context.account_name(),
            count = names.len(),
            "Listed containers"
        );
        Ok(names)
    }

    async fn create_container(&self, container_name: &str) -> Result<()> {
        self.context
            .container_client(container_name)
            .create()
            .public_access(PublicAccess::None)
            .await
            .map_err(|e| {
                ApimBackupError::storage(format!(
                    "Failed to create container '{container_name}': {e}"
                ))
            })?;
        Ok(())
    }

    async fn list_blobs(&self, container_name: &str) -> Result<Vec<BlobEntry>> {
        let mut stream = self
            .context
            .container_client(container_name)
            .list_blobs()
            .into_stream();
        let mut entries = Vec::new();

        while let Some(page) = stream.try_next().await.map_err(|e| {
            ApimBackupError::storage(format!(
                "Failed to list blobs in container '{container_name}': {e}"
            ))
        })? {
            for blob in page.blobs.blobs() {
                let last_modified = offset_to_utc(blob.properties.last_modified).ok_or_else(|| {
                    ApimBackupError::storage(format!(
                        "Blob '{}' has an out-of-range last-modified time",
                        blob.name
                    ))
                })?;

                entries.push(BlobEntry::new(
                    blob.name.clone(),
                    last_modified,
                    blob_kind(&blob.properties.blob_type),
                ));
            }
        }

        Ok(entries)
    }

    async fn delete_blob(&self, container_name: &str, blob_name: &str) -> Result<()> {
        if blob_name.trim().is_empty() {
            return Err(ApimBackupError::invalid_argument("Blob name cannot be empty"));
        }

        self.context
            .container_client(container_name)
            .blob_client(blob_name)
            .delete()
            .await
            .map_err(|e| {
                ApimBackupError::storage(format!(
                    "Failed to delete blob '{blob_name}' from '{container_name}': {e}"
                ))
            })?;
        Ok(())
    }
}
