//! The backup run
//!
//! Authenticate, make sure the destination container exists, back up the
//! API Management instance into it, then delete block blobs that have
//! fallen out of the retention window. Steps run strictly in that order and
//! the first failure ends the run.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use super::naming::backup_blob_name;
use super::retention::{retention_cutoff, select_expired};
use crate::apim::{ApimOperations, BackupRequest};
use crate::auth::provider::{authenticate, management_scope, AzureAuthProvider};
use crate::blob::{StorageContext, StorageOperations};
use crate::config::RunConfig;
use crate::error::{ApimBackupError, Result};
use crate::utils::datetime::format_age;

/// Source of "now" for naming and retention
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What the container step found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Existing,
    Created,
    /// Absent and left absent because of dry run
    Missing,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub container: ContainerState,
    pub backup_name: String,
    pub deleted: Vec<String>,
    pub retained: usize,
    pub dry_run: bool,
}

pub struct BackupWorkflow {
    auth_provider: Arc<dyn AzureAuthProvider>,
    storage_context: StorageContext,
    storage: Arc<dyn StorageOperations>,
    apim: Arc<dyn ApimOperations>,
    clock: Clock,
}

impl BackupWorkflow {
    pub fn new(
        auth_provider: Arc<dyn AzureAuthProvider>,
        storage_context: StorageContext,
        storage: Arc<dyn StorageOperations>,
        apim: Arc<dyn ApimOperations>,
    ) -> Self {
        Self {
            auth_provider,
            storage_context,
            storage,
            apim,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, mainly for tests
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub async fn run(&self, config: &RunConfig) -> Result<RunSummary> {
        info!(
            instance = %config.instance_name,
            resource_group = %config.resource_group,
            storage_account = %self.storage_context.account_name(),
            container = %config.container_name,
            retention_days = config.retention_days,
            dry_run = config.dry_run,
            "Starting API Management backup run"
        );

        self.authenticate(config).await?;
        let container = self.ensure_container(config).await?;
        let backup_name = self.trigger_backup(config).await?;

        let (deleted, retained) = if container == ContainerState::Missing {
            info!(
                container = %config.container_name,
                "[dry-run] Container does not exist, nothing to prune"
            );
            (Vec::new(), 0)
        } else {
            self.prune_expired(config).await?
        };

        info!(
            backup = %backup_name,
            deleted = deleted.len(),
            retained,
            "Backup run completed"
        );

        Ok(RunSummary {
            container,
            backup_name,
            deleted,
            retained,
            dry_run: config.dry_run,
        })
    }

    pub async fn authenticate(&self, config: &RunConfig) -> Result<()> {
        let scope = management_scope(&config.management_endpoint);
        authenticate(self.auth_provider.as_ref(), &scope).await?;
        info!(method = %self.auth_provider.method(), "Authenticated to Azure");
        Ok(())
    }

    pub async fn ensure_container(&self, config: &RunConfig) -> Result<ContainerState> {
        let name = &config.container_name;
        let containers = self.storage.list_containers().await?;

        if containers.iter().any(|existing| existing == name) {
            info!(container = %name, "Container already exists");
            return Ok(ContainerState::Existing);
        }

        if config.dry_run {
            info!(container = %name, "[dry-run] Would create private container");
            return Ok(ContainerState::Missing);
        }

        self.storage.create_container(name).await?;
        info!(container = %name, "Created private container");
        Ok(ContainerState::Created)
    }

    /// Returns the backup blob name
    pub async fn trigger_backup(&self, config: &RunConfig) -> Result<String> {
        let backup_name = backup_blob_name(&config.backup_prefix, (self.clock)());

        info!(
            instance = %config.instance_name,
            target = %format!("{}/{}", config.container_name, backup_name),
            "Backing up API Management instance"
        );

        if config.dry_run {
            info!(backup = %backup_name, "[dry-run] Skipping backup operation");
            return Ok(backup_name);
        }

        let request = BackupRequest {
            resource_group: config.resource_group.clone(),
            service_name: config.instance_name.clone(),
            container_name: config.container_name.clone(),
            backup_name: backup_name.clone(),
        };

        self.apim
            .backup(&request, &self.storage_context)
            .await
            .map_err(|e| match e {
                ApimBackupError::NetworkError(msg) | ApimBackupError::SerializationError(msg) => {
                    ApimBackupError::backup(msg)
                }
                other => other,
            })?;

        info!(backup = %backup_name, "Backup completed");
        Ok(backup_name)
    }

    /// Returns the deleted blob names and the number of blobs left in place
    pub async fn prune_expired(&self, config: &RunConfig) -> Result<(Vec<String>, usize)> {
        let now = (self.clock)();
        let cutoff = retention_cutoff(now, config.retention_days);
        let container = &config.container_name;

        info!(
            container = %container,
            cutoff = %cutoff.to_rfc3339(),
            "Removing block blobs last modified before cutoff"
        );

        let entries = self.storage.list_blobs(container).await?;
        let expired = select_expired(&entries, cutoff);
        let mut deleted = Vec::with_capacity(expired.len());

        for entry in expired {
            let age = format_age(now, entry.last_modified);
            if config.dry_run {
                info!(blob = %entry.name, age = %age, "[dry-run] Would delete expired blob");
            } else {
                self.storage.delete_blob(container, &entry.name).await?;
                info!(blob = %entry.name, age = %age, "Deleted expired blob");
            }
            deleted.push(entry.name.clone());
        }

        if deleted.is_empty() {
            info!(container = %container, "No expired blobs found");
        }

        let retained = entries.len() - deleted.len();
        Ok((deleted, retained))
    }
}
