//! Configuration settings management
//!
//! Settings come from an optional TOML (or JSON) file, overridden by
//! environment variables and command-line arguments. Validation turns them
//! into the immutable `RunConfig` used for one run.

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::apim::{PollSettings, DEFAULT_MANAGEMENT_ENDPOINT};
use crate::auth::provider::{AuthMethod, AuthOptions};
use crate::backup::{DEFAULT_BACKUP_PREFIX, DEFAULT_RETENTION_DAYS};
use crate::blob::StorageContext;
use crate::error::{ApimBackupError, Result};

pub const DEFAULT_BACKUP_TIMEOUT_MINUTES: u64 = 120;
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 15;
const MAX_RETENTION_DAYS: u32 = 36_500;
/// One week
const MAX_BACKUP_TIMEOUT_MINUTES: u64 = 10_080;

#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSettings {
    pub method: Option<AuthMethod>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<Zeroizing<String>>,
    pub access_token: Option<Zeroizing<String>>,
}

impl AuthSettings {
    fn merge(self, overrides: AuthSettings) -> Self {
        Self {
            method: overrides.method.or(self.method),
            tenant_id: overrides.tenant_id.or(self.tenant_id),
            client_id: overrides.client_id.or(self.client_id),
            client_secret: overrides.client_secret.or(self.client_secret),
            access_token: overrides.access_token.or(self.access_token),
        }
    }
}

/// Raw, possibly incomplete settings from one source
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub apim_resource_group_name: Option<String>,
    pub apim_instance_name: Option<String>,
    pub storage_account_name: Option<String>,
    pub storage_account_key: Option<Zeroizing<String>>,
    pub blob_container_name: Option<String>,
    pub backup_file_prefix: Option<String>,
    pub retention_days: Option<u32>,
    pub subscription_id: Option<String>,
    pub management_endpoint: Option<String>,
    pub backup_timeout_minutes: Option<u64>,
    pub poll_interval_seconds: Option<u64>,
    pub dry_run: Option<bool>,
    pub auth: AuthSettings,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("apim_resource_group_name", &self.apim_resource_group_name)
            .field("apim_instance_name", &self.apim_instance_name)
            .field("storage_account_name", &self.storage_account_name)
            .field(
                "storage_account_key",
                &self.storage_account_key.as_ref().map(|_| "<redacted>"),
            )
            .field("blob_container_name", &self.blob_container_name)
            .field("backup_file_prefix", &self.backup_file_prefix)
            .field("retention_days", &self.retention_days)
            .field("subscription_id", &self.subscription_id)
            .field("management_endpoint", &self.management_endpoint)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Load settings from a file. TOML is tried first, JSON as fallback.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            ApimBackupError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let toml_error = match toml::from_str::<Settings>(contents) {
            Ok(settings) => return Ok(settings),
            Err(e) => e,
        };

        serde_json::from_str::<Settings>(contents).map_err(|json_error| {
            ApimBackupError::config(format!(
                "Config file is neither valid TOML ({}) nor JSON ({})",
                toml_error.message(),
                json_error
            ))
        })
    }

    /// Values present in `overrides` win
    pub fn merge(self, overrides: Settings) -> Self {
        Self {
            apim_resource_group_name: overrides
                .apim_resource_group_name
                .or(self.apim_resource_group_name),
            apim_instance_name: overrides.apim_instance_name.or(self.apim_instance_name),
            storage_account_name: overrides.storage_account_name.or(self.storage_account_name),
            storage_account_key: overrides.storage_account_key.or(self.storage_account_key),
            blob_container_name: overrides.blob_container_name.or(self.blob_container_name),
            backup_file_prefix: overrides.backup_file_prefix.or(self.backup_file_prefix),
            retention_days: overrides.retention_days.or(self.retention_days),
            subscription_id: overrides.subscription_id.or(self.subscription_id),
            management_endpoint: overrides.management_endpoint.or(self.management_endpoint),
            backup_timeout_minutes: overrides
                .backup_timeout_minutes
                .or(self.backup_timeout_minutes),
            poll_interval_seconds: overrides.poll_interval_seconds.or(self.poll_interval_seconds),
            dry_run: overrides.dry_run.or(self.dry_run),
            auth: self.auth.merge(overrides.auth),
        }
    }

    pub fn validate(self) -> Result<RunConfig> {
        let resource_group = required(self.apim_resource_group_name, "ApimResourceGroupName")?;
        let instance_name = required(self.apim_instance_name, "ApimInstanceName")?;
        let storage_account_name = required(self.storage_account_name, "StorageAccountName")?;
        let container_name = required(self.blob_container_name, "BlobContainerName")?;

        let storage_account_key = self
            .storage_account_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ApimBackupError::config("StorageAccountKey is required"))?;

        validate_container_name(&container_name)?;

        let retention_days = self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        if retention_days == 0 || retention_days > MAX_RETENTION_DAYS {
            return Err(ApimBackupError::config(format!(
                "RetentionDays must be between 1 and {}, got {}",
                MAX_RETENTION_DAYS, retention_days
            )));
        }

        let management_endpoint = self
            .management_endpoint
            .unwrap_or_else(|| DEFAULT_MANAGEMENT_ENDPOINT.to_string());
        let parsed = url::Url::parse(&management_endpoint).map_err(|e| {
            ApimBackupError::config(format!(
                "Invalid management endpoint '{}': {}",
                management_endpoint, e
            ))
        })?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(ApimBackupError::config(format!(
                "Management endpoint must be an http(s) URL, got '{}'",
                management_endpoint
            )));
        }

        let timeout_minutes = self
            .backup_timeout_minutes
            .unwrap_or(DEFAULT_BACKUP_TIMEOUT_MINUTES);
        let poll_seconds = self
            .poll_interval_seconds
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS);
        if timeout_minutes == 0 || poll_seconds == 0 {
            return Err(ApimBackupError::config(
                "Backup timeout and poll interval must be greater than zero",
            ));
        }
        if timeout_minutes > MAX_BACKUP_TIMEOUT_MINUTES {
            return Err(ApimBackupError::config(format!(
                "BackupTimeoutMinutes must be at most {}, got {}",
                MAX_BACKUP_TIMEOUT_MINUTES, timeout_minutes
            )));
        }

        Ok(RunConfig {
            resource_group,
            instance_name,
            storage_account_name,
            storage_account_key,
            container_name,
            backup_prefix: self
                .backup_file_prefix
                .unwrap_or_else(|| DEFAULT_BACKUP_PREFIX.to_string()),
            retention_days,
            subscription_id: self.subscription_id.filter(|s| !s.trim().is_empty()),
            management_endpoint,
            poll: PollSettings {
                interval: Duration::from_secs(poll_seconds),
                timeout: Duration::from_secs(timeout_minutes * 60),
            },
            dry_run: self.dry_run.unwrap_or(false),
            auth_method: self.auth.method.unwrap_or_default(),
            auth_options: AuthOptions {
                tenant_id: self.auth.tenant_id,
                client_id: self.auth.client_id,
                client_secret: self.auth.client_secret,
                access_token: self.auth.access_token,
            },
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApimBackupError::config(format!("{} is required", name)))
}

/// Azure container names: 3-63 chars of lowercase letters, digits and
/// single hyphens, starting and ending with a letter or digit.
pub fn validate_container_name(name: &str) -> Result<()> {
    let pattern = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$")?;
    if !(3..=63).contains(&name.len()) || !pattern.is_match(name) {
        return Err(ApimBackupError::config(format!(
            "Invalid container name '{}': use 3-63 lowercase letters, digits and single hyphens",
            name
        )));
    }
    Ok(())
}

/// Validated configuration for a single run
#[derive(Clone)]
pub struct RunConfig {
    pub resource_group: String,
    pub instance_name: String,
    pub storage_account_name: String,
    pub storage_account_key: Zeroizing<String>,
    pub container_name: String,
    pub backup_prefix: String,
    pub retention_days: u32,
    pub subscription_id: Option<String>,
    pub management_endpoint: String,
    pub poll: PollSettings,
    pub dry_run: bool,
    pub auth_method: AuthMethod,
    pub auth_options: AuthOptions,
}

impl RunConfig {
    pub fn storage_context(&self) -> Result<StorageContext> {
        StorageContext::new(
            self.storage_account_name.clone(),
            self.storage_account_key.to_string(),
        )
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("resource_group", &self.resource_group)
            .field("instance_name", &self.instance_name)
            .field("storage_account_name", &self.storage_account_name)
            .field("storage_account_key", &"<redacted>")
            .field("container_name", &self.container_name)
            .field("backup_prefix", &self.backup_prefix)
            .field("retention_days", &self.retention_days)
            .field("subscription_id", &self.subscription_id)
            .field("management_endpoint", &self.management_endpoint)
            .field("poll", &self.poll)
            .field("dry_run", &self.dry_run)
            .field("auth_method", &self.auth_method)
            .field("auth_options", &self.auth_options)
            .finish()
    }
}

/// Load the optional config file and apply command-line/env overrides
pub async fn load_run_config(config_path: Option<&Path>, overrides: Settings) -> Result<RunConfig> {
    let base = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            Settings::from_file(path).await?
        }
        None => Settings::default(),
    };

    base.merge(overrides).validate()
}
