//! CLI commands and argument parsing
//!
//! Every run argument can also be supplied through an environment variable,
//! which is how scheduled hosts usually pass them.

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::apim::AzureApimOperations;
use crate::auth::provider::{AuthMethod, AuthProviderFactory};
use crate::backup::BackupWorkflow;
use crate::blob::AzureBlobStorage;
use crate::config::{load_run_config, AuthSettings, Settings};
use crate::error::Result;

/// Get the full version string with build information
fn get_version() -> &'static str {
    env!("VERSION_WITH_GIT")
}

/// Get build information for display
pub fn get_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        git_branch: env!("GIT_BRANCH"),
        build_time: env!("BUILD_TIME"),
    }
}

#[derive(Debug)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub build_time: &'static str,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "apim-backup")]
#[command(about = "Back up Azure API Management to Blob Storage and prune old backups")]
#[command(version = get_version())]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true, env = "DEBUG", value_parser = BoolishValueParser::new())]
    pub debug: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text", env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Back up the instance and delete expired backups
    Run(RunArgs),
    /// Show version and build information
    Version,
}

#[derive(Args, Default)]
pub struct RunArgs {
    /// Optional TOML or JSON settings file
    #[arg(long, value_name = "PATH", env = "APIM_BACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Resource group of the API Management instance
    #[arg(long, alias = "resource-group", env = "APIM_RESOURCE_GROUP_NAME")]
    pub apim_resource_group_name: Option<String>,

    /// Name of the API Management instance
    #[arg(long, alias = "instance", env = "APIM_INSTANCE_NAME")]
    pub apim_instance_name: Option<String>,

    /// Storage account receiving the backups
    #[arg(long, env = "STORAGE_ACCOUNT_NAME")]
    pub storage_account_name: Option<String>,

    /// Access key of the storage account
    #[arg(long, env = "STORAGE_ACCOUNT_KEY", hide_env_values = true)]
    pub storage_account_key: Option<String>,

    /// Container holding the backups; created if missing
    #[arg(long, alias = "container", env = "BLOB_CONTAINER_NAME")]
    pub blob_container_name: Option<String>,

    /// Backup file name prefix [default: apim_]
    #[arg(long, env = "BACKUP_FILE_PREFIX")]
    pub backup_file_prefix: Option<String>,

    /// Delete block blobs older than this many days [default: 30]
    #[arg(long, env = "RETENTION_DAYS")]
    pub retention_days: Option<u32>,

    /// Subscription of the instance; discovered when omitted
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Azure Resource Manager endpoint [default: https://management.azure.com]
    #[arg(long, env = "AZURE_MANAGEMENT_ENDPOINT")]
    pub management_endpoint: Option<String>,

    /// Give up waiting for the backup after this many minutes [default: 120]
    #[arg(long, env = "BACKUP_TIMEOUT_MINUTES")]
    pub backup_timeout_minutes: Option<u64>,

    /// Seconds between backup status polls when the service gives no hint [default: 15]
    #[arg(long, env = "BACKUP_POLL_INTERVAL_SECONDS")]
    pub poll_interval_seconds: Option<u64>,

    /// Log what would change without creating, backing up or deleting anything
    #[arg(long, env = "DRY_RUN", value_parser = BoolishValueParser::new())]
    pub dry_run: bool,

    /// Authentication method [default: default]
    #[arg(long, value_enum, env = "AZURE_AUTH_METHOD")]
    pub auth_method: Option<AuthMethod>,

    /// Tenant for client secret authentication
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Application (client) ID for client secret authentication
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret for client secret authentication
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Pre-issued management token for token authentication
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

impl RunArgs {
    /// Settings layer holding only what was given on the command line or env
    pub fn to_settings(&self) -> Settings {
        Settings {
            apim_resource_group_name: self.apim_resource_group_name.clone(),
            apim_instance_name: self.apim_instance_name.clone(),
            storage_account_name: self.storage_account_name.clone(),
            storage_account_key: self.storage_account_key.clone().map(Zeroizing::new),
            blob_container_name: self.blob_container_name.clone(),
            backup_file_prefix: self.backup_file_prefix.clone(),
            retention_days: self.retention_days,
            subscription_id: self.subscription_id.clone(),
            management_endpoint: self.management_endpoint.clone(),
            backup_timeout_minutes: self.backup_timeout_minutes,
            poll_interval_seconds: self.poll_interval_seconds,
            dry_run: self.dry_run.then_some(true),
            auth: AuthSettings {
                method: self.auth_method,
                tenant_id: self.tenant_id.clone(),
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone().map(Zeroizing::new),
                access_token: self.access_token.clone().map(Zeroizing::new),
            },
        }
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => execute_run(args).await,
            Commands::Version => execute_version_command(),
        }
    }
}

async fn execute_run(args: RunArgs) -> Result<()> {
    let config = load_run_config(args.config.as_deref(), args.to_settings()).await?;
    tracing::debug!(?config, "Resolved run configuration");

    let auth_provider =
        AuthProviderFactory::create_provider(config.auth_method, &config.auth_options)?;
    let storage_context = config.storage_context()?;
    let storage = Arc::new(AzureBlobStorage::new(storage_context.clone()));
    let apim = Arc::new(AzureApimOperations::new(
        auth_provider.clone(),
        config.management_endpoint.clone(),
        config.subscription_id.clone(),
        config.poll,
    )?);

    let workflow = BackupWorkflow::new(auth_provider, storage_context, storage, apim);
    workflow.run(&config).await?;
    Ok(())
}

fn execute_version_command() -> Result<()> {
    let info = get_build_info();
    println!("apim-backup {}", info.version);
    println!("  git:   {} ({})", info.git_hash, info.git_branch);
    println!("  built: {}", info.build_time);
    Ok(())
}
