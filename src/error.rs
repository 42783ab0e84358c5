use thiserror::Error;

/// Main error type for apim-backup operations
#[derive(Debug, Error)]
pub enum ApimBackupError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Storage operation failed: {0}")]
    StorageError(String),

    #[error("Backup operation failed: {0}")]
    BackupError(String),

    #[error("Backup operation did not complete within {minutes} minutes")]
    BackupTimeout { minutes: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl ApimBackupError {
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationError(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn backup<S: Into<String>>(msg: S) -> Self {
        Self::BackupError(msg.into())
    }

    pub fn backup_timeout(minutes: u64) -> Self {
        Self::BackupTimeout { minutes }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::SerializationError(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Short label for the failure category, used in the final log line
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationError(_) => "authentication",
            Self::StorageError(_) => "storage",
            Self::BackupError(_) | Self::BackupTimeout { .. } => "backup",
            Self::ConfigError(_) | Self::InvalidArgument(_) => "configuration",
            _ => "internal",
        }
    }
}

/// Result type alias for apim-backup operations
pub type Result<T> = std::result::Result<T, ApimBackupError>;
