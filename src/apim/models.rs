//! API Management backup data models

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Target of one backup invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    pub resource_group: String,
    pub service_name: String,
    pub container_name: String,
    pub backup_name: String,
}

/// Body of the ARM `backup` action
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequestBody<'a> {
    pub storage_account: &'a str,
    pub container_name: &'a str,
    pub backup_name: &'a str,
    pub access_type: &'static str,
    pub access_key: &'a str,
}

/// Terminal or in-flight state of an ARM long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
    Canceled,
}

impl OperationStatus {
    /// Interpret an `Azure-AsyncOperation` status document
    pub fn from_body(body: &Value) -> Self {
        let status = body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or_default();

        match status.to_ascii_lowercase().as_str() {
            "succeeded" => OperationStatus::Succeeded,
            "canceled" | "cancelled" => OperationStatus::Canceled,
            "failed" => {
                let error = body.get("error");
                let code = error
                    .and_then(|e| e.get("code"))
                    .and_then(|c| c.as_str())
                    .unwrap_or("Unknown");
                let message = error
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("no error details returned");
                OperationStatus::Failed(format!("{}: {}", code, message))
            }
            _ => OperationStatus::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::InProgress)
    }
}

/// How completion of a long-running operation is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    /// Status document with a `status` field
    AsyncOperation,
    /// Returns 202 until the operation finishes
    Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub url: String,
    pub kind: PollKind,
}

/// Polling behaviour for the backup operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(120 * 60),
        }
    }
}
