//! API Management operations implementation
//!
//! Talks to Azure Resource Manager over REST to run the service backup
//! action and follow it to completion.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Instant};

use super::models::{
    BackupRequest, BackupRequestBody, OperationStatus, PollKind, PollSettings, PollTarget,
};
use crate::auth::provider::{management_scope, AzureAuthProvider};
use crate::blob::storage::StorageContext;
use crate::error::{ApimBackupError, Result};
use crate::utils::network::{classify_network_error, create_http_client, NetworkConfig};

pub const APIM_API_VERSION: &str = "2022-08-01";
pub const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";
const MIN_POLL_DELAY: Duration = Duration::from_secs(1);
const MAX_POLL_DELAY: Duration = Duration::from_secs(300);

/// Trait for API Management service operations
#[async_trait]
pub trait ApimOperations: Send + Sync {
    /// Back up the service into `request.container_name/request.backup_name`
    /// and wait until the backup has been written.
    async fn backup(&self, request: &BackupRequest, storage: &StorageContext) -> Result<()>;
}

/// Azure Resource Manager implementation
pub struct AzureApimOperations {
    auth_provider: Arc<dyn AzureAuthProvider>,
    http_client: Client,
    management_endpoint: String,
    configured_subscription: Option<String>,
    resolved_subscription: OnceCell<String>,
    poll: PollSettings,
}

impl AzureApimOperations {
    /// Create a new operations instance. When `subscription_id` is `None` it
    /// is discovered on first use.
    pub fn new(
        auth_provider: Arc<dyn AzureAuthProvider>,
        management_endpoint: impl Into<String>,
        subscription_id: Option<String>,
        poll: PollSettings,
    ) -> Result<Self> {
        let http_client = create_http_client(&NetworkConfig::default())?;

        Ok(Self {
            auth_provider,
            http_client,
            management_endpoint: management_endpoint.into().trim_end_matches('/').to_string(),
            configured_subscription: subscription_id,
            resolved_subscription: OnceCell::new(),
            poll,
        })
    }

    /// Get access token for Azure Resource Manager
    async fn get_management_token(&self) -> Result<String> {
        let scope = management_scope(&self.management_endpoint);
        let token = self.auth_provider.get_token(&[scope.as_str()]).await?;
        Ok(token.token.secret().to_string())
    }

    /// Create authorized headers for Azure REST API
    async fn create_headers(&self) -> Result<HeaderMap> {
        let token = self.get_management_token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", token).parse().map_err(|e| {
                ApimBackupError::authentication(format!("Invalid token format: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Build Azure Resource Manager URL
    fn build_arm_url(&self, path: &str) -> String {
        format!("{}{}", self.management_endpoint, path)
    }

    async fn subscription_id(&self) -> Result<&str> {
        let id = self
            .resolved_subscription
            .get_or_try_init(|| async {
                match &self.configured_subscription {
                    Some(id) => Ok(id.clone()),
                    None => self.discover_subscription().await,
                }
            })
            .await?;
        Ok(id.as_str())
    }

    /// Pick the subscription the identity can see, the way an interactive
    /// session selects its default context.
    async fn discover_subscription(&self) -> Result<String> {
        let headers = self.create_headers().await?;
        let url = self.build_arm_url(&format!(
            "/subscriptions?api-version={}",
            SUBSCRIPTIONS_API_VERSION
        ));

        let response = self
            .http_client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| classify_network_error(&e, &url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!(
                "Unable to list subscriptions: {}",
                parse_azure_error(status.as_u16(), &body)
            );
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ApimBackupError::authentication(message)
                }
                _ => ApimBackupError::config(message),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            ApimBackupError::serialization(format!("Failed to parse subscription list: {}", e))
        })?;

        let subscription = select_subscription(&body).ok_or_else(|| {
            ApimBackupError::config(
                "No enabled subscription is visible to this identity; set --subscription-id",
            )
        })?;

        tracing::info!(subscription = %subscription, "Using discovered subscription");
        Ok(subscription)
    }

    /// Follow a long-running operation until it reaches a terminal state
    async fn wait_for_completion(&self, target: PollTarget, first_delay: Duration) -> Result<()> {
        let started = Instant::now();
        let mut delay = first_delay;

        loop {
            if started.elapsed() >= self.poll.timeout {
                return Err(ApimBackupError::backup_timeout(
                    self.poll.timeout.as_secs() / 60,
                ));
            }

            sleep(delay).await;

            let headers = self.create_headers().await?;
            let response = self
                .http_client
                .get(&target.url)
                .headers(headers)
                .send()
                .await
                .map_err(|e| classify_network_error(&e, &target.url))?;

            let status = response.status();
            delay = poll_delay(response.headers(), self.poll.interval);

            match target.kind {
                PollKind::AsyncOperation => {
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(ApimBackupError::backup(parse_azure_error(
                            status.as_u16(),
                            &body,
                        )));
                    }

                    let body: Value = response.json().await.map_err(|e| {
                        ApimBackupError::serialization(format!(
                            "Failed to parse operation status: {}",
                            e
                        ))
                    })?;

                    match OperationStatus::from_body(&body) {
                        OperationStatus::Succeeded => return Ok(()),
                        OperationStatus::Failed(details) => {
                            return Err(ApimBackupError::backup(details))
                        }
                        OperationStatus::Canceled => {
                            return Err(ApimBackupError::backup("Backup operation was canceled"))
                        }
                        OperationStatus::InProgress => {}
                    }
                }
                PollKind::Location => match status {
                    StatusCode::ACCEPTED => {}
                    StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                        return Ok(())
                    }
                    other => {
                        let body = response.text().await.unwrap_or_default();
                        return Err(ApimBackupError::backup(parse_azure_error(
                            other.as_u16(),
                            &body,
                        )));
                    }
                },
            }

            tracing::debug!(
                elapsed_secs = started.elapsed().as_secs(),
                next_poll_secs = delay.as_secs(),
                "Backup still in progress"
            );
        }
    }
}

#[async_trait]
impl ApimOperations for AzureApimOperations {
    async fn backup(&self, request: &BackupRequest, storage: &StorageContext) -> Result<()> {
        let subscription_id = self.subscription_id().await?;
        let resource_id =
            service_resource_id(subscription_id, &request.resource_group, &request.service_name);
        let url = self.build_arm_url(&format!(
            "{}/backup?api-version={}",
            resource_id, APIM_API_VERSION
        ));

        let body = BackupRequestBody {
            storage_account: storage.account_name(),
            container_name: &request.container_name,
            backup_name: &request.backup_name,
            access_type: "AccessKey",
            access_key: storage.account_key(),
        };

        let headers = self.create_headers().await?;
        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_network_error(&e, &url))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                let target = poll_target(response.headers()).ok_or_else(|| {
                    ApimBackupError::backup(
                        "Backup accepted but no operation URL was returned to poll",
                    )
                })?;
                let delay = poll_delay(response.headers(), self.poll.interval);
                tracing::debug!(poll_url = %target.url, "Backup accepted, polling for completion");
                self.wait_for_completion(target, delay).await
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ApimBackupError::backup(parse_azure_error(
                    status.as_u16(),
                    &body,
                )))
            }
        }
    }
}

/// ARM resource ID of an API Management service
pub fn service_resource_id(subscription_id: &str, resource_group: &str, service_name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}",
        subscription_id, resource_group, service_name
    )
}

/// Prefer the status document over the bare location URL
pub fn poll_target(headers: &HeaderMap) -> Option<PollTarget> {
    let header_url = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };

    if let Some(url) = header_url(AZURE_ASYNC_OPERATION) {
        return Some(PollTarget {
            url,
            kind: PollKind::AsyncOperation,
        });
    }

    header_url(LOCATION.as_str()).map(|url| PollTarget {
        url,
        kind: PollKind::Location,
    })
}

/// Delay before the next poll, from `Retry-After` (seconds) or the default
pub fn poll_delay(headers: &HeaderMap, default: Duration) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
        .clamp(MIN_POLL_DELAY, MAX_POLL_DELAY)
}

/// First enabled subscription in an ARM subscription listing
pub fn select_subscription(body: &Value) -> Option<String> {
    body.get("value")?
        .as_array()?
        .iter()
        .filter(|sub| {
            sub.get("state")
                .and_then(|s| s.as_str())
                .map(|s| s.eq_ignore_ascii_case("enabled"))
                .unwrap_or(true)
        })
        .find_map(|sub| sub.get("subscriptionId").and_then(|id| id.as_str()))
        .map(|id| id.to_string())
}

/// Parse Azure error response
pub fn parse_azure_error(status: u16, body: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<Value>(body) {
        if let Some(error) = error_json.get("error") {
            let code = error.get("code").and_then(|c| c.as_str());
            if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                return match code {
                    Some(code) => format!("HTTP {} ({}): {}", status, code, message),
                    None => format!("HTTP {}: {}", status, message),
                };
            }
        }
    }
    if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_resource_id() {
        let id = service_resource_id("sub-123", "rg-apim", "contoso-apim");
        assert_eq!(
            id,
            "/subscriptions/sub-123/resourceGroups/rg-apim/providers/Microsoft.ApiManagement/service/contoso-apim"
        );
    }

    #[test]
    fn test_poll_target_prefers_async_operation() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LOCATION,
            HeaderValue::from_static("https://management.azure.com/loc"),
        );
        headers.insert(
            "Azure-AsyncOperation",
            HeaderValue::from_static("https://management.azure.com/async"),
        );

        let target = poll_target(&headers).unwrap();
        assert_eq!(target.kind, PollKind::AsyncOperation);
        assert_eq!(target.url, "https://management.azure.com/async");
    }

    #[test]
    fn test_poll_target_falls_back_to_location() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LOCATION,
            HeaderValue::from_static("https://management.azure.com/loc"),
        );
        let target = poll_target(&headers).unwrap();
        assert_eq!(target.kind, PollKind::Location);

        assert!(poll_target(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_poll_delay() {
        let default = Duration::from_secs(15);
        assert_eq!(poll_delay(&HeaderMap::new(), default), default);

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(poll_delay(&headers, default), Duration::from_secs(30));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("0"));
        assert_eq!(poll_delay(&headers, default), MIN_POLL_DELAY);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("86400"));
        assert_eq!(poll_delay(&headers, default), MAX_POLL_DELAY);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(poll_delay(&headers, default), default);
    }

    #[test]
    fn test_select_subscription_skips_disabled() {
        let body = json!({
            "value": [
                {"subscriptionId": "disabled-sub", "state": "Disabled"},
                {"subscriptionId": "good-sub", "state": "Enabled"},
                {"subscriptionId": "later-sub", "state": "Enabled"}
            ]
        });
        assert_eq!(select_subscription(&body), Some("good-sub".to_string()));
        assert_eq!(select_subscription(&json!({"value": []})), None);
    }

    #[test]
    fn test_parse_azure_error() {
        let body = r#"{"error":{"code":"ResourceNotFound","message":"Service not found."}}"#;
        assert_eq!(
            parse_azure_error(404, body),
            "HTTP 404 (ResourceNotFound): Service not found."
        );
        assert_eq!(parse_azure_error(500, ""), "HTTP 500");
        assert_eq!(parse_azure_error(502, "bad gateway"), "HTTP 502: bad gateway");
    }
}
