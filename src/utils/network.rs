use crate::error::{ApimBackupError, Result};
use reqwest::Client;
use std::time::Duration;

/// Configuration for the management-plane HTTP client
pub struct NetworkConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            user_agent: format!("apim-backup/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a properly configured HTTP client with timeouts
pub fn create_http_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| ApimBackupError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a transport-level reqwest failure into a readable error
pub fn classify_network_error(error: &reqwest::Error, url: &str) -> ApimBackupError {
    let host = extract_host(url);

    if error.is_timeout() {
        return ApimBackupError::network(format!(
            "Request to '{}' timed out. The management endpoint may be unreachable.",
            host
        ));
    }

    if error.is_connect() {
        if is_dns_resolution_error(error) {
            return ApimBackupError::network(format!(
                "Unable to resolve '{}'. Check the management endpoint setting.",
                host
            ));
        }

        return ApimBackupError::network(format!(
            "Failed to connect to '{}'. Check network connectivity from this host.",
            host
        ));
    }

    let message = error.to_string().to_lowercase();
    if message.contains("ssl") || message.contains("tls") || message.contains("certificate") {
        return ApimBackupError::network(format!(
            "TLS error when connecting to '{}': {}",
            host, error
        ));
    }

    ApimBackupError::network(format!("Network error when calling '{}': {}", host, error))
}

fn is_dns_resolution_error(error: &reqwest::Error) -> bool {
    let error_msg = error.to_string().to_lowercase();
    let dns_indicators = [
        "dns",
        "name resolution",
        "name or service not known",
        "nodename nor servname provided",
        "temporary failure in name resolution",
        "no such host",
        "getaddrinfo failed",
        "could not resolve host",
    ];

    dns_indicators
        .iter()
        .any(|&indicator| error_msg.contains(indicator))
}

/// Host portion of a URL, used to keep error messages free of query strings
fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        let url = "https://management.azure.com/subscriptions/abc/resourceGroups/rg?api-version=1";
        assert_eq!(extract_host(url), "management.azure.com");
        assert_eq!(extract_host("not a url"), "unknown-host");
    }

    #[test]
    fn test_default_network_config() {
        let config = NetworkConfig::default();
        assert!(config.user_agent.starts_with("apim-backup/"));
        assert!(create_http_client(&config).is_ok());
    }
}
