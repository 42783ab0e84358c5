//! Authentication provider trait and implementations
//!
//! This module defines the authentication provider trait and provides
//! implementations for the supported Azure authentication methods. The
//! workflow only ever sees `Arc<dyn AzureAuthProvider>`, so alternate
//! strategies can be substituted without touching it.

use async_trait::async_trait;
use azure_core::auth::{AccessToken, TokenCredential};
use azure_identity::{ClientSecretCredential, DefaultAzureCredential, TokenCredentialOptions};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::error::{ApimBackupError, Result};

/// Authority host used for client secret authentication
const AZURE_PUBLIC_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Lifetime assumed for a pre-issued token whose expiry is unknown
const STATIC_TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Supported authentication methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    /// DefaultAzureCredential chain (environment, managed identity, Azure CLI)
    #[default]
    Default,
    /// Service principal with a client secret
    ClientSecret,
    /// Pre-issued bearer token
    Token,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMethod::Default => "default",
            AuthMethod::ClientSecret => "client-secret",
            AuthMethod::Token => "token",
        };
        f.write_str(name)
    }
}

/// Trait for Azure authentication providers
#[async_trait]
pub trait AzureAuthProvider: Send + Sync {
    /// Get an access token for the specified scopes
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken>;

    /// The method this provider authenticates with
    fn method(&self) -> AuthMethod;
}

/// Default Azure Credential Provider using DefaultAzureCredential
pub struct DefaultAzureCredentialProvider {
    credential: Arc<DefaultAzureCredential>,
}

impl DefaultAzureCredentialProvider {
    /// Create a new DefaultAzureCredentialProvider
    pub fn new() -> Result<Self> {
        let credential = DefaultAzureCredential::create(TokenCredentialOptions::default())
            .map_err(|e| {
                ApimBackupError::authentication(format!(
                    "Failed to create DefaultAzureCredential: {}",
                    e
                ))
            })?;

        Ok(Self {
            credential: Arc::new(credential),
        })
    }
}

#[async_trait]
impl AzureAuthProvider for DefaultAzureCredentialProvider {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        self.credential
            .get_token(scopes)
            .await
            .map_err(|e| ApimBackupError::authentication(format!("Failed to get token: {}", e)))
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::Default
    }
}

/// Client Secret Authentication Provider
pub struct ClientSecretProvider {
    credential: Arc<ClientSecretCredential>,
}

impl ClientSecretProvider {
    /// Create a new ClientSecretProvider
    pub fn new(tenant_id: String, client_id: String, client_secret: String) -> Result<Self> {
        let authority_host = azure_core::Url::parse(AZURE_PUBLIC_AUTHORITY)
            .map_err(|e| ApimBackupError::config(format!("Invalid authority URL: {}", e)))?;

        let credential = ClientSecretCredential::new(
            azure_core::new_http_client(),
            authority_host,
            tenant_id,
            client_id,
            client_secret,
        );

        Ok(Self {
            credential: Arc::new(credential),
        })
    }
}

#[async_trait]
impl AzureAuthProvider for ClientSecretProvider {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        self.credential
            .get_token(scopes)
            .await
            .map_err(|e| ApimBackupError::authentication(format!("Failed to get token: {}", e)))
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::ClientSecret
    }
}

/// Provider that hands out a bearer token issued outside this process
pub struct StaticTokenProvider {
    token: Zeroizing<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = Zeroizing::new(token.into());
        if token.trim().is_empty() {
            return Err(ApimBackupError::authentication("Access token is empty"));
        }
        Ok(Self { token })
    }
}

#[async_trait]
impl AzureAuthProvider for StaticTokenProvider {
    async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
        let expires_on =
            OffsetDateTime::now_utc() + time::Duration::minutes(STATIC_TOKEN_LIFETIME_MINUTES);
        Ok(AccessToken::new(self.token.to_string(), expires_on))
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::Token
    }
}

/// Inputs needed by the non-default authentication methods
#[derive(Default, Clone)]
pub struct AuthOptions {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<Zeroizing<String>>,
    pub access_token: Option<Zeroizing<String>>,
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Authentication provider factory
pub struct AuthProviderFactory;

impl AuthProviderFactory {
    /// Create an authentication provider for the given method
    pub fn create_provider(
        method: AuthMethod,
        options: &AuthOptions,
    ) -> Result<Arc<dyn AzureAuthProvider>> {
        match method {
            AuthMethod::Default => Ok(Arc::new(DefaultAzureCredentialProvider::new()?)),
            AuthMethod::ClientSecret => {
                let tenant_id = options.tenant_id.clone().ok_or_else(|| {
                    ApimBackupError::config("tenant_id is required for client secret authentication")
                })?;
                let client_id = options.client_id.clone().ok_or_else(|| {
                    ApimBackupError::config("client_id is required for client secret authentication")
                })?;
                let client_secret = options.client_secret.as_ref().ok_or_else(|| {
                    ApimBackupError::config(
                        "client_secret is required for client secret authentication",
                    )
                })?;

                Ok(Arc::new(ClientSecretProvider::new(
                    tenant_id,
                    client_id,
                    client_secret.to_string(),
                )?))
            }
            AuthMethod::Token => {
                let token = options.access_token.as_ref().ok_or_else(|| {
                    ApimBackupError::config("access_token is required for token authentication")
                })?;
                Ok(Arc::new(StaticTokenProvider::new(token.as_str())?))
            }
        }
    }
}

/// Token scope for an Azure Resource Manager endpoint
pub fn management_scope(management_endpoint: &str) -> String {
    format!("{}/.default", management_endpoint.trim_end_matches('/'))
}

/// Acquire a token to prove the configured identity works before any
/// storage or management call is made.
pub async fn authenticate(provider: &dyn AzureAuthProvider, scope: &str) -> Result<AccessToken> {
    let token = provider.get_token(&[scope]).await.map_err(|e| match e {
        ApimBackupError::AuthenticationError(_) => e,
        other => ApimBackupError::authentication(other.to_string()),
    })?;

    tracing::debug!(
        method = %provider.method(),
        expires_on = %token.expires_on,
        "Acquired management token"
    );
    Ok(token)
}
