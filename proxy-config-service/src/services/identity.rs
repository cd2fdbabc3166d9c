//! External identity provider (GitHub OAuth) behind a trait.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::error::ServiceError;
use crate::config::GithubConfig;
use crate::models::ExternalIdentity;

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the exchange.
    fn authorization_url(&self, state: &str) -> String;

    /// Trade an authorization code for the provider's view of the user.
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ServiceError>;
}

/// Token endpoint answer. GitHub reports failures with a 200 and an `error` field.
#[derive(Debug, Deserialize)]
struct GithubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
}

impl From<GithubUser> for ExternalIdentity {
    fn from(user: GithubUser) -> Self {
        let display_name = user
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(user.login);
        ExternalIdentity {
            provider_id: user.id,
            display_name,
            avatar_url: user.avatar_url,
        }
    }
}

#[derive(Clone)]
pub struct GithubIdentityProvider {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubIdentityProvider {
    pub fn new(config: GithubConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("proxy-config-service/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn exchange_token(&self, code: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(GITHUB_TOKEN_URL)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret().as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::IdentityProvider(format!("Failed to contact GitHub: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::IdentityProvider(format!(
                "GitHub token endpoint returned {}",
                response.status()
            )));
        }

        let body = response
            .json::<GithubTokenResponse>()
            .await
            .map_err(|e| ServiceError::IdentityProvider(format!("Failed to parse GitHub response: {}", e)))?;

        match (body.access_token, body.error) {
            (Some(token), None) => Ok(token),
            (_, error) => {
                tracing::warn!(
                    error = ?error,
                    description = ?body.error_description,
                    "GitHub rejected authorization code"
                );
                Err(ServiceError::IdentityProvider(
                    "GitHub rejected the authorization code".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for GithubIdentityProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&state={}",
            GITHUB_AUTHORIZE_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
        )
    }

    #[tracing::instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ServiceError> {
        let token = self.exchange_token(code).await?;

        let response = self
            .client
            .get(GITHUB_USER_URL)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ServiceError::IdentityProvider(format!("Failed to contact GitHub: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::IdentityProvider(format!(
                "GitHub user endpoint returned {}",
                response.status()
            )));
        }

        let user = response
            .json::<GithubUser>()
            .await
            .map_err(|e| ServiceError::IdentityProvider(format!("Failed to parse GitHub user: {}", e)))?;

        tracing::info!(provider_id = user.id, "GitHub identity resolved");
        Ok(user.into())
    }
}

/// Accepts exactly one code and answers with a fixed identity.
pub struct MockIdentityProvider {
    pub code: String,
    pub identity: ExternalIdentity,
}

impl MockIdentityProvider {
    pub fn new(code: impl Into<String>, identity: ExternalIdentity) -> Self {
        Self {
            code: code.into(),
            identity,
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://identity.test/authorize?state={}", urlencoding::encode(state))
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ServiceError> {
        if code == self.code {
            Ok(self.identity.clone())
        } else {
            Err(ServiceError::IdentityProvider("unknown code".to_string()))
        }
    }
}
