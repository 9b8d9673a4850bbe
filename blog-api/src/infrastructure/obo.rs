//! On-behalf-of token exchange and the Graph `/me` lookup built on it.

use crate::domain::DomainError;
use crate::infrastructure::config::IdentityConfig;
use crate::infrastructure::oidc::Principal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Outcome of a Graph lookup. Failures never fail the request.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GraphEnrichment {
    Fetched { profile: Value },
    Skipped { reason: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct OnBehalfOfClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    me_url: String,
}

impl OnBehalfOfClient {
    pub fn new(http: reqwest::Client, config: &IdentityConfig) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            client_id: config.app_client_id.clone(),
            client_secret: config.graph_secret.clone(),
            scope: config.graph_scope.clone(),
            me_url: config.graph_me_url(),
        }
    }

    pub async fn enrich(&self, principal: &Principal) -> GraphEnrichment {
        let outcome = match self.exchange(&principal.access_token).await {
            Ok(token) => self.me(&token).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(profile) => GraphEnrichment::Fetched { profile },
            Err(err) => {
                tracing::warn!(
                    "Skipping Graph enrichment for {}: {}",
                    principal.subject,
                    err
                );
                GraphEnrichment::Skipped {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn exchange(&self, assertion: &str) -> Result<String, DomainError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("assertion", assertion),
                ("scope", self.scope.as_str()),
                ("requested_token_use", "on_behalf_of"),
            ])
            .send()
            .await
            .map_err(|e| {
                DomainError::UpstreamUnavailable(format!("Token exchange failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            // The provider puts a short error code in `error`; the description can be long
            let code = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "unknown_error".to_string());
            return Err(DomainError::UpstreamUnavailable(format!(
                "Token exchange returned {} ({})",
                status, code
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            DomainError::UpstreamUnavailable(format!("Token exchange response unreadable: {}", e))
        })?;

        tracing::debug!("Exchanged caller token for a Graph token");
        Ok(token.access_token)
    }

    async fn me(&self, token: &str) -> Result<Value, DomainError> {
        self.http
            .get(&self.me_url)
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DomainError::UpstreamUnavailable(format!("Graph request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| {
                DomainError::UpstreamUnavailable(format!("Graph response unreadable: {}", e))
            })
    }
}
