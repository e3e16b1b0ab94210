//! OAuth code exchange and identity lookup against Discord.

use poise::serenity_prelude::UserId;
use serde::Deserialize;
use std::time::Duration;
use tracing::error;

use crate::config::GateConfig;
use crate::error::{GateError, Result};

const TOKEN_ENDPOINT: &str = "https://discord.com/api/oauth2/token";
const IDENTITY_ENDPOINT: &str = "https://discord.com/api/users/@me";

/// Bounded timeout for provider calls so a slow upstream fails the request
/// instead of hanging it.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth credentials plus the HTTP client used for the provider endpoints.
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http_client: reqwest::Client,
}

/// Discord OAuth token response
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Discord user info from /users/@me
#[derive(Deserialize, Debug)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
}

impl DiscordUser {
    pub fn user_id(&self) -> Result<UserId> {
        self.id
            .parse::<u64>()
            .map(UserId::new)
            .map_err(|_| GateError::Upstream {
                message: "identity endpoint returned a malformed user id".to_string(),
            })
    }
}

impl OAuthClient {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            http_client: reqwest::Client::builder()
                .timeout(PROVIDER_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Trade the authorization code for an access credential. The redirect
    /// URI must match the one embedded in the authorization URL exactly.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let response = self
            .http_client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            // Status only; the body may echo request parameters back.
            error!("Token exchange failed with status {}", response.status());
            return Err(GateError::Upstream {
                message: format!("token endpoint returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }

    /// Resolve the authenticated subject behind an access credential.
    pub async fn fetch_identity(&self, token: &TokenResponse) -> Result<DiscordUser> {
        let response = self
            .http_client
            .get(IDENTITY_ENDPOINT)
            .header(
                "Authorization",
                format!("{} {}", token.token_type, token.access_token),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            error!("Identity fetch failed with status {}", response.status());
            return Err(GateError::Upstream {
                message: format!("identity endpoint returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_parses_into_a_user_id() {
        let user = DiscordUser {
            id: "123456789012345678".to_string(),
            username: "someone".to_string(),
            global_name: None,
        };
        assert_eq!(user.user_id().unwrap(), UserId::new(123456789012345678));
    }

    #[test]
    fn malformed_identity_is_an_upstream_error() {
        let user = DiscordUser {
            id: "not-a-snowflake".to_string(),
            username: "someone".to_string(),
            global_name: None,
        };
        assert!(matches!(user.user_id(), Err(GateError::Upstream { .. })));
    }
}
