//! OAuth refresh-token exchange against the Google token endpoint

use std::fmt;
use std::time::Duration;

use calsync_domain::{GoogleConfig, ProviderResult};
use reqwest::Client;
use tracing::{debug, instrument};

use super::google::check_response;
use super::types::GoogleTokenRefreshResponse;
use crate::errors::transport_error;

/// Subtracted from `expires_in` so a cached token is never used at the edge
/// of its lifetime.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Short-lived access token together with how long it may be cached.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub ttl: Duration,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken").field("token", &"<redacted>").field("ttl", &self.ttl).finish()
    }
}

/// Exchanges stored refresh tokens for access tokens.
#[derive(Clone)]
pub struct OAuthTokenClient {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthTokenClient {
    pub fn new(http: Client, config: &GoogleConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Run the `refresh_token` grant.
    ///
    /// # Errors
    /// `ProviderError::AccessRevoked` when Google answers `invalid_grant`
    /// (the user revoked access or the refresh token expired).
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> ProviderResult<AccessToken> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let refreshed: GoogleTokenRefreshResponse =
            check_response(response).await?.json().await.map_err(|e| transport_error(&e))?;

        let lifetime =
            refreshed.expires_in.map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
        let ttl = lifetime.saturating_sub(EXPIRY_MARGIN);
        debug!(ttl_secs = ttl.as_secs(), "access token refreshed");

        Ok(AccessToken { token: refreshed.access_token, ttl })
    }
}
