//! Per-user Google client construction with an access-token cache

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use calsync_core::{CalendarProviderClient, ProviderClientFactory};
use calsync_domain::{GoogleConfig, ProviderError, ProviderResult, Result};
use moka::future::Cache;
use moka::Expiry;
use reqwest::Client;
use tracing::{debug, instrument};

use super::google::GoogleCalendarClient;
use super::oauth::{AccessToken, OAuthTokenClient};
use crate::database::SqliteCredentialRepository;
use crate::errors::InfraError;

const TOKEN_CACHE_CAPACITY: u64 = 10_000;

/// Expires each cached token after its own `ttl`.
struct AccessTokenExpiry;

impl Expiry<String, AccessToken> for AccessTokenExpiry {
    fn expire_after_create(
        &self,
        _user_id: &String,
        token: &AccessToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(token.ttl)
    }
}

/// Access tokens per user, refreshed from the stored refresh token on miss.
///
/// Concurrent requests for the same user share one token refresh.
pub struct AccessTokens {
    oauth: OAuthTokenClient,
    credentials: Arc<SqliteCredentialRepository>,
    cache: Cache<String, AccessToken>,
}

impl AccessTokens {
    pub fn new(oauth: OAuthTokenClient, credentials: Arc<SqliteCredentialRepository>) -> Self {
        Self {
            oauth,
            credentials,
            cache: Cache::builder()
                .max_capacity(TOKEN_CACHE_CAPACITY)
                .expire_after(AccessTokenExpiry)
                .build(),
        }
    }

    /// # Errors
    /// `ProviderError::AccessRevoked` when no grant is stored or Google
    /// answers `invalid_grant`.
    pub async fn get(&self, user_id: &str) -> ProviderResult<AccessToken> {
        self.cache
            .try_get_with(user_id.to_owned(), async {
                let refresh_token = self
                    .credentials
                    .refresh_token(user_id)
                    .await
                    .map_err(|e| ProviderError::Other(e.to_string()))?
                    .ok_or_else(|| {
                        ProviderError::AccessRevoked(format!(
                            "no provider grant stored for user {user_id}"
                        ))
                    })?;
                self.oauth.refresh_access_token(&refresh_token).await
            })
            .await
            .map_err(|e: Arc<ProviderError>| (*e).clone())
    }

    pub async fn forget(&self, user_id: &str) {
        self.cache.invalidate(user_id).await;
    }
}

/// Builds [`GoogleCalendarClient`]s from stored refresh tokens.
pub struct GoogleClientFactory {
    http: Client,
    config: GoogleConfig,
    tokens: Arc<AccessTokens>,
}

impl GoogleClientFactory {
    /// # Errors
    /// Returns `CalSyncError::Network` if the HTTP client cannot be built.
    pub fn new(config: GoogleConfig, credentials: Arc<SqliteCredentialRepository>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(InfraError::from)?;
        let oauth = OAuthTokenClient::new(http.clone(), &config);

        Ok(Self { http, config, tokens: Arc::new(AccessTokens::new(oauth, credentials)) })
    }

    /// Drop a cached access token, forcing a refresh on next use.
    pub async fn forget(&self, user_id: &str) {
        self.tokens.forget(user_id).await;
    }
}

#[async_trait]
impl ProviderClientFactory for GoogleClientFactory {
    /// The token is fetched up front so a revoked grant surfaces here.
    #[instrument(skip(self))]
    async fn client_for(&self, user_id: &str) -> ProviderResult<Arc<dyn CalendarProviderClient>> {
        self.tokens.get(user_id).await?;
        debug!(user_id, "provider client ready");
        Ok(Arc::new(GoogleCalendarClient::with_token_cache(
            self.http.clone(),
            &self.config,
            user_id,
            Arc::clone(&self.tokens),
        )))
    }
}
