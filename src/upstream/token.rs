//! Aggregator token lifecycle.
//!
//! `TokenManager` owns the one lease for its aggregator and hands out access
//! tokens. Callers never see refresh or expiry:
//! 1. access still valid → cached token, no network call
//! 2. access expired, refresh valid → `POST /token/refresh/`; any failure
//!    falls through to step 3
//! 3. otherwise → `POST /token/new/` with the client credentials; failure here
//!    is returned to the caller
//!
//! The lease sits behind an async mutex that is held across the exchange, so
//! callers racing on an expired lease wait for the in-flight exchange and reuse
//! its result instead of issuing their own.

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use super::{join_url, send_json, UpstreamError};
use crate::models::token::{LeaseState, TokenGrant, TokenLease};

const SERVICE: &str = "aggregator";

/// Long-lived client credentials issued by the aggregator.
#[derive(Clone)]
pub struct AggregatorCredentials {
    pub secret_id: String,
    pub secret_key: Zeroizing<String>,
}

impl std::fmt::Debug for AggregatorCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorCredentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"****")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to create aggregator token: {0}")]
    Authentication(#[source] UpstreamError),

    #[error("aggregator token response did not include a refresh token")]
    IncompleteGrant,
}

pub struct TokenManager {
    http: reqwest::Client,
    base_url: String,
    credentials: AggregatorCredentials,
    lease: Mutex<Option<TokenLease>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: AggregatorCredentials,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
            lease: Mutex::new(None),
        }
    }

    /// Start from an already known lease, e.g. one handed over by a previous
    /// manager.
    pub fn with_lease(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: AggregatorCredentials,
        lease: TokenLease,
    ) -> Self {
        Self {
            lease: Mutex::new(Some(lease)),
            ..Self::new(http, base_url, credentials)
        }
    }

    /// A currently valid access token.
    pub async fn access_token(&self) -> Result<String, TokenError> {
        let mut guard = self.lease.lock().await;

        if let Some(current) = guard.as_mut() {
            match current.state(Utc::now()) {
                LeaseState::AccessValid => return Ok(current.access_token.to_string()),
                LeaseState::RefreshValidOnly => {
                    match self.refresh(current.refresh_token.as_str()).await {
                        Ok(grant) => {
                            current.apply_refresh(grant, Utc::now());
                            tracing::debug!(
                                expires_at = %current.access_expires_at,
                                "aggregator access token refreshed"
                            );
                            return Ok(current.access_token.to_string());
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "token refresh failed, re-authenticating");
                        }
                    }
                }
                LeaseState::Expired => {}
            }
        }

        let fresh = self.create().await?;
        let token = fresh.access_token.to_string();
        tracing::info!(
            access_expires_at = %fresh.access_expires_at,
            refresh_expires_at = %fresh.refresh_expires_at,
            "issued new aggregator token"
        );
        *guard = Some(fresh);
        Ok(token)
    }

    /// Drop the current lease; the next call performs a full exchange.
    pub async fn invalidate(&self) {
        self.lease.lock().await.take();
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, UpstreamError> {
        let req = self
            .http
            .post(join_url(&self.base_url, "token/refresh/"))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({ "refresh": refresh_token }));
        send_json(SERVICE, "refresh token", req).await
    }

    async fn create(&self) -> Result<TokenLease, TokenError> {
        let req = self
            .http
            .post(join_url(&self.base_url, "token/new/"))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({
                "secret_id": self.credentials.secret_id,
                "secret_key": self.credentials.secret_key.as_str(),
            }));

        let grant: TokenGrant = send_json(SERVICE, "create token", req)
            .await
            .map_err(TokenError::Authentication)?;

        TokenLease::from_grant(grant, Utc::now()).ok_or(TokenError::IncompleteGrant)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
