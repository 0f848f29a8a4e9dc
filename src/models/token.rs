// Token lease for the aggregator API. Process-local, never persisted.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use zeroize::Zeroizing;

/// Response body of `POST /token/new/` and `POST /token/refresh/`.
///
/// The refresh endpoint may omit the refresh pair, in which case the caller
/// keeps the refresh token it already holds.
#[derive(Deserialize)]
pub struct TokenGrant {
    pub access: String,
    pub access_expires: i64,
    pub refresh: Option<String>,
    pub refresh_expires: Option<i64>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_expires", &self.access_expires)
            .field("refresh_expires", &self.refresh_expires)
            .finish_non_exhaustive()
    }
}

/// Where a lease stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    AccessValid,
    RefreshValidOnly,
    Expired,
}

/// The current bearer credential for the aggregator.
pub struct TokenLease {
    pub access_token: Zeroizing<String>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: Zeroizing<String>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenLease {
    /// Build a lease from a full credential exchange. Expiries are absolute:
    /// `now + ttl`.
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Option<Self> {
        let refresh = grant.refresh?;
        let refresh_ttl = grant.refresh_expires?;
        Some(Self {
            access_token: Zeroizing::new(grant.access),
            access_expires_at: now + Duration::seconds(grant.access_expires),
            refresh_token: Zeroizing::new(refresh),
            refresh_expires_at: now + Duration::seconds(refresh_ttl),
        })
    }

    /// Apply a refresh response in place. A grant that carries a new refresh
    /// pair replaces it; otherwise the existing refresh token is kept.
    pub fn apply_refresh(&mut self, grant: TokenGrant, now: DateTime<Utc>) {
        self.access_token = Zeroizing::new(grant.access);
        self.access_expires_at = now + Duration::seconds(grant.access_expires);
        if let (Some(refresh), Some(ttl)) = (grant.refresh, grant.refresh_expires) {
            self.refresh_token = Zeroizing::new(refresh);
            self.refresh_expires_at = now + Duration::seconds(ttl);
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> LeaseState {
        if now < self.access_expires_at {
            LeaseState::AccessValid
        } else if now < self.refresh_expires_at {
            LeaseState::RefreshValidOnly
        } else {
            LeaseState::Expired
        }
    }
}

impl std::fmt::Debug for TokenLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLease")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}
