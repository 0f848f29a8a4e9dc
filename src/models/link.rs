//! Account links: the user-asserted equivalence between one ledger asset and
//! one aggregator bank account.
//!
//! The link set is a partial injective mapping in both directions: no two
//! links share a ledger asset id and no two links share an aggregator account
//! id. Every mutation on [`LinkRecord`] preserves that.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single link. Field names on the wire match the durable record format
/// shared with the frontend (`lunchmoneyId`, `gocardlessId`, `createdAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    #[serde(rename = "lunchmoneyId")]
    pub ledger_asset_id: i64,
    #[serde(rename = "gocardlessId")]
    pub aggregator_account_id: String,
    #[serde(rename = "createdAt", deserialize_with = "utc_or_naive")]
    pub created_at: DateTime<Utc>,
}

/// RFC 3339, or a timestamp without offset (read as UTC) as older servers
/// wrote it.
fn utc_or_naive<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid createdAt '{}': {}", raw, e)))
}

/// The full durable link record: `{ "links": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(default)]
    pub links: Vec<AccountLink>,
}

impl LinkRecord {
    /// Link `ledger_asset_id` to `aggregator_account_id`.
    ///
    /// Both sides are freed of any prior link before the new one is inserted,
    /// so relinking the same pair only refreshes `created_at`.
    pub fn link(
        &mut self,
        ledger_asset_id: i64,
        aggregator_account_id: &str,
        now: DateTime<Utc>,
    ) {
        self.links.retain(|l| {
            l.ledger_asset_id != ledger_asset_id
                && l.aggregator_account_id != aggregator_account_id
        });
        self.links.push(AccountLink {
            ledger_asset_id,
            aggregator_account_id: aggregator_account_id.to_string(),
            created_at: now,
        });
    }

    /// Remove links for `ledger_asset_id`, optionally narrowed to a specific
    /// aggregator account. Returns how many links were removed.
    pub fn unlink(&mut self, ledger_asset_id: i64, aggregator_account_id: Option<&str>) -> usize {
        let before = self.links.len();
        self.links.retain(|l| {
            let same_asset = l.ledger_asset_id == ledger_asset_id;
            let same_account =
                aggregator_account_id.map_or(true, |id| l.aggregator_account_id == id);
            !(same_asset && same_account)
        });
        before - self.links.len()
    }

    /// Aggregator account linked to a ledger asset, if any.
    pub fn linked_account(&self, ledger_asset_id: i64) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.ledger_asset_id == ledger_asset_id)
            .map(|l| l.aggregator_account_id.as_str())
    }

    /// Ledger asset linked to an aggregator account, if any.
    pub fn linked_asset(&self, aggregator_account_id: &str) -> Option<i64> {
        self.links
            .iter()
            .find(|l| l.aggregator_account_id == aggregator_account_id)
            .map(|l| l.ledger_asset_id)
    }

    /// True when no ledger id and no aggregator id appears twice.
    pub fn is_injective(&self) -> bool {
        let mut assets = std::collections::HashSet::new();
        let mut accounts = std::collections::HashSet::new();
        self.links.iter().all(|l| {
            assets.insert(l.ledger_asset_id) && accounts.insert(l.aggregator_account_id.as_str())
        })
    }
}
