//! Ledger (personal-finance bookkeeping) API client. Authenticates with a
//! static personal access token.

use chrono::NaiveDate;
use zeroize::Zeroizing;

use super::{join_url, send_json, UpstreamError};
use crate::models::ledger::{
    Asset, AssetsEnvelope, ExistingTransaction, InsertTransactionsBody, InsertedIds,
    LedgerTransaction, TransactionsEnvelope,
};

const SERVICE: &str = "ledger";

/// The ledger accepts at most this many transactions per insert call.
pub const INSERT_BATCH_SIZE: usize = 500;

#[derive(Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Zeroizing<String>,
}

impl LedgerClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        access_token: Zeroizing<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            access_token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, join_url(&self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(self.access_token.as_str())
    }

    /// Every asset, in the order the ledger returns them.
    pub async fn list_assets(&self) -> Result<Vec<Asset>, UpstreamError> {
        let req = self.request(reqwest::Method::GET, "assets");
        let envelope: AssetsEnvelope = send_json(SERVICE, "fetch assets", req).await?;
        Ok(envelope.assets)
    }

    /// Transactions of one asset between two dates, inclusive.
    pub async fn list_transactions(
        &self,
        asset_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ExistingTransaction>, UpstreamError> {
        let req = self.request(reqwest::Method::GET, "transactions").query(&[
            ("asset_id", asset_id.to_string()),
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
        ]);
        let envelope: TransactionsEnvelope =
            send_json(SERVICE, "fetch transactions", req).await?;
        Ok(envelope.transactions)
    }

    /// Insert transactions in batches. Returns the ids the ledger assigned.
    pub async fn insert_transactions(
        &self,
        transactions: &[LedgerTransaction],
    ) -> Result<Vec<i64>, UpstreamError> {
        let mut ids = Vec::with_capacity(transactions.len());
        for batch in transactions.chunks(INSERT_BATCH_SIZE) {
            let body = InsertTransactionsBody {
                transactions: batch,
                check_for_recurring: true,
                debit_as_negative: true,
            };
            let req = self.request(reqwest::Method::POST, "transactions").json(&body);
            let inserted: InsertedIds = send_json(SERVICE, "create transactions", req).await?;
            tracing::info!(
                batch = batch.len(),
                inserted = inserted.ids.len(),
                "sent transactions to ledger"
            );
            ids.extend(inserted.ids);
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
