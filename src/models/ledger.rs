//! Ledger-side shapes: assets (financial accounts) and transactions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A ledger asset. Unknown fields pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Unknown Account")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssetsEnvelope {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// An asset annotated with the aggregator account it is linked to.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedAsset {
    #[serde(flatten)]
    pub asset: Asset,
    pub linked_account: Option<String>,
}

/// A transaction in the shape the ledger's insert endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub date: String,
    pub amount: String,
    pub currency: String,
    pub payee: String,
    pub notes: String,
    pub asset_id: i64,
    pub external_id: String,
    pub status: String,
}

/// A transaction already stored in the ledger; only the dedupe key matters.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingTransaction {
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TransactionsEnvelope {
    #[serde(default)]
    pub transactions: Vec<ExistingTransaction>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InsertTransactionsBody<'a> {
    pub transactions: &'a [LedgerTransaction],
    pub check_for_recurring: bool,
    pub debit_as_negative: bool,
}

/// Response of the insert endpoint: ids of the created transactions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsertedIds {
    #[serde(default)]
    pub ids: Vec<i64>,
}
