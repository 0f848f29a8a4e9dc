//! Read-through shapes of the open-banking aggregator's entities.
//!
//! Only the fields the service acts on are typed; everything else is carried
//! in `extra` so responses pass through to the frontend unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A bank-connection grant. `accounts` holds aggregator account ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requisition {
    pub id: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Paginated requisition listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequisitionPage {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Requisition>,
}

impl RequisitionPage {
    /// Oldest first. Requisitions without a creation time sort first.
    pub fn sort_by_created(&mut self) {
        self.results.sort_by_key(|r| r.created);
    }
}

/// A requisition whose account ids were resolved to full account details.
#[derive(Debug, Clone, Serialize)]
pub struct RequisitionDetail {
    #[serde(flatten)]
    pub requisition: RequisitionSummary,
    pub accounts: Vec<AccountDetails>,
}

/// Requisition fields other than `accounts`, kept for [`RequisitionDetail`].
#[derive(Debug, Clone, Serialize)]
pub struct RequisitionSummary {
    pub id: String,
    pub created: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub institution_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Requisition> for RequisitionSummary {
    fn from(r: Requisition) -> Self {
        Self {
            id: r.id,
            created: r.created,
            status: r.status,
            institution_id: r.institution_id,
            extra: r.extra,
        }
    }
}

/// Body of `POST /requisitions/` as the frontend sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequisition {
    pub institution_id: String,
    pub redirect_url: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub user_language: Option<String>,
}

/// The aggregator's own request shape for creating a requisition.
#[derive(Debug, Serialize)]
pub(crate) struct CreateRequisitionBody<'a> {
    pub institution_id: &'a str,
    pub redirect: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_language: Option<&'a str>,
}

impl<'a> From<&'a NewRequisition> for CreateRequisitionBody<'a> {
    fn from(r: &'a NewRequisition) -> Self {
        Self {
            institution_id: &r.institution_id,
            redirect: &r.redirect_url,
            reference: r.reference.as_deref(),
            user_language: r.user_language.as_deref(),
        }
    }
}

/// Metadata of one bank account at the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetails {
    pub id: String,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Institution {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bic: Option<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Amount {
    pub amount: String,
    pub currency: String,
}

/// One transaction as reported by the aggregator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub internal_transaction_id: Option<String>,
    #[serde(default)]
    pub booking_date: Option<String>,
    #[serde(default)]
    pub value_date: Option<String>,
    pub transaction_amount: Amount,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub creditor_name: Option<String>,
    #[serde(default)]
    pub debtor_name: Option<String>,
    #[serde(default)]
    pub remittance_information_unstructured: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionBuckets {
    #[serde(default)]
    pub booked: Vec<BankTransaction>,
    #[serde(default)]
    pub pending: Vec<BankTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TransactionsEnvelope {
    #[serde(default)]
    pub transactions: TransactionBuckets,
}

/// Per-account request quota the aggregator reports in response headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u32,
    pub remaining: u32,
    pub reset: DateTime<Utc>,
}

/// Result of a transaction fetch. `rate_limited` is set when the aggregator
/// answered 429; `transactions` is then empty.
#[derive(Debug, Clone)]
pub struct TransactionFetch {
    pub transactions: TransactionBuckets,
    pub rate_limit: RateLimit,
    pub rate_limited: bool,
}
