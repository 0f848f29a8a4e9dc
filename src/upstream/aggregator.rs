//! Aggregator (open-banking) API client.
//!
//! Every request asks the [`TokenManager`] for a token right before it is
//! sent; nothing is cached here.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::try_join_all;
use reqwest::header::HeaderMap;

use super::token::{TokenError, TokenManager};
use super::{join_url, send, send_json, UpstreamError};
use crate::models::aggregator::{
    AccountDetails, CreateRequisitionBody, Institution, NewRequisition, RateLimit, Requisition,
    RequisitionDetail, RequisitionPage, TransactionBuckets, TransactionFetch,
    TransactionsEnvelope,
};

const SERVICE: &str = "aggregator";

const RATE_LIMIT_HEADER: &str = "http_x_ratelimit_account_success_limit";
const RATE_REMAINING_HEADER: &str = "http_x_ratelimit_account_success_remaining";
const RATE_RESET_HEADER: &str = "http_x_ratelimit_account_success_reset";

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[derive(Clone, Debug)]
pub struct AggregatorClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl AggregatorClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    async fn authorized(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, TokenError> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http
            .request(method, join_url(&self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(token))
    }

    /// All requisitions, oldest first.
    pub async fn list_requisitions(&self) -> Result<RequisitionPage, AggregatorError> {
        let req = self.authorized(reqwest::Method::GET, "requisitions/").await?;
        let mut page: RequisitionPage = send_json(SERVICE, "fetch requisitions", req).await?;
        page.sort_by_created();
        Ok(page)
    }

    pub async fn get_requisition(&self, id: &str) -> Result<Requisition, AggregatorError> {
        let req = self
            .authorized(reqwest::Method::GET, &format!("requisitions/{}/", id))
            .await?;
        Ok(send_json(SERVICE, "fetch requisition details", req).await?)
    }

    /// A requisition with every linked account resolved. One failed account
    /// lookup fails the whole call.
    pub async fn get_requisition_detail(
        &self,
        id: &str,
    ) -> Result<RequisitionDetail, AggregatorError> {
        let mut requisition = self.get_requisition(id).await?;
        let account_ids = std::mem::take(&mut requisition.accounts);

        let accounts = try_join_all(account_ids.iter().map(|acc| self.get_account(acc))).await?;

        Ok(RequisitionDetail {
            requisition: requisition.into(),
            accounts,
        })
    }

    pub async fn create_requisition(
        &self,
        params: &NewRequisition,
    ) -> Result<Requisition, AggregatorError> {
        let req = self
            .authorized(reqwest::Method::POST, "requisitions/")
            .await?
            .json(&CreateRequisitionBody::from(params));
        let created: Requisition = send_json(SERVICE, "create requisition", req).await?;
        tracing::info!(requisition_id = %created.id, institution = %params.institution_id, "requisition created");
        Ok(created)
    }

    pub async fn delete_requisition(&self, id: &str) -> Result<(), AggregatorError> {
        let req = self
            .authorized(reqwest::Method::DELETE, &format!("requisitions/{}/", id))
            .await?;
        send(SERVICE, "delete requisition", req).await?;
        tracing::info!(requisition_id = %id, "requisition deleted");
        Ok(())
    }

    pub async fn list_institutions(
        &self,
        country: &str,
    ) -> Result<Vec<Institution>, AggregatorError> {
        let req = self
            .authorized(reqwest::Method::GET, "institutions/")
            .await?
            .query(&[("country", country)]);
        Ok(send_json(SERVICE, "fetch institutions", req).await?)
    }

    pub async fn get_account(&self, id: &str) -> Result<AccountDetails, AggregatorError> {
        let req = self
            .authorized(reqwest::Method::GET, &format!("accounts/{}/", id))
            .await?;
        Ok(send_json(SERVICE, "fetch account details", req).await?)
    }

    /// Transactions booked since `date_from`.
    ///
    /// A 429 is not an error: the account's daily quota is spent, so the
    /// fetch comes back empty with `rate_limited` set.
    pub async fn get_transactions(
        &self,
        account_id: &str,
        date_from: NaiveDate,
    ) -> Result<TransactionFetch, AggregatorError> {
        let req = self
            .authorized(
                reqwest::Method::GET,
                &format!("accounts/{}/transactions/", account_id),
            )
            .await?
            .query(&[("date_from", date_from.format("%Y-%m-%d").to_string())]);

        let resp = req.send().await.map_err(|e| UpstreamError::Connectivity {
            service: SERVICE,
            source: e,
        })?;
        let rate_limit = rate_limit_from_headers(resp.headers(), Utc::now());

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(account_id, ?rate_limit, "aggregator rate limit reached");
            return Ok(TransactionFetch {
                transactions: TransactionBuckets::default(),
                rate_limit,
                rate_limited: true,
            });
        }
        if !resp.status().is_success() {
            return Err(
                UpstreamError::from_response(SERVICE, "fetch transactions", resp)
                    .await
                    .into(),
            );
        }

        let envelope: TransactionsEnvelope = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Decode {
                service: SERVICE,
                source: e,
            })?;

        Ok(TransactionFetch {
            transactions: envelope.transactions,
            rate_limit,
            rate_limited: false,
        })
    }
}

/// Read the per-account quota headers. Missing values count as zero; a
/// missing reset means the quota resets in 24 hours.
pub(crate) fn rate_limit_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> RateLimit {
    let number = |name: &str| -> Option<i64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };

    let reset_in = number(RATE_RESET_HEADER)
        .filter(|secs| *secs > 0)
        .map(Duration::seconds)
        .unwrap_or_else(|| Duration::hours(24));

    RateLimit {
        limit: number(RATE_LIMIT_HEADER).unwrap_or(0).clamp(0, u32::MAX as i64) as u32,
        remaining: number(RATE_REMAINING_HEADER)
            .unwrap_or(0)
            .clamp(0, u32::MAX as i64) as u32,
        reset: now + reset_in,
    }
}
