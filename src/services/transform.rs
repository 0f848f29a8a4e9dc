//! Aggregator transaction → ledger transaction.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::aggregator::BankTransaction;
use crate::models::ledger::LedgerTransaction;

const REMITTANCE_MARKER: &str = "remittanceinformation:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("transaction has no booking or value date")]
    MissingDate,
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("transaction has no id")]
    MissingId,
}

pub fn to_ledger_transaction(
    tx: &BankTransaction,
    ledger_asset_id: i64,
) -> Result<LedgerTransaction, TransformError> {
    let raw_date = tx
        .booking_date
        .as_deref()
        .or(tx.value_date.as_deref())
        .ok_or(TransformError::MissingDate)?;
    let date = parse_date(raw_date)?;

    let amount = Decimal::from_str(tx.transaction_amount.amount.trim())
        .map_err(|_| TransformError::InvalidAmount(tx.transaction_amount.amount.clone()))?
        .round_dp(2);

    let external_id = tx
        .internal_transaction_id
        .as_deref()
        .or(tx.transaction_id.as_deref())
        .filter(|id| !id.is_empty())
        .ok_or(TransformError::MissingId)?;

    Ok(LedgerTransaction {
        date: date.format("%Y-%m-%d").to_string(),
        amount: format!("{:.2}", amount),
        currency: tx.transaction_amount.currency.to_lowercase(),
        payee: payee(tx).to_string(),
        notes: notes(tx.remittance_information_unstructured.as_deref()),
        asset_id: ledger_asset_id,
        external_id: external_id.to_string(),
        status: "uncleared".to_string(),
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, TransformError> {
    let day = raw.trim().get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| TransformError::InvalidDate(raw.to_string()))
}

fn payee(tx: &BankTransaction) -> &str {
    [&tx.merchant_name, &tx.creditor_name, &tx.debtor_name]
        .into_iter()
        .filter_map(|name| name.as_deref().map(str::trim))
        .find(|name| !name.is_empty())
        .unwrap_or("Unknown")
}

fn notes(raw: Option<&str>) -> String {
    let raw = raw.unwrap_or_default();
    let text = if raw.contains(REMITTANCE_MARKER) {
        raw.split(REMITTANCE_MARKER).nth(1).unwrap_or_default()
    } else {
        raw
    };
    text.trim().to_string()
}
