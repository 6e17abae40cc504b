//! Receipt composed from a verification result.

use crate::claims::{self, CarrierIdentifier};
use crate::pricing::PricingDecision;
use crate::verifier::{TransactionId, VerificationResult};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Everything printed for a completed verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Transaction the receipt belongs to.
    pub transaction_id: TransactionId,
    /// Upstream verdict.
    pub verified: bool,
    /// Carrier or card identifier, if one was presented.
    pub carrier: Option<CarrierIdentifier>,
    /// Price breakdown.
    pub pricing: PricingDecision,
    /// Full verifier payload, for diagnostics only.
    pub raw: Value,
}

impl Receipt {
    /// Build a receipt by interpreting `result` and pricing `base_amount`.
    #[must_use]
    pub fn build(transaction_id: TransactionId, result: &VerificationResult, base_amount: Decimal) -> Self {
        let pricing = PricingDecision::decide(
            base_amount,
            claims::is_student(result),
            claims::is_senior(result),
        );
        Self {
            transaction_id,
            verified: result.verified,
            carrier: claims::extract_carrier_identifier(result),
            pricing,
            raw: result.raw.clone(),
        }
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pricing = &self.pricing;
        writeln!(f, "POS 收銀系統 - 交易完成")?;
        writeln!(f, "身份驗證: {}", if self.verified { "已驗證" } else { "待驗證" })?;
        writeln!(f, "身份類別: {}", pricing.identity)?;
        if let Some(carrier) = &self.carrier {
            writeln!(f, "{}: {}", carrier.label, carrier.value)?;
        }
        writeln!(f, "商品金額: NT$ {}", pricing.base_amount.round())?;
        if pricing.is_discounted() {
            writeln!(
                f,
                "優惠折扣 -{}%: -NT$ {}",
                pricing.discount_percent(),
                pricing.discount_amount
            )?;
        }
        writeln!(f, "應付金額: NT$ {}", pricing.final_amount)?;
        writeln!(f, "交易序號: {}", self.transaction_id)?;
        let raw = serde_json::to_string_pretty(&self.raw).map_err(|_| fmt::Error)?;
        write!(f, "\n{raw}")
    }
}

/// What the result page shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptView {
    /// No transaction has been generated (or it expired).
    NoTransaction,
    /// Waiting for the customer to upload, or the verifier is failing.
    Pending {
        /// Transaction being waited on.
        transaction_id: TransactionId,
    },
    /// Verification finished.
    Ready(Box<Receipt>),
}

impl fmt::Display for ReceiptView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTransaction => {
                writeln!(f, "POS 收銀系統 - 等待交易")?;
                write!(f, "尚未產生交易")
            }
            Self::Pending { transaction_id } => {
                writeln!(f, "POS 收銀系統 - 處理中")?;
                writeln!(f, "等待驗證結果")?;
                write!(f, "交易序號: {transaction_id}")
            }
            Self::Ready(receipt) => write!(f, "{receipt}"),
        }
    }
}
