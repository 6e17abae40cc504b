//! Whitelisted verifier reference codes.
//!
//! A reference code selects which credential request the wallet app presents
//! to the customer. The verifier uses the same strings as credential types in
//! its result payloads.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference codes accepted by this terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceCode {
    /// MRT entry pass.
    #[serde(rename = "00000000_iris_enter_mrt")]
    EnterMrt,
    /// Invoice carrier barcode.
    #[serde(rename = "00000000_iris_invoice_code")]
    InvoiceCode,
    /// EasyCard transit card.
    #[serde(rename = "00000000_iris_easycard")]
    EasyCard,
    /// Student identity.
    #[serde(rename = "00000000_irisstudent")]
    Student,
    /// Senior citizen identity.
    #[serde(rename = "00000000_irisold")]
    Senior,
}

impl ReferenceCode {
    /// Every whitelisted code.
    pub const ALL: [Self; 5] = [
        Self::EnterMrt,
        Self::InvoiceCode,
        Self::EasyCard,
        Self::Student,
        Self::Senior,
    ];

    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnterMrt => "00000000_iris_enter_mrt",
            Self::InvoiceCode => "00000000_iris_invoice_code",
            Self::EasyCard => "00000000_iris_easycard",
            Self::Student => "00000000_irisstudent",
            Self::Senior => "00000000_irisold",
        }
    }

    /// Parse a raw, possibly missing, reference value from a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the value is missing, empty or not
    /// whitelisted.
    pub fn parse_request(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") => Err(Error::Validation("missing ref".to_string())),
            Some(value) => value.parse(),
        }
    }
}

impl FromStr for ReferenceCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("invalid ref value: {s}")))
    }
}

impl fmt::Display for ReferenceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
