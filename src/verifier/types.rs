//! Verifier API payloads.
//!
//! Only the fields this crate reads are modelled. The verification payload
//! is kept verbatim next to the parsed view so it can be passed through and
//! shown for diagnostics.

use crate::error::{Error, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Data-URI prefix the verifier puts in front of the QR code image.
const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Transaction identifier correlating QR generation with result polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a fresh random (UUID v4) identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Success body of `GET /qrcode`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QrCodeResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub qrcode_image: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
}

/// QR code image as returned by the verifier (base64 PNG data URI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrArtifact {
    data_uri: String,
}

impl QrArtifact {
    /// Wrap a data URI (or bare base64 string).
    #[must_use]
    pub fn new(data_uri: impl Into<String>) -> Self {
        Self {
            data_uri: data_uri.into(),
        }
    }

    /// The raw value from the verifier.
    #[must_use]
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Decode the PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Artifact`] if the payload is not valid base64.
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        let encoded = self
            .data_uri
            .strip_prefix(PNG_DATA_URI_PREFIX)
            .unwrap_or(&self.data_uri);
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Artifact(format!("base64 decode failed: {e}")))
    }
}

/// A verification transaction freshly opened on the verifier.
#[derive(Debug, Clone)]
pub struct CreatedTransaction {
    /// Identifier to poll the result with.
    pub transaction_id: TransactionId,
    /// Deep link that opens the wallet app.
    pub auth_uri: Option<String>,
    /// QR code encoding the deep link.
    pub qr_artifact: QrArtifact,
}

/// One named attribute inside a credential.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// Internal field name.
    pub ename: Option<String>,
    /// Display name.
    pub cname: Option<String>,
    /// Claim value, untyped.
    pub value: Value,
}

/// One credential presented by the wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    /// Credential type, matching a reference code string.
    pub credential_type: String,
    /// Claims in upstream order.
    pub claims: Vec<Claim>,
}

/// Result of `POST /result`.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    /// Overall verdict of the verifier.
    pub verified: bool,
    /// Credentials listed under `data`.
    pub credentials: Vec<Credential>,
    /// The full payload as received.
    pub raw: Value,
}

impl VerificationResult {
    /// Build the partial view over a raw payload.
    ///
    /// Never fails: entries with an unexpected shape are skipped and a
    /// missing `verifyResult` counts as not verified.
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let verified = raw
            .get("verifyResult")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let credentials = raw
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_credential).collect())
            .unwrap_or_default();

        Self {
            verified,
            credentials,
            raw,
        }
    }

    /// Returns true if any top-level credential has the given type.
    #[must_use]
    pub fn has_credential(&self, credential_type: &str) -> bool {
        self.credentials
            .iter()
            .any(|c| c.credential_type == credential_type)
    }
}

fn parse_credential(item: &Value) -> Option<Credential> {
    let credential_type = item.get("credentialType")?.as_str()?.to_string();
    let claims = item
        .get("claims")
        .and_then(Value::as_array)
        .map(|claims| claims.iter().filter_map(parse_claim).collect())
        .unwrap_or_default();
    Some(Credential {
        credential_type,
        claims,
    })
}

fn parse_claim(item: &Value) -> Option<Claim> {
    let object = item.as_object()?;
    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
    Some(Claim {
        ename: text("ename"),
        cname: text("cname"),
        value: object.get("value").cloned().unwrap_or(Value::Null),
    })
}
