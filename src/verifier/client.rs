//! HTTP client for the wallet verifier.

use super::types::{CreatedTransaction, QrArtifact, QrCodeResponse, TransactionId, VerificationResult};
use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::reference::ReferenceCode;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Header carrying the verifier access token.
const ACCESS_TOKEN_HEADER: &str = "Access-Token";

/// Why a result could not be returned.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The wallet has not uploaded a presentation yet; poll again later.
    #[error("verification result not available yet")]
    NotYetAvailable,

    /// Any other failure talking to the verifier.
    #[error("verifier failure{}: {detail}", status_suffix(.status))]
    UpstreamFailure {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Diagnostic detail.
        detail: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Client for the verifier's QR code and result endpoints.
///
/// Calls are plain request/response: there is no retry or backoff here, the
/// caller decides when to try again.
#[derive(Debug, Clone)]
pub struct VerifierClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl VerifierClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the access token is missing or the HTTP
    /// client cannot be built.
    pub fn new(config: &VerifierConfig) -> Result<Self> {
        if config.access_token.trim().is_empty() {
            return Err(Error::Config("verifier access token is not set".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("beacon-pos/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Open a verification transaction for `reference`.
    ///
    /// A fresh transaction id is generated for every call. If the verifier
    /// echoes an id back, the echoed one is used.
    ///
    /// # Errors
    ///
    /// * [`Error::UpstreamUnavailable`] - the verifier could not be reached
    /// * [`Error::UpstreamRejected`] - non-2xx response
    /// * [`Error::MalformedResponse`] - success body without a QR code image
    pub async fn create_transaction(&self, reference: ReferenceCode) -> Result<CreatedTransaction> {
        let transaction_id = TransactionId::generate();
        let url = format!("{}/qrcode", self.base_url);

        debug!(
            "Requesting QR code (ref={}, transactionId={})",
            reference, transaction_id
        );

        let response = self
            .http
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .header(reqwest::header::ACCEPT, "*/*")
            .query(&[
                ("ref", reference.as_str()),
                ("transactionId", transaction_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("QR code request rejected (HTTP {}): {}", status.as_u16(), body);
            return Err(Error::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: QrCodeResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("QR code response: {e}")))?;

        let image = body
            .qrcode_image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| Error::MalformedResponse("response lacks qrcodeImage".to_string()))?;

        let transaction_id = body
            .transaction_id
            .filter(|id| !id.trim().is_empty())
            .map_or(transaction_id, TransactionId::from);

        info!("Verification transaction {} opened for {}", transaction_id, reference);

        Ok(CreatedTransaction {
            transaction_id,
            auth_uri: body.auth_uri,
            qr_artifact: QrArtifact::new(image),
        })
    }

    /// Fetch the result of a transaction.
    ///
    /// # Errors
    ///
    /// * [`PollError::NotYetAvailable`] - HTTP 400, the wallet has not uploaded yet
    /// * [`PollError::UpstreamFailure`] - anything else that is not a JSON 200
    pub async fn poll_result(
        &self,
        transaction_id: &TransactionId,
    ) -> std::result::Result<VerificationResult, PollError> {
        let url = format!("{}/result", self.base_url);

        let response = self
            .http
            .post(&url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&json!({ "transactionId": transaction_id.as_str() }))
            .send()
            .await
            .map_err(|e| PollError::UpstreamFailure {
                status: None,
                detail: format!("{url}: {e}"),
            })?;

        match response.status() {
            StatusCode::OK => {
                let raw: Value = response.json().await.map_err(|e| PollError::UpstreamFailure {
                    status: Some(200),
                    detail: format!("result body is not JSON: {e}"),
                })?;
                info!("Verification result received for {}", transaction_id);
                Ok(VerificationResult::from_value(raw))
            }
            StatusCode::BAD_REQUEST => {
                debug!("Result for {} not uploaded yet", transaction_id);
                Err(PollError::NotYetAvailable)
            }
            status => {
                let detail = response.text().await.unwrap_or_default();
                warn!(
                    "Result query for {} failed (HTTP {}): {}",
                    transaction_id,
                    status.as_u16(),
                    detail
                );
                Err(PollError::UpstreamFailure {
                    status: Some(status.as_u16()),
                    detail,
                })
            }
        }
    }

    /// Base URL the client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
