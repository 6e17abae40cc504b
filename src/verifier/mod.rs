//! Wallet verifier integration.
//!
//! The verifier does all of the credential checking. This crate only opens
//! transactions and reads their verdict:
//!
//! ```text
//! GET  /qrcode?ref=<ref>&transactionId=<uuid>   ─► { transactionId, qrcodeImage, authUri }
//! POST /result { transactionId }                ─► 200 payload | 400 not uploaded yet
//! ```

mod client;
mod types;

pub use client::{PollError, VerifierClient};
pub use types::{Claim, CreatedTransaction, Credential, QrArtifact, TransactionId, VerificationResult};
