//! Single-slot store for the most recent verification transaction.
//!
//! Only one transaction is pending at a time. Recording a new one silently
//! supersedes the previous record; the superseded transaction is not
//! cancelled upstream and can still be polled by id.
//!
//! Callers take a [`GenerationTicket`] before asking the verifier. Tickets
//! order generations by when they started, so a slow earlier request that
//! finishes last never replaces a newer one.
//!
//! Expiry is lazy: reading the slot after its TTL has elapsed clears it.

use crate::reference::ReferenceCode;
use crate::verifier::{CreatedTransaction, TransactionId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default lifetime of a recorded transaction (10 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(600);

/// A live verification transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationTransaction {
    /// Identifier used to poll the result.
    pub transaction_id: TransactionId,
    /// Reference code the transaction was opened with.
    pub reference: ReferenceCode,
    /// Deep link that opens the wallet app.
    pub auth_uri: Option<String>,
    /// Where the QR code image was saved, if it was.
    pub artifact_path: Option<PathBuf>,
    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
    /// When the record stops being served.
    pub expires_at: DateTime<Utc>,
}

impl VerificationTransaction {
    /// Returns true if the record is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Position of a generation in start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationTicket(u64);

#[derive(Debug, Default)]
struct Slot {
    latest: Option<GenerationTicket>,
    current: Option<VerificationTransaction>,
}

/// Time-limited single slot, safe to share between request handlers.
///
/// Every update replaces the whole record under one lock, so readers never
/// see fields from two different transactions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    slot: Arc<Mutex<Slot>>,
    next_ticket: Arc<AtomicU64>,
    ttl: chrono::Duration,
}

impl SessionStore {
    /// Create a store with the default 10 minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    /// Create a store with the given TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            next_ticket: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    /// Reserve a place in line for a generation about to start.
    pub fn ticket(&self) -> GenerationTicket {
        GenerationTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    /// Record a freshly created transaction.
    ///
    /// Returns the transaction and whether it became the live one; it does
    /// not if a generation with a later ticket was already recorded.
    pub fn record(
        &self,
        ticket: GenerationTicket,
        created: &CreatedTransaction,
        reference: ReferenceCode,
        artifact_path: Option<PathBuf>,
    ) -> (VerificationTransaction, bool) {
        self.record_at(ticket, created, reference, artifact_path, Utc::now())
    }

    /// Record as of `now`.
    pub fn record_at(
        &self,
        ticket: GenerationTicket,
        created: &CreatedTransaction,
        reference: ReferenceCode,
        artifact_path: Option<PathBuf>,
        now: DateTime<Utc>,
    ) -> (VerificationTransaction, bool) {
        let transaction = VerificationTransaction {
            transaction_id: created.transaction_id.clone(),
            reference,
            auth_uri: created.auth_uri.clone(),
            artifact_path,
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut slot = self.slot.lock();
        if slot.latest.is_some_and(|latest| latest > ticket) {
            debug!(
                "Transaction {} finished after a newer generation, not made live",
                transaction.transaction_id
            );
            return (transaction, false);
        }

        slot.latest = Some(ticket);
        if let Some(previous) = slot.current.replace(transaction.clone()) {
            debug!(
                "Transaction {} superseded by {}",
                previous.transaction_id, transaction.transaction_id
            );
        }
        (transaction, true)
    }

    /// The live transaction, if any.
    pub fn current(&self) -> Option<VerificationTransaction> {
        self.current_at(Utc::now())
    }

    /// The live transaction as of `now`; clears the slot if it has expired.
    pub fn current_at(&self, now: DateTime<Utc>) -> Option<VerificationTransaction> {
        let mut slot = self.slot.lock();
        if slot.current.as_ref().is_some_and(|t| t.is_expired_at(now)) {
            if let Some(expired) = slot.current.take() {
                debug!("Transaction {} expired", expired.transaction_id);
            }
            return None;
        }
        slot.current.clone()
    }

    /// Drop the live transaction.
    pub fn clear(&self) {
        self.slot.lock().current.take();
    }

    /// Returns true if the slot holds a record, without checking expiry.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.slot.lock().current.is_some()
    }

    /// Configured TTL.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
