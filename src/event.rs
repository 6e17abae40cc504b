//! Terminal event system.

use crate::reference::ReferenceCode;
use tokio::sync::broadcast;

/// Events emitted by the terminal.
#[derive(Debug, Clone)]
pub enum PosEvent {
    /// Terminal has started successfully.
    Started,

    /// Terminal is shutting down.
    ShuttingDown,

    /// A watched beacon came within range.
    ProximityEnter {
        /// Beacon address (upper-case).
        address: String,
        /// Signal strength that crossed the threshold.
        rssi: i16,
    },

    /// A watched beacon left the near zone.
    ProximityReset {
        /// Beacon address (upper-case).
        address: String,
        /// Signal strength that crossed the threshold.
        rssi: i16,
    },

    /// A verification transaction was created and recorded.
    TransactionCreated {
        /// Transaction identifier.
        transaction_id: String,
        /// Reference code the transaction was opened with.
        reference: ReferenceCode,
    },

    /// Creating a verification transaction failed.
    TransactionFailed {
        /// Reference code the transaction was opened with.
        reference: ReferenceCode,
        /// Error message.
        message: String,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving terminal events.
pub type PosEventsChannel = broadcast::Receiver<PosEvent>;

/// Sender for terminal events.
pub type PosEventsSender = broadcast::Sender<PosEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (PosEventsSender, PosEventsChannel) {
    broadcast::channel(256)
}
