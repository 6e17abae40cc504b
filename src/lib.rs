//! # beacon-pos
//!
//! Proximity-triggered digital-wallet verification for point-of-sale
//! terminals.
//!
//! A customer's BLE beacon crossing the RSSI threshold opens a verification
//! transaction against the wallet verifier. Once the customer scans the QR
//! code and uploads their credentials, the verification result is turned into
//! a receipt: carrier identifier, identity class and the discounted total.
//!
//! ```text
//! BLE advertisement ─► ProximityMonitor ─► Enter
//!                                            │
//!                                            ▼
//!                       VerifierClient::create_transaction
//!                                            │
//!                                            ▼
//!                              ArtifactStore + SessionStore
//!                                            │
//!                             [customer scans QR in wallet]
//!                                            │
//!                                            ▼
//!                         VerifierClient::poll_result
//!                                            │
//!                                            ▼
//!                      claims ─► PricingDecision ─► Receipt
//! ```

pub mod artifact;
pub mod claims;
pub mod config;
pub mod error;
pub mod event;
pub mod pricing;
pub mod proximity;
pub mod receipt;
pub mod reference;
pub mod server;
pub mod service;
pub mod session;
pub mod verifier;

pub use config::PosConfig;
pub use error::{Error, Result};
pub use event::{PosEvent, PosEventsChannel};
pub use pricing::{IdentityLabel, PricingDecision};
pub use proximity::{Advertisement, Edge, ProximityDebouncer, ProximityMonitor};
pub use receipt::{Receipt, ReceiptView};
pub use reference::ReferenceCode;
pub use service::{PosBuilder, PosService, RunningPos};
pub use session::{GenerationTicket, SessionStore, VerificationTransaction};
pub use verifier::{PollError, VerificationResult, VerifierClient};
