//! Terminal service - wires proximity, verifier, session store and receipts.

use crate::artifact::ArtifactStore;
use crate::config::PosConfig;
use crate::error::Result;
use crate::event::{create_event_channel, PosEvent, PosEventsChannel, PosEventsSender};
use crate::proximity::{Advertisement, Edge, ProximityEvent, ProximityMonitor};
use crate::receipt::{Receipt, ReceiptView};
use crate::reference::ReferenceCode;
use crate::server;
use crate::session::{GenerationTicket, SessionStore, VerificationTransaction};
use crate::verifier::{PollError, TransactionId, VerificationResult, VerifierClient};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shared handle to the terminal's operations.
///
/// Cheap to clone; every clone talks to the same session store.
#[derive(Clone)]
pub struct PosService {
    inner: Arc<Inner>,
}

struct Inner {
    verifier: VerifierClient,
    sessions: SessionStore,
    artifacts: ArtifactStore,
    base_amount: Decimal,
    events_tx: PosEventsSender,
}

impl PosService {
    /// Create a service from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the verifier client cannot be created.
    pub fn new(config: &PosConfig, events_tx: PosEventsSender) -> Result<Self> {
        let verifier = VerifierClient::new(&config.verifier)?;
        Ok(Self {
            inner: Arc::new(Inner {
                verifier,
                sessions: SessionStore::with_ttl(config.session.ttl()),
                artifacts: ArtifactStore::new(config.artifact_dir.clone()),
                base_amount: config.pricing.base_amount,
                events_tx,
            }),
        })
    }

    /// Open a verification transaction and make it the live session.
    ///
    /// A QR image that cannot be saved is logged and skipped; the
    /// transaction is still recorded and returned. The live slot goes to
    /// whichever generation started last, not whichever finished last.
    ///
    /// # Errors
    ///
    /// Returns the verifier error if the transaction could not be opened.
    pub async fn generate(&self, reference: ReferenceCode) -> Result<VerificationTransaction> {
        let ticket = self.inner.sessions.ticket();
        self.open(ticket, reference).await
    }

    async fn open(
        &self,
        ticket: GenerationTicket,
        reference: ReferenceCode,
    ) -> Result<VerificationTransaction> {
        let created = match self.inner.verifier.create_transaction(reference).await {
            Ok(created) => created,
            Err(e) => {
                warn!("Failed to open verification transaction for {}: {}", reference, e);
                let _ = self.inner.events_tx.send(PosEvent::TransactionFailed {
                    reference,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let artifact_path = match self.inner.artifacts.save(&created.qr_artifact, reference.as_str()) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("save image failed: {}", e);
                None
            }
        };

        let (transaction, live) = self
            .inner
            .sessions
            .record(ticket, &created, reference, artifact_path);
        if live {
            info!(
                "Transaction {} is live until {}",
                transaction.transaction_id, transaction.expires_at
            );
        } else {
            info!(
                "Transaction {} was overtaken by a newer one and is not live",
                transaction.transaction_id
            );
        }
        let _ = self.inner.events_tx.send(PosEvent::TransactionCreated {
            transaction_id: transaction.transaction_id.to_string(),
            reference,
        });

        Ok(transaction)
    }

    /// Validate a raw reference value from a request, then [`generate`](Self::generate).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) for a missing or unknown reference,
    /// before anything is sent upstream.
    pub async fn generate_by_ref(&self, raw: Option<&str>) -> Result<VerificationTransaction> {
        let reference = ReferenceCode::parse_request(raw).map_err(|e| {
            warn!("Rejected generate request: {}", e);
            e
        })?;
        self.generate(reference).await
    }

    /// Fetch the verification result of a transaction.
    ///
    /// # Errors
    ///
    /// See [`VerifierClient::poll_result`].
    pub async fn poll_result(
        &self,
        transaction_id: &TransactionId,
    ) -> std::result::Result<VerificationResult, PollError> {
        self.inner.verifier.poll_result(transaction_id).await
    }

    /// Build the result page for `transaction_id`, or for the live session
    /// when no id is given.
    pub async fn receipt_view(&self, transaction_id: Option<&str>) -> ReceiptView {
        let transaction_id = match transaction_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => TransactionId::from(id),
            None => match self.inner.sessions.current() {
                Some(live) => live.transaction_id,
                None => return ReceiptView::NoTransaction,
            },
        };

        match self.poll_result(&transaction_id).await {
            Ok(result) => ReceiptView::Ready(Box::new(Receipt::build(
                transaction_id,
                &result,
                self.inner.base_amount,
            ))),
            Err(e) => {
                debug!("No receipt for {} yet: {}", transaction_id, e);
                ReceiptView::Pending { transaction_id }
            }
        }
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Subscribe to terminal events.
    #[must_use]
    pub fn subscribe_events(&self) -> PosEventsChannel {
        self.inner.events_tx.subscribe()
    }

    /// React to a proximity edge.
    ///
    /// On `Enter` a transaction is opened in the background so the caller
    /// never waits on the verifier; the handle is returned for callers that
    /// want to.
    pub fn on_proximity(
        &self,
        event: &ProximityEvent,
        reference: ReferenceCode,
    ) -> Option<JoinHandle<Result<VerificationTransaction>>> {
        match event.edge {
            Edge::Enter => {
                info!(
                    "[NEAR] {} within range (RSSI={}), opening transaction with ref {}",
                    event.address, event.rssi, reference
                );
                let _ = self.inner.events_tx.send(PosEvent::ProximityEnter {
                    address: event.address.clone(),
                    rssi: event.rssi,
                });
                // Ticket taken here so spawn scheduling cannot reorder approaches
                let ticket = self.inner.sessions.ticket();
                let service = self.clone();
                Some(tokio::spawn(async move { service.open(ticket, reference).await }))
            }
            Edge::Reset => {
                info!("[FAR] {} out of range (RSSI={}), re-armed", event.address, event.rssi);
                let _ = self.inner.events_tx.send(PosEvent::ProximityReset {
                    address: event.address.clone(),
                    rssi: event.rssi,
                });
                None
            }
        }
    }

    /// Consume advertisements one at a time until the feed closes or
    /// shutdown is requested.
    pub async fn run_proximity_loop(
        &self,
        mut monitor: ProximityMonitor,
        reference: ReferenceCode,
        mut advertisements: mpsc::Receiver<Advertisement>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Proximity loop watching {} beacon(s)", monitor.len());

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                adv = advertisements.recv() => {
                    let Some(adv) = adv else {
                        info!("Advertisement feed closed");
                        break;
                    };
                    if let Some(event) = monitor.on_advertisement(&adv) {
                        self.on_proximity(&event, reference);
                    }
                }
            }
        }
    }
}

/// Builder for constructing a terminal.
pub struct PosBuilder {
    config: PosConfig,
    advertisements: Option<mpsc::Receiver<Advertisement>>,
}

impl PosBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: PosConfig) -> Self {
        Self {
            config,
            advertisements: None,
        }
    }

    /// Feed BLE advertisements into the proximity trigger.
    #[must_use]
    pub fn advertisements(mut self, rx: mpsc::Receiver<Advertisement>) -> Self {
        self.advertisements = Some(rx);
        self
    }

    /// Validate configuration, bind the HTTP listener and build the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is incomplete or the listener
    /// cannot be bound.
    pub async fn build(self) -> Result<RunningPos> {
        self.config.validate()?;
        info!(
            "Building beacon-pos (verifier {}, {} beacon(s), API {})",
            self.config.verifier.base_url,
            self.config.proximity.target_addresses.len(),
            if self.config.server.enabled { "enabled" } else { "disabled" }
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();
        let service = PosService::new(&self.config, events_tx.clone())?;

        let listener = if self.config.server.enabled {
            let listener = TcpListener::bind(self.config.server.bind).await?;
            info!("HTTP API listening on {}", listener.local_addr()?);
            Some(listener)
        } else {
            None
        };

        if self.advertisements.is_some() && self.config.proximity.target_addresses.is_empty() {
            warn!("Advertisement feed configured but no target addresses - nothing will trigger");
        }

        Ok(RunningPos {
            config: self.config,
            service,
            listener,
            advertisements: self.advertisements,
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// A running terminal.
pub struct RunningPos {
    config: PosConfig,
    service: PosService,
    listener: Option<TcpListener>,
    advertisements: Option<mpsc::Receiver<Advertisement>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: PosEventsSender,
    events_rx: Option<PosEventsChannel>,
}

impl RunningPos {
    /// Service handle shared with the HTTP API and proximity loop.
    #[must_use]
    pub fn service(&self) -> &PosService {
        &self.service
    }

    /// Address the HTTP API is bound to, if enabled and not yet running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Get a receiver for terminal events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<PosEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to terminal events.
    #[must_use]
    pub fn subscribe_events(&self) -> PosEventsChannel {
        self.events_tx.subscribe()
    }

    /// A handle that can stop the terminal from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Run until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal encounters a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting beacon-pos");
        let _ = self.events_tx.send(PosEvent::Started);

        let mut tasks = Vec::new();

        if let Some(listener) = self.listener.take() {
            let router = server::router(self.service.clone(), self.config.server.api_key.clone());
            let shutdown_rx = self.shutdown_rx.clone();
            let events_tx = self.events_tx.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = server::serve(listener, router, shutdown_rx).await {
                    error!("HTTP API stopped: {}", e);
                    let _ = events_tx.send(PosEvent::Error {
                        message: format!("HTTP API stopped: {e}"),
                    });
                }
            }));
        }

        if let Some(advertisements) = self.advertisements.take() {
            let monitor = ProximityMonitor::new(
                &self.config.proximity.target_addresses,
                self.config.proximity.rssi_threshold,
            );
            let reference = self.config.proximity.reference;
            let service = self.service.clone();
            let shutdown_rx = self.shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .run_proximity_loop(monitor, reference, advertisements, shutdown_rx)
                    .await;
            }));
        }

        info!("Terminal running, waiting for shutdown signal");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
            }
        }

        let _ = self.events_tx.send(PosEvent::ShuttingDown);
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
        info!("Terminal shutdown complete");
        Ok(())
    }

    /// Request the terminal to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
