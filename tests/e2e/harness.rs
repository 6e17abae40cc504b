//! Test harness: mock verifier, temp directories and a configured terminal.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use beacon_pos::config::PosConfig;
use beacon_pos::event::create_event_channel;
use beacon_pos::{PosBuilder, PosEvent, PosEventsChannel, PosService, ReferenceCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Access token the mock verifier expects.
pub const ACCESS_TOKEN: &str = "test-access-token";

/// API key the HTTP API expects.
pub const API_KEY: &str = "test-api-key";

/// A tiny but valid PNG data URI.
pub const QR_IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

/// How long tests wait for asynchronous outcomes.
pub const WAIT: Duration = Duration::from_secs(5);

/// Mock verifier plus a terminal configuration pointing at it.
pub struct TestHarness {
    /// Mock wallet verifier.
    pub verifier: MockServer,
    /// Terminal configuration.
    pub config: PosConfig,
    artifacts: TempDir,
}

impl TestHarness {
    /// Start a mock verifier and configure a terminal against it.
    pub async fn setup() -> Self {
        let verifier = MockServer::start().await;
        let artifacts = tempfile::tempdir().expect("tempdir");

        let mut config = PosConfig::default();
        config.verifier.base_url = verifier.uri();
        config.verifier.access_token = ACCESS_TOKEN.to_string();
        config.verifier.timeout_secs = 5;
        config.server.bind = "127.0.0.1:0".parse().expect("bind addr");
        config.server.api_key = API_KEY.to_string();
        config.artifact_dir = artifacts.path().join("qrcodes");

        Self {
            verifier,
            config,
            artifacts,
        }
    }

    /// Temporary directory backing the artifact store.
    pub fn artifact_root(&self) -> &std::path::Path {
        self.artifacts.path()
    }

    /// A service wired to the mock verifier, with its event receiver.
    pub fn service(&self) -> (PosService, PosEventsChannel) {
        let (events_tx, events_rx) = create_event_channel();
        let service = PosService::new(&self.config, events_tx).expect("service");
        (service, events_rx)
    }

    /// Answer QR code requests for `reference` with a fresh image.
    ///
    /// The response carries no transaction id, so the client-generated one
    /// is kept and every call yields a distinct id.
    pub async fn mount_qrcode(&self, reference: ReferenceCode, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/qrcode"))
            .and(query_param("ref", reference.as_str()))
            .and(header("Access-Token", ACCESS_TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "qrcodeImage": QR_IMAGE,
                "authUri": "modadigitalwallet://verify?request_uri=test"
            })))
            .expect(expected_calls)
            .mount(&self.verifier)
            .await;
    }

    /// Fail the test if any QR code request reaches the verifier.
    pub async fn forbid_qrcode(&self) {
        Mock::given(method("GET"))
            .and(path("/qrcode"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.verifier)
            .await;
    }

    /// Answer result queries with `status` and `body`.
    pub async fn mount_result(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/result"))
            .and(header("Access-Token", ACCESS_TOKEN))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.verifier)
            .await;
    }

    /// Build and run a full terminal; returns its API address.
    pub async fn start_terminal(&self) -> RunningTerminal {
        let mut pos = PosBuilder::new(self.config.clone())
            .build()
            .await
            .expect("build terminal");
        let addr = pos.local_addr().expect("server enabled");
        let shutdown = pos.shutdown_handle();
        let service = pos.service().clone();
        let task = tokio::spawn(async move { pos.run().await.expect("terminal run") });

        RunningTerminal {
            addr,
            service,
            shutdown,
            task,
        }
    }
}

/// A terminal running in the background.
pub struct RunningTerminal {
    /// HTTP API address.
    pub addr: SocketAddr,
    /// Service handle shared with the API.
    pub service: PosService,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunningTerminal {
    /// Absolute URL for `path` on the API.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop the terminal and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("terminal stops in time")
            .expect("terminal task");
    }
}

/// Wait for the next `TransactionCreated` event; returns its transaction id.
pub async fn next_created(events: &mut PosEventsChannel) -> String {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await.expect("event channel open") {
                PosEvent::TransactionCreated { transaction_id, .. } => return transaction_id,
                _ => continue,
            }
        }
    })
    .await
    .expect("transaction created in time")
}
