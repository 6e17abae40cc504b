//! Service-level flows: generation, session handling, proximity trigger.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::harness::{next_created, TestHarness, QR_IMAGE, WAIT};
use beacon_pos::proximity::{feed, ProximityEvent};
use beacon_pos::{
    Advertisement, Edge, Error, PosEvent, ProximityMonitor, ReceiptView, ReferenceCode,
};
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::watch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const BEACON: &str = "AA:BB:CC:DD:EE:FF";

fn adv(address: &str, rssi: i16) -> Advertisement {
    Advertisement {
        address: address.to_string(),
        rssi: Some(rssi),
        name: None,
    }
}

#[tokio::test]
async fn test_generate_records_session_and_saves_image() {
    let harness = TestHarness::setup().await;
    harness.mount_qrcode(ReferenceCode::InvoiceCode, 1).await;
    let (service, mut events) = harness.service();

    let transaction = service
        .generate(ReferenceCode::InvoiceCode)
        .await
        .expect("generate");

    let image = transaction.artifact_path.clone().expect("image saved");
    assert!(image.starts_with(harness.artifact_root()));
    assert!(image.exists());

    let live = service.sessions().current().expect("live session");
    assert_eq!(live, transaction);
    assert_eq!(next_created(&mut events).await, transaction.transaction_id.as_str());
}

#[tokio::test]
async fn test_quick_successive_generates_keep_only_latest() {
    let harness = TestHarness::setup().await;
    harness.mount_qrcode(ReferenceCode::EasyCard, 1).await;
    harness.mount_qrcode(ReferenceCode::Student, 1).await;
    let (service, _events) = harness.service();

    let first = service.generate(ReferenceCode::EasyCard).await.expect("first");
    let second = service.generate(ReferenceCode::Student).await.expect("second");

    assert_ne!(first.transaction_id, second.transaction_id);
    let live = service.sessions().current().expect("live");
    assert_eq!(live.transaction_id, second.transaction_id);
    assert_eq!(live.reference, ReferenceCode::Student);
}

#[tokio::test]
async fn test_slow_earlier_approach_does_not_displace_later_one() {
    let harness = TestHarness::setup().await;
    Mock::given(method("GET"))
        .and(path("/qrcode"))
        .and(query_param("ref", ReferenceCode::Student.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"qrcodeImage": QR_IMAGE}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&harness.verifier)
        .await;
    harness.mount_qrcode(ReferenceCode::Senior, 1).await;
    let (service, _events) = harness.service();

    let enter = |address: &str| ProximityEvent {
        address: address.to_string(),
        edge: Edge::Enter,
        rssi: -40,
        name: None,
        observed_at: Utc::now(),
    };

    let slow = service
        .on_proximity(&enter(BEACON), ReferenceCode::Student)
        .expect("spawned");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let fast = service
        .on_proximity(&enter("11:22:33:44:55:66"), ReferenceCode::Senior)
        .expect("spawned");

    let later = fast.await.expect("join").expect("senior generate");
    let earlier = slow.await.expect("join").expect("student generate");
    assert_ne!(earlier.transaction_id, later.transaction_id);

    let live = service.sessions().current().expect("live");
    assert_eq!(live.transaction_id, later.transaction_id);
    assert_eq!(live.reference, ReferenceCode::Senior);
}

#[tokio::test]
async fn test_invalid_ref_never_reaches_verifier() {
    let harness = TestHarness::setup().await;
    harness.forbid_qrcode().await;
    let (service, _events) = harness.service();

    let missing = service.generate_by_ref(None).await;
    assert!(matches!(missing, Err(Error::Validation(ref m)) if m == "missing ref"));

    let blank = service.generate_by_ref(Some("   ")).await;
    assert!(matches!(blank, Err(Error::Validation(_))));

    let unknown = service.generate_by_ref(Some("00000000_iristest")).await;
    assert!(matches!(unknown, Err(Error::Validation(ref m)) if m.contains("00000000_iristest")));

    assert!(service.sessions().current().is_none());
}

#[tokio::test]
async fn test_artifact_failure_still_records_transaction() {
    let mut harness = TestHarness::setup().await;
    // A regular file where the image directory should be
    let blocker = harness.artifact_root().join("not-a-dir");
    std::fs::write(&blocker, b"x").expect("write blocker");
    harness.config.artifact_dir = blocker;

    harness.mount_qrcode(ReferenceCode::Senior, 1).await;
    let (service, _events) = harness.service();

    let transaction = service.generate(ReferenceCode::Senior).await.expect("generate");
    assert!(transaction.artifact_path.is_none());
    assert_eq!(
        service.sessions().current().map(|t| t.transaction_id),
        Some(transaction.transaction_id)
    );
}

#[tokio::test]
async fn test_upstream_failure_leaves_session_untouched() {
    let harness = TestHarness::setup().await;
    harness.mount_qrcode(ReferenceCode::Student, 1).await;
    let (service, mut events) = harness.service();

    let live = service.generate(ReferenceCode::Student).await.expect("generate");

    // No mock for the MRT reference: wiremock answers 404
    let err = service
        .generate(ReferenceCode::EnterMrt)
        .await
        .expect_err("rejected");
    assert!(matches!(err, Error::UpstreamRejected { status: 404, .. }));
    assert_eq!(service.sessions().current(), Some(live));

    let failed = tokio::time::timeout(WAIT, async {
        loop {
            if let PosEvent::TransactionFailed { reference, .. } =
                events.recv().await.expect("events")
            {
                return reference;
            }
        }
    })
    .await
    .expect("failure event");
    assert_eq!(failed, ReferenceCode::EnterMrt);
}

#[tokio::test]
async fn test_receipt_view_follows_live_session() {
    let harness = TestHarness::setup().await;
    harness.mount_qrcode(ReferenceCode::Student, 1).await;
    harness
        .mount_result(
            200,
            json!({
                "verifyResult": true,
                "data": [{"credentialType": "00000000_irisstudent", "claims": []}]
            }),
        )
        .await;
    let (service, _events) = harness.service();

    assert_eq!(service.receipt_view(None).await, ReceiptView::NoTransaction);

    let live = service.generate(ReferenceCode::Student).await.expect("generate");
    match service.receipt_view(None).await {
        ReceiptView::Ready(receipt) => {
            assert_eq!(receipt.transaction_id, live.transaction_id);
            assert_eq!(receipt.pricing.final_amount, rust_decimal::Decimal::from(90));
        }
        other => panic!("expected a receipt, got {other:?}"),
    }
}

#[tokio::test]
async fn test_receipt_view_pending_until_uploaded() {
    let harness = TestHarness::setup().await;
    harness.mount_result(400, json!({"code": 4002})).await;
    let (service, _events) = harness.service();

    let view = service.receipt_view(Some("tx-waiting")).await;
    assert!(matches!(view, ReceiptView::Pending { ref transaction_id } if transaction_id.as_str() == "tx-waiting"));
}

#[tokio::test]
async fn test_proximity_stream_opens_one_transaction_per_approach() {
    let harness = TestHarness::setup().await;
    harness.mount_qrcode(ReferenceCode::EnterMrt, 2).await;
    let (service, mut events) = harness.service();

    let (tx, rx) = feed::channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = ProximityMonitor::new(&[BEACON], -50);

    let loop_service = service.clone();
    let proximity = tokio::spawn(async move {
        loop_service
            .run_proximity_loop(monitor, ReferenceCode::EnterMrt, rx, shutdown_rx)
            .await;
    });

    // Near, stay near, leave, an unrelated device
    for reading in [
        adv(BEACON, -60),
        adv(BEACON, -40),
        adv("aa:bb:cc:dd:ee:ff", -40),
        adv(BEACON, -60),
        adv("11:22:33:44:55:66", -10),
    ] {
        tx.send(reading).await.expect("send");
    }
    let first = next_created(&mut events).await;

    // Come back
    tx.send(adv(BEACON, -45)).await.expect("send");
    drop(tx);
    let second = next_created(&mut events).await;
    assert_ne!(first, second);

    tokio::time::timeout(WAIT, proximity)
        .await
        .expect("loop ends with the feed")
        .expect("loop task");

    let live = service.sessions().current().expect("live");
    assert_eq!(live.transaction_id.as_str(), second);
}

#[tokio::test]
async fn test_json_lines_feed_drives_trigger() {
    let harness = TestHarness::setup().await;
    harness.mount_qrcode(ReferenceCode::EnterMrt, 1).await;
    let (service, mut events) = harness.service();

    let lines = format!(
        "{{\"address\":\"{BEACON}\",\"rssi\":-70}}\n\
         not json\n\
         \n\
         {{\"address\":\"{BEACON}\"}}\n\
         {{\"address\":\"{BEACON}\",\"rssi\":-48,\"name\":\"tag\"}}\n"
    );

    let (tx, rx) = feed::channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = ProximityMonitor::new(&[BEACON], -50);
    let loop_service = service.clone();
    let proximity = tokio::spawn(async move {
        loop_service
            .run_proximity_loop(monitor, ReferenceCode::EnterMrt, rx, shutdown_rx)
            .await;
    });

    let forwarded = feed::forward(BufReader::new(lines.as_bytes()), tx)
        .await
        .expect("forward");
    assert_eq!(forwarded, 3);

    next_created(&mut events).await;
    tokio::time::timeout(WAIT, proximity)
        .await
        .expect("loop ends")
        .expect("loop task");
}

#[tokio::test]
async fn test_proximity_loop_stops_on_shutdown() {
    let harness = TestHarness::setup().await;
    let (service, _events) = harness.service();

    let (_tx, rx) = feed::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = ProximityMonitor::new(&[BEACON], -50);

    let proximity = tokio::spawn(async move {
        service
            .run_proximity_loop(monitor, ReferenceCode::EnterMrt, rx, shutdown_rx)
            .await;
    });

    shutdown_tx.send(true).expect("send shutdown");
    tokio::time::timeout(WAIT, proximity)
        .await
        .expect("loop stops")
        .expect("loop task");
}
