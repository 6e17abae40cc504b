//! Verifier client against a mock verifier.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{TestHarness, ACCESS_TOKEN, QR_IMAGE};
use beacon_pos::{Error, PollError, ReferenceCode, VerifierClient};
use beacon_pos::verifier::TransactionId;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_create_transaction_sends_ref_and_token() {
    let harness = TestHarness::setup().await;
    harness.mount_qrcode(ReferenceCode::Student, 1).await;

    let client = VerifierClient::new(&harness.config.verifier).expect("client");
    let created = client
        .create_transaction(ReferenceCode::Student)
        .await
        .expect("created");

    assert!(!created.transaction_id.as_str().is_empty());
    assert_eq!(created.qr_artifact.data_uri(), QR_IMAGE);
    assert_eq!(
        created.auth_uri.as_deref(),
        Some("modadigitalwallet://verify?request_uri=test")
    );

    let requests = harness.verifier.received_requests().await.expect("recording");
    let sent_id = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "transactionId")
        .map(|(_, v)| v.into_owned())
        .expect("transactionId query param");
    assert_eq!(sent_id, created.transaction_id.as_str());
}

#[tokio::test]
async fn test_echoed_transaction_id_wins() {
    let harness = TestHarness::setup().await;
    Mock::given(method("GET"))
        .and(path("/qrcode"))
        .and(query_param("ref", "00000000_iris_easycard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactionId": "upstream-id",
            "qrcodeImage": QR_IMAGE
        })))
        .mount(&harness.verifier)
        .await;

    let client = VerifierClient::new(&harness.config.verifier).expect("client");
    let created = client
        .create_transaction(ReferenceCode::EasyCard)
        .await
        .expect("created");

    assert_eq!(created.transaction_id.as_str(), "upstream-id");
    assert!(created.auth_uri.is_none());
}

#[tokio::test]
async fn test_create_transaction_failures() {
    let harness = TestHarness::setup().await;
    Mock::given(method("GET"))
        .and(path("/qrcode"))
        .and(query_param("ref", "00000000_irisold"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&harness.verifier)
        .await;
    Mock::given(method("GET"))
        .and(path("/qrcode"))
        .and(query_param("ref", "00000000_irisstudent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"authUri": "x"})))
        .mount(&harness.verifier)
        .await;

    let client = VerifierClient::new(&harness.config.verifier).expect("client");

    let rejected = client.create_transaction(ReferenceCode::Senior).await;
    assert!(matches!(
        rejected,
        Err(Error::UpstreamRejected { status: 401, ref body }) if body == "bad token"
    ));

    let malformed = client.create_transaction(ReferenceCode::Student).await;
    assert!(matches!(malformed, Err(Error::MalformedResponse(_))));
}

#[tokio::test]
async fn test_unreachable_verifier() {
    let harness = TestHarness::setup().await;
    let mut config = harness.config.verifier.clone();
    // Nothing listens on the discard port
    config.base_url = "http://127.0.0.1:9".to_string();
    config.timeout_secs = 2;

    let client = VerifierClient::new(&config).expect("client");
    let err = client
        .create_transaction(ReferenceCode::EnterMrt)
        .await
        .expect_err("unreachable");
    assert!(matches!(err, Error::UpstreamUnavailable(_)));

    let poll = client.poll_result(&TransactionId::from("tx")).await;
    assert!(matches!(poll, Err(PollError::UpstreamFailure { status: None, .. })));
}

#[tokio::test]
async fn test_poll_result_statuses() {
    let harness = TestHarness::setup().await;
    Mock::given(method("POST"))
        .and(path("/result"))
        .and(header("Access-Token", ACCESS_TOKEN))
        .and(body_json(json!({"transactionId": "done"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "verifyResult": true,
            "data": [{"credentialType": "00000000_irisstudent", "claims": []}]
        })))
        .mount(&harness.verifier)
        .await;
    Mock::given(method("POST"))
        .and(path("/result"))
        .and(body_json(json!({"transactionId": "waiting"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": 4002})))
        .mount(&harness.verifier)
        .await;
    Mock::given(method("POST"))
        .and(path("/result"))
        .and(body_json(json!({"transactionId": "broken"})))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&harness.verifier)
        .await;

    let client = VerifierClient::new(&harness.config.verifier).expect("client");

    let done = client
        .poll_result(&TransactionId::from("done"))
        .await
        .expect("result");
    assert!(done.verified);
    assert!(done.has_credential("00000000_irisstudent"));

    let waiting = client.poll_result(&TransactionId::from("waiting")).await;
    assert!(matches!(waiting, Err(PollError::NotYetAvailable)));

    let broken = client.poll_result(&TransactionId::from("broken")).await;
    assert!(matches!(
        broken,
        Err(PollError::UpstreamFailure { status: Some(503), ref detail }) if detail == "maintenance"
    ));
}
