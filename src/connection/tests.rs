use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::StoreConfig;
use crate::remote::TransportKind;

use super::{ConnectError, ConnectionHealth, Negotiator, Route, FAILURE_THRESHOLD};

fn mock_config(server: &MockServer) -> StoreConfig {
    StoreConfig::default()
        .with_api_key("test-key")
        .with_index_name("docs")
        .with_api_base(server.uri())
        .with_create_grace(Duration::from_millis(10))
}

#[test]
fn test_fresh_health_is_unavailable_not_degraded() {
    let health = ConnectionHealth::new(true);
    assert_eq!(health.route(), Route::Unavailable);
    assert!(!health.is_available());
    assert!(!health.temporary_failure());
    assert_eq!(health.failed_attempts(), 0);
}

#[test]
fn test_success_marks_available_and_resets_the_counter() {
    let health = ConnectionHealth::new(false);
    health.record_failure();
    health.record_failure();
    assert_eq!(health.failed_attempts(), 2);

    health.record_success();
    assert_eq!(health.route(), Route::Remote);
    assert_eq!(health.failed_attempts(), 0);
    assert!(health.snapshot().last_success_at.is_some());
}

#[test]
fn test_threshold_failures_in_a_constrained_context_declare_temporary_failure() {
    let health = ConnectionHealth::new(true);
    for expected in 1..=FAILURE_THRESHOLD {
        assert_eq!(health.record_failure(), expected);
    }
    assert!(health.temporary_failure());
    // No success ever, so no grace window applies: straight to degraded.
    assert_eq!(health.route(), Route::Degraded);
    assert!(health.snapshot().degraded_active);
}

#[test]
fn test_unconstrained_contexts_never_declare_temporary_failure() {
    let health = ConnectionHealth::new(false);
    for _ in 0..10 {
        health.record_failure();
    }
    assert!(!health.temporary_failure());
    assert_eq!(health.route(), Route::Unavailable);
}

#[test]
fn test_grace_window_keeps_reporting_available_after_a_recent_success() {
    let health = ConnectionHealth::new(true);
    health.record_success();
    for _ in 0..FAILURE_THRESHOLD {
        health.record_failure();
    }
    assert!(health.temporary_failure());
    // Last success is fresh, so routing stays remote to avoid flapping.
    assert_eq!(health.route(), Route::Remote);
    assert!(!health.snapshot().degraded_active);
}

#[test]
fn test_zero_grace_window_degrades_immediately() {
    let health = ConnectionHealth::new(true).with_grace_window(Duration::ZERO);
    health.record_success();
    for _ in 0..FAILURE_THRESHOLD {
        health.record_failure();
    }
    assert_eq!(health.route(), Route::Degraded);
}

#[tokio::test]
async fn test_success_after_the_window_lapses_clears_temporary_failure() {
    let health = ConnectionHealth::new(true).with_grace_window(Duration::from_millis(5));
    health.record_success();
    for _ in 0..FAILURE_THRESHOLD {
        health.record_failure();
    }
    assert!(health.temporary_failure());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(health.route(), Route::Degraded);

    // A reconnect succeeded well after the window: genuinely recovered.
    health.record_success();
    assert!(!health.temporary_failure());
    assert_eq!(health.route(), Route::Remote);
}

#[test]
fn test_operator_reset_clears_flag_and_counter() {
    let health = ConnectionHealth::new(true);
    for _ in 0..FAILURE_THRESHOLD {
        health.record_failure();
    }
    assert!(health.temporary_failure());

    health.exit_degraded();
    assert!(!health.temporary_failure());
    assert_eq!(health.failed_attempts(), 0);
    // Still not available until something actually succeeds.
    assert_eq!(health.route(), Route::Unavailable);
}

#[test]
fn test_snapshot_reflects_the_live_state() {
    let health = ConnectionHealth::new(true);
    let fresh = health.snapshot();
    assert!(!fresh.available);
    assert!(!fresh.degraded_active);
    assert!(fresh.last_success_at.is_none());

    health.record_success();
    let after = health.snapshot();
    assert!(after.available);
    assert_eq!(after.failed_attempts, 0);
}

#[tokio::test]
async fn test_snapshot_degraded_flag_tracks_routing_after_an_in_window_recovery() {
    let health = ConnectionHealth::new(true).with_grace_window(Duration::from_millis(50));
    health.record_success();
    for _ in 0..FAILURE_THRESHOLD {
        health.record_failure();
    }
    assert!(health.temporary_failure());

    // Recovered inside the window: the anti-flap flag stays set.
    health.record_success();
    assert!(health.temporary_failure());

    // Idle past the window with no further failures. Routing stays remote,
    // and the diagnostic must agree with it.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(health.route(), Route::Remote);
    let snapshot = health.snapshot();
    assert!(snapshot.available);
    assert!(!snapshot.degraded_active);
}

#[test]
fn test_negotiator_rejects_invalid_configuration_without_any_attempt() {
    let err = Negotiator::new(StoreConfig::default()).unwrap_err();
    assert!(matches!(err, ConnectError::Configuration(_)));

    let ok = Negotiator::new(StoreConfig::default().with_api_key("key"));
    assert!(ok.is_ok());
}

#[test]
fn test_connect_error_messages_name_both_paths() {
    let err = ConnectError::NoPath {
        control_plane: "connection refused".to_string(),
        index_host: "dns failure".to_string(),
    };
    let message = err.to_string();
    assert!(message.contains("control-plane"));
    assert!(message.contains("index-host"));
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn test_negotiator_skips_creation_when_the_index_is_listed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["docs"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/docs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let negotiator = Negotiator::new(mock_config(&server)).unwrap();
    let health = ConnectionHealth::new(false);
    let transport = negotiator.establish(&health).await.unwrap();
    assert_eq!(transport.kind(), TransportKind::ControlPlane);
    assert_eq!(health.route(), Route::Remote);
}

#[tokio::test]
async fn test_negotiator_trusts_describe_when_the_listing_lags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["other"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "docs" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let negotiator = Negotiator::new(mock_config(&server)).unwrap();
    let health = ConnectionHealth::new(false);
    let transport = negotiator.establish(&health).await.unwrap();
    assert_eq!(transport.kind(), TransportKind::ControlPlane);
}

#[tokio::test]
async fn test_negotiator_creates_a_missing_index_before_first_use() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/docs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_json(json!({
            "name": "docs", "dimension": 1536, "metric": "cosine"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let negotiator = Negotiator::new(mock_config(&server)).unwrap();
    let health = ConnectionHealth::new(false);
    let transport = negotiator.establish(&health).await.unwrap();
    assert_eq!(transport.kind(), TransportKind::ControlPlane);
    assert!(health.is_available());
}
