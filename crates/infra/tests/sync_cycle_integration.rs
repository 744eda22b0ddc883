//! End-to-end sync cycles: store double → mapper → partner client → wiremock
//!
//! **Coverage:**
//! - Page processed in ascending fix-time order; sent records never reselected
//! - HTTP 500 marks the record failed with the response body and keeps it eligible
//! - Authentication failure fails every record of the page without deliveries

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use support::InMemoryLocationStore;
use trackrelay_core::{CycleReport, LocationStore, MappingContext, RecordMapper, SyncService};
use trackrelay_domain::{DeliveryStatus, PendingRecord, ZoneSetting};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(server: &MockServer, store: Arc<InMemoryLocationStore>) -> SyncService {
    let (client, _tokens) = support::partner_client(&server.uri(), support::system_clock());
    let mapper = RecordMapper::new(MappingContext { client_id: 77, timezone: ZoneSetting::Local });
    SyncService::new(store, Arc::new(client), mapper)
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"access_token":"abc"}"#))
        .mount(server)
        .await;
}

async fn delivered_plates(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/api/data/insert")
        .map(|request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            body["patente"].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn page_is_delivered_in_fix_time_order() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/data/insert"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"inserted":1}"#))
        .mount(&server)
        .await;

    let already_sent =
        PendingRecord { delivery_status: DeliveryStatus::Sent, ..support::fix(4, "SENT00", 0) };
    let previously_failed =
        PendingRecord { delivery_status: DeliveryStatus::Failed, ..support::fix(5, "FAIL55", 3) };
    let store = Arc::new(InMemoryLocationStore::with_records(vec![
        support::fix(1, "CCC333", 9),
        support::fix(2, "AAA111", 1),
        already_sent,
        previously_failed,
        support::fix(3, "BBB222", 5),
    ]));

    let report = service(&server, store.clone()).run_cycle().await.unwrap();

    assert_eq!(report, CycleReport { fetched: 4, sent: 4, failed: 0, mark_errors: 0 });
    assert_eq!(delivered_plates(&server).await, vec!["AAA111", "FAIL55", "BBB222", "CCC333"]);
    for id in [1, 2, 3, 5] {
        assert_eq!(store.record(id).await.unwrap().delivery_status, DeliveryStatus::Sent);
        assert_eq!(store.detail(id).await.unwrap(), r#"{"inserted":1}"#);
    }
    assert!(store.fetch_pending(50).await.unwrap().is_empty());
}

#[tokio::test]
async fn server_error_marks_failed_and_record_stays_eligible() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/data/insert"))
        .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"error":"db down"}"#))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryLocationStore::with_records(vec![support::fix(1, "ABCD12", 0)]));

    let report = service(&server, store.clone()).run_cycle().await.unwrap();

    assert_eq!(report, CycleReport { fetched: 1, sent: 0, failed: 1, mark_errors: 0 });
    assert_eq!(store.record(1).await.unwrap().delivery_status, DeliveryStatus::Failed);
    assert_eq!(store.detail(1).await.unwrap(), r#"{"error":"db down"}"#);

    let pending = store.fetch_pending(50).await.unwrap();
    assert_eq!(pending.iter().map(|r| r.location_id).collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn auth_failure_fails_the_page_without_deliveries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryLocationStore::with_records(vec![
        support::fix(1, "AAA111", 0),
        support::fix(2, "BBB222", 1),
    ]));

    let report = service(&server, store.clone()).run_cycle().await.unwrap();

    assert_eq!(report, CycleReport { fetched: 2, sent: 0, failed: 2, mark_errors: 0 });
    assert!(delivered_plates(&server).await.is_empty());
    let detail = store.detail(1).await.unwrap();
    assert!(detail.starts_with(r#""Authentication error: "#), "got {detail}");
    assert!(detail.contains("401"), "got {detail}");
}
