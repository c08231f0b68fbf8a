use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pushgate_core::{Device, Notification, NotificationContext};
use pushgate_http::{METRICS_PATH, NOTIFY_PATH, gateway_router, metrics_router};
use pushgate_pushkin::gcm::{GcmRequest, GcmTransport, TransportResponse};
use pushgate_pushkin::pushgate_storage::{CanonicalIdStore, InMemoryStore};
use pushgate_pushkin::{
    DispatchError, GcmConfig, GcmPushkin, Pushkin, PushkinError, PushkinRegistry, TransportError,
};
use serde_json::{Value, json};
use tower::ServiceExt as _;

const APP_ID: &str = "com.example.spqr";

/// Pushkin whose behaviour is chosen by the pushkey.
#[derive(Default)]
struct TestPushkin {
    calls: AtomicUsize,
    slow_finished: Arc<AtomicBool>,
}

impl Pushkin for TestPushkin {
    fn name(&self) -> &str {
        APP_ID
    }

    async fn dispatch_notification(
        &self,
        _notification: &Notification,
        device: &Device,
        _context: &NotificationContext,
    ) -> Result<Vec<String>, PushkinError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match device.pushkey.as_str() {
            "raise_exception" => Err(color_eyre::eyre::eyre!("Bad things have occurred!").into()),
            "remote_error" => Err(DispatchError::Unauthorized("Synthetic failure".into()).into()),
            "reject" => Ok(vec![device.pushkey.clone()]),
            "accept" => Ok(Vec::new()),
            "slow_accept" => {
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.slow_finished.store(true, Ordering::SeqCst);
                Ok(Vec::new())
            }
            other => Err(color_eyre::eyre::eyre!("unexpected fall-through: {other}").into()),
        }
    }
}

fn device(pushkey: &str) -> Value {
    json!({"app_id": APP_ID, "pushkey": pushkey, "pushkey_ts": 1234})
}

fn notification(devices: Vec<Value>) -> Value {
    json!({
        "notification": {
            "event_id": "$3957tyerfgewrf384",
            "room_id": "!slw48wfj34rtnrf:example.com",
            "type": "m.room.message",
            "sender": "@exampleuser:matrix.org",
            "sender_display_name": "Major Tom",
            "room_name": "Mission Control",
            "room_alias": "#exampleroom:matrix.org",
            "prio": "high",
            "content": {
                "msgtype": "m.text",
                "body": "I'm floating in a most peculiar way."
            },
            "counts": {"unread": 2, "missed_calls": 1},
            "devices": devices,
        }
    })
}

/// Send a request and return the status plus the body.
async fn request<P: Pushkin + 'static>(
    registry: Arc<PushkinRegistry<P>>,
    body: impl Into<Body>,
) -> (StatusCode, Vec<u8>) {
    let response = gateway_router(registry)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(NOTIFY_PATH)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn notify<P: Pushkin + 'static>(
    registry: Arc<PushkinRegistry<P>>,
    payload: Value,
) -> (StatusCode, Vec<u8>) {
    request(registry, payload.to_string()).await
}

fn rejected(body: &[u8]) -> Vec<String> {
    let value: Value = serde_json::from_slice(body).unwrap();
    serde_json::from_value(value["rejected"].clone()).unwrap()
}

fn test_registry() -> Arc<PushkinRegistry<TestPushkin>> {
    Arc::new(PushkinRegistry::new().with_pushkin(TestPushkin::default()))
}

#[tokio::test]
async fn test_accepted_devices_are_not_rejected() {
    let (status, body) = notify(test_registry(), notification(vec![device("accept")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({"rejected": []})
    );
}

#[tokio::test]
async fn test_only_rejected_devices_are_rejected() {
    let (status, body) = notify(
        test_registry(),
        notification(vec![device("reject"), device("accept")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected(&body), ["reject"]);
}

#[tokio::test]
async fn test_unknown_app_id_is_rejected() {
    let unknown = json!({"app_id": "com.example.unknown", "pushkey": "lost"});
    let (status, body) = notify(
        test_registry(),
        notification(vec![unknown, device("reject")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected(&body), ["lost", "reject"]);
}

#[tokio::test]
async fn test_bad_requests_give_400() {
    let registry = test_registry();

    let (status, body) = notify(registry.clone(), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "Invalid notification: expecting object in 'notification' key"
    );

    let (status, body) = request(registry.clone(), "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "Expected JSON request body");

    let (status, body) = notify(registry.clone(), notification(vec![])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "No devices in notification");

    let (status, _) = notify(
        registry.clone(),
        notification(vec![json!({"app_id": APP_ID})]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let pushkin = registry.get(APP_ID).unwrap();
    assert_eq!(pushkin.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exceptions_give_500() {
    for devices in [
        vec![device("raise_exception")],
        vec![device("accept"), device("raise_exception")],
        vec![device("raise_exception"), device("accept")],
    ] {
        let (status, body) = notify(test_registry(), notification(devices)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn test_remote_errors_give_502() {
    for devices in [
        vec![device("remote_error")],
        vec![device("accept"), device("remote_error")],
        vec![device("remote_error"), device("reject")],
    ] {
        let (status, body) = notify(test_registry(), notification(devices)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_siblings_finish_before_failure_is_reported() {
    let registry = test_registry();
    let finished = registry.get(APP_ID).unwrap().slow_finished.clone();

    let (status, _) = notify(
        registry,
        notification(vec![device("remote_error"), device("slow_accept")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_run_concurrently() {
    struct SlowPushkin(&'static str);

    impl Pushkin for SlowPushkin {
        fn name(&self) -> &str {
            self.0
        }

        async fn dispatch_notification(
            &self,
            _notification: &Notification,
            _device: &Device,
            _context: &NotificationContext,
        ) -> Result<Vec<String>, PushkinError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(Vec::new())
        }
    }

    let registry = Arc::new(
        PushkinRegistry::new()
            .with_pushkin(SlowPushkin("com.example.a"))
            .with_pushkin(SlowPushkin("com.example.b")),
    );

    let start = tokio::time::Instant::now();
    let (status, _) = notify(
        registry,
        notification(vec![
            json!({"app_id": "com.example.a", "pushkey": "one"}),
            json!({"app_id": "com.example.b", "pushkey": "two"}),
            json!({"app_id": "com.example.a", "pushkey": "three"}),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test]
async fn test_repeated_devices_dispatched_once() {
    let registry = test_registry();

    let (status, body) = notify(
        registry.clone(),
        notification(vec![device("reject"), device("reject"), device("accept")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected(&body), ["reject"]);
    assert_eq!(registry.get(APP_ID).unwrap().calls.load(Ordering::SeqCst), 2);
}

/// Provider transport replaying canned responses. Clones share state.
#[derive(Clone, Default)]
struct FakeTransport {
    responses: Arc<Mutex<VecDeque<TransportResponse>>>,
    requests: Arc<Mutex<Vec<GcmRequest>>>,
}

impl FakeTransport {
    fn num_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl GcmTransport for FakeTransport {
    async fn send(&self, request: &GcmRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Request("no response queued".into()))
    }
}

const GCM_APP_ID: &str = "com.example.gcm";

type TestGcm = GcmPushkin<InMemoryStore, FakeTransport>;

fn gcm_registry(
    responses: Vec<TransportResponse>,
) -> (Arc<PushkinRegistry<TestGcm>>, FakeTransport) {
    let transport = FakeTransport {
        responses: Arc::new(Mutex::new(responses.into())),
        requests: Arc::default(),
    };

    let pushkin = GcmPushkin::with_transport(
        GCM_APP_ID,
        &GcmConfig::new("kii"),
        InMemoryStore::new(),
        transport.clone(),
    );

    (Arc::new(PushkinRegistry::new().with_pushkin(pushkin)), transport)
}

fn gcm_device(pushkey: &str) -> Value {
    json!({"app_id": GCM_APP_ID, "pushkey": pushkey})
}

fn gcm_ok(body: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        retry_after: None,
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_gcm_rejects_unregistered_token() {
    let (registry, transport) = gcm_registry(vec![gcm_ok(
        r#"{"results": [{"message_id": "0:1"}, {"error": "NotRegistered"}]}"#,
    )]);

    let (status, body) = notify(
        registry,
        notification(vec![gcm_device("A"), gcm_device("B")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected(&body), ["B"]);
    assert_eq!(transport.num_requests(), 1);
}

#[tokio::test]
async fn test_gcm_sends_repeated_pushkey_once() {
    let (registry, transport) = gcm_registry(vec![gcm_ok(r#"{"results": [{}]}"#)]);

    let (status, _) = notify(
        registry,
        notification(vec![gcm_device("A"), gcm_device("A"), gcm_device("A")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].to.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_gcm_unauthorized_gives_502() {
    let (registry, transport) = gcm_registry(vec![TransportResponse {
        status: 401,
        retry_after: None,
        body: "Unauthorized".into(),
    }]);

    let (status, body) = notify(registry, notification(vec![gcm_device("A")])).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.is_empty());
    assert_eq!(transport.num_requests(), 1);
}

#[tokio::test]
async fn test_gcm_unknown_app_rejected_alongside() {
    let (registry, _transport) = gcm_registry(vec![gcm_ok(r#"{"results": [{}]}"#)]);

    let (status, body) = notify(
        registry,
        notification(vec![
            json!({"app_id": "com.example.unknown", "pushkey": "lost"}),
            gcm_device("A"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected(&body), ["lost"]);
}

/// Store whose backend is unreachable.
struct FailingStore;

impl CanonicalIdStore for FailingStore {
    async fn resolve(&self, _reg_id: &str) -> color_eyre::eyre::Result<String> {
        color_eyre::eyre::bail!("disk I/O error")
    }

    async fn resolve_batch(
        &self,
        _reg_ids: &[String],
    ) -> color_eyre::eyre::Result<HashMap<String, String>> {
        color_eyre::eyre::bail!("disk I/O error")
    }

    async fn record_canonical(
        &self,
        _reg_id: &str,
        _canonical_reg_id: &str,
    ) -> color_eyre::eyre::Result<()> {
        color_eyre::eyre::bail!("disk I/O error")
    }
}

#[tokio::test]
async fn test_gcm_store_failure_gives_500() {
    let transport = FakeTransport::default();
    let pushkin = GcmPushkin::with_transport(
        GCM_APP_ID,
        &GcmConfig::new("kii"),
        FailingStore,
        transport.clone(),
    );
    let registry = Arc::new(PushkinRegistry::new().with_pushkin(pushkin));

    let (status, body) = notify(registry, notification(vec![gcm_device("A")])).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
    assert_eq!(transport.num_requests(), 0);
}

#[tokio::test]
async fn test_metrics_count_provider_status_codes() {
    let (registry, _transport) = gcm_registry(vec![gcm_ok(r#"{"results": [{}]}"#)]);
    let (status, _) = notify(registry, notification(vec![gcm_device("A")])).await;
    assert_eq!(status, StatusCode::OK);

    let response = metrics_router()
        .oneshot(
            Request::builder()
                .uri(METRICS_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.lines().any(|line| {
        line.starts_with("pushgate_gcm_status_codes_total{")
            && line.contains(r#"code="200""#)
            && line.contains(r#"pushkin="com.example.gcm""#)
    }));
    assert!(text.contains("pushgate_gcm_request_duration_seconds_count"));
}
