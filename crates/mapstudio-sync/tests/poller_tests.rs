use async_trait::async_trait;
use mapstudio_sync::{
    AuditEvent, AuditPoller, AuditSource, PollOutcome, PollScope, SourceError, StudioConfig,
    StudioResponse, StudioSession,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Returns one fixed audit row per call and counts calls.
struct FixedSource {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl FixedSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl AuditSource for FixedSource {
    async fn fetch_audit(&self, conversation_id: &str) -> Result<Vec<AuditEvent>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SourceError::Request("connection refused".into()));
        }
        Ok(vec![AuditEvent {
            audit_id: Some(1),
            conversation_id: Some(conversation_id.to_string()),
            payload_json: Some(
                json!({"inputParams": {"mapping_suggestions": [{"sourcePath": "a", "targetPath": "b"}]}})
                    .to_string(),
            ),
            ..AuditEvent::default()
        }])
    }
}

#[tokio::test]
async fn first_poll_is_immediate_and_tagged() {
    let scope = PollScope::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = AuditPoller::spawn(
        Arc::new(FixedSource::new()),
        "conv-1",
        Duration::from_secs(60),
        &scope,
        tx,
    );

    let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("first poll arrives")
        .expect("channel open");
    assert_eq!(update.generation, poller.generation());
    assert_eq!(update.conversation_id, "conv-1");
    assert!(matches!(update.outcome, PollOutcome::Events(ref rows) if rows.len() == 1));
    assert_eq!(poller.stats().polls, 1);
    poller.shutdown().await;
}

#[tokio::test]
async fn cancel_stops_requests_and_retires_the_generation() {
    let scope = PollScope::new();
    let source = Arc::new(FixedSource::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = AuditPoller::spawn(source.clone(), "conv-1", Duration::from_millis(10), &scope, tx);

    rx.recv().await.expect("at least one poll");
    let generation = poller.generation();
    poller.shutdown().await;
    assert!(!scope.is_current(generation));

    let calls = source.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn in_flight_response_after_cancel_is_never_delivered() {
    let scope = PollScope::new();
    let source = Arc::new(FixedSource {
        delay: Duration::from_millis(200),
        ..FixedSource::new()
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = AuditPoller::spawn(source.clone(), "conv-1", Duration::from_millis(10), &scope, tx);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    poller.shutdown().await;

    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn zero_interval_still_polls() {
    let scope = PollScope::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = AuditPoller::spawn(Arc::new(FixedSource::new()), "conv-1", Duration::ZERO, &scope, tx);

    let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("poll arrives")
        .expect("channel open");
    assert_eq!(update.generation, poller.generation());
    assert!(poller.stats().polls >= 1);
    poller.shutdown().await;
    assert!(!scope.is_current(update.generation));
}

#[tokio::test]
async fn failures_are_reported_as_updates() {
    let scope = PollScope::new();
    let source = Arc::new(FixedSource {
        fail: true,
        ..FixedSource::new()
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = AuditPoller::spawn(source, "conv-1", Duration::from_secs(60), &scope, tx);

    let update = rx.recv().await.expect("failure update");
    assert!(matches!(update.outcome, PollOutcome::Failed { .. }));
    assert_eq!(poller.stats().failures, 1);
    poller.cancel();
}

#[tokio::test]
async fn session_applies_only_current_poller_updates() {
    let mut session = StudioSession::new(StudioConfig {
        poll_interval_ms: 10,
        ..StudioConfig::default()
    });
    session.apply_response(StudioResponse {
        conversation_id: "conv-1".into(),
        context_json: "{}".into(),
        ..StudioResponse::default()
    });

    let source: Arc<dyn AuditSource> = Arc::new(FixedSource::new());
    let (first, mut first_rx) = session
        .spawn_audit_poller(Arc::clone(&source))
        .expect("conversation is known");
    let stale = first_rx.recv().await.expect("first poller update");
    first.shutdown().await;

    let (second, mut second_rx) = session
        .spawn_audit_poller(source)
        .expect("conversation is known");
    let fresh = second_rx.recv().await.expect("second poller update");

    assert!(!session.apply_poll_update(stale));
    assert!(session.mapping().records().is_empty());
    assert!(session.apply_poll_update(fresh.clone()));
    assert_eq!(session.mapping().records().len(), 1);
    assert_eq!(session.mapping().records()[0].source_path, "a");

    second.shutdown().await;
    assert!(!session.apply_poll_update(fresh));
}
