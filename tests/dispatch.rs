//! Dispatcher integration: the cancel flow against a controlled backend,
//! including a genuinely overlapping pair of dispatches for one key.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use runboard::actions::{ActionConfig, ActionDispatcher, Eligibility};
use runboard::api::{ApiClient, Backend, StubBackend};
use runboard::config::DashboardConfig;
use runboard::view::ViewState;

fn view_with(records: Vec<Value>) -> ViewState {
    let mut view = ViewState::new(DashboardConfig::bot_runs().sections.table);
    view.replace(records).unwrap();
    view
}

fn running(runid: &str) -> Value {
    json!({
        "bot_name": "voucher-entry",
        "runid": runid,
        "status": "running",
        "cancel_requested": false,
        "updated_at": "2025-11-03T10:00:00Z"
    })
}

#[tokio::test]
async fn cancel_success_patches_only_the_matching_row() {
    let stub = Arc::new(StubBackend::new());
    stub.set_post_response(json!({"runid": "run-1"}));
    let api = ApiClient::new(Box::new(stub.clone()));
    let dispatcher = ActionDispatcher::new(ActionConfig::cancel_runs("/bot-runs"));
    let view = Mutex::new(view_with(vec![running("run-1"), running("run-2")]));

    let row = view.lock().unwrap().rows()[0].clone();
    let note = dispatcher.dispatch(&api, &view, &row).await;
    assert!(note.is_success());

    let posts = stub.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "/bot-runs/run-1/cancel");
    assert_eq!(posts[0].1, json!({"reason": "Cancelled from dashboard"}));

    let view = view.into_inner().unwrap();
    assert_eq!(view.rows()[0].field("status"), Some("cancel_requested"));
    assert_eq!(view.rows()[0].field("cancel_requested"), Some("true"));
    assert_eq!(view.rows()[1].field("status"), Some("running"));
    assert!(view.needs_refresh());

    // the patched row is no longer eligible
    assert_eq!(
        dispatcher.eligibility(&view.rows()[0]),
        Eligibility::AlreadyRequested
    );
}

#[tokio::test]
async fn cancel_failure_leaves_rows_untouched() {
    let stub = Arc::new(StubBackend::new());
    stub.set_post_error("run not found");
    let api = ApiClient::new(Box::new(stub.clone()));
    let dispatcher = ActionDispatcher::new(ActionConfig::cancel_runs("/bot-runs"));
    let view = Mutex::new(view_with(vec![running("run-1")]));
    let before = view.lock().unwrap().rows().to_vec();

    let note = dispatcher.dispatch(&api, &view, &before[0]).await;
    assert!(!note.is_success());
    assert_eq!(note.description.as_deref(), Some("run not found"));
    assert_eq!(stub.posts().len(), 1);

    let view = view.into_inner().unwrap();
    assert_eq!(view.rows(), &before[..]);
    assert!(!view.needs_refresh());

    // the key is free again: a retry is allowed to go out
    assert!(!dispatcher.is_inflight("run-1"));
}

/// Backend whose POST blocks until released, so two dispatches can really
/// overlap.
struct HeldBackend {
    release: tokio::sync::Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    posts: Mutex<usize>,
}

#[async_trait]
impl Backend for HeldBackend {
    async fn get_json(&self, _path: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn post_json(&self, _path: &str, _body: &Value) -> Result<Value> {
        *self.posts.lock().unwrap() += 1;
        if let Some(rx) = self.release.lock().await.take() {
            let _ = rx.await;
        }
        Ok(json!({}))
    }
}

#[tokio::test]
async fn second_dispatch_for_same_key_is_refused_while_first_is_in_flight() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let backend = Arc::new(HeldBackend {
        release: tokio::sync::Mutex::new(Some(rx)),
        posts: Mutex::new(0),
    });
    let api = Arc::new(ApiClient::new(Box::new(backend.clone())));
    let dispatcher = Arc::new(ActionDispatcher::new(ActionConfig::cancel_runs("/bot-runs")));
    let view = Arc::new(Mutex::new(view_with(vec![running("run-1")])));
    let row = view.lock().unwrap().rows()[0].clone();

    let first = {
        let (api, dispatcher, view, row) =
            (api.clone(), dispatcher.clone(), view.clone(), row.clone());
        tokio::spawn(async move { dispatcher.dispatch(&api, &view, &row).await })
    };

    // wait for the first request to be in flight
    while !dispatcher.is_inflight("run-1") {
        tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
    }

    let second = dispatcher.dispatch(&api, &view, &row).await;
    assert!(!second.is_success());
    assert_eq!(second.title, "Cancel already in flight");
    assert_eq!(*backend.posts.lock().unwrap(), 1, "second dispatch must not reach the wire");

    tx.send(()).unwrap();
    let first = first.await.unwrap();
    assert!(first.is_success());
    assert!(!dispatcher.is_inflight("run-1"));
    assert_eq!(
        view.lock().unwrap().rows()[0].field("status"),
        Some("cancel_requested")
    );
}
