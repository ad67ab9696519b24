use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::json;

use crate::api::{encode_segment, ApiClient};
use crate::logging::log_action;
use crate::notify::Notification;
use crate::rows::Row;
use crate::view::{OptimisticPatch, ViewState};

/// Describes one side-effecting row action (the cancel flow is the
/// canonical instance): which fields identify and gate it, which endpoint
/// it posts to, and how the optimistic patch looks.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// Path verb appended after the identifier, e.g. `cancel`.
    pub name: String,
    pub api_base: String,
    pub id_field: String,
    pub status_field: String,
    pub flag_field: String,
    pub patched_status: String,
    /// Statuses after which the action is never offered.
    pub terminal_states: Vec<String>,
    pub reason: String,
}

impl ActionConfig {
    pub fn cancel_runs(api_base: &str) -> Self {
        Self {
            name: "cancel".to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            id_field: "runid".to_string(),
            status_field: "status".to_string(),
            flag_field: "cancel_requested".to_string(),
            patched_status: "cancel_requested".to_string(),
            terminal_states: vec![
                "completed".to_string(),
                "failed".to_string(),
                "cancelled".to_string(),
            ],
            reason: "Cancelled from dashboard".to_string(),
        }
    }

    pub fn endpoint(&self, key: &str) -> String {
        format!("{}/{}/{}", self.api_base, encode_segment(key), self.name)
    }

    fn patch(&self) -> OptimisticPatch {
        OptimisticPatch {
            id_field: self.id_field.clone(),
            status_field: self.status_field.clone(),
            patched_status: self.patched_status.clone(),
            flag_field: self.flag_field.clone(),
        }
    }
}

/// Whether the action is offered for a row, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Offer,
    /// Hosts render this one as a passive badge.
    AlreadyRequested,
    Terminal,
    NoIdentifier,
}

/// Keys with a request outstanding. The dispatcher consults and updates it
/// atomically, so single-flight-per-identifier holds even if a UI forgets
/// to disable its control.
#[derive(Default)]
pub struct InflightRegistry {
    inner: Mutex<HashSet<String>>,
}

impl InflightRegistry {
    /// Atomic check-and-insert. False means a request for this key is
    /// already outstanding (a poisoned lock also refuses).
    pub fn begin(&self, key: &str) -> bool {
        match self.inner.lock() {
            Ok(mut set) => set.insert(key.to_string()),
            Err(_) => false,
        }
    }

    pub fn finish(&self, key: &str) {
        if let Ok(mut set) = self.inner.lock() {
            set.remove(key);
        }
    }

    pub fn is_inflight(&self, key: &str) -> bool {
        self.inner
            .lock()
            .map(|set| set.contains(key))
            .unwrap_or(true)
    }
}

pub struct ActionDispatcher {
    cfg: ActionConfig,
    registry: InflightRegistry,
}

impl ActionDispatcher {
    pub fn new(cfg: ActionConfig) -> Self {
        Self {
            cfg,
            registry: InflightRegistry::default(),
        }
    }

    pub fn config(&self) -> &ActionConfig {
        &self.cfg
    }

    /// UI hook: the triggering control stays disabled while this is true.
    pub fn is_inflight(&self, key: &str) -> bool {
        self.registry.is_inflight(key)
    }

    /// Offer the action only when an identifier resolves, the request flag
    /// is not already raised (compared case-insensitively against "true"),
    /// and the status is not terminal.
    pub fn eligibility(&self, row: &Row) -> Eligibility {
        let id = row
            .lookup(&self.cfg.id_field)
            .filter(|k| !k.is_empty());
        if id.is_none() {
            return Eligibility::NoIdentifier;
        }
        let requested = row
            .lookup(&self.cfg.flag_field)
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        if requested {
            return Eligibility::AlreadyRequested;
        }
        let status = row
            .lookup(&self.cfg.status_field)
            .unwrap_or_default()
            .to_lowercase();
        if self.cfg.terminal_states.iter().any(|t| t == &status) {
            return Eligibility::Terminal;
        }
        Eligibility::Offer
    }

    /// Issue exactly one request for the row's identifier. Every failure is
    /// recovered here into a notification; nothing propagates upward, and
    /// on failure the view is left untouched. The view lock is taken only
    /// for the patch, after the response has arrived.
    pub async fn dispatch(
        &self,
        api: &ApiClient,
        view: &Mutex<ViewState>,
        row: &Row,
    ) -> Notification {
        let key = match row.lookup(&self.cfg.id_field).filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => {
                log_action("", &self.cfg.name, "missing_identifier");
                return Notification::error(
                    "Missing run id",
                    "Unable to cancel without a run identifier.",
                );
            }
        };

        match self.eligibility(row) {
            Eligibility::Offer => {}
            Eligibility::AlreadyRequested => {
                log_action(&key, &self.cfg.name, "already_requested");
                return Notification::error(
                    "Cancel already requested",
                    format!("Run {} already has a cancel request.", key),
                );
            }
            Eligibility::Terminal => {
                log_action(&key, &self.cfg.name, "terminal_state");
                return Notification::error(
                    "Run already finished",
                    format!("Run {} is in a terminal state.", key),
                );
            }
            Eligibility::NoIdentifier => {
                log_action("", &self.cfg.name, "missing_identifier");
                return Notification::error(
                    "Missing run id",
                    "Unable to cancel without a run identifier.",
                );
            }
        }

        if !self.registry.begin(&key) {
            log_action(&key, &self.cfg.name, "in_flight");
            return Notification::error(
                "Cancel already in flight",
                format!("A cancel request for {} is still outstanding.", key),
            );
        }

        let path = self.cfg.endpoint(&key);
        let body = json!({ "reason": self.cfg.reason });
        let result = api.post(&path, &body).await;

        let note = match result {
            Ok(resp) => {
                if let Ok(mut view) = view.lock() {
                    view.apply_patch(&self.cfg.patch(), &key);
                }
                log_action(&key, &self.cfg.name, "requested");
                let ack = resp
                    .get(&self.cfg.id_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or(&key);
                Notification::success(format!("Cancel requested for {}", ack))
            }
            Err(err) => {
                log_action(&key, &self.cfg.name, "failed");
                let msg = err.to_string();
                let description = if msg.is_empty() {
                    "Something went wrong while cancelling.".to_string()
                } else {
                    msg
                };
                Notification::error("Unable to cancel run", description)
            }
        };
        self.registry.finish(&key);
        note
    }
}
