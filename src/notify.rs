use crate::logging::{self, obj, v_str, Domain, Level};

/// Outcome surfaced to the person driving the dashboard. The host UI turns
/// these into toasts; they are non-blocking by contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotifyKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            kind: NotifyKind::Success,
            title: title.into(),
            description: None,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotifyKind::Error,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind == NotifyKind::Success
    }

    /// Mirror the notification into the structured log.
    pub fn emit(&self, domain: Domain) {
        let level = match self.kind {
            NotifyKind::Success => Level::Info,
            NotifyKind::Error => Level::Error,
        };
        logging::log(
            level,
            domain,
            "notify",
            obj(&[
                ("msg", v_str(&self.title)),
                (
                    "description",
                    self.description.as_deref().map(v_str).unwrap_or(serde_json::Value::Null),
                ),
            ]),
        );
    }
}
