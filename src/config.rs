use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricSpec;

/// Per-view dashboard descriptor. Loaded once per view, data only: the
/// normalizer, validator, column generator and card metrics are all driven
/// off this structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    pub title: String,
    pub api_base: String,
    pub sections: Sections,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sections {
    pub cards: CardsSection,
    pub chart: ChartSection,
    pub table: TableSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardsSection {
    pub show: bool,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSection {
    pub show: bool,
    pub x_key: String,
    pub y_key: String,
    pub label: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSection {
    pub show: bool,
    pub display_keys: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub keep_full_record: bool,
    /// Field of the raw record carrying the stable backend identity for a
    /// row. Positional order is only a render hint; this key is what
    /// actions and patches match on.
    #[serde(default)]
    pub entity_key: Option<String>,
}

impl TableSection {
    /// Header text for a display key: configured label, else the key verbatim.
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.labels.get(key).map(String::as_str).unwrap_or(key)
    }
}

impl DashboardConfig {
    /// Built-in bot-runs view, used when no config file is supplied.
    pub fn bot_runs() -> Self {
        Self {
            title: "Bot Runs".to_string(),
            api_base: "/bot-runs".to_string(),
            sections: Sections {
                cards: CardsSection {
                    show: true,
                    metrics: vec![
                        MetricSpec::count("Total Runs", "runid", "var(--chart-1)"),
                        MetricSpec::count_true("Cancel Requested", "cancel_requested", "red"),
                        MetricSpec::count_false("Active or Finished", "cancel_requested", "green"),
                    ],
                },
                chart: ChartSection {
                    show: false,
                    x_key: "updated_at".to_string(),
                    y_key: "runid".to_string(),
                    label: "Runs over time".to_string(),
                    color: Some("var(--chart-1)".to_string()),
                },
                table: TableSection {
                    show: true,
                    display_keys: vec![
                        "bot_name".to_string(),
                        "runid".to_string(),
                        "status".to_string(),
                        "cancel_requested".to_string(),
                        "updated_at".to_string(),
                    ],
                    labels: [
                        ("bot_name", "Bot"),
                        ("runid", "Run ID"),
                        ("status", "Status"),
                        ("cancel_requested", "Cancel Requested"),
                        ("updated_at", "Updated"),
                    ]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                    keep_full_record: true,
                    entity_key: Some("runid".to_string()),
                },
            },
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read dashboard config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid dashboard config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load-time checks. Unknown metric kinds are already rejected by serde;
    /// this covers the structural invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("dashboard config: title is empty");
        }
        if self.api_base.trim().is_empty() {
            bail!("dashboard config: apiBase is empty");
        }
        let table = &self.sections.table;
        if table.show && table.display_keys.is_empty() {
            bail!("dashboard config: table.show set but displayKeys is empty");
        }
        if let Some(key) = &table.entity_key {
            if key.trim().is_empty() {
                bail!("dashboard config: entityKey is empty");
            }
        }
        let chart = &self.sections.chart;
        if chart.show && (chart.x_key.is_empty() || chart.y_key.is_empty()) {
            bail!("dashboard config: chart.show set but xKey/yKey missing");
        }
        Ok(())
    }
}

/// Process-level settings, one env var per knob.
#[derive(Clone)]
pub struct ServerConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub poll_secs: u64,
    pub gateway_addr: String,
    pub session_secret: Option<String>,
    pub protected_prefix: String,
    pub login_path: String,
    pub dashboard_config_path: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()),
            api_key: std::env::var("API_KEY").ok(),
            poll_secs: std::env::var("POLL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(300),
            gateway_addr: std::env::var("GATEWAY_ADDR").unwrap_or_else(|_| "127.0.0.1:8765".to_string()),
            session_secret: std::env::var("SESSION_SECRET").ok(),
            protected_prefix: std::env::var("PROTECTED_PREFIX").unwrap_or_else(|_| "/dashboard".to_string()),
            login_path: std::env::var("LOGIN_PATH").unwrap_or_else(|_| "/auth/login".to_string()),
            dashboard_config_path: std::env::var("DASHBOARD_CONFIG").ok(),
        }
    }

    pub fn load_dashboard(&self) -> Result<DashboardConfig> {
        match &self.dashboard_config_path {
            Some(path) => DashboardConfig::from_json_file(Path::new(path)),
            None => {
                let cfg = DashboardConfig::bot_runs();
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }
}
