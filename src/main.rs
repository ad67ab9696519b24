use anyhow::Result;
use serde_json::json;
use tokio::time::{sleep, Duration};

use runboard::api::describe::ServiceDescription;
use runboard::api::http::HttpBackend;
use runboard::api::retry::{retry_fetch, RetryConfig};
use runboard::api::ApiClient;
use runboard::columns::{build_columns, ColumnDescriptor};
use runboard::config::ServerConfig;
use runboard::logging::{self, json_log, log_fetch, log_metric, obj, v_num, v_str};
use runboard::metrics::compute_metrics;
use runboard::view::ViewState;

#[tokio::main]
async fn main() -> Result<()> {
    let server = ServerConfig::from_env();
    let dashboard = server.load_dashboard()?;

    json_log(
        "startup",
        obj(&[
            ("view", v_str(&dashboard.title)),
            ("api_base", v_str(&dashboard.api_base)),
            ("poll_secs", v_num(server.poll_secs as f64)),
        ]),
    );

    // Authenticated client when a key is configured, anonymous otherwise
    let authed = server.api_key.is_some();
    json_log(
        "api_client",
        obj(&[
            ("base", v_str(&server.api_base_url)),
            ("auth", v_str(if authed { "x-api-key" } else { "anonymous" })),
        ]),
    );
    let api = ApiClient::new(Box::new(HttpBackend::new(
        server.api_base_url.clone(),
        server.api_key.clone(),
    )));

    // Advisory: note whether the backend declares a schema for this view
    match ServiceDescription::fetch(api.backend()).await {
        Ok(desc) => json_log(
            "service_description",
            obj(&[
                ("title", desc.title().map(v_str).unwrap_or(serde_json::Value::Null)),
                (
                    "declares_view_schema",
                    json!(desc.schema_for(&dashboard.api_base, "get").is_some()),
                ),
            ]),
        ),
        Err(err) => json_log(
            "service_description",
            obj(&[("status", v_str("unavailable")), ("error", v_str(&err.to_string()))]),
        ),
    }

    let table = dashboard.sections.table.clone();
    let columns = build_columns(&table, Some(ColumnDescriptor::actions("Actions")));
    json_log(
        "columns",
        obj(&[
            ("view", v_str(&dashboard.title)),
            ("count", json!(columns.len())),
        ]),
    );

    let mut view = ViewState::new(table);
    let retry_cfg = RetryConfig::default();

    loop {
        {
            let _cycle = logging::ProfileScope::new("poll_cycle");
            let started = std::time::Instant::now();

            let records = retry_fetch(&retry_cfg, "load_records", || {
                api.load_records(&dashboard.api_base)
            })
            .await?;
            log_fetch(
                &dashboard.api_base,
                records.len(),
                started.elapsed().as_secs_f64() * 1000.0,
            );

            // A rejected batch keeps the previous rows; the render for this
            // cycle fails, the loop does not.
            match view.replace(records) {
                Ok(()) => {
                    logging::log_rows(&dashboard.title, view.records().len(), view.rows().len())
                }
                Err(err) => json_log(
                    "rows_rejected",
                    obj(&[
                        ("view", v_str(&dashboard.title)),
                        ("error", v_str(&err.to_string())),
                    ]),
                ),
            }

            if dashboard.sections.cards.show {
                for metric in compute_metrics(view.records(), &dashboard.sections.cards.metrics) {
                    log_metric(&dashboard.title, &metric.label, metric.value);
                }
            }
        }

        sleep(Duration::from_secs(server.poll_secs)).await;
    }
}
