//! Queue one bot run from the command line.
//!
//! Usage: cargo run --bin launch_run [vendor]
//! Vendor defaults to the first configured option; TEST_MODE=0 disables
//! test mode.

use anyhow::Result;

use runboard::api::http::HttpBackend;
use runboard::api::ApiClient;
use runboard::config::ServerConfig;
use runboard::launcher::{launch, LaunchForm, LauncherSpec};
use runboard::logging::Domain;

#[tokio::main]
async fn main() -> Result<()> {
    let server = ServerConfig::from_env();
    let spec = LauncherSpec::voucher_entry();

    let vendor = std::env::args()
        .nth(1)
        .unwrap_or_else(|| spec.vendors[0].value.clone());
    let mut form = LaunchForm::for_vendor(&spec, &vendor)?;
    if let Ok(v) = std::env::var("TEST_MODE") {
        form.test_mode = matches!(v.as_str(), "1" | "true" | "yes");
    }

    let api = ApiClient::new(Box::new(HttpBackend::new(
        server.api_base_url.clone(),
        server.api_key.clone(),
    )));

    let outcome = launch(&api, &spec, &form).await;
    outcome.notification.emit(Domain::Launch);
    match outcome.run_key {
        Some(key) => {
            println!("queued: {}", key);
            Ok(())
        }
        None if outcome.notification.is_success() => Ok(()),
        None => std::process::exit(1),
    }
}
