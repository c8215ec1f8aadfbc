use actionserver::api::{self, ActionServerSettings};
use actionserver::config::ActionServerConfig;
use actionserver::error::{self, Result};
use actionserver::resolver::KubeconfigResolver;
use actionserver::router::EventRouter;
use drainer::telemetry::{init_telemetry, LogSettings};

use snafu::ResultExt;
use tracing::{event, Level};

use std::env;
use std::fs;
use std::process;

// By default, errors resulting in termination of the action server are written to this file,
// which is the location kubernetes uses by default to surface termination-causing errors.
const TERMINATION_LOG: &str = "/dev/termination-log";

#[actix_web::main]
async fn main() {
    let termination_log = env::var("TERMINATION_LOG").unwrap_or(TERMINATION_LOG.to_string());

    if let Err(error) = run_server().await {
        event!(Level::ERROR, %error, "Action server failed.");
        if let Err(write_error) = fs::write(&termination_log, format!("{}", error)) {
            eprintln!(
                "Could not write k8s termination log '{}': '{}'",
                termination_log, write_error
            );
        }
        process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let log_settings = LogSettings::try_from_env().context(error::TelemetryConfigurationSnafu)?;
    init_telemetry(&log_settings).context(error::TelemetryConfigurationSnafu)?;

    let config = ActionServerConfig::from_env()?;
    event!(Level::INFO, ?config, "Loaded configuration.");

    let router = EventRouter::new(
        KubeconfigResolver::new(&config.kubeconfig_root),
        config.drain_policy,
        config.evacuation,
    );

    api::run_server(ActionServerSettings {
        router,
        bind_address: config.bind_address,
        server_port: config.port,
    })
    .await
}
