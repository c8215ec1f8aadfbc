use drainer::telemetry::TelemetryConfigError;
use drainer::DrainError;

use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use kube::config::KubeconfigError;
use snafu::Snafu;

use std::path::PathBuf;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "Could not parse environment variable '{}={}': '{}'",
        variable,
        value,
        message
    ))]
    InvalidEnv {
        variable: &'static str,
        value: String,
        message: String,
    },

    #[snafu(display("Unable to read kubeconfig '{}': '{}'", path.display(), source))]
    ReadKubeConfig {
        path: PathBuf,
        source: KubeconfigError,
    },

    #[snafu(display("Unable to load kubeconfig '{}': '{}'", path.display(), source))]
    LoadKubeConfig {
        path: PathBuf,
        source: KubeconfigError,
    },

    #[snafu(display("Unable to create client: '{}'", source))]
    CreateK8sClient { source: kube::Error },

    #[snafu(display("Event '{}' is missing data '{}'", event_type, key))]
    MissingEventData {
        event_type: String,
        key: &'static str,
    },

    #[snafu(display("Failed to drain Node '{}': '{}'", node_name, source))]
    Drain {
        node_name: String,
        source: DrainError,
    },

    #[snafu(display("Error running HTTP server: '{}'", source))]
    HttpServer { source: std::io::Error },

    #[snafu(display("Error configuring tracing: '{}'", source))]
    TelemetryConfiguration { source: TelemetryConfigError },
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingEventData { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
