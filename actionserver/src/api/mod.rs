//! This module contains the action server's HTTP API.
mod alert;
mod ping;

use crate::constants::{ALERT_ENDPOINT, HEALTH_CHECK_ROUTE};
use crate::error::{self, Result};
use crate::resolver::ClusterResolver;
use crate::router::EventRouter;
use crate::telemetry;

use actix_web::{
    web::{self, Data},
    App, HttpServer,
};
use snafu::ResultExt;
use tracing::{event, Level};
use tracing_actix_web::TracingLogger;

// The set of API endpoints for which `tracing::Span`s will not be recorded.
pub const NO_TELEMETRY_ENDPOINTS: &[&str] = &[HEALTH_CHECK_ROUTE];

/// Settings that are applied to the action server. The router is provided to each HTTP route via actix's
/// application data system.
pub struct ActionServerSettings<R: ClusterResolver> {
    pub router: EventRouter<R>,
    pub bind_address: String,
    pub server_port: u16,
}

/// Formats a socket address, bracketing IPv6 addresses.
fn server_addr(bind_address: &str, server_port: u16) -> String {
    if bind_address.contains(':') {
        format!("[{}]:{}", bind_address, server_port)
    } else {
        format!("{}:{}", bind_address, server_port)
    }
}

/// Runs the action server using the given settings.
pub async fn run_server<R: ClusterResolver + 'static>(
    settings: ActionServerSettings<R>,
) -> Result<()> {
    let server_addr = server_addr(&settings.bind_address, settings.server_port);
    event!(Level::INFO, %server_addr, "Starting action server.");

    let router = Data::new(settings.router);
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::<telemetry::ActionServerRootSpanBuilder>::new())
            .app_data(router.clone())
            .service(
                web::resource(ALERT_ENDPOINT).route(web::post().to(alert::handle_alert::<R>)),
            )
            .route(HEALTH_CHECK_ROUTE, web::get().to(ping::health_check))
    })
    .bind(server_addr)
    .context(error::HttpServerSnafu)?
    .run()
    .await
    .context(error::HttpServerSnafu)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_server_addr() {
        let test_cases = vec![
            ("0.0.0.0", 8887, "0.0.0.0:8887"),
            ("::", 9000, "[::]:9000"),
        ];

        for (bind_address, port, expected) in test_cases {
            assert_eq!(server_addr(bind_address, port), expected);
        }
    }
}
