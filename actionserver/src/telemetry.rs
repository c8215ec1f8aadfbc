use crate::api::NO_TELEMETRY_ENDPOINTS;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use tracing::Span;
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};

/// Builds the root span of each HTTP request. Health checks are not recorded.
#[derive(Default)]
pub(crate) struct ActionServerRootSpanBuilder;

impl RootSpanBuilder for ActionServerRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        if NO_TELEMETRY_ENDPOINTS.contains(&request.path()) {
            Span::none()
        } else {
            tracing_actix_web::root_span!(request)
        }
    }

    fn on_request_end<B: MessageBody>(
        span: Span,
        response: &std::result::Result<ServiceResponse<B>, actix_web::Error>,
    ) {
        DefaultRootSpanBuilder::on_request_end(span, response);
    }
}
