use crate::error::Result;
use crate::resolver::ClusterResolver;
use crate::router::{AlertEvent, EventRouter};

use actix_web::{web, HttpResponse, Responder};

/// HTTP endpoint which receives alert events and runs the action registered for them, such as draining a Node
/// that is about to be terminated.
pub(crate) async fn handle_alert<R: ClusterResolver>(
    router: web::Data<EventRouter<R>>,
    alert: web::Json<AlertEvent>,
) -> Result<impl Responder> {
    let result = router.route_event(&alert).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::ALERT_ENDPOINT;
    use crate::resolver::mock::MockClusterResolver;
    use crate::router::test::{empty_node_client, router, spot_termination};
    use drainer::cluster::mock::MockClusterClient;
    use drainer::cluster::ClusterClientError;

    use actix_web::{http::StatusCode, test, web::Data, App};
    use maplit::hashmap;
    use serde_json::{json, Value};

    use std::sync::Arc;

    async fn post_alert(
        router: EventRouter<MockClusterResolver>,
        body: Value,
    ) -> (StatusCode, String) {
        let app = test::init_service(
            App::new()
                .route(
                    ALERT_ENDPOINT,
                    web::post().to(handle_alert::<MockClusterResolver>),
                )
                .app_data(Data::new(router)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(ALERT_ENDPOINT)
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[actix_web::test]
    async fn test_spot_termination() {
        let router = router(|resolver| {
            resolver
                .expect_resolve()
                .times(1)
                .returning(|_| Ok(Arc::new(empty_node_client())));
        });
        let alert = spot_termination(hashmap! {
            "instance".to_string() => "node-1".to_string(),
            "cluster_name".to_string() => "spot-east".to_string(),
        });

        let (status, body) = post_alert(router, serde_json::to_value(alert).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["report"]["node_name"], "node-1");
        assert_eq!(body["report"]["already_cordoned"], true);
    }

    #[actix_web::test]
    async fn test_unhandled_event() {
        let router = router(|resolver| {
            resolver.expect_resolve().never();
        });

        let (status, body) = post_alert(
            router,
            json!({"event_type": "prometheus.server.alert.HighCpuUsage"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"status": "ok"})
        );
    }

    #[actix_web::test]
    async fn test_missing_instance_is_a_bad_request() {
        let router = router(|resolver| {
            resolver.expect_resolve().never();
        });

        let (status, body) = post_alert(
            router,
            json!({
                "event_type": "prometheus.server.alert.SpotTerminationNotice",
                "data": {"cluster_name": "spot-east"},
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("missing data 'instance'"), "{}", body);
    }

    #[actix_web::test]
    async fn test_drain_failure_is_a_server_error() {
        let router = router(|resolver| {
            resolver.expect_resolve().returning(|_| {
                let mut client = MockClusterClient::new();
                client.expect_get_node().returning(|name| {
                    Err(ClusterClientError::NotFound {
                        kind: "Node",
                        name: name.to_string(),
                    })
                });
                Ok(Arc::new(client))
            });
        });

        let (status, body) = post_alert(
            router,
            json!({
                "event_type": "prometheus.server.alert.SpotTerminationNotice",
                "data": {"instance": "node-1"},
            }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Failed to drain Node 'node-1'"), "{}", body);
    }
}
