//! Maps incoming alert events to the actions taken in response.
use crate::constants::{EVENT_DATA_CLUSTER_NAME, EVENT_DATA_INSTANCE, SPOT_TERMINATION_NOTICE_EVENT};
use crate::error::{self, Result};
use crate::resolver::ClusterResolver;
use drainer::{DrainPolicy, DrainReport, DrainRequest, EvacuationSettings, NodeDrainer};

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tracing::{event, instrument, Level};

use std::collections::HashMap;

pub const STATUS_OK: &str = "ok";

/// An alert forwarded by the alerting pipeline.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub event_type: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// The response to a handled alert.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ActionResult {
    pub status: String,
    /// Present when the alert triggered a drain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DrainReport>,
}

impl ActionResult {
    fn ok(report: Option<DrainReport>) -> Self {
        ActionResult {
            status: STATUS_OK.to_string(),
            report,
        }
    }
}

pub struct EventRouter<R: ClusterResolver> {
    resolver: R,
    policy: DrainPolicy,
    settings: EvacuationSettings,
}

impl<R: ClusterResolver> EventRouter<R> {
    pub fn new(resolver: R, policy: DrainPolicy, settings: EvacuationSettings) -> Self {
        EventRouter {
            resolver,
            policy,
            settings,
        }
    }

    /// Handles an alert. Events without a registered action are acknowledged and otherwise ignored.
    #[instrument(skip(self, alert), fields(event_type = %alert.event_type), err)]
    pub async fn route_event(&self, alert: &AlertEvent) -> Result<ActionResult> {
        event!(Level::INFO, "Received {}", alert.event_type);

        match alert.event_type.as_str() {
            SPOT_TERMINATION_NOTICE_EVENT => {
                let report = self.drain_instance(alert).await?;
                Ok(ActionResult::ok(Some(report)))
            }
            _ => {
                event!(
                    Level::DEBUG,
                    "No action registered for event '{}'.",
                    alert.event_type
                );
                Ok(ActionResult::ok(None))
            }
        }
    }

    async fn drain_instance(&self, alert: &AlertEvent) -> Result<DrainReport> {
        let node_name = alert
            .data
            .get(EVENT_DATA_INSTANCE)
            .filter(|instance| !instance.is_empty())
            .context(error::MissingEventDataSnafu {
                event_type: &alert.event_type,
                key: EVENT_DATA_INSTANCE,
            })?;
        let cluster_name = alert
            .data
            .get(EVENT_DATA_CLUSTER_NAME)
            .cloned()
            .unwrap_or_default();

        let client = self.resolver.resolve(&cluster_name).await?;
        let request = DrainRequest {
            node_name: node_name.clone(),
            cluster_name,
            policy: self.policy.clone(),
        };

        let report = NodeDrainer::new(client, self.settings.clone())
            .drain(&request)
            .await
            .context(error::DrainSnafu { node_name })?;

        event!(
            Level::INFO,
            evacuated = report.evacuated.len(),
            skipped = report.skipped.len(),
            already_cordoned = report.already_cordoned,
            "Drained Node '{}'.",
            report.node_name
        );
        Ok(report)
    }
}
