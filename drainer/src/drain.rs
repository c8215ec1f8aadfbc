//! Drives a drain through its phases: cordon, Pod selection, eviction discovery and Pod removal.
use crate::cluster::ClusterClient;
use crate::constants::DEFAULT_GRACE_PERIOD_SECONDS;
use crate::discovery::{probe_eviction_support, EvictionStrategy};
use crate::error::Result;
use crate::node::{cordon_node, CordonOutcome};
use crate::pod::evacuate::{EvacuationSettings, Evacuator};
use crate::pod::filter::{select_pods, SkippedPod};
use crate::pod::PodRef;

use serde::Serialize;
use tokio::time::Duration;
use tracing::{event, instrument, Level};

/// Controls which Pods a drain may remove and how long it may take.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DrainPolicy {
    /// Remove Pods which have no controller, and Pods whose DaemonSet no longer exists.
    pub force: bool,
    /// Leave DaemonSet Pods in place instead of refusing to drain.
    pub ignore_daemon_set_pods: bool,
    /// Remove Pods using `emptyDir` volumes, losing their data.
    pub delete_local_storage: bool,
    pub grace_period_seconds: u32,
    /// Deadline for removing Pods. `None` or zero waits indefinitely.
    pub timeout: Option<Duration>,
}

/// The Node is about to be lost, so by default nothing is allowed to hold the drain up.
impl Default for DrainPolicy {
    fn default() -> Self {
        DrainPolicy {
            force: true,
            ignore_daemon_set_pods: true,
            delete_local_storage: true,
            grace_period_seconds: DEFAULT_GRACE_PERIOD_SECONDS,
            timeout: None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DrainRequest {
    pub node_name: String,
    /// Names the cluster the Node belongs to. Empty for the default cluster.
    pub cluster_name: String,
    pub policy: DrainPolicy,
}

/// The result of a successful drain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DrainReport {
    pub node_name: String,
    pub already_cordoned: bool,
    /// `None` when no Pods needed to be removed.
    pub strategy: Option<EvictionStrategy>,
    pub evacuated: Vec<PodRef>,
    pub skipped: Vec<SkippedPod>,
}

/// Drains Nodes using a single cluster client.
#[derive(Clone)]
pub struct NodeDrainer<C: ClusterClient> {
    client: C,
    settings: EvacuationSettings,
}

impl<C: ClusterClient> NodeDrainer<C> {
    pub fn new(client: C, settings: EvacuationSettings) -> Self {
        NodeDrainer { client, settings }
    }

    /// Cordons the requested Node and removes every Pod which the policy allows.
    ///
    /// The Node is left cordoned when the drain fails.
    #[instrument(
        skip(self, request),
        fields(node = %request.node_name, cluster = %request.cluster_name),
        err
    )]
    pub async fn drain(&self, request: &DrainRequest) -> Result<DrainReport> {
        let node_name = request.node_name.as_str();
        let policy = &request.policy;

        event!(Level::INFO, "Cordoning Node '{}'.", node_name);
        let cordon = cordon_node(&self.client, node_name).await?;

        event!(Level::INFO, "Selecting Pods to remove from Node '{}'.", node_name);
        let selection = select_pods(&self.client, node_name, policy).await?;

        let mut report = DrainReport {
            node_name: node_name.to_string(),
            already_cordoned: cordon == CordonOutcome::AlreadyCordoned,
            strategy: None,
            evacuated: Vec::new(),
            skipped: selection.skipped,
        };
        if selection.eligible.is_empty() {
            event!(Level::INFO, "No Pods to remove from Node '{}'.", node_name);
            return Ok(report);
        }

        event!(Level::INFO, "Checking whether the cluster supports evictions.");
        let strategy = probe_eviction_support(&self.client).await?;

        event!(
            Level::INFO,
            %strategy,
            pods = selection.eligible.len(),
            "Removing Pods from Node '{}'.",
            node_name
        );
        report.evacuated = Evacuator::new(&self.client, &self.settings, policy.grace_period_seconds)
            .evacuate(node_name, &selection.eligible, &strategy, policy.timeout)
            .await?;
        report.strategy = Some(strategy);

        event!(Level::INFO, "Node '{}' drained successfully.", node_name);
        Ok(report)
    }
}
