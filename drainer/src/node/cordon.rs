use super::patch::merge_patch_diff;
use crate::cluster::ClusterClient;
use crate::error::{self, Result};

use k8s_openapi::api::core::v1::Node;
use serde::Serialize;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

/// The result of a successful cordon.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CordonOutcome {
    /// The Node was schedulable and has been patched.
    Cordoned,
    /// The Node was already unschedulable; nothing was sent to Kubernetes.
    AlreadyCordoned,
}

/// Marks the given Node as unschedulable, preventing Pods from being deployed onto it.
///
/// Rather than overwriting the Node, only the `spec.unschedulable` change is sent as a merge patch, so that
/// updates made concurrently by other controllers (e.g. to the Node's status or labels) are not clobbered.
/// Failures are not retried.
#[instrument(skip(client), err)]
pub async fn cordon_node<C: ClusterClient>(client: &C, node_name: &str) -> Result<CordonOutcome> {
    let node = client
        .get_node(node_name)
        .await
        .context(error::CordonSnafu { node_name })?;

    if is_unschedulable(&node) {
        event!(Level::INFO, "Node '{}' is already unschedulable.", node_name);
        return Ok(CordonOutcome::AlreadyCordoned);
    }

    let patch = cordon_patch(&node).context(error::CordonPatchSnafu { node_name })?;
    let node = client
        .patch_node(node_name, &patch)
        .await
        .context(error::CordonSnafu { node_name })?;

    event!(
        Level::INFO,
        unschedulable = is_unschedulable(&node),
        "Node '{}' cordoned successfully.",
        node_name
    );
    Ok(CordonOutcome::Cordoned)
}

fn is_unschedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false)
}

/// Builds the patch by diffing the fetched Node against a copy of it that has been cordoned locally.
fn cordon_patch(node: &Node) -> serde_json::Result<serde_json::Value> {
    let original = serde_json::to_value(node)?;

    let mut cordoned = node.clone();
    cordoned.spec.get_or_insert_with(Default::default).unschedulable = Some(true);
    let modified = serde_json::to_value(&cordoned)?;

    Ok(merge_patch_diff(&original, &modified))
}
