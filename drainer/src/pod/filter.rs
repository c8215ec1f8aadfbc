//! Decides which Pods on a Node may be removed during a drain.
//!
//! Every Pod is passed through a fixed chain of independent filters. A Pod is only removed if every filter allows
//! it. Filters which refuse a Pod because removing it would be unsafe under the current [`DrainPolicy`] also
//! report an error; any such error aborts the whole drain before a single Pod is touched.
use super::PodRef;
use crate::cluster::{ClusterClient, ClusterClientError};
use crate::constants::{
    DAEMON_SET_KIND, MIRROR_POD_ANNOTATION, POD_PHASE_FAILED, POD_PHASE_SUCCEEDED,
};
use crate::drain::DrainPolicy;
use crate::error::{self, Result};

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::Serialize;
use snafu::{ensure, ResultExt, Snafu};
use tracing::{event, instrument, Level};

/// The filters applied to every Pod, in order. The order only affects the order of log messages and errors.
pub const FILTER_CHAIN: [PodFilter; 4] = [
    PodFilter::DaemonSet,
    PodFilter::MirrorPod,
    PodFilter::LocalStorage,
    PodFilter::Unreplicated,
];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PodFilterError {
    #[snafu(display(
        "Unable to find DaemonSet '{}' controlling Pod '{}': '{}'",
        daemon_set,
        pod,
        source
    ))]
    DaemonSetLookup {
        pod: PodRef,
        daemon_set: String,
        source: ClusterClientError,
    },

    #[snafu(display(
        "Pod '{}' is controlled by a DaemonSet, node cannot be drained (set ignore_daemon_set_pods to drain)",
        pod
    ))]
    DaemonSetPod { pod: PodRef },

    #[snafu(display(
        "Pod '{}' has local storage, node cannot be drained (set delete_local_storage to drain)",
        pod
    ))]
    LocalStorage { pod: PodRef },

    #[snafu(display(
        "Pod '{}' is unreplicated, node cannot be drained (set force to drain)",
        pod
    ))]
    Unreplicated { pod: PodRef },
}

/// Why a Pod was left on the Node without failing the drain.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// The DaemonSet controller ignores cordons and would recreate the Pod on the same Node.
    DaemonSetPod,
    /// Static Pods are managed by the kubelet, not the API server.
    MirrorPod,
}

/// The outcome of a single filter for a single Pod.
#[derive(Debug)]
pub struct FilterVerdict {
    pub allow: bool,
    pub skip_reason: Option<SkipReason>,
    pub error: Option<PodFilterError>,
}

impl FilterVerdict {
    fn allow() -> Self {
        FilterVerdict {
            allow: true,
            skip_reason: None,
            error: None,
        }
    }

    fn skip(reason: SkipReason) -> Self {
        FilterVerdict {
            allow: false,
            skip_reason: Some(reason),
            error: None,
        }
    }

    fn reject(error: PodFilterError) -> Self {
        FilterVerdict {
            allow: false,
            skip_reason: None,
            error: Some(error),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PodFilter {
    DaemonSet,
    MirrorPod,
    LocalStorage,
    Unreplicated,
}

impl PodFilter {
    pub async fn evaluate<C: ClusterClient>(
        &self,
        client: &C,
        pod: &Pod,
        policy: &DrainPolicy,
    ) -> FilterVerdict {
        match self {
            Self::DaemonSet => daemon_set_filter(client, pod, policy).await,
            Self::MirrorPod => mirror_pod_filter(pod),
            Self::LocalStorage => local_storage_filter(pod, policy),
            Self::Unreplicated => unreplicated_filter(pod, policy),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SkippedPod {
    pub pod: PodRef,
    pub reason: SkipReason,
}

/// The Pods on a Node, split into those which will be removed and those which stay.
#[derive(Clone, Debug, Default)]
pub struct PodSelection {
    pub eligible: Vec<Pod>,
    pub skipped: Vec<SkippedPod>,
}

/// Finds all Pods on the given Node which should be removed during a drain.
///
/// Errors from every filter on every Pod are collected; if there are any, the whole selection fails and
/// reports all of them, even for Pods which would otherwise have been left in place.
#[instrument(skip(client, policy), err)]
pub async fn select_pods<C: ClusterClient>(
    client: &C,
    node_name: &str,
    policy: &DrainPolicy,
) -> Result<PodSelection> {
    let pods = client
        .list_pods_on_node(node_name)
        .await
        .context(error::FindTargetPodsSnafu { node_name })?;

    let mut selection = PodSelection::default();
    let mut errors = Vec::new();
    for pod in pods {
        let mut deletable = true;
        let mut skip_reason = None;
        for filter in FILTER_CHAIN {
            let verdict = filter.evaluate(client, &pod, policy).await;
            deletable = deletable && verdict.allow;
            skip_reason = skip_reason.or(verdict.skip_reason);
            errors.extend(verdict.error);
        }

        if deletable {
            selection.eligible.push(pod);
        } else if let Some(reason) = skip_reason {
            selection.skipped.push(SkippedPod {
                pod: PodRef::from(&pod),
                reason,
            });
        }
    }

    ensure!(
        errors.is_empty(),
        error::SelectionPolicyViolationSnafu { node_name, errors }
    );

    event!(
        Level::INFO,
        eligible = selection.eligible.len(),
        skipped = selection.skipped.len(),
        "Selected Pods to remove from Node '{}'.",
        node_name
    );
    Ok(selection)
}

fn controller_of(pod: &Pod) -> Option<&OwnerReference> {
    pod.metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|reference| reference.controller == Some(true))
}

/// DaemonSet Pods stay, as the DaemonSet controller ignores cordons. Pods whose DaemonSet no longer exists are
/// orphans and may be removed when forced.
async fn daemon_set_filter<C: ClusterClient>(
    client: &C,
    pod: &Pod,
    policy: &DrainPolicy,
) -> FilterVerdict {
    let controller = match controller_of(pod) {
        Some(controller) if controller.kind == DAEMON_SET_KIND => controller,
        _ => return FilterVerdict::allow(),
    };
    let pod_ref = PodRef::from(pod);

    match client
        .get_daemon_set(&pod_ref.namespace, &controller.name)
        .await
    {
        Err(err) if err.is_not_found() && policy.force => {
            event!(
                Level::WARN,
                "Pod '{}' is controlled by a DaemonSet but the DaemonSet is not found.",
                pod_ref
            );
            FilterVerdict::allow()
        }
        Err(err) => FilterVerdict::reject(PodFilterError::DaemonSetLookup {
            pod: pod_ref,
            daemon_set: controller.name.clone(),
            source: err,
        }),
        Ok(_) if !policy.ignore_daemon_set_pods => {
            FilterVerdict::reject(PodFilterError::DaemonSetPod { pod: pod_ref })
        }
        Ok(_) => {
            event!(
                Level::WARN,
                "Not draining Pod '{}': Pod is member of a DaemonSet",
                pod_ref
            );
            FilterVerdict::skip(SkipReason::DaemonSetPod)
        }
    }
}

fn mirror_pod_filter(pod: &Pod) -> FilterVerdict {
    let is_mirror = pod
        .metadata
        .annotations
        .as_ref()
        .map(|annotations| annotations.contains_key(MIRROR_POD_ANNOTATION))
        .unwrap_or(false);

    if is_mirror {
        event!(
            Level::INFO,
            "Not draining Pod '{}': Pod is a static Mirror Pod",
            PodRef::from(pod)
        );
        FilterVerdict::skip(SkipReason::MirrorPod)
    } else {
        FilterVerdict::allow()
    }
}

fn local_storage_filter(pod: &Pod, policy: &DrainPolicy) -> FilterVerdict {
    let has_local_storage = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.volumes.as_ref())
        .map(|volumes| volumes.iter().any(|volume| volume.empty_dir.is_some()))
        .unwrap_or(false);

    if !has_local_storage {
        return FilterVerdict::allow();
    }
    if !policy.delete_local_storage {
        return FilterVerdict::reject(PodFilterError::LocalStorage {
            pod: PodRef::from(pod),
        });
    }

    event!(
        Level::WARN,
        "Pod '{}' has local storage, and it will be deleted because delete_local_storage is set.",
        PodRef::from(pod)
    );
    FilterVerdict::allow()
}

fn unreplicated_filter(pod: &Pod, policy: &DrainPolicy) -> FilterVerdict {
    let completed = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .map(|phase| phase == POD_PHASE_SUCCEEDED || phase == POD_PHASE_FAILED)
        .unwrap_or(false);

    if completed || controller_of(pod).is_some() {
        return FilterVerdict::allow();
    }
    if !policy.force {
        return FilterVerdict::reject(PodFilterError::Unreplicated {
            pod: PodRef::from(pod),
        });
    }

    event!(
        Level::WARN,
        "Pod '{}' is unreplicated, but it will be deleted because force is set.",
        PodRef::from(pod)
    );
    FilterVerdict::allow()
}
