use crate::cluster::ClusterClientError;
use crate::pod::filter::PodFilterError;
use crate::pod::PodRef;

use serde::Serialize;
use snafu::Snafu;
use tokio::time::Duration;

use std::fmt;

pub type Result<T> = std::result::Result<T, DrainError>;

/// The step of a drain which produced a failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainPhase {
    Cordon,
    Selection,
    Discovery,
    Eviction,
    Deletion,
    Timeout,
}

impl fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Cordon => "cordon",
            Self::Selection => "selection",
            Self::Discovery => "discovery",
            Self::Eviction => "eviction",
            Self::Deletion => "deletion",
            Self::Timeout => "timeout",
        };
        f.write_str(phase)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DrainError {
    #[snafu(display("Unable to cordon Node '{}': '{}'", node_name, source))]
    Cordon {
        node_name: String,
        source: ClusterClientError,
    },

    #[snafu(display("Unable to create cordon patch for Node '{}': '{}'", node_name, source))]
    CordonPatch {
        node_name: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to find drainable Pods for Node '{}': '{}'", node_name, source))]
    FindTargetPods {
        node_name: String,
        source: ClusterClientError,
    },

    #[snafu(display(
        "Node '{}' cannot be drained: {}",
        node_name,
        display_all(errors)
    ))]
    SelectionPolicyViolation {
        node_name: String,
        errors: Vec<PodFilterError>,
    },

    #[snafu(display("Unable to determine whether the cluster supports evictions: '{}'", source))]
    EvictionCapabilityUnknown { source: ClusterClientError },

    #[snafu(display("Error when evicting Pod '{}': '{}'", pod, source))]
    EvictionRejected {
        pod: PodRef,
        source: ClusterClientError,
    },

    #[snafu(display("Error when deleting Pod '{}': '{}'", pod, source))]
    DeletionRejected {
        pod: PodRef,
        source: ClusterClientError,
    },

    #[snafu(display("Error when waiting for Pod '{}' to terminate: '{}'", pod, source))]
    WaitForDeletion {
        pod: PodRef,
        phase: DrainPhase,
        source: ClusterClientError,
    },

    #[snafu(display(
        "Drain of Node '{}' did not complete within {:.2}s; Pods still pending: [{}]",
        node_name,
        timeout.as_secs_f64(),
        display_all(pending)
    ))]
    DrainTimeout {
        node_name: String,
        timeout: Duration,
        pending: Vec<PodRef>,
    },
}

impl DrainError {
    /// Returns the step of the drain which failed.
    pub fn phase(&self) -> DrainPhase {
        match self {
            Self::Cordon { .. } | Self::CordonPatch { .. } => DrainPhase::Cordon,
            Self::FindTargetPods { .. } | Self::SelectionPolicyViolation { .. } => {
                DrainPhase::Selection
            }
            Self::EvictionCapabilityUnknown { .. } => DrainPhase::Discovery,
            Self::EvictionRejected { .. } => DrainPhase::Eviction,
            Self::DeletionRejected { .. } => DrainPhase::Deletion,
            Self::WaitForDeletion { phase, .. } => *phase,
            Self::DrainTimeout { .. } => DrainPhase::Timeout,
        }
    }
}

fn display_all<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
