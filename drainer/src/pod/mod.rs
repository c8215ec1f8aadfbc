//! Selection and removal of the Pods running on a drained Node.
pub mod evacuate;
pub mod filter;

use crate::constants::DEFAULT_NAMESPACE;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use serde::Serialize;

use std::fmt;

/// Identifies a single Pod instance. The `uid` distinguishes the instance from a later Pod reusing the same name.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
}

impl From<&Pod> for PodRef {
    fn from(pod: &Pod) -> Self {
        PodRef {
            namespace: pod
                .namespace()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            name: pod.name_any(),
            uid: pod.uid(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
