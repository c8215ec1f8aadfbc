//! The subset of the Kubernetes API needed to drain a Node.
mod client;
pub mod error;

pub use self::client::K8SClusterClient;
pub use self::error::Error as ClusterClientError;
use self::error::Result;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroupList, APIResourceList};
use std::sync::Arc;

#[async_trait]
/// A trait providing an interface to the Kubernetes API for draining Nodes. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
///
/// Every call may fail with `NotFound`, `TooManyRequests`, or a generic API error; callers decide per call
/// which of these are fatal.
pub trait ClusterClient: Clone + Sized + Send + Sync {
    async fn get_node(&self, name: &str) -> Result<Node>;
    /// Applies a JSON merge patch to a Node.
    async fn patch_node(&self, name: &str, patch: &serde_json::Value) -> Result<Node>;
    /// Lists the Pods in all namespaces which are bound to the given Node.
    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>>;
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;
    async fn delete_pod(&self, namespace: &str, name: &str, grace_period_seconds: u32)
        -> Result<()>;
    /// Creates an Eviction for a Pod using the `policy` API group/version served by the cluster.
    async fn evict_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
        group_version: &str,
    ) -> Result<()>;
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet>;
    /// Lists the API groups served by the cluster.
    async fn discover_groups(&self) -> Result<APIGroupList>;
    /// Lists the resources served for a group/version. A bare version (e.g. `v1`) refers to the core group.
    async fn discover_resources(&self, group_version: &str) -> Result<APIResourceList>;
}

#[cfg(any(feature = "mockall", test))]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        /// A Mock ClusterClient for use in tests.
        pub ClusterClient {}
        #[async_trait]
        impl ClusterClient for ClusterClient {
            async fn get_node(&self, name: &str) -> Result<Node>;
            async fn patch_node(&self, name: &str, patch: &serde_json::Value) -> Result<Node>;
            async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>>;
            async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;
            async fn delete_pod(&self, namespace: &str, name: &str, grace_period_seconds: u32)
                -> Result<()>;
            async fn evict_pod(
                &self,
                namespace: &str,
                name: &str,
                grace_period_seconds: u32,
                group_version: &str,
            ) -> Result<()>;
            async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet>;
            async fn discover_groups(&self) -> Result<APIGroupList>;
            async fn discover_resources(&self, group_version: &str) -> Result<APIResourceList>;
        }

        impl Clone for ClusterClient {
            fn clone(&self) -> Self;
        }
    }
}

#[async_trait]
impl<T> ClusterClient for Arc<T>
where
    T: ClusterClient,
{
    async fn get_node(&self, name: &str) -> Result<Node> {
        (**self).get_node(name).await
    }

    async fn patch_node(&self, name: &str, patch: &serde_json::Value) -> Result<Node> {
        (**self).patch_node(name, patch).await
    }

    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>> {
        (**self).list_pods_on_node(node_name).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        (**self).get_pod(namespace, name).await
    }

    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
    ) -> Result<()> {
        (**self)
            .delete_pod(namespace, name, grace_period_seconds)
            .await
    }

    async fn evict_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
        group_version: &str,
    ) -> Result<()> {
        (**self)
            .evict_pod(namespace, name, grace_period_seconds, group_version)
            .await
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet> {
        (**self).get_daemon_set(namespace, name).await
    }

    async fn discover_groups(&self) -> Result<APIGroupList> {
        (**self).discover_groups().await
    }

    async fn discover_resources(&self, group_version: &str) -> Result<APIResourceList> {
        (**self).discover_resources(group_version).await
    }
}
