use super::error::{self, Error, Result};
use super::ClusterClient;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::api::policy::v1::Eviction;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    APIGroupList, APIResourceList, DeleteOptions, ObjectMeta,
};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use snafu::ResultExt;
use tracing::instrument;

#[derive(Clone)]
/// Concrete implementation of the `ClusterClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SClusterClient {
    k8s_client: kube::client::Client,
}

impl K8SClusterClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SClusterClient { k8s_client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.k8s_client.clone(), namespace)
    }
}

fn qualified_name(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

#[async_trait]
impl ClusterClient for K8SClusterClient {
    #[instrument(skip(self), err)]
    async fn get_node(&self, name: &str) -> Result<Node> {
        Api::<Node>::all(self.k8s_client.clone())
            .get(name)
            .await
            .map_err(|err| Error::from_kube(err, "get", "Node", name))
    }

    #[instrument(skip(self), err)]
    async fn patch_node(&self, name: &str, patch: &serde_json::Value) -> Result<Node> {
        Api::<Node>::all(self.k8s_client.clone())
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|err| Error::from_kube(err, "patch", "Node", name))
    }

    #[instrument(skip(self), err)]
    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>> {
        let pods = Api::<Pod>::all(self.k8s_client.clone())
            .list(&ListParams::default().fields(&format!("spec.nodeName={}", node_name)))
            .await
            .map_err(|err| Error::from_kube(err, "list Pods on", "Node", node_name))?;

        Ok(pods.items)
    }

    #[instrument(skip(self), err)]
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.pods(namespace)
            .get(name)
            .await
            .map_err(|err| Error::from_kube(err, "get", "Pod", &qualified_name(namespace, name)))
    }

    #[instrument(skip(self), err)]
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
    ) -> Result<()> {
        let delete_params = DeleteParams {
            grace_period_seconds: Some(grace_period_seconds),
            ..Default::default()
        };

        self.pods(namespace)
            .delete(name, &delete_params)
            .await
            .map_err(|err| {
                Error::from_kube(err, "delete", "Pod", &qualified_name(namespace, name))
            })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn evict_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
        group_version: &str,
    ) -> Result<()> {
        let eviction = Eviction {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            delete_options: Some(DeleteOptions {
                grace_period_seconds: Some(grace_period_seconds.into()),
                ..Default::default()
            }),
        };

        // `Api::evict` always speaks the newest policy version. Build the request body ourselves so that the
        // group/version discovered on the cluster is the one used.
        let mut body = serde_json::to_value(&eviction).context(error::CreateEvictionSnafu {
            name: qualified_name(namespace, name),
        })?;
        body["apiVersion"] = serde_json::Value::String(group_version.to_string());
        let body = serde_json::to_vec(&body).context(error::CreateEvictionSnafu {
            name: qualified_name(namespace, name),
        })?;

        self.pods(namespace)
            .create_subresource::<serde_json::Value>(
                "eviction",
                name,
                &PostParams::default(),
                body,
            )
            .await
            .map_err(|err| {
                Error::from_kube(err, "evict", "Pod", &qualified_name(namespace, name))
            })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet> {
        Api::<DaemonSet>::namespaced(self.k8s_client.clone(), namespace)
            .get(name)
            .await
            .map_err(|err| {
                Error::from_kube(err, "get", "DaemonSet", &qualified_name(namespace, name))
            })
    }

    #[instrument(skip(self), err)]
    async fn discover_groups(&self) -> Result<APIGroupList> {
        self.k8s_client
            .list_api_groups()
            .await
            .map_err(|err| Error::from_kube(err, "discover", "APIGroupList", "/apis"))
    }

    #[instrument(skip(self), err)]
    async fn discover_resources(&self, group_version: &str) -> Result<APIResourceList> {
        let resources = if !group_version.contains('/') {
            self.k8s_client.list_core_api_resources(group_version).await
        } else {
            self.k8s_client.list_api_group_resources(group_version).await
        };

        resources.map_err(|err| Error::from_kube(err, "discover", "APIResourceList", group_version))
    }
}
