use crate::constants::KUBECONFIG_FILE_NAME;
use crate::error::{self, Result};
use drainer::cluster::{ClusterClient, K8SClusterClient};

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use snafu::ResultExt;
use tracing::instrument;

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait]
/// Provides a Kubernetes client for a named cluster. This is provided as a trait in order to allow mocks to be
/// used for testing purposes.
pub trait ClusterResolver: Send + Sync {
    type Client: ClusterClient + 'static;

    /// Returns a client for `cluster_name`. An empty name refers to the default cluster.
    async fn resolve(&self, cluster_name: &str) -> Result<Self::Client>;
}

/// Resolves clusters to kubeconfig files stored beneath a common root directory.
#[derive(Clone, Debug)]
pub struct KubeconfigResolver {
    config_root: PathBuf,
}

impl KubeconfigResolver {
    pub fn new<P: AsRef<Path>>(config_root: P) -> Self {
        KubeconfigResolver {
            config_root: config_root.as_ref().to_path_buf(),
        }
    }

    /// `<root>/config` for the default cluster, `<root>/<cluster_name>/config` otherwise.
    pub fn kubeconfig_path(&self, cluster_name: &str) -> PathBuf {
        if cluster_name.is_empty() {
            self.config_root.join(KUBECONFIG_FILE_NAME)
        } else {
            self.config_root
                .join(cluster_name)
                .join(KUBECONFIG_FILE_NAME)
        }
    }
}

#[async_trait]
impl ClusterResolver for KubeconfigResolver {
    type Client = K8SClusterClient;

    #[instrument(skip(self), err)]
    async fn resolve(&self, cluster_name: &str) -> Result<K8SClusterClient> {
        let path = self.kubeconfig_path(cluster_name);

        let kubeconfig =
            Kubeconfig::read_from(&path).context(error::ReadKubeConfigSnafu { path: &path })?;
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context(error::LoadKubeConfigSnafu { path: &path })?;
        let k8s_client = kube::Client::try_from(config).context(error::CreateK8sClientSnafu)?;

        Ok(K8SClusterClient::new(k8s_client))
    }
}

#[cfg(any(feature = "mockall", test))]
pub mod mock {
    use super::*;
    use drainer::cluster::mock::MockClusterClient;
    use mockall::mock;

    mock! {
        /// A Mock ClusterResolver for use in tests.
        pub ClusterResolver {}
        #[async_trait]
        impl ClusterResolver for ClusterResolver {
            type Client = Arc<MockClusterClient>;

            async fn resolve(&self, cluster_name: &str) -> Result<Arc<MockClusterClient>>;
        }
    }
}

#[async_trait]
impl<T> ClusterResolver for Arc<T>
where
    T: ClusterResolver,
{
    type Client = T::Client;

    async fn resolve(&self, cluster_name: &str) -> Result<Self::Client> {
        (**self).resolve(cluster_name).await
    }
}
