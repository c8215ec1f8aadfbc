//! Determines whether Pods can be removed through the Eviction API, which respects PodDisruptionBudgets.
use crate::cluster::ClusterClient;
use crate::constants::{CORE_API_VERSION, EVICTION_KIND, EVICTION_SUBRESOURCE, POLICY_API_GROUP};
use crate::error::{self, Result};

use serde::Serialize;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

use std::fmt;

/// How Pods are removed from a Node. A single strategy is chosen per drain and used for every Pod.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum EvictionStrategy {
    /// Create Evictions using the given `policy` group/version, e.g. `policy/v1`.
    Evict { group_version: String },
    /// Delete Pods directly. Used on clusters which do not serve the Eviction subresource.
    Delete,
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evict { group_version } => write!(f, "evict ({})", group_version),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Queries API discovery to choose how Pods will be removed.
///
/// Evictions are used when the cluster serves the `policy` group and lists `pods/eviction` among the core
/// resources. Otherwise Pods are deleted directly.
#[instrument(skip(client), err)]
pub async fn probe_eviction_support<C: ClusterClient>(client: &C) -> Result<EvictionStrategy> {
    let groups = client
        .discover_groups()
        .await
        .context(error::EvictionCapabilityUnknownSnafu)?;

    let group_version = match groups
        .groups
        .iter()
        .find(|group| group.name == POLICY_API_GROUP)
        .and_then(|group| {
            group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first())
        }) {
        Some(version) => version.group_version.clone(),
        None => {
            event!(
                Level::INFO,
                "Cluster does not serve the '{}' API group, Pods will be deleted.",
                POLICY_API_GROUP
            );
            return Ok(EvictionStrategy::Delete);
        }
    };

    let resources = client
        .discover_resources(CORE_API_VERSION)
        .await
        .context(error::EvictionCapabilityUnknownSnafu)?;

    let strategy = if resources
        .resources
        .iter()
        .any(|resource| resource.name == EVICTION_SUBRESOURCE && resource.kind == EVICTION_KIND)
    {
        EvictionStrategy::Evict { group_version }
    } else {
        EvictionStrategy::Delete
    };

    event!(Level::INFO, %strategy, "Chose Pod removal strategy.");
    Ok(strategy)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cluster::mock::MockClusterClient;
    use crate::cluster::ClusterClientError;
    use crate::error::DrainPhase;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
        APIGroup, APIGroupList, APIResource, APIResourceList, GroupVersionForDiscovery,
    };

    fn group(name: &str, preferred: Option<&str>, versions: &[&str]) -> APIGroup {
        let version = |v: &str| GroupVersionForDiscovery {
            group_version: format!("{}/{}", name, v),
            version: v.to_string(),
        };
        APIGroup {
            name: name.to_string(),
            preferred_version: preferred.map(version),
            versions: versions.iter().map(|v| version(*v)).collect(),
            ..Default::default()
        }
    }

    fn resource(name: &str, kind: &str) -> APIResource {
        APIResource {
            name: name.to_string(),
            kind: kind.to_string(),
            namespaced: true,
            ..Default::default()
        }
    }

    fn client(groups: Vec<APIGroup>, resources: Vec<APIResource>) -> MockClusterClient {
        let mut client = MockClusterClient::new();
        client.expect_discover_groups().times(1).returning(move || {
            Ok(APIGroupList {
                groups: groups.clone(),
            })
        });
        client
            .expect_discover_resources()
            .withf(|group_version| group_version == "v1")
            .returning(move |group_version| {
                Ok(APIResourceList {
                    group_version: group_version.to_string(),
                    resources: resources.clone(),
                })
            });
        client
    }

    #[tokio::test]
    async fn test_probe_eviction_support() {
        let core_resources = vec![
            resource("pods", "Pod"),
            resource("pods/eviction", "Eviction"),
            resource("nodes", "Node"),
        ];
        let test_cases = vec![
            (
                vec![
                    group("apps", Some("v1"), &["v1"]),
                    group("policy", Some("v1"), &["v1", "v1beta1"]),
                ],
                core_resources.clone(),
                EvictionStrategy::Evict {
                    group_version: "policy/v1".to_string(),
                },
            ),
            (
                vec![group("policy", None, &["v1beta1"])],
                core_resources.clone(),
                EvictionStrategy::Evict {
                    group_version: "policy/v1beta1".to_string(),
                },
            ),
            (
                vec![group("apps", Some("v1"), &["v1"])],
                core_resources.clone(),
                EvictionStrategy::Delete,
            ),
            (
                vec![group("policy", Some("v1"), &["v1"])],
                vec![resource("pods", "Pod"), resource("pods/eviction", "Binding")],
                EvictionStrategy::Delete,
            ),
        ];

        for (groups, resources, expected) in test_cases {
            let client = client(groups, resources);
            assert_eq!(probe_eviction_support(&client).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_resources_not_queried_without_policy_group() {
        let mut client = MockClusterClient::new();
        client
            .expect_discover_groups()
            .returning(|| Ok(APIGroupList { groups: vec![] }));
        client.expect_discover_resources().never();

        assert_eq!(
            probe_eviction_support(&client).await.unwrap(),
            EvictionStrategy::Delete
        );
    }

    #[tokio::test]
    async fn test_discovery_failure() {
        let mut client = MockClusterClient::new();
        client
            .expect_discover_groups()
            .returning(|| Ok(APIGroupList { groups: vec![group("policy", Some("v1"), &["v1"])] }));
        client.expect_discover_resources().returning(|group_version| {
            Err(ClusterClientError::NotFound {
                kind: "APIResourceList",
                name: group_version.to_string(),
            })
        });

        let err = probe_eviction_support(&client).await.unwrap_err();
        assert_eq!(err.phase(), DrainPhase::Discovery);
    }
}
