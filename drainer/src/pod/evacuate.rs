//! Removes the selected Pods from a Node and waits until Kubernetes confirms that each of them is gone.
//!
//! Evictions are created concurrently, up to a fixed limit. An eviction which is refused because a
//! PodDisruptionBudget does not currently allow the disruption (HTTP 429) is retried at a fixed interval, without
//! limit, as `kubectl drain` does. Operators must intervene if a budget can never be satisfied.
use super::PodRef;
use crate::cluster::error::Result as ClusterResult;
use crate::cluster::{ClusterClient, ClusterClientError};
use crate::discovery::EvictionStrategy;
use crate::error::{self, DrainPhase, Result};

use futures::{stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use snafu::ResultExt;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};
use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{event, instrument, Level};

use std::future::Future;

// Waiting for Pods to be deleted counts against this limit. We don't want to generate too many TPS to Kubernetes.
const DEFAULT_MAX_CONCURRENT_EVICTIONS: usize = 5;
// `kubectl drain` similarly waits 5 seconds between eviction attempts.
const DEFAULT_EVICTION_RETRY_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_DELETION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Tuning for the removal of Pods, shared by every drain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EvacuationSettings {
    /// Maximum number of Pods being evicted, or awaited, at once.
    pub max_concurrent_evictions: usize,
    /// Delay before retrying an eviction refused with HTTP 429.
    pub eviction_retry_interval: Duration,
    /// Delay between checks for whether removed Pods still exist.
    pub deletion_check_interval: Duration,
}

impl Default for EvacuationSettings {
    fn default() -> Self {
        EvacuationSettings {
            max_concurrent_evictions: DEFAULT_MAX_CONCURRENT_EVICTIONS,
            eviction_retry_interval: DEFAULT_EVICTION_RETRY_INTERVAL,
            deletion_check_interval: DEFAULT_DELETION_CHECK_INTERVAL,
        }
    }
}

/// Removes Pods for a single drain.
pub struct Evacuator<'a, C> {
    client: &'a C,
    settings: &'a EvacuationSettings,
    grace_period_seconds: u32,
}

impl<'a, C: ClusterClient> Evacuator<'a, C> {
    pub fn new(client: &'a C, settings: &'a EvacuationSettings, grace_period_seconds: u32) -> Self {
        Evacuator {
            client,
            settings,
            grace_period_seconds,
        }
    }

    /// Removes every given Pod using `strategy`, returning the Pods in the order their removal was confirmed.
    ///
    /// If `deadline` elapses first, all outstanding work is dropped and the drain fails with the Pods that were not
    /// yet confirmed, no matter how many others already were. A zero `deadline` is the same as none.
    #[instrument(skip(self, pods), fields(pods = pods.len()), err)]
    pub async fn evacuate(
        &self,
        node_name: &str,
        pods: &[Pod],
        strategy: &EvictionStrategy,
        deadline: Option<Duration>,
    ) -> Result<Vec<PodRef>> {
        let targets: Vec<PodRef> = pods.iter().map(PodRef::from).collect();
        let mut confirmed = Vec::with_capacity(targets.len());

        let removal = async {
            match strategy {
                EvictionStrategy::Evict { group_version } => {
                    self.evict_pods(&targets, group_version, &mut confirmed)
                        .await
                }
                EvictionStrategy::Delete => self.delete_pods(&targets, &mut confirmed).await,
            }
        };

        let outcome = match deadline.filter(|limit| !limit.is_zero()) {
            Some(limit) => timeout(limit, removal).await.map_err(|_| limit),
            None => Ok(removal.await),
        };

        match outcome {
            Ok(removed) => removed.map(|()| confirmed),
            Err(limit) => {
                let pending: Vec<PodRef> = targets
                    .into_iter()
                    .filter(|pod| !confirmed.contains(pod))
                    .collect();
                error::DrainTimeoutSnafu {
                    node_name,
                    timeout: limit,
                    pending,
                }
                .fail()
            }
        }
    }

    /// Runs one eviction task per Pod. The first task to fail raises the cancel signal; every other task stops at
    /// its next suspension point and the failure is returned once all of them have stopped.
    async fn evict_pods(
        &self,
        pods: &[PodRef],
        group_version: &str,
        confirmed: &mut Vec<PodRef>,
    ) -> Result<()> {
        let (cancel, signal) = watch::channel(false);
        let signal = CancelSignal(signal);

        let mut evictions = stream::iter(pods)
            .map(|pod| {
                signal
                    .clone()
                    .run(self.evict_and_confirm(pod, group_version))
            })
            .buffer_unordered(self.settings.max_concurrent_evictions.max(1));

        let mut failure = None;
        while let Some(outcome) = evictions.next().await {
            match outcome {
                Some(Ok(pod)) => confirmed.push(pod),
                Some(Err(err)) if failure.is_none() => {
                    event!(
                        Level::ERROR,
                        "Stopping remaining evictions after failure: '{}'",
                        err
                    );
                    cancel.send_replace(true);
                    failure = Some(err);
                }
                Some(Err(err)) => {
                    event!(Level::DEBUG, "Eviction also failed: '{}'", err);
                }
                None => {}
            }
        }

        failure.map_or(Ok(()), Err)
    }

    #[instrument(skip(self), err)]
    async fn evict_and_confirm(&self, pod: &PodRef, group_version: &str) -> Result<PodRef> {
        let client = self.client;
        let grace_period_seconds = self.grace_period_seconds;
        let retry_interval = self.settings.eviction_retry_interval;
        let (namespace, name) = (pod.namespace.as_str(), pod.name.as_str());

        event!(Level::INFO, "Attempting to evict Pod '{}'", pod);
        let evicted = RetryIf::spawn(
            FixedInterval::new(retry_interval),
            move || client.evict_pod(namespace, name, grace_period_seconds, group_version),
            |err: &ClusterClientError| {
                let throttled = err.is_too_many_requests();
                if throttled {
                    event!(
                        Level::WARN,
                        "Too many requests when creating Eviction for Pod '{}': '{}'. This is likely due to respecting a Pod Disruption Budget. Retrying in {:.2}s.",
                        pod,
                        err,
                        retry_interval.as_secs_f64()
                    );
                }
                throttled
            },
        )
        .await;

        match evicted {
            Err(err) if err.is_not_found() => {
                event!(Level::INFO, "Pod '{}' no longer exists.", pod);
                return Ok(pod.clone());
            }
            evicted => {
                evicted.context(error::EvictionRejectedSnafu { pod: pod.clone() })?;
            }
        }
        event!(Level::INFO, "Successfully evicted Pod '{}'", pod);

        self.wait_for_deletion(
            std::slice::from_ref(pod),
            DrainPhase::Eviction,
            &mut Vec::new(),
        )
        .await?;
        Ok(pod.clone())
    }

    /// Deletes each Pod in turn and then waits for all of them together.
    async fn delete_pods(&self, pods: &[PodRef], confirmed: &mut Vec<PodRef>) -> Result<()> {
        for pod in pods {
            match self
                .client
                .delete_pod(&pod.namespace, &pod.name, self.grace_period_seconds)
                .await
            {
                Err(err) if err.is_not_found() => {
                    event!(Level::INFO, "Pod '{}' was already deleted.", pod);
                }
                deleted => {
                    deleted.context(error::DeletionRejectedSnafu { pod: pod.clone() })?;
                    event!(Level::INFO, "Deleted Pod '{}'", pod);
                }
            }
        }

        self.wait_for_deletion(pods, DrainPhase::Deletion, confirmed)
            .await
    }

    /// Polls the given Pods, starting immediately, until each of them is gone.
    async fn wait_for_deletion(
        &self,
        pods: &[PodRef],
        phase: DrainPhase,
        confirmed: &mut Vec<PodRef>,
    ) -> Result<()> {
        let interval = self.settings.deletion_check_interval;
        let mut remaining: Vec<&PodRef> = pods.iter().collect();

        loop {
            let mut present = Vec::with_capacity(remaining.len());
            for pod in remaining {
                match self.is_gone(pod).await {
                    Ok(true) => {
                        event!(Level::INFO, "Pod '{}' deleted.", pod);
                        confirmed.push(pod.clone());
                    }
                    Ok(false) => present.push(pod),
                    Err(err) if err.is_too_many_requests() => {
                        event!(
                            Level::WARN,
                            "Could not determine if Pod '{}' has been deleted: '{}'. Waiting {:.2}s.",
                            pod,
                            err,
                            interval.as_secs_f64()
                        );
                        present.push(pod);
                    }
                    Err(source) => {
                        return Err(error::DrainError::WaitForDeletion {
                            pod: pod.clone(),
                            phase,
                            source,
                        })
                    }
                }
            }

            if present.is_empty() {
                return Ok(());
            }
            event!(
                Level::DEBUG,
                pending = present.len(),
                "Pods not yet deleted. Waiting {:.2}s.",
                interval.as_secs_f64()
            );
            sleep(interval).await;
            remaining = present;
        }
    }

    /// A Pod is gone once it cannot be found, or once its name belongs to a different instance.
    async fn is_gone(&self, pod: &PodRef) -> ClusterResult<bool> {
        match self.client.get_pod(&pod.namespace, &pod.name).await {
            Ok(current) => Ok(pod.uid.is_some() && current.uid() != pod.uid),
            Err(err) if err.is_not_found() => Ok(true),
            Err(err) => Err(err),
        }
    }
}

/// Shared by every eviction task of a drain; raised once to stop them all.
#[derive(Clone)]
struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    async fn raised(&mut self) {
        // A dropped sender counts as raised.
        let _ = self.0.wait_for(|raised| *raised).await;
    }

    /// Runs `task` unless the signal is raised first. Returns `None` if the task was stopped.
    async fn run<F: Future>(mut self, task: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.raised() => None,
            output = task => Some(output),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cluster::error::test::api_error;
    use crate::cluster::mock::MockClusterClient;
    use crate::error::DrainError;
    use crate::pod::test::fake_pod;

    use tokio::time::Instant;

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn policy_v1() -> EvictionStrategy {
        EvictionStrategy::Evict {
            group_version: "policy/v1".to_string(),
        }
    }

    fn not_found(namespace: &str, name: &str) -> ClusterClientError {
        ClusterClientError::NotFound {
            kind: "Pod",
            name: format!("{}/{}", namespace, name),
        }
    }

    fn throttled(name: &str) -> ClusterClientError {
        ClusterClientError::from_kube(api_error(429), "evict", "Pod", name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_retries_while_throttled() {
        let evictions = Arc::new(AtomicUsize::new(0));
        let polls = Arc::new(AtomicUsize::new(0));

        let mut client = MockClusterClient::new();
        let eviction_count = evictions.clone();
        client
            .expect_evict_pod()
            .withf(|namespace, name, grace_period_seconds, group_version| {
                namespace == "default"
                    && name == "web-0"
                    && *grace_period_seconds == 30
                    && group_version == "policy/v1"
            })
            .returning(move |_, name, _, _| {
                if eviction_count.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(throttled(name))
                } else {
                    Ok(())
                }
            });
        let poll_count = polls.clone();
        client.expect_get_pod().returning(move |namespace, name| {
            if poll_count.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(fake_pod(name))
            } else {
                Err(not_found(namespace, name))
            }
        });
        client.expect_delete_pod().never();

        let settings = EvacuationSettings::default();
        let start = Instant::now();
        let evacuated = Evacuator::new(&client, &settings, 30)
            .evacuate("node-1", &[fake_pod("web-0")], &policy_v1(), None)
            .await
            .unwrap();

        assert_eq!(evacuated, vec![PodRef::from(&fake_pod("web-0"))]);
        assert_eq!(evictions.load(Ordering::SeqCst), 4);
        // The Pod still existed on the first check, so removal is only confirmed by the second.
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_failure_stops_siblings() {
        let polls = Arc::new(AtomicUsize::new(0));

        let mut client = MockClusterClient::new();
        client
            .expect_evict_pod()
            .returning(|_, name, _, _| match name {
                "web-0" => Err(ClusterClientError::from_kube(
                    api_error(500),
                    "evict",
                    "Pod",
                    name,
                )),
                _ => Ok(()),
            });
        let poll_count = polls.clone();
        client.expect_get_pod().returning(move |_, name| {
            poll_count.fetch_add(1, Ordering::SeqCst);
            Ok(fake_pod(name))
        });

        let settings = EvacuationSettings::default();
        let err = Evacuator::new(&client, &settings, 30)
            .evacuate(
                "node-1",
                &[fake_pod("web-0"), fake_pod("web-1")],
                &policy_v1(),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.phase(), DrainPhase::Eviction);
        assert!(matches!(err, DrainError::EvictionRejected { ref pod, .. } if pod.name == "web-0"));

        // web-1 never disappears, so it is only abandoned because web-0 failed. It gets no further than its first
        // check for deletion.
        assert!(polls.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicting_missing_pod_needs_no_wait() {
        let mut client = MockClusterClient::new();
        client
            .expect_evict_pod()
            .times(1)
            .returning(|namespace, name, _, _| Err(not_found(namespace, name)));
        client.expect_get_pod().never();

        let settings = EvacuationSettings::default();
        let evacuated = Evacuator::new(&client, &settings, 30)
            .evacuate("node-1", &[fake_pod("web-0")], &policy_v1(), None)
            .await
            .unwrap();
        assert_eq!(evacuated.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evictions_are_bounded() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let mut client = MockClusterClient::new();
        let evict_calls = calls.clone();
        client.expect_evict_pod().returning(move |_, name, _, _| {
            evict_calls.lock().unwrap().push(format!("evict {}", name));
            Ok(())
        });
        let get_calls = calls.clone();
        let mut seen = HashSet::new();
        client.expect_get_pod().returning(move |namespace, name| {
            get_calls.lock().unwrap().push(format!("get {}", name));
            if seen.insert(name.to_string()) {
                Ok(fake_pod(name))
            } else {
                Err(not_found(namespace, name))
            }
        });

        let settings = EvacuationSettings {
            max_concurrent_evictions: 1,
            ..Default::default()
        };
        Evacuator::new(&client, &settings, 30)
            .evacuate(
                "node-1",
                &[fake_pod("web-0"), fake_pod("web-1")],
                &policy_v1(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "evict web-0",
                "get web-0",
                "get web-0",
                "evict web-1",
                "get web-1",
                "get web-1",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_strategy() {
        let mut client = MockClusterClient::new();
        client.expect_evict_pod().never();
        client
            .expect_delete_pod()
            .withf(|_, _, grace_period_seconds| *grace_period_seconds == 10)
            .times(2)
            .returning(|namespace, name, _| match name {
                "web-1" => Err(not_found(namespace, name)),
                _ => Ok(()),
            });
        client
            .expect_get_pod()
            .returning(|namespace, name| match name {
                // Its controller has already replaced the Pod.
                "web-0" => {
                    let mut pod = fake_pod(name);
                    pod.metadata.uid = Some("uid-replacement".to_string());
                    Ok(pod)
                }
                _ => Err(not_found(namespace, name)),
            });

        let settings = EvacuationSettings::default();
        let pods = [fake_pod("web-0"), fake_pod("web-1")];
        let evacuated = Evacuator::new(&client, &settings, 10)
            .evacuate("node-1", &pods, &EvictionStrategy::Delete, None)
            .await
            .unwrap();

        assert_eq!(
            evacuated,
            pods.iter().map(PodRef::from).collect::<Vec<_>>()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_failures() {
        let mut client = MockClusterClient::new();
        client.expect_delete_pod().times(1).returning(|namespace, name, _| {
            Err(ClusterClientError::from_kube(
                api_error(403),
                "delete",
                "Pod",
                &format!("{}/{}", namespace, name),
            ))
        });
        client.expect_get_pod().never();

        let settings = EvacuationSettings::default();
        let pods = [fake_pod("web-0"), fake_pod("web-1")];
        let err = Evacuator::new(&client, &settings, 30)
            .evacuate("node-1", &pods, &EvictionStrategy::Delete, None)
            .await
            .unwrap_err();
        assert_eq!(err.phase(), DrainPhase::Deletion);

        let mut client = MockClusterClient::new();
        client.expect_delete_pod().returning(|_, _, _| Ok(()));
        client.expect_get_pod().times(1).returning(|namespace, name| {
            Err(ClusterClientError::from_kube(
                api_error(401),
                "get",
                "Pod",
                &format!("{}/{}", namespace, name),
            ))
        });

        let err = Evacuator::new(&client, &settings, 30)
            .evacuate("node-1", &pods, &EvictionStrategy::Delete, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DrainError::WaitForDeletion { .. }));
        assert_eq!(err.phase(), DrainPhase::Deletion);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reports_pending_pods() {
        let evictions = Arc::new(AtomicUsize::new(0));

        let mut client = MockClusterClient::new();
        let eviction_count = evictions.clone();
        client.expect_evict_pod().returning(move |_, name, _, _| {
            eviction_count.fetch_add(1, Ordering::SeqCst);
            match name {
                "web-0" => Ok(()),
                _ => Err(throttled(name)),
            }
        });
        client
            .expect_get_pod()
            .returning(|namespace, name| Err(not_found(namespace, name)));

        let settings = EvacuationSettings::default();
        let pods = [fake_pod("web-0"), fake_pod("web-1")];
        let err = Evacuator::new(&client, &settings, 30)
            .evacuate(
                "node-1",
                &pods,
                &policy_v1(),
                Some(Duration::from_secs(12)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.phase(), DrainPhase::Timeout);
        match err {
            DrainError::DrainTimeout {
                timeout, pending, ..
            } => {
                assert_eq!(timeout, Duration::from_secs(12));
                assert_eq!(pending, vec![PodRef::from(&pods[1])]);
            }
            other => panic!("unexpected error: {}", other),
        }

        // web-0 once, then web-1 at 0s, 5s and 10s. The attempt due at 15s never happens.
        assert_eq!(evictions.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_deadline_waits_indefinitely() {
        let polls = Arc::new(AtomicUsize::new(0));

        let mut client = MockClusterClient::new();
        client.expect_evict_pod().times(1).returning(|_, _, _, _| Ok(()));
        let poll_count = polls.clone();
        client.expect_get_pod().returning(move |namespace, name| {
            if poll_count.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(fake_pod(name))
            } else {
                Err(not_found(namespace, name))
            }
        });

        let settings = EvacuationSettings::default();
        let evacuated = Evacuator::new(&client, &settings, 30)
            .evacuate(
                "node-1",
                &[fake_pod("web-0")],
                &policy_v1(),
                Some(Duration::ZERO),
            )
            .await
            .unwrap();

        assert_eq!(evacuated, vec![PodRef::from(&fake_pod("web-0"))]);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }
}
