/// Annotation set by the kubelet on the API representation of a static Pod.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// Owner kind identifying Pods managed by a DaemonSet.
pub const DAEMON_SET_KIND: &str = "DaemonSet";

// Pod phases in which all containers have terminated.
pub const POD_PHASE_SUCCEEDED: &str = "Succeeded";
pub const POD_PHASE_FAILED: &str = "Failed";

// Discovery identifiers which indicate that the cluster serves Pod evictions.
pub const POLICY_API_GROUP: &str = "policy";
pub const CORE_API_VERSION: &str = "v1";
pub const EVICTION_SUBRESOURCE: &str = "pods/eviction";
pub const EVICTION_KIND: &str = "Eviction";

/// Matches the default termination grace period used by Kubernetes.
pub const DEFAULT_GRACE_PERIOD_SECONDS: u32 = 30;

/// Namespace assumed for Pods whose metadata does not carry one.
pub const DEFAULT_NAMESPACE: &str = "default";
