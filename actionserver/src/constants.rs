pub const ALERT_ENDPOINT: &str = "/alert";
pub const HEALTH_CHECK_ROUTE: &str = "/ping";

/// Raised by Prometheus when a spot instance receives its two-minute termination notice.
pub const SPOT_TERMINATION_NOTICE_EVENT: &str = "prometheus.server.alert.SpotTerminationNotice";

// Keys read from the `data` of an alert event.
pub const EVENT_DATA_INSTANCE: &str = "instance";
pub const EVENT_DATA_CLUSTER_NAME: &str = "cluster_name";

/// File name of the kubeconfig within each cluster's directory under the config root.
pub const KUBECONFIG_FILE_NAME: &str = "config";

// Environment variables and their defaults.
pub const PORT_ENV_VAR: &str = "ACTIONSERVER_PORT";
pub const DEFAULT_PORT: u16 = 8887;
pub const BIND_ADDRESS_ENV_VAR: &str = "ACTIONSERVER_BIND_ADDRESS";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const KUBECONFIG_ROOT_ENV_VAR: &str = "KUBECONFIG_ROOT";
pub const DEFAULT_KUBECONFIG_ROOT: &str = "/etc/kubeconfig";

pub const DRAIN_FORCE_ENV_VAR: &str = "DRAIN_FORCE";
pub const DRAIN_IGNORE_DAEMONSETS_ENV_VAR: &str = "DRAIN_IGNORE_DAEMONSETS";
pub const DRAIN_DELETE_LOCAL_DATA_ENV_VAR: &str = "DRAIN_DELETE_LOCAL_DATA";
pub const DRAIN_GRACE_PERIOD_SECONDS_ENV_VAR: &str = "DRAIN_GRACE_PERIOD_SECONDS";
pub const DRAIN_TIMEOUT_SECONDS_ENV_VAR: &str = "DRAIN_TIMEOUT_SECONDS";
pub const DRAIN_MAX_CONCURRENT_EVICTIONS_ENV_VAR: &str = "DRAIN_MAX_CONCURRENT_EVICTIONS";
pub const DRAIN_EVICTION_RETRY_INTERVAL_SECONDS_ENV_VAR: &str =
    "DRAIN_EVICTION_RETRY_INTERVAL_SECONDS";
pub const DRAIN_DELETION_CHECK_INTERVAL_SECONDS_ENV_VAR: &str =
    "DRAIN_DELETION_CHECK_INTERVAL_SECONDS";
