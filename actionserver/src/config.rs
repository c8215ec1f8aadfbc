//! Configuration for the action server, read from environment variables.
use crate::constants::*;
use crate::error::{self, Result};
use drainer::{DrainPolicy, EvacuationSettings};

use snafu::ensure;
use tokio::time::Duration;

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Directory holding one kubeconfig per cluster.
    pub kubeconfig_root: PathBuf,
    /// Applied to every drain.
    pub drain_policy: DrainPolicy,
    pub evacuation: EvacuationSettings,
}

impl ActionServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration using `lookup` to resolve environment variable names. Unset or empty variables
    /// take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let default_policy = DrainPolicy::default();
        let default_evacuation = EvacuationSettings::default();

        let timeout_seconds: u64 = parse_env(&lookup, DRAIN_TIMEOUT_SECONDS_ENV_VAR, 0)?;
        let drain_policy = DrainPolicy {
            force: parse_env(&lookup, DRAIN_FORCE_ENV_VAR, default_policy.force)?,
            ignore_daemon_set_pods: parse_env(
                &lookup,
                DRAIN_IGNORE_DAEMONSETS_ENV_VAR,
                default_policy.ignore_daemon_set_pods,
            )?,
            delete_local_storage: parse_env(
                &lookup,
                DRAIN_DELETE_LOCAL_DATA_ENV_VAR,
                default_policy.delete_local_storage,
            )?,
            grace_period_seconds: parse_env(
                &lookup,
                DRAIN_GRACE_PERIOD_SECONDS_ENV_VAR,
                default_policy.grace_period_seconds,
            )?,
            timeout: (timeout_seconds > 0).then(|| Duration::from_secs(timeout_seconds)),
        };

        let evacuation = EvacuationSettings {
            max_concurrent_evictions: parse_env(
                &lookup,
                DRAIN_MAX_CONCURRENT_EVICTIONS_ENV_VAR,
                default_evacuation.max_concurrent_evictions,
            )?,
            eviction_retry_interval: parse_interval_env(
                &lookup,
                DRAIN_EVICTION_RETRY_INTERVAL_SECONDS_ENV_VAR,
                default_evacuation.eviction_retry_interval,
            )?,
            deletion_check_interval: parse_interval_env(
                &lookup,
                DRAIN_DELETION_CHECK_INTERVAL_SECONDS_ENV_VAR,
                default_evacuation.deletion_check_interval,
            )?,
        };

        Ok(ActionServerConfig {
            bind_address: lookup(BIND_ADDRESS_ENV_VAR)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            port: parse_env(&lookup, PORT_ENV_VAR, DEFAULT_PORT)?,
            kubeconfig_root: lookup(KUBECONFIG_ROOT_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KUBECONFIG_ROOT)),
            drain_policy,
            evacuation,
        })
    }
}

fn parse_env<F, T>(lookup: &F, variable: &'static str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(variable) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|err: T::Err| error::Error::InvalidEnv {
                variable,
                message: err.to_string(),
                value,
            }),
    }
}

/// Reads a whole number of seconds between repeated API requests. Zero would issue them back to back.
fn parse_interval_env<F>(lookup: &F, variable: &'static str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let seconds: u64 = parse_env(lookup, variable, default.as_secs())?;
    ensure!(
        seconds > 0,
        error::InvalidEnvSnafu {
            variable,
            value: seconds.to_string(),
            message: "interval must be at least 1 second",
        }
    );
    Ok(Duration::from_secs(seconds))
}
