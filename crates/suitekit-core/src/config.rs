//! Harness configuration
//!
//! Values come from the environment with built-in defaults; callers (the CLI,
//! suite setup code) override individual fields afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::readiness::DEFAULT_POLL_INTERVAL;
use crate::{HarnessError, Readiness, Result, Topology};

pub const ENV_LAUNCHER: &str = "SUITEKIT_LAUNCHER";
pub const ENV_SHELL: &str = "SUITEKIT_SHELL";
pub const ENV_APP: &str = "SUITEKIT_APP";
pub const ENV_DATA_ROOT: &str = "SUITEKIT_DATA_ROOT";
pub const ENV_READY_TIMEOUT: &str = "SUITEKIT_READY_TIMEOUT_SECS";
pub const ENV_CLUSTER_READY_TIMEOUT: &str = "SUITEKIT_CLUSTER_READY_TIMEOUT_SECS";
/// Externally provisioned sharded cluster for suites that opt into a real remote topology
pub const ENV_CLUSTER_HOST: &str = "EC2_SHARD_CLUSTER_HOSTNAME";

const DEFAULT_LAUNCHER: &str = "mlaunch";
const DEFAULT_SHELL: &str = "mongo";
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CLUSTER_READY_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Topology launcher (`init` / `kill` subcommands)
    pub launcher: PathBuf,
    /// Database shell used to seed fixture data
    pub shell: PathBuf,
    /// Application under test
    pub app_path: Option<PathBuf>,
    /// Parent directory for per-instance data directories
    pub data_root: PathBuf,
    pub cluster_host: Option<String>,
    pub single_ready_timeout: Duration,
    pub cluster_ready_timeout: Duration,
    pub poll_interval: Duration,
}

impl HarnessConfig {
    /// Build a configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if a timeout variable is not a whole number of seconds
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if a timeout value is not a whole number of seconds
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let seconds = |key: &str, default: Duration| -> Result<Duration> {
            non_empty(key).map_or(Ok(default), |raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| HarnessError::Config(format!("{key} must be whole seconds, got {raw:?}")))
            })
        };

        Ok(Self {
            launcher: non_empty(ENV_LAUNCHER).map_or_else(|| PathBuf::from(DEFAULT_LAUNCHER), PathBuf::from),
            shell: non_empty(ENV_SHELL).map_or_else(|| PathBuf::from(DEFAULT_SHELL), PathBuf::from),
            app_path: non_empty(ENV_APP).map(PathBuf::from),
            data_root: non_empty(ENV_DATA_ROOT).map_or_else(std::env::temp_dir, PathBuf::from),
            cluster_host: non_empty(ENV_CLUSTER_HOST),
            single_ready_timeout: seconds(ENV_READY_TIMEOUT, DEFAULT_READY_TIMEOUT)?,
            cluster_ready_timeout: seconds(ENV_CLUSTER_READY_TIMEOUT, DEFAULT_CLUSTER_READY_TIMEOUT)?,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Readiness policy for a freshly started topology
    #[must_use]
    pub fn readiness_for(&self, topology: &Topology) -> Readiness {
        let timeout = match topology {
            Topology::Single => self.single_ready_timeout,
            Topology::Cluster { .. } => self.cluster_ready_timeout,
        };
        Readiness::new(timeout, self.poll_interval)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            launcher: PathBuf::from(DEFAULT_LAUNCHER),
            shell: PathBuf::from(DEFAULT_SHELL),
            app_path: None,
            data_root: std::env::temp_dir(),
            cluster_host: None,
            single_ready_timeout: DEFAULT_READY_TIMEOUT,
            cluster_ready_timeout: DEFAULT_CLUSTER_READY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
