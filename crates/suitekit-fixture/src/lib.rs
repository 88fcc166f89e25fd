//! Ephemeral database instances for a single suite
//!
//! Each instance gets its own port and data directory, lives for the suite's
//! lifetime and is torn down through `stop`, which is safe to call from any
//! number of exit paths.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Mutex, MutexGuard, PoisonError};

use suitekit_core::{HarnessConfig, HarnessError, Port, Result, Topology, port_accepts_connections};
use tempfile::TempDir;

pub mod documents;
pub mod runner;

pub use documents::DEFAULT_DOCUMENT_COUNT;
pub use runner::{CommandRunner, SystemRunner};

use runner::run_checked;

const FIXTURE_HOST: &str = "localhost";

struct Instance {
    topology: Topology,
    data_dir: TempDir,
}

pub struct Provisioner {
    config: HarnessConfig,
    runner: Box<dyn CommandRunner>,
    instances: Mutex<HashMap<Port, Instance>>,
}

impl Provisioner {
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_runner(config, SystemRunner)
    }

    #[must_use]
    pub fn with_runner(config: HarnessConfig, runner: impl CommandRunner + 'static) -> Self {
        Self {
            config,
            runner: Box::new(runner),
            instances: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// A port believed free right now
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if no loopback socket can be bound
    pub fn allocate_port(&self) -> Result<Port> {
        Port::allocate()
    }

    /// Launch an instance bound to `port`
    ///
    /// The instance is registered before the launcher runs, so a launch that
    /// fails halfway is still cleaned up by `stop` / `stop_all`. For clusters
    /// the topology is usually not queryable yet when this returns; follow up
    /// with [`Provisioner::wait_ready`].
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::InvalidArgument` if `port` already hosts an
    /// instance of this provisioner, and the launcher's spawn or exit error otherwise
    pub fn start(&self, port: Port, topology: Topology) -> Result<()> {
        let data_dir = {
            let mut instances = self.lock();
            if instances.contains_key(&port) {
                return Err(HarnessError::InvalidArgument(format!(
                    "an instance is already running on port {port}"
                )));
            }
            std::fs::create_dir_all(&self.config.data_root)?;
            let data_dir = tempfile::Builder::new()
                .prefix(&format!("suitekit-{port}-"))
                .tempdir_in(&self.config.data_root)?;
            let path = data_dir.path().to_path_buf();
            instances.insert(
                port,
                Instance {
                    topology: topology.clone(),
                    data_dir,
                },
            );
            path
        };

        let mut command = self.launch_command(port, &topology, data_dir);
        tracing::info!(%port, ?topology, "starting fixture instance");
        run_checked(self.runner.as_ref(), &mut command)?;
        Ok(())
    }

    /// Block until the instance on `port` accepts connections
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::InvalidArgument` for an unknown port and
    /// `HarnessError::Timeout` if the topology does not settle in time
    pub fn wait_ready(&self, port: Port) -> Result<usize> {
        let topology = self
            .lock()
            .get(&port)
            .map(|instance| instance.topology.clone())
            .ok_or_else(|| HarnessError::InvalidArgument(format!("no instance on port {port}")))?;
        self.config
            .readiness_for(&topology)
            .wait_until(&format!("fixture instance on port {port}"), || {
                port_accepts_connections(FIXTURE_HOST, port)
            })
    }

    /// Insert synthetic documents into `database.collection`
    ///
    /// `None` seeds [`DEFAULT_DOCUMENT_COUNT`] documents; `Some(0)` only makes
    /// sure the collection exists, which is how placeholder targets are made.
    ///
    /// # Errors
    ///
    /// Returns the shell's spawn or exit error
    pub fn seed(&self, port: Port, database: &str, collection: &str, count: Option<usize>) -> Result<()> {
        let count = count.unwrap_or(DEFAULT_DOCUMENT_COUNT);
        let mut command = Command::new(&self.config.shell);
        command
            .arg("--host")
            .arg(FIXTURE_HOST)
            .arg("--port")
            .arg(port.to_string())
            .arg("--quiet")
            .arg("--eval")
            .arg(documents::seed_script(database, collection, count));
        tracing::debug!(%port, database, collection, count, "seeding fixture data");
        run_checked(self.runner.as_ref(), &mut command)?;
        Ok(())
    }

    /// Tear down the instance on `port`
    ///
    /// Unknown or already stopped ports are a no-op. Launcher failures are
    /// logged and swallowed so sibling teardown keeps going. Returns whether
    /// an instance was actually stopped.
    pub fn stop(&self, port: Port) -> bool {
        let Some(instance) = self.lock().remove(&port) else {
            tracing::debug!(%port, "no fixture instance to stop");
            return false;
        };

        let mut command = Command::new(&self.config.launcher);
        command.arg("kill").arg("--dir").arg(instance.data_dir.path());
        match run_checked(self.runner.as_ref(), &mut command) {
            Ok(_) => tracing::info!(%port, "stopped fixture instance"),
            Err(e) => tracing::warn!(%port, error = %e, "failed to stop fixture instance"),
        }
        true
    }

    /// Stop every instance this provisioner started
    pub fn stop_all(&self) -> usize {
        self.running_ports()
            .into_iter()
            .filter(|port| self.stop(*port))
            .count()
    }

    #[must_use]
    pub fn running_ports(&self) -> Vec<Port> {
        let mut ports: Vec<Port> = self.lock().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    #[must_use]
    pub fn data_dir(&self, port: Port) -> Option<PathBuf> {
        self.lock()
            .get(&port)
            .map(|instance| instance.data_dir.path().to_path_buf())
    }

    fn launch_command(&self, port: Port, topology: &Topology, data_dir: PathBuf) -> Command {
        let mut command = Command::new(&self.config.launcher);
        command.arg("init");
        match topology {
            Topology::Single => {
                command.arg("--single");
            }
            Topology::Cluster { args } => {
                command.args(args);
            }
        }
        command
            .arg("--port")
            .arg(port.to_string())
            .arg("--dir")
            .arg(data_dir);
        command
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Port, Instance>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Provisioner {
    fn drop(&mut self) {
        let stopped = self.stop_all();
        if stopped > 0 {
            tracing::debug!(stopped, "stopped leftover fixture instances on drop");
        }
    }
}
