//! Shared types for the suitekit harness
//!
//! Every fixture, application handle and generated command line is keyed by
//! these types; errors carry enough context to be reported without a backtrace.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::time::Duration;

pub mod config;
pub mod readiness;

pub use config::HarnessConfig;
pub use readiness::{Readiness, port_accepts_connections};

/// TCP port a fixture instance or application remote-control surface is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port(pub u16);

impl Port {
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Ask the kernel for a port that is free right now.
    ///
    /// The listener is dropped before returning, so another process may grab
    /// the port before the caller binds it. Suites run in isolated workers,
    /// which keeps that window harmless in practice.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if no loopback socket can be bound
    pub fn allocate() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
        let port = listener.local_addr()?.port();
        Ok(Self(port))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Port {
    fn from(port: u16) -> Self {
        Self(port)
    }
}

/// Shape of a fixture deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    /// One standalone server process
    Single,
    /// Multi-node replica set / sharded cluster, described by launcher
    /// arguments such as `--mongos 3 --sharded 3 --hostname localhost`
    Cluster { args: Vec<String> },
}

impl Topology {
    /// Cluster from a whitespace-separated argument string; no shell quoting
    /// is interpreted, so use [`Topology::cluster_args`] for values with spaces
    #[must_use]
    pub fn cluster(args: &str) -> Self {
        Self::cluster_args(args.split_whitespace())
    }

    /// Cluster from pre-split launcher arguments, passed through unchanged
    #[must_use]
    pub fn cluster_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Cluster {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub const fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster { .. })
    }
}

/// Host platform conventions that leak into generated command lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }

    #[must_use]
    pub const fn separator(self) -> char {
        match self {
            Self::Unix => '/',
            Self::Windows => '\\',
        }
    }
}

/// Error types for harness operations
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", describe_exit(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("application already launched for this suite")]
    AlreadyLaunched,

    #[error("application is not running")]
    NotRunning,

    #[error("configuration error: {0}")]
    Config(String),
}

impl HarnessError {
    #[must_use]
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    #[must_use]
    pub fn command_failed(program: impl Into<String>, output: &std::process::Output) -> Self {
        Self::CommandFailed {
            program: program.into(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

pub type Result<T> = std::result::Result<T, HarnessError>;
