//! Bounded readiness polling
//!
//! Operations that need the system under test to settle (topology startup,
//! data propagation, UI refresh) poll an explicit predicate instead of
//! sleeping for a fixed duration, and surface a timeout error when the
//! predicate never holds.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use crate::{HarnessError, Port, Result};

/// Default interval between predicate evaluations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Readiness {
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }

    /// Evaluate `predicate` until it holds or the timeout elapses.
    ///
    /// Returns the number of evaluations it took. The predicate is always
    /// evaluated at least once, even with a zero timeout.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Timeout` naming `what` if the predicate never held
    pub fn wait_until<F>(&self, what: &str, mut predicate: F) -> Result<usize>
    where
        F: FnMut() -> bool,
    {
        let started = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            if predicate() {
                tracing::debug!(what, attempts, elapsed = ?started.elapsed(), "ready");
                return Ok(attempts);
            }
            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Err(HarnessError::Timeout {
                    what: what.to_string(),
                    waited: elapsed,
                });
            }
            thread::sleep(self.interval.min(self.timeout - elapsed));
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }
}

/// TCP connect probe: true once something accepts connections on `host:port`
#[must_use]
pub fn port_accepts_connections(host: &str, port: Port) -> bool {
    let Ok(addrs) = (host, port.get()).to_socket_addrs() else {
        return false;
    };
    addrs
        .collect::<Vec<SocketAddr>>()
        .iter()
        .any(|addr| TcpStream::connect_timeout(addr, CONNECT_PROBE_TIMEOUT).is_ok())
}
