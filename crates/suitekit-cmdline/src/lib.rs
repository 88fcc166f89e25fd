//! Command-line rendering for the database backup/restore tools
//!
//! The application writes these invocations into its editor and scenarios
//! compare them byte for byte, so flag order, quoting and the trailing space
//! are part of the contract.

pub mod dump;
pub mod export;
pub mod restore;

pub use dump::{DumpOptions, DumpTarget, dump_commands};
pub use export::{ExportOptions, export_commands};
pub use restore::{ImportOptions, RestoreOptions, import_command, restore_command};

use suitekit_core::Port;

/// Wrap a value in double quotes, escaping embedded double quotes
///
/// Backslashes pass through untouched, so Windows paths render verbatim.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Server address every generated command starts with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: String,
    pub port: Port,
}

impl Connection {
    #[must_use]
    pub fn new(host: impl Into<String>, port: Port) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    #[must_use]
    pub fn localhost(port: Port) -> Self {
        Self::new("localhost", port)
    }
}

/// Incremental builder; every token is followed by a single space
#[derive(Debug, Clone)]
pub struct CommandLine {
    buffer: String,
}

impl CommandLine {
    #[must_use]
    pub fn new(program: &str) -> Self {
        let mut buffer = String::with_capacity(256);
        buffer.push_str(program);
        buffer.push(' ');
        Self { buffer }
    }

    /// `--host "<host>" --port "<port>"`
    #[must_use]
    pub fn connection(self, connection: &Connection) -> Self {
        self.value("--host", &connection.host)
            .value("--port", &connection.port.to_string())
    }

    #[must_use]
    pub fn flag(mut self, name: &str) -> Self {
        self.buffer.push_str(name);
        self.buffer.push(' ');
        self
    }

    #[must_use]
    pub fn flag_if(self, name: &str, enabled: bool) -> Self {
        if enabled { self.flag(name) } else { self }
    }

    #[must_use]
    pub fn value(mut self, name: &str, value: &str) -> Self {
        self.buffer.push_str(name);
        self.buffer.push(' ');
        self.buffer.push_str(&quote(value));
        self.buffer.push(' ');
        self
    }

    /// Render `name "value"` only for a present, non-empty value
    #[must_use]
    pub fn value_opt(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.value(name, v),
            _ => self,
        }
    }

    #[must_use]
    pub fn number_opt(self, name: &str, value: Option<u64>) -> Self {
        match value {
            Some(n) => self.value(name, &n.to_string()),
            None => self,
        }
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.buffer
    }
}
