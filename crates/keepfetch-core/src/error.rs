//! Error types for pool construction, input validation and individual tasks.
//!
//! Only `ConstructionError` ever reaches the caller as an `Err`. Validation
//! problems turn `run()` into a logged no-op, and `TaskError`s are recorded in
//! the run report for the task that hit them.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Raised by `ConnectionPool::new` before any connection is opened.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// A source locator is not an `http`/`https` URL naming a host.
    #[error("invalid source locator: {locator}")]
    InvalidLocator { locator: String },
    /// The locator list is empty.
    #[error("source locators do not name any host")]
    NoHost,
    /// Locators point at more than one host; a pool binds to exactly one.
    #[error("source locators span multiple hosts: {}", hosts.join(", "))]
    MultipleHosts { hosts: Vec<String> },
    #[error("max connections must be at least 1")]
    ZeroConnections,
    #[error("TLS client setup failed: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
}

/// Task list shape problems detected at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task list is empty")]
    Empty,
    #[error("{sources} sources but {destinations} destinations")]
    LengthMismatch { sources: usize, destinations: usize },
}

/// Failure of a single task. Contained to that task; the slot moves on.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("sending request failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("receiving response failed: {0}")]
    Receive(#[source] std::io::Error),
    /// Header block grew past the limit without a terminating blank line.
    #[error("response header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },
    #[error("malformed response head: {0}")]
    MalformedHeaders(String),
    /// Non-2xx response; the body was consumed but not written.
    #[error("HTTP {code}")]
    Status { code: u16 },
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("task exceeded deadline of {0:?}")]
    Timeout(Duration),
    /// The slot driving this task panicked before it could report.
    #[error("connection slot panicked")]
    SlotPanicked,
}

impl TaskError {
    /// True when the connection that produced this error must not be reused.
    pub fn poisons_connection(&self) -> bool {
        match self {
            TaskError::Connect(_)
            | TaskError::Send(_)
            | TaskError::Receive(_)
            | TaskError::HeaderTooLarge { .. }
            | TaskError::MalformedHeaders(_)
            | TaskError::Timeout(_)
            | TaskError::SlotPanicked => true,
            TaskError::Status { .. } | TaskError::Write { .. } => false,
        }
    }
}
