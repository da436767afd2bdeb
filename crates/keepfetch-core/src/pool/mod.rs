//! Bounded pool of keep-alive connections to one host.
//!
//! `min(max_connections, tasks)` slots are spawned onto a `JoinSet`. Each slot
//! opens one connection and loops claim → GET → frame → write → claim on that
//! same connection until the dispenser is empty, then closes it. `run()`
//! returns once every slot has finished, which is also the point at which
//! every task has reported exactly one outcome.

mod barrier;
mod report;
mod slot;

pub use report::{DropReason, RunReport, RunSummary, TaskOutcome, TaskRecord, TaskSummary};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::config::KeepfetchConfig;
use crate::error::ConstructionError;
use crate::framer::PartialBodyPolicy;
use crate::host::{self, HostBinding};
use crate::request;
use crate::task::{TaskDispenser, TaskList};
use crate::throughput::Throughput;
use crate::transport::{Connector, TlsConnector};

use barrier::CompletionBarrier;
use slot::{Slot, SlotStats};

/// Tunables for one pool. See `KeepfetchConfig` for the on-disk form.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub task_timeout: Duration,
    pub connect_timeout: Duration,
    pub receive_chunk_bytes: usize,
    pub partial_body: PartialBodyPolicy,
    pub user_agent: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from(&KeepfetchConfig::default())
    }
}

impl From<&KeepfetchConfig> for PoolOptions {
    fn from(cfg: &KeepfetchConfig) -> Self {
        Self {
            task_timeout: Duration::from_secs(cfg.task_timeout_secs),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            receive_chunk_bytes: cfg.receive_chunk_bytes,
            partial_body: cfg.partial_body,
            user_agent: cfg
                .user_agent
                .clone()
                .unwrap_or_else(request::default_user_agent),
        }
    }
}

/// Downloads a fixed task list from one host over reused connections.
pub struct ConnectionPool<C: Connector = TlsConnector> {
    binding: HostBinding,
    tasks: TaskList,
    max_connections: usize,
    connector: Arc<C>,
    options: PoolOptions,
    throughput: Arc<Throughput>,
}

impl ConnectionPool<TlsConnector> {
    /// Pool over TLS (1.2 minimum, SNI = derived host).
    pub fn new<S, P>(
        sources: &[S],
        destinations: &[P],
        max_connections: usize,
    ) -> Result<Self, ConstructionError>
    where
        S: AsRef<str>,
        P: Into<PathBuf> + Clone,
    {
        let connector = TlsConnector::new()?;
        Self::with_connector(sources, destinations, max_connections, connector)
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Pool over a caller-supplied transport.
    ///
    /// Fails when a locator is not a URL, when the locators name zero or
    /// several hosts, or when `max_connections` is zero. List lengths are not
    /// checked here; `run` treats a mismatch as a no-op.
    pub fn with_connector<S, P>(
        sources: &[S],
        destinations: &[P],
        max_connections: usize,
        connector: C,
    ) -> Result<Self, ConstructionError>
    where
        S: AsRef<str>,
        P: Into<PathBuf> + Clone,
    {
        if max_connections == 0 {
            return Err(ConstructionError::ZeroConnections);
        }
        let urls = host::parse_locators(sources)?;
        let binding = HostBinding::from_urls(&urls)?;
        let destinations = destinations.iter().cloned().map(Into::into).collect();
        Ok(Self {
            binding,
            tasks: TaskList::new(urls, destinations),
            max_connections,
            connector: Arc::new(connector),
            options: PoolOptions::default(),
            throughput: Throughput::global(),
        })
    }

    pub fn with_options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Count received bytes into `throughput` instead of the global counter.
    pub fn with_throughput(mut self, throughput: Arc<Throughput>) -> Self {
        self.throughput = throughput;
        self
    }

    pub fn binding(&self) -> &HostBinding {
        &self.binding
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Number of connections a run opens: `min(max_connections, tasks)`.
    pub fn effective_parallelism(&self) -> usize {
        self.max_connections.min(self.tasks.len())
    }

    /// Download every task and return once all of them have completed.
    ///
    /// An empty list or a source/destination length mismatch returns at once
    /// with `RunReport::skipped` set; no connection is opened.
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        if let Err(reason) = self.tasks.validate() {
            tracing::warn!(%reason, "task list rejected; nothing downloaded");
            return RunReport::skipped(reason);
        }

        let tasks = self.tasks.tasks();
        let total = tasks.len();
        let parallelism = self.effective_parallelism();
        tracing::info!(
            host = %self.binding.authority(),
            tasks = total,
            connections = parallelism,
            "starting pooled download"
        );

        let dispenser = TaskDispenser::new(tasks.clone());
        let barrier = Arc::new(CompletionBarrier::new(total));
        let options = Arc::new(self.options.clone());

        let mut slots = JoinSet::new();
        for id in 0..parallelism {
            let slot = Slot {
                id,
                binding: self.binding.clone(),
                connector: Arc::clone(&self.connector),
                options: Arc::clone(&options),
                throughput: Arc::clone(&self.throughput),
                dispenser: dispenser.clone(),
                barrier: Arc::clone(&barrier),
            };
            slots.spawn(slot.run());
        }

        let mut totals = SlotStats::default();
        while let Some(joined) = slots.join_next().await {
            match joined {
                Ok(stats) => {
                    totals.connections_opened += stats.connections_opened;
                    totals.bytes_received += stats.bytes_received;
                    totals.tasks += stats.tasks;
                }
                Err(e) => tracing::error!(error = %e, "connection slot aborted"),
            }
        }

        if !barrier.is_resolved() {
            tracing::error!(
                completed = barrier.completed(),
                total,
                "slots finished with tasks unaccounted for"
            );
        }

        let records = tasks
            .into_iter()
            .zip(barrier.take_outcomes())
            .map(|(task, outcome)| TaskRecord {
                index: task.index,
                source: task.source.to_string(),
                destination: task.destination,
                outcome,
            })
            .collect();

        let report = RunReport {
            records,
            connections_opened: totals.connections_opened,
            bytes_received: totals.bytes_received,
            elapsed: started.elapsed(),
            skipped: None,
        };
        tracing::info!(
            written = report.written().count(),
            dropped = report.dropped().count(),
            failed = report.failed().count(),
            connections = report.connections_opened,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "pooled download finished"
        );
        report
    }
}
