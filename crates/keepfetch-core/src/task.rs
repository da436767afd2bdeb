//! Fixed task list and the claim cursor shared by all connection slots.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

use crate::error::ValidationError;

/// One (source, destination) transfer unit, identified by its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub index: usize,
    pub source: Url,
    pub destination: PathBuf,
}

impl DownloadTask {
    /// Request target: path plus query, never the fragment.
    pub fn request_target(&self) -> String {
        let mut target = self.source.path().to_string();
        if target.is_empty() {
            target.push('/');
        }
        if let Some(q) = self.source.query() {
            target.push('?');
            target.push_str(q);
        }
        target
    }
}

/// Sources and destinations as given by the caller. The two lists are kept
/// separately until a run validates them, so a length mismatch is observable.
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    sources: Vec<Url>,
    destinations: Vec<PathBuf>,
}

impl TaskList {
    pub fn new(sources: Vec<Url>, destinations: Vec<PathBuf>) -> Self {
        Self {
            sources,
            destinations,
        }
    }

    pub fn sources(&self) -> &[Url] {
        &self.sources
    }

    /// Number of tasks a valid list describes.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sources.is_empty() {
            return Err(ValidationError::Empty);
        }
        if self.sources.len() != self.destinations.len() {
            return Err(ValidationError::LengthMismatch {
                sources: self.sources.len(),
                destinations: self.destinations.len(),
            });
        }
        Ok(())
    }

    /// Pair the lists into indexed tasks. Call after `validate`.
    pub fn tasks(&self) -> Vec<DownloadTask> {
        self.sources
            .iter()
            .zip(&self.destinations)
            .enumerate()
            .map(|(index, (source, destination))| DownloadTask {
                index,
                source: source.clone(),
                destination: destination.clone(),
            })
            .collect()
    }
}

/// Hands out tasks in list order, each exactly once.
///
/// The claim is a single `fetch_add`; nothing is held while the claimed task
/// is transferred, so claim latency never depends on I/O.
#[derive(Debug, Clone)]
pub struct TaskDispenser {
    tasks: Arc<[DownloadTask]>,
    cursor: Arc<AtomicUsize>,
}

impl TaskDispenser {
    pub fn new(tasks: Vec<DownloadTask>) -> Self {
        Self {
            tasks: tasks.into(),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Claim the next task, or `None` once the list is exhausted.
    pub fn next(&self) -> Option<DownloadTask> {
        let i = self.cursor.fetch_add(1, Ordering::AcqRel);
        self.tasks.get(i).cloned()
    }

    /// Indices handed out so far.
    pub fn claimed(&self) -> usize {
        self.cursor.load(Ordering::Acquire).min(self.tasks.len())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
