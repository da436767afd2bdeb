//! One persistent connection and its claim → request → receive → claim loop.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::barrier::CompletionBarrier;
use super::report::{DropReason, TaskOutcome};
use super::PoolOptions;
use crate::error::TaskError;
use crate::framer::{CompleteResponse, EarlyEof, FrameProgress, ResponseFrame};
use crate::host::HostBinding;
use crate::request;
use crate::storage;
use crate::task::{DownloadTask, TaskDispenser};
use crate::throughput::Throughput;
use crate::transport::Connector;

/// Connection state carried between tasks.
enum Conn<S> {
    Ready(S),
    /// The last open attempt failed; the next claimed task inherits the error.
    Failed(io::Error),
    /// No stream; open one when the next task is claimed.
    Closed,
}

/// What a slot did over its lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct SlotStats {
    pub connections_opened: usize,
    pub bytes_received: u64,
    pub tasks: usize,
}

pub(super) struct Slot<C: Connector> {
    pub id: usize,
    pub binding: HostBinding,
    pub connector: Arc<C>,
    pub options: Arc<PoolOptions>,
    pub throughput: Arc<Throughput>,
    pub dispenser: TaskDispenser,
    pub barrier: Arc<CompletionBarrier>,
}

impl<C: Connector> Slot<C> {
    pub(super) async fn run(self) -> SlotStats {
        let mut stats = SlotStats::default();
        let mut conn = self.open(&mut stats).await;

        loop {
            let Some(task) = self.dispenser.next() else {
                if let Conn::Ready(mut stream) = conn {
                    let _ = stream.shutdown().await;
                    tracing::debug!(slot = self.id, "no tasks left; connection closed");
                }
                break;
            };
            tracing::debug!(slot = self.id, index = task.index, url = %task.source, "claimed");

            let stream = match conn {
                Conn::Ready(stream) => Ok(stream),
                Conn::Failed(e) => Err(e),
                Conn::Closed => match self.open(&mut stats).await {
                    Conn::Ready(stream) => Ok(stream),
                    Conn::Failed(e) => Err(e),
                    Conn::Closed => Err(io::Error::from(io::ErrorKind::NotConnected)),
                },
            };

            let (outcome, next) = match stream {
                Ok(mut stream) => {
                    let (outcome, reusable) = self.transfer(&mut stream, &task, &mut stats).await;
                    let next = if reusable {
                        Conn::Ready(stream)
                    } else {
                        Conn::Closed
                    };
                    (outcome, next)
                }
                Err(e) => (TaskOutcome::Failed(TaskError::Connect(e)), Conn::Closed),
            };
            conn = next;

            self.report(&task, &outcome);
            stats.tasks += 1;
            self.barrier.complete(task.index, outcome);
        }

        stats
    }

    async fn open(&self, stats: &mut SlotStats) -> Conn<C::Stream> {
        let attempt = tokio::time::timeout(
            self.options.connect_timeout,
            self.connector.connect(&self.binding),
        )
        .await;
        match attempt {
            Ok(Ok(stream)) => {
                stats.connections_opened += 1;
                tracing::debug!(slot = self.id, host = %self.binding.authority(), "connected");
                Conn::Ready(stream)
            }
            Ok(Err(e)) => {
                tracing::warn!(slot = self.id, error = %e, "connect failed");
                Conn::Failed(e)
            }
            Err(_) => {
                tracing::warn!(slot = self.id, "connect timed out");
                Conn::Failed(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", self.options.connect_timeout),
                ))
            }
        }
    }

    /// Run one task under the per-task deadline. Returns the outcome and
    /// whether the stream can carry the next request.
    async fn transfer(
        &self,
        stream: &mut C::Stream,
        task: &DownloadTask,
        stats: &mut SlotStats,
    ) -> (TaskOutcome, bool) {
        let deadline = self.options.task_timeout;
        match tokio::time::timeout(deadline, self.exchange(stream, task, stats)).await {
            Ok(Ok((outcome, reusable))) => (outcome, reusable),
            Ok(Err(e)) => {
                let reusable = !e.poisons_connection();
                (TaskOutcome::Failed(e), reusable)
            }
            Err(_) => (TaskOutcome::Failed(TaskError::Timeout(deadline)), false),
        }
    }

    async fn exchange(
        &self,
        stream: &mut C::Stream,
        task: &DownloadTask,
        stats: &mut SlotStats,
    ) -> Result<(TaskOutcome, bool), TaskError> {
        let req = request::build_get(&self.binding, task, &self.options.user_agent);
        stream.write_all(&req).await.map_err(TaskError::Send)?;
        stream.flush().await.map_err(TaskError::Send)?;

        let mut frame = ResponseFrame::new();
        let mut chunk = vec![0u8; self.options.receive_chunk_bytes.max(1)];
        loop {
            let n = stream.read(&mut chunk).await.map_err(TaskError::Receive)?;
            if n == 0 {
                let outcome = match self.settle_eof(task, frame.finish_eof()).await {
                    Ok(outcome) => outcome,
                    Err(e) => TaskOutcome::Failed(e),
                };
                return Ok((outcome, false));
            }
            stats.bytes_received += n as u64;
            self.throughput.add(n);

            match frame.push(&chunk[..n])? {
                FrameProgress::Pending(f) => frame = f,
                FrameProgress::Complete(response) => {
                    let reusable = response.keeps_connection();
                    if response.surplus > 0 {
                        tracing::warn!(
                            slot = self.id,
                            index = task.index,
                            surplus = response.surplus,
                            "bytes past the response body; connection retired"
                        );
                    }
                    let outcome = match self.settle(task, response).await {
                        Ok(outcome) => outcome,
                        Err(e) => TaskOutcome::Failed(e),
                    };
                    return Ok((outcome, reusable));
                }
            }
        }
    }

    async fn settle(
        &self,
        task: &DownloadTask,
        response: CompleteResponse,
    ) -> Result<TaskOutcome, TaskError> {
        let status = &response.head.status;
        if !status.is_success() {
            return Err(TaskError::Status { code: status.code });
        }
        storage::write_body(&task.destination, &response.body).await?;
        Ok(TaskOutcome::Written {
            bytes: response.body.len(),
            partial: false,
        })
    }

    async fn settle_eof(&self, task: &DownloadTask, eof: EarlyEof) -> Result<TaskOutcome, TaskError> {
        let reason = match &eof.head {
            None => DropReason::NoHeaders,
            Some(_) => DropReason::ShortBody {
                received: eof.body.len(),
                expected: eof.expected,
            },
        };
        let Some((head, body)) = eof.into_body(self.options.partial_body) else {
            return Ok(TaskOutcome::Dropped(reason));
        };
        if !head.status.is_success() {
            return Err(TaskError::Status {
                code: head.status.code,
            });
        }
        storage::write_body(&task.destination, &body).await?;
        Ok(TaskOutcome::Written {
            bytes: body.len(),
            partial: true,
        })
    }

    fn report(&self, task: &DownloadTask, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Written { bytes, partial } => tracing::debug!(
                slot = self.id,
                index = task.index,
                bytes,
                partial,
                dest = %task.destination.display(),
                "written"
            ),
            TaskOutcome::Dropped(reason) => tracing::warn!(
                slot = self.id,
                index = task.index,
                url = %task.source,
                %reason,
                "response ended early; nothing written"
            ),
            TaskOutcome::Failed(e) => tracing::error!(
                slot = self.id,
                index = task.index,
                url = %task.source,
                error = %e,
                "task failed"
            ),
        }
    }
}
