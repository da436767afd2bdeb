//! Response framing for one task on a keep-alive connection.
//!
//! Raw bytes go in; once the blank line after the header block is seen the
//! head is parsed, then exactly `Content-Length` body bytes are collected.
//! The frame is consumed when it completes, so its buffer never outlives the
//! task that created it.

mod parse;

use serde::{Deserialize, Serialize};

pub use parse::{ResponseHead, ResponseHeaders, StatusLine};

use crate::error::TaskError;

/// Blank line that terminates the header block.
pub const HEADER_DELIMITER: &[u8] = b"\r\n\r\n";

/// Header blocks larger than this without a delimiter fail the task.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// What to do with body bytes that arrived before the peer closed early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialBodyPolicy {
    /// Write nothing; the task ends as dropped.
    #[default]
    Discard,
    /// Write whatever body bytes were received after a parsed head.
    Flush,
}

#[derive(Debug)]
enum FrameState {
    AwaitingHeaders,
    /// `None` means no Content-Length: the body runs until EOF.
    AwaitingBody {
        head: ResponseHead,
        content_length: Option<usize>,
    },
}

/// A response that reached its Content-Length.
#[derive(Debug)]
pub struct CompleteResponse {
    pub head: ResponseHead,
    pub body: Vec<u8>,
    /// Bytes received past the end of the body. They belong to no request.
    pub surplus: usize,
}

impl CompleteResponse {
    /// Whether the connection can carry the next request: the server did not
    /// ask to close, did not switch protocols, and sent nothing past the body.
    pub fn keeps_connection(&self) -> bool {
        self.surplus == 0
            && self.head.status.code != 101
            && !self.head.headers.connection_close()
    }
}

/// Result of feeding a chunk into a frame.
#[derive(Debug)]
pub enum FrameProgress {
    Pending(ResponseFrame),
    Complete(CompleteResponse),
}

/// What was held when the transport reported end-of-stream before completion.
#[derive(Debug)]
pub struct EarlyEof {
    /// `None` when the header block never finished.
    pub head: Option<ResponseHead>,
    pub body: Vec<u8>,
    pub expected: Option<usize>,
}

impl EarlyEof {
    /// Body to write under `policy`, if any.
    pub fn into_body(self, policy: PartialBodyPolicy) -> Option<(ResponseHead, Vec<u8>)> {
        match (policy, self.head) {
            (PartialBodyPolicy::Flush, Some(head)) => Some((head, self.body)),
            _ => None,
        }
    }
}

/// Per-task parse state: `AwaitingHeaders → AwaitingBody → (consumed)`.
#[derive(Debug)]
pub struct ResponseFrame {
    buffer: Vec<u8>,
    state: FrameState,
}

impl Default for ResponseFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseFrame {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: FrameState::AwaitingHeaders,
        }
    }

    pub fn is_awaiting_headers(&self) -> bool {
        matches!(self.state, FrameState::AwaitingHeaders)
    }

    /// Bytes currently buffered (header remainder or body so far).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one received chunk.
    ///
    /// Interim `1xx` heads (other than `101`) are skipped; framing continues
    /// with the head that follows them.
    pub fn push(mut self, chunk: &[u8]) -> Result<FrameProgress, TaskError> {
        self.buffer.extend_from_slice(chunk);

        while let FrameState::AwaitingHeaders = self.state {
            let Some(pos) = find_delimiter(&self.buffer) else {
                if self.buffer.len() > MAX_HEADER_BYTES {
                    return Err(TaskError::HeaderTooLarge {
                        limit: MAX_HEADER_BYTES,
                    });
                }
                return Ok(FrameProgress::Pending(self));
            };
            let head_end = pos + HEADER_DELIMITER.len();
            let head = parse::parse_head(&self.buffer[..pos])?;
            self.buffer.drain(..head_end);
            if head.status.is_interim() {
                tracing::trace!(status = head.status.code, "interim response skipped");
                continue;
            }
            let content_length = if head.status.is_bodyless() {
                Some(0)
            } else {
                head.headers.content_length()?
            };
            tracing::trace!(
                status = head.status.code,
                ?content_length,
                "response head parsed"
            );
            self.state = FrameState::AwaitingBody {
                head,
                content_length,
            };
        }

        match self.state {
            FrameState::AwaitingBody {
                head,
                content_length: Some(len),
            } if self.buffer.len() >= len => {
                let mut body = self.buffer;
                let surplus = body.len() - len;
                body.truncate(len);
                Ok(FrameProgress::Complete(CompleteResponse {
                    head,
                    body,
                    surplus,
                }))
            }
            state => Ok(FrameProgress::Pending(Self {
                buffer: self.buffer,
                state,
            })),
        }
    }

    /// The peer closed before the response completed.
    pub fn finish_eof(self) -> EarlyEof {
        match self.state {
            FrameState::AwaitingHeaders => EarlyEof {
                head: None,
                body: Vec::new(),
                expected: None,
            },
            FrameState::AwaitingBody {
                head,
                content_length,
            } => EarlyEof {
                head: Some(head),
                body: self.buffer,
                expected: content_length,
            },
        }
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_DELIMITER.len())
        .position(|w| w == HEADER_DELIMITER)
}
