//! Connector wrapper that counts connections and can inject receive errors.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use keepfetch_core::host::HostBinding;
use keepfetch_core::transport::{Connector, TcpConnector};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

#[derive(Debug, Default)]
pub struct ConnCounters {
    pub opened: AtomicUsize,
    pub open_now: AtomicUsize,
    pub peak_open: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct TrackedConnector {
    pub counters: Arc<ConnCounters>,
    /// Request path whose response read fails with `ConnectionReset`.
    pub fail_receive_for: Option<String>,
}

impl TrackedConnector {
    pub fn failing_receive_for(path: &str) -> Self {
        Self {
            fail_receive_for: Some(path.to_string()),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> usize {
        self.counters.open_now.load(Ordering::SeqCst)
    }

    pub fn peak_open(&self) -> usize {
        self.counters.peak_open.load(Ordering::SeqCst)
    }
}

impl Connector for TrackedConnector {
    type Stream = TrackedStream;

    fn connect(&self, binding: &HostBinding) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let binding = binding.clone();
        let counters = Arc::clone(&self.counters);
        let fail_on = self.fail_receive_for.clone();
        async move {
            let inner = TcpConnector.connect(&binding).await?;
            counters.opened.fetch_add(1, Ordering::SeqCst);
            let now = counters.open_now.fetch_add(1, Ordering::SeqCst) + 1;
            counters.peak_open.fetch_max(now, Ordering::SeqCst);
            Ok(TrackedStream {
                inner,
                counters,
                fail_on,
                armed: false,
            })
        }
    }
}

pub struct TrackedStream {
    inner: TcpStream,
    counters: Arc<ConnCounters>,
    fail_on: Option<String>,
    armed: bool,
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.counters.open_now.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.armed {
            this.armed = false;
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected receive failure",
            )));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Some(path) = &this.fail_on {
            let needle = format!("GET {} ", path);
            if String::from_utf8_lossy(buf).contains(&needle) {
                this.armed = true;
            }
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
