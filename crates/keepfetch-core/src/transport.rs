//! Connection providers for the pool.
//!
//! `TlsConnector` is the production transport (TLS 1.2 minimum, SNI set to the
//! bound host). `TcpConnector` speaks plain TCP to the same binding and is used
//! for loopback servers.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};

use crate::host::HostBinding;

/// Opens one stream to the bound host per call.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(
        &self,
        binding: &HostBinding,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP, no TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(
        &self,
        binding: &HostBinding,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let authority = binding.authority();
        async move {
            let stream = TcpStream::connect(&authority).await?;
            stream.set_nodelay(true)?;
            Ok(stream)
        }
    }
}

/// TCP + rustls with the webpki root set.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector").finish_non_exhaustive()
    }
}

impl TlsConnector {
    /// Client config accepting TLS 1.2 and 1.3 only.
    pub fn new() -> Result<Self, rustls::Error> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self::from_config(Arc::new(config)))
    }

    /// Use a caller-built client config (custom roots, pinned versions).
    pub fn from_config(config: Arc<ClientConfig>) -> Self {
        Self {
            inner: tokio_rustls::TlsConnector::from(config),
        }
    }
}

impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    fn connect(
        &self,
        binding: &HostBinding,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        let authority = binding.authority();
        let name = server_name(binding);
        let inner = self.inner.clone();
        async move {
            let name = name?;
            let tcp = TcpStream::connect(&authority).await?;
            tcp.set_nodelay(true)?;
            inner.connect(name, tcp).await
        }
    }
}

/// SNI / certificate name for the binding: a DNS name, or an IP address
/// for IPv4 and (unbracketed) IPv6 literals.
fn server_name(binding: &HostBinding) -> io::Result<ServerName<'static>> {
    ServerName::try_from(binding.host.clone())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}
