pub mod config;
pub mod logging;

pub mod error;
pub mod framer;
pub mod host;
pub mod pool;
pub mod request;
pub mod storage;
pub mod task;
pub mod throughput;
pub mod transport;

pub use error::{ConstructionError, TaskError, ValidationError};
pub use pool::{ConnectionPool, PoolOptions, RunReport, TaskOutcome};
pub use task::{DownloadTask, TaskDispenser};
pub use transport::{Connector, TcpConnector, TlsConnector};
