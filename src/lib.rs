pub mod codec;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod rate;
pub mod simulator;
pub mod sink;
pub mod status;
pub mod supervisor;
pub mod transport;
pub mod types;
pub mod worker;

pub use config::LoggerConfig;
pub use error::{ConfigError, DecodeError, SinkError, SupervisorError, TransportError, WorkerError};
pub use supervisor::Supervisor;
