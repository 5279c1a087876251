//! topicsync daemon runtime: interval trigger + run processor + control socket.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    ChannelStatus, DaemonClient, DaemonRequest, DaemonStatus, Reply, RunRecord, StopAck,
};
pub use runtime::{init_tracing, run, start_blocking, DaemonOptions, DEFAULT_INTERVAL, LOG_FORMAT_VAR};
