//! Transport layer between the host UI and the explorer service.
//!
//! - `protocol`: request/response types of the JSON-lines protocol
//! - `stdio`: line-delimited JSON over standard input/output

pub mod protocol;
pub mod stdio;

pub use protocol::{Operation, Outgoing, Request};
pub use stdio::{Inbox, Outbox, StdioTransport, Stop, outbox};

use crate::error::DbResult;
use std::future::Future;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Start the transport and handle requests until shutdown.
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
