//! Shared types for sysask.
//!
//! Everything the daemon and its clients exchange lives here: the response
//! envelope, RPC framing, error types, and formatting helpers. No I/O.

pub mod envelope;
pub mod error;
pub mod format;
pub mod rpc;

pub use envelope::ResponseEnvelope;
pub use error::AgentError;
