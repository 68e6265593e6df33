//! Errand worker RPC protocol.
//!
//! Orchestrator and workers exchange newline-delimited JSON frames over the
//! worker's stdin/stdout. Each frame carries a `message_id`, a `kind`
//! (`manifest`, `invoke`, `result`, `error`) and a kind-specific payload.
//! Responses may arrive out of request order and are matched by
//! `message_id`.
//!
//! The worker's stdout belongs to this protocol exclusively; workers log to
//! stderr.

mod error;
mod frame;
mod peer;

pub use error::RpcError;
pub use frame::{Frame, Payload, WireErrorKind};
pub use peer::RpcPeer;
