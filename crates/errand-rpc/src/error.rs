//! Error types for the worker RPC channel.

use thiserror::Error;

use crate::frame::WireErrorKind;

/// Errors that can occur on the worker RPC channel.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Underlying stream I/O failed.
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("Frame codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The peer closed the channel while a call was outstanding.
    #[error("Channel closed by peer")]
    ChannelClosed,

    /// The worker answered an invoke with an error frame.
    #[error("Worker error ({kind}): {detail}")]
    Worker { kind: WireErrorKind, detail: String },

    /// The first frame from the worker was not a manifest.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The manifest was already consumed.
    #[error("Manifest already taken")]
    ManifestTaken,
}
