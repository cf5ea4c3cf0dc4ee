//! Error types for channel registration and calls.

use satchel_proto::{ErrorCode, ErrorInfo};

/// Alias for `Result<T, satchel::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by registries and endpoints.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A second handler was registered for a channel name.
    #[error("channel {channel} already has a handler")]
    AlreadyRegistered {
        /// The contested channel name.
        channel: &'static str,
    },

    /// The peer has no handler for the channel.
    #[error("no receiver for channel {channel}")]
    NoReceiver {
        /// Channel the call was sent on.
        channel: String,
    },

    /// The peer's handler failed.
    #[error("{channel}: {}", message.as_deref().unwrap_or("request rejected"))]
    Rejected {
        /// Channel the call was sent on.
        channel: String,
        /// The handler's error, or `None` when the failure is opaque.
        message: Option<String>,
    },

    /// The transport closed before a reply arrived.
    #[error("connection closed")]
    Closed,

    /// A request or response could not be (de)serialized locally.
    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// An I/O error from the underlying transport.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Converts a failure reported by the peer into a local error.
    pub(crate) fn from_remote(channel: &str, info: ErrorInfo) -> Self {
        match info.code {
            ErrorCode::NoReceiver => Self::NoReceiver {
                channel: channel.to_owned(),
            },
            ErrorCode::Decode => Self::Rejected {
                channel: channel.to_owned(),
                message: info.message.map(|m| format!("peer could not decode: {m}")),
            },
            _ => Self::Rejected {
                channel: channel.to_owned(),
                message: info.message,
            },
        }
    }
}
