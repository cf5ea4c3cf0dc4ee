//! Frame types exchanged between the main and renderer endpoints.

use serde::{Deserialize, Serialize};

/// A single message on the transport, addressed to a channel name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Channel the frame belongs to.
    pub channel: String,
    /// What the frame carries.
    pub kind: FrameKind,
}

/// Payload of a [`Frame`].
///
/// A [`FrameKind::Request`] is answered by exactly one
/// [`FrameKind::Response`] carrying the same `id`. A
/// [`FrameKind::Notify`] is never answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FrameKind {
    /// A call awaiting a reply.
    Request {
        /// Correlation ID chosen by the caller.
        id: u64,
        /// Postcard-encoded request value.
        body: Vec<u8>,
    },
    /// The reply to the request with the same `id`.
    Response {
        /// Correlation ID copied from the request.
        id: u64,
        /// Outcome of the handler.
        reply: Reply,
    },
    /// A fire-and-forget message.
    Notify {
        /// Postcard-encoded message value.
        body: Vec<u8>,
    },
}

/// Settled outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Postcard-encoded response value.
    Ok(Vec<u8>),
    /// The call failed on the receiving side.
    Err(ErrorInfo),
}

/// Failure category reported in an [`ErrorInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCode {
    /// The receiving endpoint has no handler for the channel.
    NoReceiver,
    /// The handler ran and failed.
    Handler,
    /// The receiving endpoint could not decode the request body.
    Decode,
}

/// Structured failure carried by [`Reply::Err`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Failure category.
    pub code: ErrorCode,
    /// Human-readable detail; `None` when the failure is opaque.
    pub message: Option<String>,
}

impl ErrorInfo {
    /// No handler is registered for the channel.
    pub const fn no_receiver() -> Self {
        Self {
            code: ErrorCode::NoReceiver,
            message: None,
        }
    }

    /// The handler failed with the given error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Handler,
            message: Some(message.into()),
        }
    }

    /// The handler failed without an error value (e.g. it panicked).
    pub const fn opaque() -> Self {
        Self {
            code: ErrorCode::Handler,
            message: None,
        }
    }

    /// The request or response body did not match the channel's types.
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Decode,
            message: Some(message.into()),
        }
    }
}
