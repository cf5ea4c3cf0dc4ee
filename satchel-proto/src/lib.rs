//! Wire protocol for satchel main↔renderer communication.
//!
//! Every message on the wire is a [`Frame`] addressed to a channel name.
//! Frames are serialized with [`postcard`] and prefixed with a 4-byte
//! big-endian length, suitable for any reliable byte stream (Unix socket,
//! in-memory pipe, TCP).
//!
//! Typed payloads travel as opaque bodies inside a frame; the
//! [`Channel`] declaration binds a channel name to its request and
//! response types so both endpoints agree at compile time.

pub mod api;
mod channel;
mod codec;
mod message;

pub use channel::Channel;
pub use codec::{MAX_FRAME, from_body, recv, send, to_body};
pub use message::{ErrorCode, ErrorInfo, Frame, FrameKind, Reply};
