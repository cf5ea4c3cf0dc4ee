//! Typed request/response channels between a wallet's main and renderer
//! processes.
//!
//! `satchel` layers named, statically typed calls on top of a duplex byte
//! stream. One endpoint registers a handler per [`Channel`]; the other
//! sends requests and awaits the correlated reply.
//!
//! # Quick start
//!
//! ```no_run
//! use satchel::{Endpoint, Registry, api};
//!
//! # async fn demo(main_stream: tokio::net::UnixStream, renderer_stream: tokio::net::UnixStream) -> satchel::Result<()> {
//! // Main process: register handlers, then serve.
//! let mut registry = Registry::new();
//! registry.handle(api::DETECT_SYSTEM_LOCALE, |()| async {
//!     Ok::<_, std::convert::Infallible>("en-US".to_owned())
//! })?;
//! let _main = Endpoint::new(main_stream, registry.seal());
//!
//! // Renderer process: no handlers of its own, only calls.
//! let renderer = Endpoint::new(renderer_stream, Registry::new().seal());
//! let locale = renderer.call(api::DETECT_SYSTEM_LOCALE, &()).await?;
//! assert_eq!(locale, "en-US");
//! # Ok(())
//! # }
//! ```

mod endpoint;
mod error;
mod registry;

pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use registry::{Registry, Router};
pub use satchel_proto::{Channel, api};
