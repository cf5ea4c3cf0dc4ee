//! Handler registration and lookup.
//!
//! A [`Registry`] collects handlers during startup. Sealing it yields a
//! [`Router`], the read-only table an [`Endpoint`](crate::Endpoint)
//! consults while serving. Nothing can be registered once sealed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use satchel_proto::{Channel, ErrorInfo, Reply};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// A boxed, sendable future.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A handler with its request and response types erased to frame bodies.
pub(crate) type ErasedHandler = Arc<dyn Fn(Vec<u8>) -> BoxFuture<Reply> + Send + Sync>;

/// Channel name → handler table, open for registration.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<&'static str, ErasedHandler>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` as the sole responder for `channel`.
    ///
    /// The handler receives the decoded request and its `Ok` value is sent
    /// back as the response. An `Err` reaches the caller as
    /// [`Error::Rejected`] carrying the error's `Display` text.
    ///
    /// Fails with [`Error::AlreadyRegistered`] if the channel's name
    /// already has a handler, whatever its types.
    pub fn handle<Req, Resp, E, F, Fut>(
        &mut self,
        channel: Channel<Req, Resp>,
        handler: F,
    ) -> Result<()>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Resp, E>> + Send + 'static,
    {
        let name = channel.name();
        if self.handlers.contains_key(name) {
            return Err(Error::AlreadyRegistered { channel: name });
        }

        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |body: Vec<u8>| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let req: Req = match satchel_proto::from_body(&body) {
                    Ok(req) => req,
                    Err(e) => return Reply::Err(ErrorInfo::decode(e.to_string())),
                };
                match handler(req).await {
                    Ok(resp) => match satchel_proto::to_body(&resp) {
                        Ok(body) => Reply::Ok(body),
                        Err(e) => Reply::Err(ErrorInfo::decode(e.to_string())),
                    },
                    Err(e) => Reply::Err(ErrorInfo::handler(e.to_string())),
                }
            })
        });
        self.handlers.insert(name, erased);
        Ok(())
    }

    /// Returns `true` if a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler has been registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Ends the registration phase.
    pub fn seal(self) -> Router {
        Router {
            handlers: Arc::new(self.handlers),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Sealed, read-only handler table shared by every connection.
#[derive(Clone)]
pub struct Router {
    handlers: Arc<HashMap<&'static str, ErasedHandler>>,
}

impl Router {
    /// Returns `true` if a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Iterates over the names this router serves.
    pub fn channels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Looks up the handler for `name`.
    pub(crate) fn route(&self, name: &str) -> Option<&ErasedHandler> {
        self.handlers.get(name)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
