//! One side of a main↔renderer connection.
//!
//! An [`Endpoint`] owns a duplex byte stream and two background tasks:
//!
//! - the reader decodes inbound frames, runs the local [`Router`]'s
//!   handlers for requests and notifications, and hands replies to the
//!   calls waiting on them;
//! - the writer drains an outbox so frames from concurrent calls and
//!   handlers never interleave on the stream.
//!
//! Every outbound call gets a fresh correlation ID and a oneshot slot in
//! the pending table; the reply carrying that ID settles exactly that
//! slot.
//!
//! The background tasks only hold weak references to the connection
//! state. Once the last handle is dropped, or the connection closes, the
//! writer drains the frames already queued, shuts the stream down and
//! both tasks exit, releasing the stream.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use satchel_proto::{Channel, ErrorInfo, Frame, FrameKind, Reply};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Notify, mpsc, oneshot, watch};
use tracing::{debug, trace};

use crate::registry::Router;
use crate::{Error, Result};

/// Capacity of the in-memory pipe created by [`Endpoint::pair`].
const PAIR_BUFFER: usize = 64 * 1024;

/// A connected endpoint that can both serve and issue calls.
///
/// Cloning is cheap; clones share the connection.
#[derive(Debug, Clone)]
pub struct Endpoint {
    shared: Arc<Shared>,
}

/// State shared between handles and the background tasks.
#[derive(Debug)]
struct Shared {
    /// Source of correlation IDs.
    next_id: AtomicU64,
    /// Calls awaiting a reply.
    pending: Mutex<Pending>,
    /// Frames queued for the writer task.
    outbox: mpsc::UnboundedSender<Frame>,
    /// Wakes [`Endpoint::closed`] waiters.
    closed: Notify,
    /// Set by [`Shared::close`]; dropped with the last handle. Either way
    /// both background tasks stop.
    stop: watch::Sender<bool>,
}

/// Pending-call table; once `closed` is set no entry is ever added.
#[derive(Debug, Default)]
struct Pending {
    closed: bool,
    calls: HashMap<u64, oneshot::Sender<Reply>>,
}

impl Endpoint {
    /// Starts serving `stream` with `router` and returns the endpoint.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(stream: S, router: Router) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbox, inbox) = mpsc::unbounded_channel();
        let (stop, stopped) = watch::channel(false);
        let shared = Arc::new(Shared {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(Pending::default()),
            outbox,
            closed: Notify::new(),
            stop,
        });

        tokio::spawn(write_loop(
            BufWriter::new(writer),
            inbox,
            Arc::downgrade(&shared),
            stopped.clone(),
        ));
        tokio::spawn(read_loop(
            BufReader::new(reader),
            router,
            Arc::downgrade(&shared),
            stopped,
        ));

        Self { shared }
    }

    /// Connects two endpoints through an in-memory pipe.
    ///
    /// Returns `(main, renderer)` serving `main_router` and
    /// `renderer_router` respectively.
    pub fn pair(main_router: Router, renderer_router: Router) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(PAIR_BUFFER);
        (Self::new(a, main_router), Self::new(b, renderer_router))
    }

    /// Sends `req` on `channel` and waits for the peer's reply.
    ///
    /// Dropping the returned future abandons the call: the peer's handler
    /// still runs, and its reply is discarded on arrival.
    pub async fn call<Req, Resp>(&self, channel: Channel<Req, Resp>, req: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = satchel_proto::to_body(req)?;
        let (id, rx) = self.shared.register()?;
        let _slot = Slot {
            shared: &self.shared,
            id,
        };

        self.shared.post(Frame {
            channel: channel.name().to_owned(),
            kind: FrameKind::Request { id, body },
        })?;

        match rx.await.map_err(|_| Error::Closed)? {
            Reply::Ok(body) => Ok(satchel_proto::from_body(&body)?),
            Reply::Err(info) => Err(Error::from_remote(channel.name(), info)),
        }
    }

    /// Sends `msg` on `channel` without waiting for, or receiving, a reply.
    ///
    /// Succeeds once the frame is queued; whether the peer has a handler
    /// for it is never reported.
    pub fn notify<Msg>(&self, channel: Channel<Msg, ()>, msg: &Msg) -> Result<()>
    where
        Msg: Serialize,
    {
        let body = satchel_proto::to_body(msg)?;
        self.shared.post(Frame {
            channel: channel.name().to_owned(),
            kind: FrameKind::Notify { body },
        })
    }

    /// Returns `true` once the connection has shut down.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Waits until the connection has shut down.
    pub async fn closed(&self) {
        loop {
            let notified = self.shared.closed.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a correlation ID and its reply slot.
    fn register(&self) -> Result<(u64, oneshot::Receiver<Reply>)> {
        let mut pending = self.lock();
        if pending.closed {
            return Err(Error::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        pending.calls.insert(id, tx);
        Ok((id, rx))
    }

    /// Removes and returns the slot for `id`, if still pending.
    fn take(&self, id: u64) -> Option<oneshot::Sender<Reply>> {
        self.lock().calls.remove(&id)
    }

    /// Queues a frame for the writer task.
    fn post(&self, frame: Frame) -> Result<()> {
        self.outbox.send(frame).map_err(|_| Error::Closed)
    }

    /// Marks the connection dead, fails every pending call and stops the
    /// background tasks.
    fn close(&self) {
        let calls = {
            let mut pending = self.lock();
            pending.closed = true;
            std::mem::take(&mut pending.calls)
        };
        // Dropping the senders wakes each caller with `Error::Closed`.
        drop(calls);
        self.stop.send_replace(true);
        self.closed.notify_waiters();
    }
}

/// Resolves once the connection is closed or its last handle is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|closed| *closed).await;
}

/// Removes an abandoned call's pending entry.
struct Slot<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.shared.take(self.id);
    }
}

/// Reads frames until the stream ends or the endpoint stops, dispatching
/// each one.
async fn read_loop<R>(
    mut r: R,
    router: Router,
    shared: Weak<Shared>,
    mut stop: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let read = tokio::select! {
            read = satchel_proto::recv::<Frame, _>(&mut r) => read,
            () = stopped(&mut stop) => break,
        };
        let frame = match read {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                debug!(error = %e, "read failed; closing connection");
                break;
            }
        };
        let Some(shared) = shared.upgrade() else {
            break;
        };
        dispatch(frame, &router, &shared);
    }
    if let Some(shared) = shared.upgrade() {
        shared.close();
    }
}

/// Routes one inbound frame.
fn dispatch(frame: Frame, router: &Router, shared: &Arc<Shared>) {
    let Frame { channel, kind } = frame;
    match kind {
        FrameKind::Request { id, body } => {
            let Some(handler) = router.route(&channel) else {
                debug!(%channel, id, "no receiver");
                let _ = shared.post(Frame {
                    channel,
                    kind: FrameKind::Response {
                        id,
                        reply: Reply::Err(ErrorInfo::no_receiver()),
                    },
                });
                return;
            };
            trace!(%channel, id, "request");
            let call = handler(body);
            let shared = Arc::downgrade(shared);
            tokio::spawn(async move {
                // A panicking handler still settles its call, opaquely.
                let reply = tokio::spawn(call)
                    .await
                    .unwrap_or_else(|_| Reply::Err(ErrorInfo::opaque()));
                match shared.upgrade() {
                    Some(shared) => {
                        let _ = shared.post(Frame {
                            channel,
                            kind: FrameKind::Response { id, reply },
                        });
                    }
                    None => trace!(%channel, id, "endpoint gone; dropping reply"),
                }
            });
        }
        FrameKind::Response { id, reply } => match shared.take(id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => trace!(%channel, id, "dropping reply to abandoned call"),
        },
        FrameKind::Notify { body } => {
            let Some(handler) = router.route(&channel) else {
                debug!(%channel, "dropping notification: no receiver");
                return;
            };
            let call = handler(body);
            tokio::spawn(async move {
                if let Reply::Err(e) = call.await {
                    debug!(%channel, error = ?e, "notification handler failed");
                }
            });
        }
        _ => debug!(%channel, "dropping unsupported frame"),
    }
}

/// Writes queued frames until the endpoint stops or the stream fails, then
/// shuts the stream down.
async fn write_loop<W>(
    mut w: W,
    mut inbox: mpsc::UnboundedReceiver<Frame>,
    shared: Weak<Shared>,
    mut stop: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        // Frames queued before the stop are still written.
        let frame = tokio::select! {
            biased;
            frame = inbox.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            () = stopped(&mut stop) => break,
        };
        let sent = async {
            satchel_proto::send(&mut w, &frame).await?;
            // Keep writing without flushing while more frames are queued.
            if inbox.is_empty() {
                w.flush().await?;
            }
            Ok::<_, io::Error>(())
        };
        if let Err(e) = sent.await {
            debug!(error = %e, "write failed; closing connection");
            if let Some(shared) = shared.upgrade() {
                shared.close();
            }
            return;
        }
    }
    let _ = w.shutdown().await;
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, DuplexStream, ReadBuf};
    use tokio::sync::Semaphore;

    use super::*;
    use crate::Registry;

    const ECHO: Channel<String, String> = Channel::new("ECHO");
    const SLOW: Channel<u64, u64> = Channel::new("SLOW");
    const FAIL: Channel<(), ()> = Channel::new("FAIL");
    const PANIC: Channel<(), ()> = Channel::new("PANIC");
    const TICK: Channel<u32, ()> = Channel::new("TICK");

    fn main_router() -> Router {
        let mut registry = Registry::new();
        registry
            .handle(ECHO, |s: String| async move { Ok::<_, Infallible>(s) })
            .unwrap();
        registry
            .handle(FAIL, |()| async { Err::<(), _>("status 503") })
            .unwrap();
        registry
            .handle(PANIC, |()| async {
                if true {
                    panic!("handler blew up");
                }
                Ok::<(), Infallible>(())
            })
            .unwrap();
        registry.seal()
    }

    fn empty() -> Router {
        Registry::new().seal()
    }

    /// Pipe end that records when it is dropped.
    struct Tracked {
        inner: DuplexStream,
        dropped: Arc<AtomicBool>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    impl AsyncRead for Tracked {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Tracked {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    #[tokio::test]
    async fn call_resolves_with_the_handler_value() {
        let (_main, renderer) = Endpoint::pair(main_router(), empty());
        let echoed = renderer.call(ECHO, &"hello".to_owned()).await.unwrap();
        assert_eq!(echoed, "hello");
    }

    #[tokio::test]
    async fn call_without_receiver_fails_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let mut registry = Registry::new();
        registry
            .handle(ECHO, move |s: String| {
                seen.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, Infallible>(s) }
            })
            .unwrap();
        let (main, renderer) = Endpoint::pair(registry.seal(), empty());

        // The renderer serves nothing, so main's call has no receiver, and
        // main's own ECHO handler must not answer it either.
        let err = main.call(ECHO, &"x".to_owned()).await.unwrap_err();
        assert!(matches!(err, Error::NoReceiver { channel } if channel == "ECHO"));

        let err = renderer.call(SLOW, &1).await.unwrap_err();
        assert!(matches!(err, Error::NoReceiver { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_error_rejects_with_its_message() {
        let (_main, renderer) = Endpoint::pair(main_router(), empty());
        let err = renderer.call(FAIL, &()).await.unwrap_err();
        match err {
            Error::Rejected { channel, message } => {
                assert_eq!(channel, "FAIL");
                assert_eq!(message.as_deref(), Some("status 503"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_panic_rejects_opaquely() {
        let (_main, renderer) = Endpoint::pair(main_router(), empty());
        let err = renderer.call(PANIC, &()).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { message: None, .. }));

        // The connection survives the panic.
        let echoed = renderer.call(ECHO, &"still up".to_owned()).await.unwrap();
        assert_eq!(echoed, "still up");
    }

    #[tokio::test]
    async fn concurrent_calls_resolve_independently() {
        // The first call parks until the second one has been answered.
        let gate = Arc::new(Semaphore::new(0));
        let mut registry = Registry::new();
        let handler_gate = Arc::clone(&gate);
        registry
            .handle(SLOW, move |n: u64| {
                let gate = Arc::clone(&handler_gate);
                async move {
                    if n == 1 {
                        let _permit = gate.acquire().await;
                    }
                    Ok::<_, Infallible>(n * 10)
                }
            })
            .unwrap();
        let (_main, renderer) = Endpoint::pair(registry.seal(), empty());

        let first = tokio::spawn({
            let renderer = renderer.clone();
            async move { renderer.call(SLOW, &1).await }
        });
        let second = renderer.call(SLOW, &2).await.unwrap();
        assert_eq!(second, 20);
        assert!(!first.is_finished());

        gate.add_permits(1);
        assert_eq!(first.await.unwrap().unwrap(), 10);
    }

    #[tokio::test]
    async fn pending_calls_fail_when_the_peer_goes_away() {
        let (client, server) = tokio::io::duplex(PAIR_BUFFER);
        let renderer = Endpoint::new(client, empty());

        let call = tokio::spawn({
            let renderer = renderer.clone();
            async move { renderer.call(ECHO, &"lost".to_owned()).await }
        });
        // Let the request reach the pipe, then hang up without answering.
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(server);

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Closed));
        renderer.closed().await;
        assert!(renderer.is_closed());
        assert!(matches!(
            renderer.call(ECHO, &String::new()).await,
            Err(Error::Closed)
        ));
    }

    #[tokio::test]
    async fn notifications_run_the_handler_without_a_reply() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut registry = Registry::new();
        registry
            .handle(TICK, move |n: u32| {
                seen.fetch_add(n as usize, Ordering::SeqCst);
                async { Ok::<_, Infallible>(()) }
            })
            .unwrap();
        let (main, renderer) = Endpoint::pair(empty(), registry.seal());

        // Either side may notify; the renderer owns this handler.
        main.notify(TICK, &2).unwrap();
        main.notify(TICK, &3).unwrap();
        // Unhandled on main: dropped silently, nothing comes back.
        renderer.notify(TICK, &100).unwrap();

        // A call on the same connection is answered after the notifies.
        let err = main.call(ECHO, &String::new()).await.unwrap_err();
        assert!(matches!(err, Error::NoReceiver { .. }));
        tokio::time::timeout(Duration::from_secs(1), async {
            while count.load(Ordering::SeqCst) != 5 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn dropping_the_last_handle_ends_the_stream() {
        let (ours, mut peer) = tokio::io::duplex(PAIR_BUFFER);
        let endpoint = Endpoint::new(ours, empty());
        endpoint.notify(TICK, &7).unwrap();
        drop(endpoint);

        // The queued frame still goes out, then the peer reads EOF.
        let frame: Frame =
            tokio::time::timeout(Duration::from_secs(1), satchel_proto::recv(&mut peer))
                .await
                .unwrap()
                .unwrap();
        assert_eq!(frame.channel, "TICK");
        assert!(matches!(frame.kind, FrameKind::Notify { .. }));

        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(1), peer.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn stream_is_released_once_the_peer_hangs_up() {
        let (ours, peer) = tokio::io::duplex(PAIR_BUFFER);
        let dropped = Arc::new(AtomicBool::new(false));
        let endpoint = Endpoint::new(
            Tracked {
                inner: ours,
                dropped: Arc::clone(&dropped),
            },
            empty(),
        );

        drop(peer);
        endpoint.closed().await;

        // The handle is still alive; the background tasks let go anyway.
        tokio::time::timeout(Duration::from_secs(1), async {
            while !dropped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(endpoint.is_closed());
    }
}
