//! The multiplexing connection to a RESP3 server.
//!
//! One long-lived full-duplex socket carries every pipelined request. The
//! [`Connection`] handle is cheap to clone; callers submit requests with
//! [`Connection::exec`] and consume unsolicited server frames with
//! [`Connection::receive`], while one task drives [`Connection::run`].

mod engine;
mod queue;
mod state;

pub use state::ConnectionState;

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use log::info;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    adapter::ResponseAdapter,
    config::Config,
    error::{Error, Result, SharedError},
    push::{self, PushControl, PushReceiver},
    request::Request,
};

use engine::Shared;

/// Cancellable operations, mirroring the public async entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Cancel requests that have not been written to the socket yet.
    Exec,
    /// Cancel push reception; later pushes are discarded and counted.
    ReceivePush,
    /// Stop the engine permanently.
    Run,
    /// All of the above.
    All,
}

/// A self-managing client connection to a RESP3 server.
///
/// # Examples
///
/// ```no_run
/// use resplink::{adapter::StringAdapter, Config, Connection, Request};
///
/// # async fn example() -> Result<(), resplink::Error> {
/// let conn = Connection::new(Config::new("127.0.0.1", "6379"));
/// let runner = {
///     let conn = conn.clone();
///     tokio::spawn(async move { conn.run().await })
/// };
///
/// let mut req = Request::new();
/// req.push("PING", &[] as &[&str]);
/// let mut pong = StringAdapter::new();
/// conn.exec(&req, &mut pong).await?;
/// assert_eq!(pong.take().as_deref(), Some("PONG"));
///
/// conn.cancel(resplink::Operation::Run);
/// # runner.abort();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    push_rx: Arc<tokio::sync::Mutex<PushReceiver>>,
    push_control: PushControl,
    state_rx: watch::Receiver<ConnectionState>,
}

impl Connection {
    /// Create a connection handle. Nothing touches the network until
    /// [`Self::run`] is awaited.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (push_tx, push_rx, push_control) = push::channel(config.push_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let shared = Arc::new(Shared {
            config,
            queue: queue::RequestQueue::new(),
            push_tx,
            state_tx,
            run_token: CancellationToken::new(),
            last_data: Mutex::new(Instant::now()),
        });
        Self {
            shared,
            push_rx: Arc::new(tokio::sync::Mutex::new(push_rx)),
            push_control,
            state_rx,
        }
    }

    /// Drive the engine: resolve, connect, handshake, then multiplex until
    /// the connection is lost. With reconnection enabled the loop starts
    /// over after `reconnect_interval`; otherwise the first loss is final.
    ///
    /// Returns `Ok(())` when the server closed the connection after a
    /// written `QUIT`, and `Err` with the terminal failure otherwise.
    /// Intended to be driven by exactly one task per connection.
    pub async fn run(&self) -> Result<()> {
        let shared = &self.shared;
        loop {
            if shared.run_token.is_cancelled() {
                shared.set_state(ConnectionState::Stopped);
                return Err(Error::Cancelled);
            }

            let end = tokio::select! {
                () = shared.run_token.cancelled() => engine::EpochEnd {
                    error: Error::Cancelled,
                    fatal: true,
                },
                end = engine::run_once(shared) => end,
            };

            let reason = SharedError::new(end.error);
            info!("connection lost: {reason}");

            let quit_close =
                shared.queue.quit_written() && matches!(reason.get(), Error::Eof);
            let will_reconnect = !end.fatal
                && !quit_close
                && shared.config.enable_reconnect
                && !shared.run_token.is_cancelled();

            if will_reconnect {
                // Unwritten requests that opted in survive into the next
                // epoch; everything else resolves with the wire error.
                shared.queue.cancel_on_conn_lost(&reason);
            } else {
                shared.queue.cancel_all(&reason);
                shared.set_state(ConnectionState::Stopped);
                if quit_close {
                    return Ok(());
                }
                return Err(Error::Shared(reason));
            }

            shared.set_state(ConnectionState::Reconnecting);
            tokio::select! {
                () = shared.run_token.cancelled() => {
                    shared.set_state(ConnectionState::Stopped);
                    return Err(Error::Cancelled);
                }
                () = tokio::time::sleep(shared.config.reconnect_interval) => {}
            }
        }
    }

    /// Execute a pipelined request, feeding each reply into `adapter` in
    /// command order.
    ///
    /// Completes once every expected reply has been consumed, after the
    /// write for requests expecting none. Returns the number of reply
    /// bytes read for this request. Multiple concurrent calls are queued
    /// and complete in enqueue order.
    pub async fn exec<A>(&self, req: &Request, adapter: &mut A) -> Result<usize>
    where
        A: ResponseAdapter + ?Sized,
    {
        if req.is_empty() {
            return Ok(0);
        }
        let events = self.shared.queue.enqueue(req);
        engine::await_request(events, adapter).await
    }

    /// Receive one server push, feeding it into `adapter`.
    ///
    /// Returns the number of bytes the push occupied on the wire. Fails
    /// with [`Error::Cancelled`] when push reception is disabled or has
    /// been cancelled.
    pub async fn receive<A>(&self, adapter: &mut A) -> Result<usize>
    where
        A: ResponseAdapter + ?Sized,
    {
        if !self.shared.config.enable_push {
            return Err(Error::Cancelled);
        }
        let mut rx = self.push_rx.lock().await;
        let frame = rx.recv().await?;
        frame.deliver(adapter)?;
        Ok(frame.read_size())
    }

    /// Cancel an operation. Takes effect at the next suspension point of
    /// the affected futures; cancelling twice is a no-op.
    pub fn cancel(&self, op: Operation) {
        match op {
            Operation::Exec => {
                let reason = SharedError::new(Error::Cancelled);
                self.shared.queue.cancel_unwritten(&reason);
            }
            Operation::ReceivePush => self.push_control.cancel(),
            Operation::Run => self.shared.run_token.cancel(),
            Operation::All => {
                self.cancel(Operation::Exec);
                self.cancel(Operation::ReceivePush);
                self.cancel(Operation::Run);
            }
        }
    }

    /// The engine's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { *self.state_rx.borrow() }

    /// A watch on lifecycle transitions, for callers that want to react to
    /// reconnects.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Number of pushes dropped since reception was cancelled or because
    /// pushes are disabled.
    #[must_use]
    pub fn discarded_pushes(&self) -> u64 { self.push_control.discarded() }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("address", &self.shared.config.address())
            .finish_non_exhaustive()
    }
}
