//! Connection engine internals: one connection epoch from resolve to
//! teardown.
//!
//! The supervisor (`Connection::run`) calls [`run_once`] per epoch. An
//! epoch resolves the address, connects, performs the `HELLO 3` handshake
//! and then races three cooperative loops with `tokio::select!`: the writer
//! drains the request queue, the reader parses replies and routes them, and
//! the watchdog pings the server and trips the idle timeout. The first loop
//! to fail ends the epoch; dropping the other branches cancels them at
//! their next suspension point.

use std::{io, sync::Mutex, time::Instant};

use bytes::{Buf, BytesMut};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, watch},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use crate::{
    adapter::{replay, FlatNodes, ResponseAdapter},
    config::Config,
    connection::{
        queue::{QueueEvent, ReplyChunk, RequestQueue},
        state::ConnectionState,
    },
    error::{Error, Result},
    push::{PushFrame, PushSender},
    request::Request,
};

/// Read growth hint when no bulk length is known.
const READ_GROWTH: usize = 1024;

/// State shared between the connection handle and the engine tasks.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) queue: RequestQueue,
    pub(crate) push_tx: PushSender,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
    pub(crate) run_token: CancellationToken,
    pub(crate) last_data: Mutex<Instant>,
}

impl Shared {
    pub(crate) fn set_state(&self, state: ConnectionState) {
        debug!("connection state: {state}");
        let _ = self.state_tx.send(state);
    }

    fn touch(&self) { *self.last_data.lock().expect("clock poisoned") = Instant::now(); }

    fn idle_elapsed(&self) -> std::time::Duration {
        self.last_data.lock().expect("clock poisoned").elapsed()
    }
}

/// Why an epoch ended, and whether reconnecting could help.
#[derive(Debug)]
pub(crate) struct EpochEnd {
    pub(crate) error: Error,
    pub(crate) fatal: bool,
}

impl EpochEnd {
    fn transient(error: Error) -> Self {
        Self {
            error,
            fatal: false,
        }
    }

    fn fatal(error: Error) -> Self { Self { error, fatal: true } }
}

/// Drive one connection epoch to its end.
pub(crate) async fn run_once(shared: &Shared) -> EpochEnd {
    shared.set_state(ConnectionState::Resolving);
    let addrs = match resolve(shared).await {
        Ok(addrs) => addrs,
        Err(err) => return EpochEnd::transient(err),
    };

    shared.set_state(ConnectionState::Connecting);
    let mut stream = match connect(shared, &addrs).await {
        Ok(stream) => stream,
        Err(err) => return EpochEnd::transient(err),
    };

    shared.set_state(ConnectionState::Handshaking);
    let leftover = match handshake(shared, &mut stream).await {
        Ok(leftover) => leftover,
        // A server refusing HELLO will refuse it again; do not retry.
        Err(err) => return EpochEnd::fatal(err),
    };

    info!("connected to {}", shared.config.address());
    shared.set_state(ConnectionState::Running);
    shared.touch();
    shared.queue.kick_writer();

    let (read_half, write_half) = stream.into_split();
    let error = tokio::select! {
        err = writer_loop(write_half, shared) => err,
        err = reader_loop(read_half, leftover, shared) => err,
        err = watchdog_loop(shared) => err,
    };
    EpochEnd::transient(error)
}

async fn resolve(shared: &Shared) -> Result<Vec<std::net::SocketAddr>> {
    let address = shared.config.address();
    let resolved = timeout(
        shared.config.resolve_timeout,
        tokio::net::lookup_host(address.as_str()),
    )
    .await
    .map_err(|_| Error::ResolveTimeout)??;
    let addrs: Vec<_> = resolved.collect();
    if addrs.is_empty() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses for {address}"),
        )));
    }
    debug!("resolved {address} to {} address(es)", addrs.len());
    Ok(addrs)
}

async fn connect(shared: &Shared, addrs: &[std::net::SocketAddr]) -> Result<TcpStream> {
    timeout(shared.config.connect_timeout, async {
        let mut last_err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no address");
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = err,
            }
        }
        Err(Error::Io(last_err))
    })
    .await
    .map_err(|_| Error::ConnectTimeout)?
}

/// Send `HELLO 3` and read its reply. Returns bytes received past the
/// reply, which seed the reader's buffer.
async fn handshake(shared: &Shared, stream: &mut TcpStream) -> Result<BytesMut> {
    let mut hello = Request::new();
    hello.push("HELLO", &["3"]);
    stream.write_all(hello.payload()).await?;

    let mut parser = crate::resp3::Parser::new(shared.config.max_depth);
    let mut sink = FlatNodes::new();
    let mut buf = BytesMut::with_capacity(256);
    loop {
        let step = parser.consume(&buf, &mut sink)?;
        buf.advance(step.taken);
        if step.status == crate::resp3::Status::Done {
            break;
        }
        read_more(stream, &mut buf, &parser, shared).await?;
    }

    if let Some(err) = sink
        .nodes()
        .first()
        .and_then(|node| node.payload().map(|payload| (node.kind, payload)))
        .and_then(|(kind, payload)| crate::adapter::leaf_error(kind, payload))
    {
        return Err(err);
    }
    Ok(buf)
}

async fn writer_loop(mut write_half: OwnedWriteHalf, shared: &Shared) -> Error {
    loop {
        loop {
            let batch = shared.queue.next_to_write(shared.config.coalesce_requests);
            if batch.is_empty() {
                break;
            }
            if let Err(err) = write_half.write_all(batch.payload()).await {
                return Error::Io(err);
            }
            debug!(
                "wrote {} request(s), {} bytes",
                batch.len(),
                batch.payload().len()
            );
            shared.queue.mark_written(&batch);
        }
        shared.queue.wait_for_work().await;
    }
}

async fn reader_loop(
    mut read_half: OwnedReadHalf,
    leftover: BytesMut,
    shared: &Shared,
) -> Error {
    match read_replies(&mut read_half, leftover, shared).await {
        Ok(()) => unreachable!("read_replies only returns on error"),
        Err(err) => err,
    }
}

async fn read_replies(
    read_half: &mut OwnedReadHalf,
    mut buf: BytesMut,
    shared: &Shared,
) -> Result<()> {
    let mut parser = crate::resp3::Parser::new(shared.config.max_depth);
    loop {
        parser.reset();
        let mut sink = FlatNodes::new();
        let mut read_size = 0;
        loop {
            let step = parser.consume(&buf, &mut sink)?;
            buf.advance(step.taken);
            read_size += step.taken;
            if step.status == crate::resp3::Status::Done {
                break;
            }
            read_more(read_half, &mut buf, &parser, shared).await?;
        }

        // Unsolicited frames parse to a push root, or arrive while no
        // written request is waiting for a reply. The root kind holds even
        // when attribute frames precede the push.
        let is_push = parser.root_kind() == Some(crate::resp3::Kind::Push);
        if is_push || !shared.queue.expects_response() {
            let frame = PushFrame::new(sink.into_nodes(), read_size);
            if shared.config.enable_push {
                shared.push_tx.send(frame).await;
            } else {
                shared.push_tx.discard(frame);
            }
        } else {
            shared.queue.on_reply_chunk(ReplyChunk {
                nodes: sink.into_nodes(),
                read_size,
            });
        }
    }
}

async fn read_more<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    parser: &crate::resp3::Parser,
    shared: &Shared,
) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    buf.reserve(parser.suggested_growth(READ_GROWTH));
    let n = stream.read_buf(buf).await?;
    if n == 0 {
        return Err(Error::Eof);
    }
    if buf.len() > shared.config.max_read_size {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::OutOfMemory,
            "read buffer limit exceeded",
        )));
    }
    shared.touch();
    Ok(())
}

async fn watchdog_loop(shared: &Shared) -> Error {
    let interval = shared.config.ping_interval;
    let mut ping = Request::new();
    ping.push("PING", &[shared.config.ping_message.as_str()]);
    let mut outstanding: Option<tokio::task::JoinHandle<()>> = None;
    loop {
        tokio::time::sleep(interval).await;
        if shared.idle_elapsed() >= interval * 2 {
            warn!(
                "no data from {} for two ping intervals",
                shared.config.address()
            );
            return Error::IdleTimeout;
        }
        let pending = outstanding.as_ref().is_some_and(|task| !task.is_finished());
        if !pending {
            let events = shared.queue.enqueue(&ping);
            outstanding = Some(tokio::spawn(async move {
                let mut sink = crate::adapter::Ignore;
                if let Err(err) = await_request(events, &mut sink).await {
                    if !err.is_cancelled() {
                        debug!("health ping failed: {err}");
                    }
                }
            }));
        }
    }
}

/// Consume the event stream of one enqueued request, replaying each reply
/// into `adapter`. Returns the reply bytes consumed, or the first error the
/// replies carried.
pub(crate) async fn await_request<A>(
    mut events: mpsc::UnboundedReceiver<QueueEvent>,
    adapter: &mut A,
) -> Result<usize>
where
    A: ResponseAdapter + ?Sized,
{
    let mut read_size = 0;
    let mut first_err: Option<Error> = None;
    loop {
        match events.recv().await {
            Some(QueueEvent::Reply(chunk)) => {
                read_size += chunk.read_size;
                let outcome = replay(&chunk.nodes, adapter);
                adapter.on_reply_complete();
                if let Err(err) = outcome {
                    first_err.get_or_insert(err);
                }
            }
            Some(QueueEvent::Completed) => break,
            Some(QueueEvent::Cancelled(reason)) => return Err(Error::Shared(reason)),
            None => return Err(Error::Cancelled),
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(read_size),
    }
}
