//! Shared test fixtures: a scriptable in-process RESP3 server.
#![allow(dead_code)]

use std::{future::Future, net::SocketAddr, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};

use resplink::Config;

/// Capture crate logs in test output when `RUST_LOG` is set.
pub fn init_logging() { let _ = env_logger::builder().is_test(true).try_init(); }

/// Connection configuration pointed at a test server, with timeouts small
/// enough to keep failing tests fast.
pub fn test_config(addr: SocketAddr) -> Config {
    init_logging();
    Config::new(addr.ip().to_string(), addr.port().to_string())
        .resolve_timeout(Duration::from_secs(2))
        .connect_timeout(Duration::from_secs(2))
        .ping_interval(Duration::from_secs(30))
        .reconnect_interval(Duration::from_millis(50))
}

/// Bind a listener and serve exactly one connection with `handler`.
pub async fn spawn_server<F, Fut>(handler: F) -> SocketAddr
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        handler(stream).await;
    });
    addr
}

/// Bind a listener and serve connections forever, handing each to
/// `handler` along with its zero-based index. Used by reconnect tests.
pub async fn spawn_server_loop<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(usize, TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut index = 0;
        loop {
            let (stream, _) = listener.accept().await.expect("accept");
            handler(index, stream).await;
            index += 1;
        }
    });
    addr
}

/// Read one client command (an array of blob strings) off the wire.
///
/// Returns `None` once the client closes the connection.
pub async fn read_command(reader: &mut BufReader<TcpStream>) -> Option<Vec<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.strip_prefix('*')?.trim_end().parse().ok()?;
    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        let mut len_line = String::new();
        reader.read_line(&mut len_line).await.ok()?;
        let len: usize = len_line.strip_prefix('$')?.trim_end().parse().ok()?;
        let mut payload = vec![0u8; len + 2];
        reader.read_exact(&mut payload).await.ok()?;
        payload.truncate(len);
        parts.push(String::from_utf8_lossy(&payload).into_owned());
    }
    Some(parts)
}

/// Serve the `HELLO 3` handshake every connection starts with.
pub async fn serve_hello(reader: &mut BufReader<TcpStream>) {
    let command = read_command(reader).await.expect("hello command");
    assert_eq!(command.first().map(String::as_str), Some("HELLO"));
    reply(reader, b"%1\r\n$6\r\nserver\r\n$4\r\nmock\r\n").await;
}

/// Write raw reply bytes back to the client.
pub async fn reply(reader: &mut BufReader<TcpStream>, bytes: &[u8]) {
    reader.get_mut().write_all(bytes).await.expect("write reply");
}

/// A server that answers the handshake and then `+PONG`s every `PING`,
/// ignoring all other commands. Handy default behaviour.
pub async fn pong_server(stream: TcpStream) {
    let mut reader = BufReader::new(stream);
    serve_hello(&mut reader).await;
    while let Some(command) = read_command(&mut reader).await {
        if command.first().map(String::as_str) == Some("PING") {
            reply(&mut reader, b"+PONG\r\n").await;
        }
    }
}
