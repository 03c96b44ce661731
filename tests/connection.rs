//! End-to-end request/response behaviour against a scripted server.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{io::BufReader, time::timeout};

use common::{pong_server, read_command, reply, serve_hello, spawn_server, test_config};
use resplink::{
    adapter::{FlatNodes, IntAdapter, StringAdapter},
    resp3::{Kind, NodeValue},
    Connection, Error, Request,
};

fn ping() -> Request {
    let mut req = Request::new();
    req.push("PING", &[] as &[&str]);
    req
}

async fn start(conn: &Connection) -> tokio::task::JoinHandle<Result<(), Error>> {
    let conn = conn.clone();
    tokio::spawn(async move { conn.run().await })
}

#[tokio::test]
async fn simple_ping_pong() {
    let addr = spawn_server(pong_server).await;
    let conn = Connection::new(test_config(addr));
    let runner = start(&conn).await;

    let mut pong = StringAdapter::new();
    let read = conn.exec(&ping(), &mut pong).await.expect("exec");
    assert_eq!(pong.take().as_deref(), Some("PONG"));
    assert_eq!(read, b"+PONG\r\n".len());

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn pipelined_requests_resolve_in_enqueue_order() {
    let addr = spawn_server(pong_server).await;
    let conn = Connection::new(test_config(addr));

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut waiters = Vec::new();
    for index in 0..3 {
        let conn = conn.clone();
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let mut pong = StringAdapter::new();
            conn.exec(&ping(), &mut pong).await.expect("exec");
            order.lock().unwrap().push(index);
            assert_eq!(pong.take().as_deref(), Some("PONG"));
        }));
        // Give each exec a chance to enqueue before the next.
        tokio::task::yield_now().await;
    }

    let runner = start(&conn).await;
    for waiter in waiters {
        waiter.await.expect("waiter");
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn multi_command_request_feeds_adapters_in_command_order() {
    let addr = spawn_server(|stream| async move {
        let mut reader = BufReader::new(stream);
        serve_hello(&mut reader).await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "SET");
        reply(&mut reader, b"+OK\r\n").await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "STRLEN");
        reply(&mut reader, b":5\r\n").await;
    })
    .await;

    let conn = Connection::new(test_config(addr));
    let runner = start(&conn).await;

    let mut req = Request::new();
    req.push("SET", &["key", "value"]);
    req.push("STRLEN", &["key"]);

    let mut status = StringAdapter::new();
    let mut len = IntAdapter::new();
    let mut adapter = resplink::adapter::Composed::new()
        .with(&mut status)
        .with(&mut len);
    conn.exec(&req, &mut adapter).await.expect("exec");
    drop(adapter);

    assert_eq!(status.take().as_deref(), Some("OK"));
    assert_eq!(len.take(), Some(5));

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn push_interleaved_with_pipeline() {
    let addr = spawn_server(|stream| async move {
        let mut reader = BufReader::new(stream);
        serve_hello(&mut reader).await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "PING");
        // Unsolicited push before the solicited reply.
        reply(&mut reader, b">2\r\n$7\r\nmessage\r\n$5\r\nhello\r\n").await;
        reply(&mut reader, b"+PONG\r\n").await;
    })
    .await;

    let conn = Connection::new(test_config(addr));
    let runner = start(&conn).await;

    let mut pong = StringAdapter::new();
    conn.exec(&ping(), &mut pong).await.expect("exec");
    assert_eq!(pong.take().as_deref(), Some("PONG"));

    let mut push = FlatNodes::new();
    let read = timeout(Duration::from_secs(2), conn.receive(&mut push))
        .await
        .expect("receive timed out")
        .expect("receive");
    assert!(read > 0);
    let nodes = push.nodes();
    assert_eq!(nodes[0].kind, Kind::Push);
    let payloads: Vec<_> = nodes
        .iter()
        .filter_map(|node| match &node.value {
            NodeValue::Leaf { payload } => Some(payload.as_ref().to_vec()),
            _ => None,
        })
        .collect();
    assert_eq!(payloads, vec![b"message".to_vec(), b"hello".to_vec()]);

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn push_behind_attribute_frame_stays_out_of_band() {
    let addr = spawn_server(|stream| async move {
        let mut reader = BufReader::new(stream);
        serve_hello(&mut reader).await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "PING");
        // The push is annotated by an attribute frame; it must still reach
        // the push channel, not the pending request.
        reply(
            &mut reader,
            b"|1\r\n$3\r\nsrc\r\n$4\r\nmock\r\n>2\r\n$7\r\nmessage\r\n$5\r\nhello\r\n",
        )
        .await;
        reply(&mut reader, b"+PONG\r\n").await;
    })
    .await;

    let conn = Connection::new(test_config(addr));
    let runner = start(&conn).await;

    let mut pong = StringAdapter::new();
    conn.exec(&ping(), &mut pong).await.expect("exec");
    assert_eq!(pong.take().as_deref(), Some("PONG"));

    let mut push = FlatNodes::new();
    timeout(Duration::from_secs(2), conn.receive(&mut push))
        .await
        .expect("receive timed out")
        .expect("receive");
    assert_eq!(push.nodes().first().map(|node| node.kind), Some(Kind::Push));

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn server_error_resolves_only_its_request() {
    let addr = spawn_server(|stream| async move {
        let mut reader = BufReader::new(stream);
        serve_hello(&mut reader).await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "BOGUS");
        reply(&mut reader, b"-ERR unknown command 'BOGUS'\r\n").await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "PING");
        reply(&mut reader, b"+PONG\r\n").await;
    })
    .await;

    let conn = Connection::new(test_config(addr));
    let runner = start(&conn).await;

    let mut req = Request::new();
    req.push("BOGUS", &[] as &[&str]);
    let mut sink = FlatNodes::new();
    let err = conn.exec(&req, &mut sink).await.expect_err("server error");
    assert!(matches!(err, Error::SimpleError(msg) if msg.contains("unknown command")));

    // The connection survives an adapter-level failure.
    let mut pong = StringAdapter::new();
    conn.exec(&ping(), &mut pong).await.expect("exec after error");
    assert_eq!(pong.take().as_deref(), Some("PONG"));

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn streamed_string_reply_is_reassembled() {
    let addr = spawn_server(|stream| async move {
        let mut reader = BufReader::new(stream);
        serve_hello(&mut reader).await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "GET");
        reply(
            &mut reader,
            b"$?\r\n;5\r\nHello\r\n;6\r\n World\r\n;0\r\n",
        )
        .await;
    })
    .await;

    let conn = Connection::new(test_config(addr));
    let runner = start(&conn).await;

    let mut req = Request::new();
    req.push("GET", &["greeting"]);
    let mut value = StringAdapter::new();
    conn.exec(&req, &mut value).await.expect("exec");
    assert_eq!(value.take().as_deref(), Some("Hello World"));

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn fire_and_forget_completes_after_write() {
    let addr = spawn_server(|stream| async move {
        let mut reader = BufReader::new(stream);
        serve_hello(&mut reader).await;
        // Swallow the SUBSCRIBE; no reply is owed.
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "SUBSCRIBE");
        let _ = read_command(&mut reader).await;
    })
    .await;

    let conn = Connection::new(test_config(addr));
    let runner = start(&conn).await;

    let mut req = Request::new();
    req.push("SUBSCRIBE", &["events"]);
    let mut sink = FlatNodes::new();
    let read = timeout(Duration::from_secs(2), conn.exec(&req, &mut sink))
        .await
        .expect("exec timed out")
        .expect("exec");
    assert_eq!(read, 0);

    conn.cancel(resplink::Operation::Run);
    let _ = runner.await;
}

#[tokio::test]
async fn quit_turns_server_close_into_clean_shutdown() {
    let addr = spawn_server(|stream| async move {
        let mut reader = BufReader::new(stream);
        serve_hello(&mut reader).await;
        let command = read_command(&mut reader).await.expect("command");
        assert_eq!(command[0], "QUIT");
        reply(&mut reader, b"+OK\r\n").await;
        // Dropping the stream closes the connection server-side.
    })
    .await;

    let conn = Connection::new(test_config(addr).enable_reconnect(false));
    let runner = start(&conn).await;

    let mut req = Request::new();
    req.push("QUIT", &[] as &[&str]);
    let mut ok = StringAdapter::new();
    conn.exec(&req, &mut ok).await.expect("exec");
    assert_eq!(ok.take().as_deref(), Some("OK"));

    let outcome = timeout(Duration::from_secs(2), runner)
        .await
        .expect("run timed out")
        .expect("join");
    assert!(outcome.is_ok(), "expected clean shutdown, got {outcome:?}");
}

#[tokio::test]
async fn empty_request_completes_without_touching_the_wire() {
    let conn = Connection::new(test_config(([127, 0, 0, 1], 1).into()));
    let mut sink = FlatNodes::new();
    let read = conn.exec(&Request::new(), &mut sink).await.expect("exec");
    assert_eq!(read, 0);
}
