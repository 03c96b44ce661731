//! Pipelined command requests.
//!
//! A request is an append-only batch of commands serialized in RESP3 array
//! form, written to the server as one unit. Commands that solicit no direct
//! reply (the subscription family) are tracked so the reply matcher knows
//! how many responses to expect.

use bytes::BytesMut;

use crate::resp3::encode;

/// Per-request configuration.
#[derive(Clone, Copy, Debug)]
pub struct RequestConfig {
    /// Allow this request to share a network write with its queue
    /// neighbours. When false the writer flushes it on its own.
    pub coalesce: bool,
    /// Keep this request queued across a reconnect if it had not been
    /// written when the connection was lost. Written-but-unanswered
    /// requests are always cancelled.
    pub retry_on_cancel: bool,
    /// Move a request whose first command is `HELLO` ahead of every other
    /// request still waiting to be written, so authentication happens
    /// before queued traffic.
    pub hello_priority: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            coalesce: true,
            retry_on_cancel: true,
            hello_priority: true,
        }
    }
}

/// Commands whose replies arrive as pushes rather than responses.
fn has_response(cmd: &str) -> bool {
    !matches!(
        cmd.to_ascii_uppercase().as_str(),
        "SUBSCRIBE" | "PSUBSCRIBE" | "SSUBSCRIBE" | "UNSUBSCRIBE" | "PUNSUBSCRIBE"
            | "SUNSUBSCRIBE"
    )
}

#[derive(Clone, Copy, Debug)]
struct CommandInfo {
    expects_response: bool,
}

/// An append-only batch of pipelined commands.
///
/// # Examples
///
/// ```
/// use resplink::Request;
///
/// let mut req = Request::new();
/// req.push("HELLO", &["3"]);
/// req.push("SET", &["key", "value"]);
/// req.push("GET", &["key"]);
/// assert_eq!(req.len(), 3);
/// assert_eq!(req.expected_responses(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Request {
    payload: BytesMut,
    commands: Vec<CommandInfo>,
    config: RequestConfig,
    has_hello: bool,
    has_quit: bool,
}

impl Request {
    /// Create an empty request with the default configuration.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty request with an explicit configuration.
    #[must_use]
    pub fn with_config(config: RequestConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Append one command with its arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use resplink::Request;
    ///
    /// let mut req = Request::new();
    /// req.push("PING", &[] as &[&str]);
    /// req.push("SET", &["key", "some value"]);
    /// ```
    pub fn push<A: AsRef<[u8]>>(&mut self, cmd: &str, args: &[A]) {
        encode::write_header(&mut self.payload, crate::resp3::Kind::Array, 1 + args.len());
        encode::write_blob(&mut self.payload, cmd.as_bytes());
        for arg in args {
            encode::write_blob(&mut self.payload, arg.as_ref());
        }
        self.note_command(cmd);
    }

    /// Append one command with a key and a dynamic argument range.
    ///
    /// # Examples
    ///
    /// ```
    /// use resplink::Request;
    ///
    /// let mut req = Request::new();
    /// req.push_range("RPUSH", "mylist", ["a", "b", "c"]);
    /// ```
    pub fn push_range<K, I>(&mut self, cmd: &str, key: K, items: I)
    where
        K: AsRef<[u8]>,
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        <I::IntoIter as Iterator>::Item: AsRef<[u8]>,
    {
        let items = items.into_iter();
        if items.len() == 0 {
            return;
        }
        encode::write_header(
            &mut self.payload,
            crate::resp3::Kind::Array,
            2 + items.len(),
        );
        encode::write_blob(&mut self.payload, cmd.as_bytes());
        encode::write_blob(&mut self.payload, key.as_ref());
        for item in items {
            encode::write_blob(&mut self.payload, item.as_ref());
        }
        self.note_command(cmd);
    }

    fn note_command(&mut self, cmd: &str) {
        let expects_response = has_response(cmd);
        if self.commands.is_empty() && cmd.eq_ignore_ascii_case("HELLO") {
            self.has_hello = true;
        }
        if cmd.eq_ignore_ascii_case("QUIT") {
            self.has_quit = true;
        }
        self.commands.push(CommandInfo { expects_response });
    }

    /// Number of commands in the request.
    #[must_use]
    pub fn len(&self) -> usize { self.commands.len() }

    /// True when no command has been pushed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.commands.is_empty() }

    /// Number of replies the server will send for this request.
    #[must_use]
    pub fn expected_responses(&self) -> usize {
        self.commands
            .iter()
            .filter(|info| info.expects_response)
            .count()
    }

    /// The serialized wire bytes of every command, in push order.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// The request configuration.
    #[must_use]
    pub fn config(&self) -> &RequestConfig { &self.config }

    /// Mutable access to the request configuration.
    pub fn config_mut(&mut self) -> &mut RequestConfig { &mut self.config }

    /// True when the first command is `HELLO` and jumps the write queue.
    #[must_use]
    pub fn has_hello_priority(&self) -> bool { self.has_hello && self.config.hello_priority }

    /// True when the request contains a `QUIT`, after which a server close
    /// is the expected termination.
    #[must_use]
    pub fn contains_quit(&self) -> bool { self.has_quit }

    /// Remove all commands, keeping the allocated buffers.
    pub fn clear(&mut self) {
        self.payload.clear();
        self.commands.clear();
        self.has_hello = false;
        self.has_quit = false;
    }
}
