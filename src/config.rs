//! Connection configuration.

use std::time::Duration;

use crate::{push::DEFAULT_PUSH_CAPACITY, resp3::DEFAULT_MAX_DEPTH};

/// Configuration for a [`crate::Connection`].
///
/// Setters follow the builder style and may be chained.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use resplink::Config;
///
/// let config = Config::new("127.0.0.1", "6379")
///     .ping_interval(Duration::from_secs(1))
///     .enable_reconnect(false);
/// assert_eq!(config.ping_interval_value(), Duration::from_secs(1));
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) host: String,
    pub(crate) port: String,
    pub(crate) resolve_timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) ping_interval: Duration,
    pub(crate) reconnect_interval: Duration,
    pub(crate) max_read_size: usize,
    pub(crate) coalesce_requests: bool,
    pub(crate) enable_push: bool,
    pub(crate) enable_reconnect: bool,
    pub(crate) max_depth: usize,
    pub(crate) push_capacity: usize,
    pub(crate) ping_message: String,
}

impl Config {
    /// Create a configuration for the given host and port with defaults
    /// matching a local server.
    #[must_use]
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            resolve_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(2),
            reconnect_interval: Duration::from_secs(1),
            max_read_size: usize::MAX,
            coalesce_requests: true,
            enable_push: true,
            enable_reconnect: true,
            max_depth: DEFAULT_MAX_DEPTH,
            push_capacity: DEFAULT_PUSH_CAPACITY,
            ping_message: "resplink".to_owned(),
        }
    }

    /// Bound on how long name resolution may take.
    #[must_use]
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Bound on how long the TCP connect may take.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Interval between watchdog pings. The connection is considered
    /// unresponsive when no server byte arrives for twice this interval.
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Delay between losing a connection and the next resolve attempt.
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Cap on the read buffer; replies growing past it fail the connection.
    #[must_use]
    pub fn max_read_size(mut self, size: usize) -> Self {
        self.max_read_size = size;
        self
    }

    /// Batch staged requests into one network write where allowed.
    #[must_use]
    pub fn coalesce_requests(mut self, enabled: bool) -> Self {
        self.coalesce_requests = enabled;
        self
    }

    /// Route server pushes to the push channel. When disabled, pushes are
    /// discarded and counted.
    #[must_use]
    pub fn enable_push(mut self, enabled: bool) -> Self {
        self.enable_push = enabled;
        self
    }

    /// Re-establish the connection after it is lost.
    #[must_use]
    pub fn enable_reconnect(mut self, enabled: bool) -> Self {
        self.enable_reconnect = enabled;
        self
    }

    /// Bound on reply nesting accepted by the parser.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Capacity of the push mailbox; a full mailbox backpressures reads.
    #[must_use]
    pub fn push_capacity(mut self, capacity: usize) -> Self {
        self.push_capacity = capacity;
        self
    }

    /// Payload sent with the watchdog `PING`, useful to identify
    /// connections server-side.
    #[must_use]
    pub fn ping_message(mut self, message: impl Into<String>) -> Self {
        self.ping_message = message.into();
        self
    }

    /// Return the configured ping interval.
    #[must_use]
    pub fn ping_interval_value(&self) -> Duration { self.ping_interval }

    /// Return the configured reconnect interval.
    #[must_use]
    pub fn reconnect_interval_value(&self) -> Duration { self.reconnect_interval }

    /// Return the configured address as `host:port`.
    #[must_use]
    pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}
