//! Per-command adapter composition for pipelined requests.

use crate::{
    adapter::ResponseAdapter,
    error::{Error, Result},
    resp3::{Kind, Node},
};

/// Routes each reply of a pipelined request to its own sink.
///
/// Sinks are visited in pipeline order; the connection engine signals the
/// boundary between replies through
/// [`ResponseAdapter::on_reply_complete`]. Receiving more replies than
/// there are sinks is an [`Error::IncompatibleSize`].
///
/// # Examples
///
/// ```
/// use resplink::adapter::{Composed, IntAdapter, StringAdapter};
///
/// let mut pong = StringAdapter::new();
/// let mut count = IntAdapter::new();
/// let adapter = Composed::new().with(&mut pong).with(&mut count);
/// # drop(adapter);
/// ```
#[derive(Default)]
pub struct Composed<'a> {
    sinks: Vec<&'a mut dyn ResponseAdapter>,
    current: usize,
}

impl<'a> Composed<'a> {
    /// Create a composition with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            current: 0,
        }
    }

    /// Append the sink for the next command in the pipeline.
    #[must_use]
    pub fn with(mut self, sink: &'a mut dyn ResponseAdapter) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks in the composition.
    #[must_use]
    pub fn len(&self) -> usize { self.sinks.len() }

    /// True when the composition holds no sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.sinks.is_empty() }

    fn current_sink(&mut self) -> Result<&mut &'a mut dyn ResponseAdapter> {
        self.sinks
            .get_mut(self.current)
            .ok_or(Error::IncompatibleSize)
    }
}

impl ResponseAdapter for Composed<'_> {
    fn on_header(&mut self, kind: Kind, count: usize, depth: usize) -> Result<()> {
        self.current_sink()?.on_header(kind, count, depth)
    }

    fn on_leaf(&mut self, kind: Kind, depth: usize, payload: &[u8]) -> Result<()> {
        self.current_sink()?.on_leaf(kind, depth, payload)
    }

    fn on_close(&mut self, kind: Kind, depth: usize) -> Result<()> {
        self.current_sink()?.on_close(kind, depth)
    }

    fn wants_streamed_parts(&self) -> bool {
        self.sinks
            .get(self.current)
            .is_some_and(|sink| sink.wants_streamed_parts())
    }

    fn on_streamed_part(&mut self, depth: usize, payload: &[u8]) -> Result<()> {
        self.current_sink()?.on_streamed_part(depth, payload)
    }

    fn on_attribute(&mut self, node: &Node) -> Result<()> {
        self.current_sink()?.on_attribute(node)
    }

    fn set_error(&mut self, err: &Error) {
        if let Ok(sink) = self.current_sink() {
            sink.set_error(err);
        }
    }

    fn on_reply_complete(&mut self) { self.current += 1; }
}
