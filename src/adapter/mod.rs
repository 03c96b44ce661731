//! Response adapters: the sinks the parser feeds.
//!
//! An adapter receives the in-order traversal of one reply tree as
//! callbacks. Aggregates open with [`ResponseAdapter::on_header`] and close
//! with [`ResponseAdapter::on_close`]; leaves arrive fully reassembled
//! unless the adapter opts into streamed parts. Attribute frames annotate a
//! reply without being part of it and are routed to
//! [`ResponseAdapter::on_attribute`], which discards them by default.

mod composed;
mod flat;
mod typed;

pub use composed::Composed;
pub use flat::FlatNodes;
pub use typed::{
    BoolAdapter,
    BytesAdapter,
    DoubleAdapter,
    FromLeaf,
    IntAdapter,
    MapAdapter,
    OptionalAdapter,
    ScalarAdapter,
    SeqAdapter,
    SetAdapter,
    StringAdapter,
};

use crate::{
    error::{Error, Result},
    resp3::{Kind, Node, NodeValue},
};

/// Sink driven by the RESP3 parser.
///
/// All methods default to accepting and ignoring the event, so adapters
/// implement only what they care about. Returning an error from a callback
/// rejects the reply for the request it belongs to; it does not stop the
/// connection, which has already parsed the frame off the wire.
pub trait ResponseAdapter {
    /// An aggregate opened. `count` is the announced element count
    /// (`usize::MAX` when the size is streamed).
    fn on_header(&mut self, kind: Kind, count: usize, depth: usize) -> Result<()> {
        let _ = (kind, count, depth);
        Ok(())
    }

    /// A leaf value, fully reassembled.
    fn on_leaf(&mut self, kind: Kind, depth: usize, payload: &[u8]) -> Result<()> {
        let _ = (kind, depth, payload);
        Ok(())
    }

    /// An aggregate or streamed string closed.
    fn on_close(&mut self, kind: Kind, depth: usize) -> Result<()> {
        let _ = (kind, depth);
        Ok(())
    }

    /// Opt in to receiving streamed strings chunk by chunk instead of as a
    /// single reassembled leaf.
    fn wants_streamed_parts(&self) -> bool { false }

    /// One chunk of a streamed string. Only called when
    /// [`Self::wants_streamed_parts`] returns true.
    fn on_streamed_part(&mut self, depth: usize, payload: &[u8]) -> Result<()> {
        let _ = (depth, payload);
        Ok(())
    }

    /// One event of an attribute frame preceding the reply. Discarded by
    /// default.
    fn on_attribute(&mut self, node: &Node) -> Result<()> {
        let _ = node;
        Ok(())
    }

    /// The server answered with an error frame. The reply still parses so
    /// that pipelined responses behind it stay aligned.
    fn set_error(&mut self, err: &Error) { let _ = err; }

    /// One top-level reply finished. The connection engine calls this
    /// between the pipelined replies of a request so composed sinks can
    /// advance to the next command's adapter.
    fn on_reply_complete(&mut self) {}
}

/// Adapter that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ignore;

impl ResponseAdapter for Ignore {}

/// Feed a recorded node sequence into `adapter`, reproducing the parser's
/// callbacks for one reply.
///
/// Server error leaves fire [`ResponseAdapter::set_error`] and surface as
/// `Err` after being delivered, so the caller observes the failure while
/// the traversal stays aligned with the wire.
pub fn replay<A: ResponseAdapter + ?Sized>(nodes: &[Node], adapter: &mut A) -> Result<()> {
    let mut server_error: Option<Error> = None;
    // Chunks recorded by a part-streaming sink are reassembled here when
    // the target adapter wants whole leaves.
    let mut parts: Option<Vec<u8>> = None;
    for node in nodes {
        match &node.value {
            NodeValue::Header { count } => adapter.on_header(node.kind, *count, node.depth)?,
            NodeValue::Leaf { payload } => {
                adapter.on_leaf(node.kind, node.depth, payload)?;
                if server_error.is_none() {
                    if let Some(err) = leaf_error(node.kind, payload) {
                        adapter.set_error(&err);
                        server_error = Some(err);
                    }
                }
            }
            NodeValue::StreamedPart { payload } => {
                if adapter.wants_streamed_parts() {
                    adapter.on_streamed_part(node.depth, payload)?;
                } else {
                    parts.get_or_insert_with(Vec::new).extend_from_slice(payload);
                }
            }
            NodeValue::Close => {
                if node.kind == Kind::StreamedString && !adapter.wants_streamed_parts() {
                    let payload = parts.take().unwrap_or_default();
                    adapter.on_leaf(Kind::StreamedString, node.depth, &payload)?;
                } else {
                    adapter.on_close(node.kind, node.depth)?;
                }
            }
        }
    }
    match server_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

pub(crate) fn leaf_error(kind: Kind, payload: &[u8]) -> Option<Error> {
    let message = || String::from_utf8_lossy(payload).into_owned();
    match kind {
        Kind::SimpleError => Some(Error::SimpleError(message())),
        Kind::BlobError => Some(Error::BlobError(message())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_reports_server_error_after_delivery() {
        let nodes = [Node::leaf(Kind::SimpleError, 0, &b"ERR boom"[..])];
        let mut sink = FlatNodes::new();
        let err = replay(&nodes, &mut sink).unwrap_err();
        assert!(matches!(err, Error::SimpleError(msg) if msg == "ERR boom"));
        assert_eq!(sink.nodes().len(), 1);
    }

    #[test]
    fn replay_reassembles_recorded_parts_for_whole_leaf_adapters() {
        let nodes = [
            Node::part(1, &b"Hello"[..]),
            Node::part(1, &b" World"[..]),
            Node::close(Kind::StreamedString, 0),
        ];
        let mut sink = crate::adapter::StringAdapter::new();
        replay(&nodes, &mut sink).unwrap();
        assert_eq!(sink.take().as_deref(), Some("Hello World"));
    }

    #[test]
    fn replay_is_ok_for_plain_replies() {
        let nodes = [
            Node::header(Kind::Array, 1, 0),
            Node::leaf(Kind::Number, 1, &b"7"[..]),
            Node::close(Kind::Array, 0),
        ];
        let mut sink = FlatNodes::new();
        replay(&nodes, &mut sink).unwrap();
        assert_eq!(sink.nodes(), &nodes);
    }
}
