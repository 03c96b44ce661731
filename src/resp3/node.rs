//! Decoded reply events for adapters that want a flat stream.

use bytes::Bytes;

use crate::resp3::kind::Kind;

/// One event in the in-order traversal of a reply tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeValue {
    /// An aggregate opened with the announced element count.
    Header {
        /// Element count as announced on the wire (pairs for maps).
        count: usize,
    },
    /// A fully reassembled leaf payload.
    Leaf {
        /// The raw payload bytes, without markers or CRLF.
        payload: Bytes,
    },
    /// One chunk of a streamed string, for part-streaming adapters.
    StreamedPart {
        /// The chunk bytes.
        payload: Bytes,
    },
    /// An aggregate or streamed string closed.
    Close,
}

/// A decoded node: the kind, its depth in the reply tree and the event.
///
/// A reply is fully described by its node sequence; feeding the sequence
/// back into an adapter reproduces the parser's callbacks exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// The RESP3 kind this event belongs to.
    pub kind: Kind,
    /// Nesting depth; top-level frames sit at depth zero.
    pub depth: usize,
    /// The traversal event.
    pub value: NodeValue,
}

impl Node {
    /// Build an aggregate-open node.
    #[must_use]
    pub fn header(kind: Kind, count: usize, depth: usize) -> Self {
        Self {
            kind,
            depth,
            value: NodeValue::Header { count },
        }
    }

    /// Build a leaf node from payload bytes.
    #[must_use]
    pub fn leaf(kind: Kind, depth: usize, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            depth,
            value: NodeValue::Leaf {
                payload: payload.into(),
            },
        }
    }

    /// Build a streamed-part node.
    #[must_use]
    pub fn part(depth: usize, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: Kind::StreamedStringPart,
            depth,
            value: NodeValue::StreamedPart {
                payload: payload.into(),
            },
        }
    }

    /// Build an aggregate-close node.
    #[must_use]
    pub fn close(kind: Kind, depth: usize) -> Self {
        Self {
            kind,
            depth,
            value: NodeValue::Close,
        }
    }

    /// Leaf payload bytes, if this node is a leaf.
    #[must_use]
    pub fn payload(&self) -> Option<&Bytes> {
        match &self.value {
            NodeValue::Leaf { payload } | NodeValue::StreamedPart { payload } => Some(payload),
            _ => None,
        }
    }
}
