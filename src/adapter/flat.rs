//! Adapter collecting the flat node stream of a reply.

use crate::{
    adapter::ResponseAdapter,
    error::Result,
    resp3::{Kind, Node},
};

/// Records every parser callback as an owned [`Node`], in traversal order.
///
/// The recorded sequence can be replayed into another adapter with
/// [`crate::adapter::replay`]; the connection engine relies on this to move
/// parsed replies between tasks.
#[derive(Clone, Debug, Default)]
pub struct FlatNodes {
    nodes: Vec<Node>,
}

impl FlatNodes {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// The recorded nodes.
    #[must_use]
    pub fn nodes(&self) -> &[Node] { &self.nodes }

    /// Consume the recorder, returning the node sequence.
    #[must_use]
    pub fn into_nodes(self) -> Vec<Node> { self.nodes }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) { self.nodes.clear(); }
}

impl ResponseAdapter for FlatNodes {
    fn on_header(&mut self, kind: Kind, count: usize, depth: usize) -> Result<()> {
        self.nodes.push(Node::header(kind, count, depth));
        Ok(())
    }

    fn on_leaf(&mut self, kind: Kind, depth: usize, payload: &[u8]) -> Result<()> {
        self.nodes.push(Node::leaf(kind, depth, payload.to_vec()));
        Ok(())
    }

    fn on_close(&mut self, kind: Kind, depth: usize) -> Result<()> {
        self.nodes.push(Node::close(kind, depth));
        Ok(())
    }
}
