//! RESP3 wire protocol: types, header scanning and the incremental parser.

pub mod encode;
mod kind;
mod node;
mod parser;
pub(crate) mod scanner;

pub use kind::Kind;
pub use node::{Node, NodeValue};
pub use parser::{
    Consume, Parser, Status, DEFAULT_MAX_DEPTH, MAX_AGGREGATE_ELEMENTS, STREAMED_SIZE,
};
