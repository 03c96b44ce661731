//! Incremental RESP3 parser.
//!
//! The parser consumes bytes from a caller-owned buffer and drives a
//! [`ResponseAdapter`] with the in-order traversal of one top-level reply.
//! It never copies payloads except to reassemble streamed strings, and it
//! supports resuming at any byte boundary: feeding a reply one byte at a
//! time produces exactly the same callbacks as feeding it whole.

use bytes::{BufMut, BytesMut};

use crate::{
    adapter::{leaf_error, ResponseAdapter},
    error::{Error, Result},
    resp3::{
        kind::Kind,
        node::Node,
        scanner::{scan, Header},
    },
};

/// Announced count reported for aggregates whose size is streamed.
pub const STREAMED_SIZE: usize = usize::MAX;

/// Default bound on reply nesting.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Maximum announced element count for a single aggregate.
///
/// A header may declare any count that fits in a `usize` long before the
/// elements arrive; counts beyond this bound are rejected as malformed so
/// a short frame cannot commit the parser to an absurd reply.
pub const MAX_AGGREGATE_ELEMENTS: usize = 1024 * 1024;

/// Progress report returned by [`Parser::consume`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consume {
    /// Bytes taken from the front of the buffer by this call.
    pub taken: usize,
    /// Whether the current top-level reply is complete.
    pub status: Status,
}

/// Parser status after a `consume` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// More bytes are required before further progress can be made.
    NeedMore,
    /// The current top-level reply has been fully delivered.
    Done,
}

/// Parse faults are terminal: the parser refuses further input until it is
/// reset. Kept as a copyable subset of [`Error`] so the failure can be
/// re-reported on every call.
#[derive(Clone, Copy, Debug)]
enum Fault {
    InvalidType,
    NotANumber,
    UnexpectedReadSize,
    ExceedsMaxDepth,
    UnexpectedBoolValue,
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::InvalidType => Self::InvalidType,
            Fault::NotANumber => Self::NotANumber,
            Fault::UnexpectedReadSize => Self::UnexpectedReadSize,
            Fault::ExceedsMaxDepth => Self::ExceedsMaxDepth,
            Fault::UnexpectedBoolValue => Self::UnexpectedBoolValue,
        }
    }
}

impl From<&Error> for Fault {
    fn from(err: &Error) -> Self {
        match err {
            Error::NotANumber => Self::NotANumber,
            Error::UnexpectedReadSize => Self::UnexpectedReadSize,
            Error::ExceedsMaxDepth => Self::ExceedsMaxDepth,
            Error::UnexpectedBoolValue => Self::UnexpectedBoolValue,
            _ => Self::InvalidType,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Expected {
    Fixed(usize),
    Streamed,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    kind: Kind,
    expected: Expected,
    seen: usize,
    depth: usize,
}

#[derive(Clone, Copy, Debug)]
enum BulkTarget {
    Leaf(Kind),
    Chunk,
}

#[derive(Clone, Copy, Debug)]
struct Bulk {
    target: BulkTarget,
    len: usize,
}

/// Incremental RESP3 reply parser.
pub struct Parser {
    max_depth: usize,
    stack: Vec<Frame>,
    bulk: Option<Bulk>,
    chunks: BytesMut,
    attr_at: Option<usize>,
    root: Option<Kind>,
    complete: bool,
    fault: Option<Fault>,
}

impl Default for Parser {
    fn default() -> Self { Self::new(DEFAULT_MAX_DEPTH) }
}

impl Parser {
    /// Create a parser bounding reply nesting at `max_depth`.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            stack: Vec::new(),
            bulk: None,
            chunks: BytesMut::new(),
            attr_at: None,
            root: None,
            complete: false,
            fault: None,
        }
    }

    /// True once the current top-level reply has been fully delivered.
    #[must_use]
    pub fn done(&self) -> bool { self.complete }

    /// The kind of the reply's root frame, once known.
    ///
    /// Attribute frames never become the root; the reply they annotate
    /// does.
    #[must_use]
    pub fn root_kind(&self) -> Option<Kind> { self.root }

    /// When `Some(n)`, the parser is waiting for a bulk payload: supply at
    /// least `n + 2` further bytes (payload plus CRLF) before calling
    /// [`Self::consume`] again for guaranteed progress.
    #[must_use]
    pub fn needs_bulk(&self) -> Option<usize> { self.bulk.map(|b| b.len) }

    /// How many bytes the read buffer should grow by before the next read:
    /// the outstanding bulk remainder when one is pending, `hint` otherwise.
    #[must_use]
    pub fn suggested_growth(&self, hint: usize) -> usize {
        self.bulk.map_or(hint, |b| b.len + 2)
    }

    /// Prepare for the next top-level reply, clearing any terminal fault.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.bulk = None;
        self.chunks.clear();
        self.attr_at = None;
        self.root = None;
        self.complete = false;
        self.fault = None;
    }

    /// Consume bytes from the front of `buf`, driving `adapter`.
    ///
    /// Returns how many bytes were taken and whether the reply completed.
    /// On a parse fault the parser stays failed until [`Self::reset`]; the
    /// same error is returned for every subsequent call.
    pub fn consume<A>(&mut self, buf: &[u8], adapter: &mut A) -> Result<Consume>
    where
        A: ResponseAdapter + ?Sized,
    {
        if let Some(fault) = self.fault {
            return Err(fault.into());
        }
        if self.complete {
            return Ok(Consume {
                taken: 0,
                status: Status::Done,
            });
        }

        let mut taken = 0;
        loop {
            if let Some(bulk) = self.bulk {
                let avail = &buf[taken..];
                if avail.len() < bulk.len + 2 {
                    return Ok(Consume {
                        taken,
                        status: Status::NeedMore,
                    });
                }
                let payload = &avail[..bulk.len];
                if &avail[bulk.len..bulk.len + 2] != b"\r\n" {
                    return Err(self.fail(Fault::UnexpectedReadSize));
                }
                taken += bulk.len + 2;
                self.bulk = None;
                match bulk.target {
                    BulkTarget::Leaf(kind) => self.emit_leaf(kind, payload, adapter)?,
                    BulkTarget::Chunk => self.emit_chunk(payload, adapter)?,
                }
            } else {
                let avail = &buf[taken..];
                let Some(line_len) = find_line(avail) else {
                    return Ok(Consume {
                        taken,
                        status: Status::NeedMore,
                    });
                };
                let line = &avail[..line_len];
                taken += line_len + 2;
                let header = match scan(line) {
                    Ok(header) => header,
                    Err(err) => return Err(self.fail(Fault::from(&err))),
                };
                self.apply(header, adapter)?;
            }

            if self.complete {
                return Ok(Consume {
                    taken,
                    status: Status::Done,
                });
            }
        }
    }

    fn fail(&mut self, fault: Fault) -> Error {
        self.fault = Some(fault);
        fault.into()
    }

    fn depth(&self) -> usize { self.stack.len() }

    fn in_attribute(&self) -> bool { self.attr_at.is_some() }

    fn note_root(&mut self, kind: Kind) {
        if self.root.is_none() && !self.in_attribute() && kind != Kind::Attribute {
            self.root = Some(kind);
        }
    }

    fn apply<A>(&mut self, header: Header<'_>, adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        match header {
            Header::Simple { kind, payload } => {
                if kind == Kind::Boolean && payload != b"t" && payload != b"f" {
                    return Err(self.fail(Fault::UnexpectedBoolValue));
                }
                self.emit_leaf(kind, payload, adapter)
            }
            Header::Blob { kind, len } => {
                self.bulk = Some(Bulk {
                    target: BulkTarget::Leaf(kind),
                    len,
                });
                Ok(())
            }
            Header::NullBulk => self.emit_leaf(Kind::Null, b"", adapter),
            Header::StreamedBlob => self.open_frame(Kind::StreamedString, Expected::Streamed, adapter),
            Header::Chunk { len } => {
                if !matches!(
                    self.stack.last(),
                    Some(Frame {
                        kind: Kind::StreamedString,
                        ..
                    })
                ) {
                    return Err(self.fail(Fault::InvalidType));
                }
                if len == 0 {
                    return self.close_streamed_string(adapter);
                }
                self.bulk = Some(Bulk {
                    target: BulkTarget::Chunk,
                    len,
                });
                Ok(())
            }
            Header::Aggregate { kind, count } => {
                // Unsolicited frames are only legal between replies.
                if kind == Kind::Push && !self.stack.is_empty() {
                    return Err(self.fail(Fault::InvalidType));
                }
                self.open_aggregate(kind, count, adapter)
            }
            Header::StreamedAggregate { kind } => {
                if kind == Kind::Push && !self.stack.is_empty() {
                    return Err(self.fail(Fault::InvalidType));
                }
                self.open_frame(kind, Expected::Streamed, adapter)
            }
            Header::StreamEnd => self.close_streamed_aggregate(adapter),
        }
    }

    fn open_aggregate<A>(&mut self, kind: Kind, count: usize, adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        let depth = self.depth();
        if depth >= self.max_depth {
            return Err(self.fail(Fault::ExceedsMaxDepth));
        }
        if count > MAX_AGGREGATE_ELEMENTS {
            return Err(self.fail(Fault::NotANumber));
        }
        self.note_root(kind);
        let expected = if kind.is_paired() {
            match count.checked_mul(2) {
                Some(expected) => expected,
                None => return Err(self.fail(Fault::NotANumber)),
            }
        } else {
            count
        };
        if self.in_attribute() || kind == Kind::Attribute {
            adapter.on_attribute(&Node::header(kind, count, depth))?;
        } else {
            adapter.on_header(kind, count, depth)?;
        }
        if expected == 0 {
            if self.in_attribute() || kind == Kind::Attribute {
                adapter.on_attribute(&Node::close(kind, depth))?;
            } else {
                adapter.on_close(kind, depth)?;
            }
            if kind == Kind::Attribute && !self.in_attribute() {
                // An empty attribute annotates the reply that follows.
                return Ok(());
            }
            return self.commit_element(adapter);
        }
        if kind == Kind::Attribute && !self.in_attribute() {
            self.attr_at = Some(self.stack.len());
        }
        self.stack.push(Frame {
            kind,
            expected: Expected::Fixed(expected),
            seen: 0,
            depth,
        });
        Ok(())
    }

    fn open_frame<A>(&mut self, kind: Kind, expected: Expected, adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        let depth = self.depth();
        if depth >= self.max_depth {
            return Err(self.fail(Fault::ExceedsMaxDepth));
        }
        self.note_root(kind);
        if kind != Kind::StreamedString {
            if self.in_attribute() || kind == Kind::Attribute {
                adapter.on_attribute(&Node::header(kind, STREAMED_SIZE, depth))?;
            } else {
                adapter.on_header(kind, STREAMED_SIZE, depth)?;
            }
            if kind == Kind::Attribute && !self.in_attribute() {
                self.attr_at = Some(self.stack.len());
            }
        } else {
            self.chunks.clear();
        }
        self.stack.push(Frame {
            kind,
            expected,
            seen: 0,
            depth,
        });
        Ok(())
    }

    fn emit_leaf<A>(&mut self, kind: Kind, payload: &[u8], adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        let depth = self.depth();
        self.note_root(kind);
        if self.in_attribute() {
            adapter.on_attribute(&Node::leaf(kind, depth, payload.to_vec()))?;
        } else {
            adapter.on_leaf(kind, depth, payload)?;
            if let Some(err) = leaf_error(kind, payload) {
                adapter.set_error(&err);
            }
        }
        self.commit_element(adapter)
    }

    fn emit_chunk<A>(&mut self, payload: &[u8], adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        let depth = self.depth();
        if self.in_attribute() {
            adapter.on_attribute(&Node::part(depth, payload.to_vec()))?;
        } else if adapter.wants_streamed_parts() {
            adapter.on_streamed_part(depth, payload)?;
        } else {
            self.chunks.put_slice(payload);
        }
        Ok(())
    }

    /// A `;0` chunk terminates the streamed string on top of the stack.
    fn close_streamed_string<A>(&mut self, adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        let frame = self.stack.pop().expect("checked by caller");
        if self.in_attribute() {
            adapter.on_attribute(&Node::close(Kind::StreamedString, frame.depth))?;
            return self.commit_element(adapter);
        }
        if adapter.wants_streamed_parts() {
            adapter.on_close(Kind::StreamedString, frame.depth)?;
        } else {
            let payload = self.chunks.split().freeze();
            adapter.on_leaf(Kind::StreamedString, frame.depth, &payload)?;
        }
        self.commit_element(adapter)
    }

    /// A `.` line terminates the streamed aggregate on top of the stack.
    fn close_streamed_aggregate<A>(&mut self, adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        let valid = matches!(
            self.stack.last(),
            Some(Frame {
                expected: Expected::Streamed,
                kind,
                ..
            }) if kind.is_aggregate()
        );
        if !valid {
            return Err(self.fail(Fault::InvalidType));
        }
        let frame = self.stack.pop().expect("matched above");
        let was_attr_root = self.attr_at == Some(self.stack.len());
        if was_attr_root || self.in_attribute() {
            adapter.on_attribute(&Node::close(frame.kind, frame.depth))?;
        } else {
            adapter.on_close(frame.kind, frame.depth)?;
        }
        if was_attr_root {
            self.attr_at = None;
            return Ok(());
        }
        self.commit_element(adapter)
    }

    /// Count one completed element into the enclosing frame, cascading
    /// closes for every aggregate this fills up.
    fn commit_element<A>(&mut self, adapter: &mut A) -> Result<()>
    where
        A: ResponseAdapter + ?Sized,
    {
        loop {
            let Some(top) = self.stack.last_mut() else {
                self.complete = true;
                return Ok(());
            };
            match top.expected {
                Expected::Streamed => return Ok(()),
                Expected::Fixed(expected) => {
                    top.seen += 1;
                    if top.seen < expected {
                        return Ok(());
                    }
                }
            }
            let frame = self.stack.pop().expect("non-empty");
            let was_attr_root = self.attr_at == Some(self.stack.len());
            if was_attr_root || self.in_attribute() {
                adapter.on_attribute(&Node::close(frame.kind, frame.depth))?;
            } else {
                adapter.on_close(frame.kind, frame.depth)?;
            }
            if was_attr_root {
                // The attribute annotates the upcoming reply; nothing to
                // count into the parent and the reply is still pending.
                self.attr_at = None;
                return Ok(());
            }
        }
    }
}

fn find_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\r\n")
}
