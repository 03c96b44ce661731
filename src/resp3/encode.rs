//! Serialization helpers for the request wire format.
//!
//! Commands travel as arrays of blob strings. These helpers are also used
//! by tests to fabricate server replies.

use bytes::{BufMut, BytesMut};

use crate::resp3::kind::Kind;

/// Protocol line separator.
pub const SEPARATOR: &[u8] = b"\r\n";

/// Append an aggregate or blob header, e.g. `*3\r\n` or `$5\r\n`.
pub fn write_header(buf: &mut BytesMut, kind: Kind, len: usize) {
    buf.put_u8(kind.marker());
    buf.put_slice(len.to_string().as_bytes());
    buf.put_slice(SEPARATOR);
}

/// Append one blob string: header line, payload and terminator.
pub fn write_blob(buf: &mut BytesMut, payload: &[u8]) {
    write_header(buf, Kind::BlobString, payload.len());
    buf.put_slice(payload);
    buf.put_slice(SEPARATOR);
}

/// Append a simple line frame such as `+OK\r\n`.
pub fn write_simple(buf: &mut BytesMut, kind: Kind, payload: &[u8]) {
    buf.put_u8(kind.marker());
    buf.put_slice(payload);
    buf.put_slice(SEPARATOR);
}
