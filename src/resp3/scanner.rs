//! Header scanner: classifies one CRLF-terminated line.
//!
//! The parser hands each freshly received line to [`scan`], which reads the
//! marker byte and interprets the remainder as a payload, a blob length or
//! an aggregate count. Streamed sizes are announced with `?` in place of the
//! number and the end of a streamed aggregate is a lone `.` line.

use crate::{
    error::Error,
    resp3::kind::Kind,
};

/// Classification of a single protocol line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Header<'a> {
    /// A simple leaf whose payload sits between the marker and the CRLF.
    Simple { kind: Kind, payload: &'a [u8] },
    /// A blob leaf; `len` payload bytes plus CRLF follow this line.
    Blob { kind: Kind, len: usize },
    /// `$-1` or `*-1`: RESP2-compatible null spellings.
    NullBulk,
    /// A blob announced with `$?`; chunks follow.
    StreamedBlob,
    /// One chunk of a streamed string; zero length ends the stream.
    Chunk { len: usize },
    /// An aggregate with a known element count.
    Aggregate { kind: Kind, count: usize },
    /// An aggregate announced with `?`; elements end at a `.` line.
    StreamedAggregate { kind: Kind },
    /// The `.` line closing a streamed aggregate.
    StreamEnd,
}

/// Classify `line`, the bytes of one protocol line without its CRLF.
pub(crate) fn scan(line: &[u8]) -> Result<Header<'_>, Error> {
    let (&marker, rest) = line.split_first().ok_or(Error::InvalidType)?;
    if marker == b'.' && rest.is_empty() {
        return Ok(Header::StreamEnd);
    }
    let kind = Kind::from_marker(marker)?;
    match kind {
        Kind::SimpleString
        | Kind::SimpleError
        | Kind::Number
        | Kind::Double
        | Kind::BigNumber
        | Kind::Boolean
        | Kind::Null => Ok(Header::Simple { kind, payload: rest }),
        Kind::BlobString | Kind::BlobError | Kind::VerbatimString => {
            if rest == b"?" {
                // Only plain blob strings may be streamed.
                if kind == Kind::BlobString {
                    return Ok(Header::StreamedBlob);
                }
                return Err(Error::NotANumber);
            }
            match parse_length(rest)? {
                Some(len) => Ok(Header::Blob { kind, len }),
                None => Ok(Header::NullBulk),
            }
        }
        Kind::StreamedStringPart => {
            let len = parse_length(rest)?.ok_or(Error::NotANumber)?;
            Ok(Header::Chunk { len })
        }
        Kind::Array | Kind::Map | Kind::Set | Kind::Attribute | Kind::Push => {
            if rest == b"?" {
                return Ok(Header::StreamedAggregate { kind });
            }
            match parse_length(rest)? {
                Some(count) => Ok(Header::Aggregate { kind, count }),
                None if kind == Kind::Array => Ok(Header::NullBulk),
                None => Err(Error::NotANumber),
            }
        }
        Kind::StreamedString => unreachable!("no dedicated marker"),
    }
}

/// Parse a decimal count field. `-1` maps to `None` (the RESP2 null).
fn parse_length(digits: &[u8]) -> Result<Option<usize>, Error> {
    if digits == b"-1" {
        return Ok(None);
    }
    if digits.is_empty() {
        return Err(Error::NotANumber);
    }
    let mut value: usize = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(Error::NotANumber);
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(usize::from(b - b'0')))
            .ok_or(Error::NotANumber)?;
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b"+OK".as_slice(), Header::Simple { kind: Kind::SimpleString, payload: b"OK" })]
    #[case(b"-ERR bad".as_slice(), Header::Simple { kind: Kind::SimpleError, payload: b"ERR bad" })]
    #[case(b":42".as_slice(), Header::Simple { kind: Kind::Number, payload: b"42" })]
    #[case(b",3.14".as_slice(), Header::Simple { kind: Kind::Double, payload: b"3.14" })]
    #[case(b"#t".as_slice(), Header::Simple { kind: Kind::Boolean, payload: b"t" })]
    #[case(b"_".as_slice(), Header::Simple { kind: Kind::Null, payload: b"" })]
    fn simple_headers(#[case] line: &[u8], #[case] expected: Header<'_>) {
        assert_eq!(scan(line).unwrap(), expected);
    }

    #[rstest]
    #[case(b"$5".as_slice(), Kind::BlobString, 5)]
    #[case(b"!9".as_slice(), Kind::BlobError, 9)]
    #[case(b"=15".as_slice(), Kind::VerbatimString, 15)]
    fn blob_headers(#[case] line: &[u8], #[case] kind: Kind, #[case] len: usize) {
        assert_eq!(scan(line).unwrap(), Header::Blob { kind, len });
    }

    #[rstest]
    #[case(b"*3".as_slice(), Kind::Array, 3)]
    #[case(b"%2".as_slice(), Kind::Map, 2)]
    #[case(b"~0".as_slice(), Kind::Set, 0)]
    #[case(b"|1".as_slice(), Kind::Attribute, 1)]
    #[case(b">2".as_slice(), Kind::Push, 2)]
    fn aggregate_headers(#[case] line: &[u8], #[case] kind: Kind, #[case] count: usize) {
        assert_eq!(scan(line).unwrap(), Header::Aggregate { kind, count });
    }

    #[test]
    fn streamed_sentinels() {
        assert_eq!(scan(b"$?").unwrap(), Header::StreamedBlob);
        assert_eq!(
            scan(b"*?").unwrap(),
            Header::StreamedAggregate { kind: Kind::Array }
        );
        assert_eq!(
            scan(b"%?").unwrap(),
            Header::StreamedAggregate { kind: Kind::Map }
        );
        assert_eq!(scan(b";5").unwrap(), Header::Chunk { len: 5 });
        assert_eq!(scan(b";0").unwrap(), Header::Chunk { len: 0 });
        assert_eq!(scan(b".").unwrap(), Header::StreamEnd);
    }

    #[test]
    fn resp2_nulls() {
        assert_eq!(scan(b"$-1").unwrap(), Header::NullBulk);
        assert_eq!(scan(b"*-1").unwrap(), Header::NullBulk);
    }

    #[rstest]
    #[case(b"@oops".as_slice())]
    #[case(b"".as_slice())]
    fn unknown_markers(#[case] line: &[u8]) {
        assert!(matches!(scan(line), Err(Error::InvalidType)));
    }

    #[rstest]
    #[case(b"$abc".as_slice())]
    #[case(b"*1x".as_slice())]
    #[case(b"%".as_slice())]
    #[case(b"$-2".as_slice())]
    fn malformed_counts(#[case] line: &[u8]) {
        assert!(matches!(scan(line), Err(Error::NotANumber)));
    }

    #[test]
    fn overlong_count_is_rejected() {
        let line = b"*99999999999999999999999999";
        assert!(matches!(scan(line), Err(Error::NotANumber)));
    }
}
