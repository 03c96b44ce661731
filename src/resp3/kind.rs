//! RESP3 wire types and their marker bytes.

use crate::error::Error;

/// The closed set of RESP3 data kinds.
///
/// Each kind maps to a single marker byte on the wire. Streamed strings use
/// the blob marker with a `?` length and deliver their payload as
/// [`Kind::StreamedStringPart`] chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `+` line payload.
    SimpleString,
    /// `-` line payload carrying an error message.
    SimpleError,
    /// `:` signed 64-bit integer.
    Number,
    /// `,` floating point value.
    Double,
    /// `(` arbitrarily large integer, kept textual.
    BigNumber,
    /// `#` boolean, payload `t` or `f`.
    Boolean,
    /// `_` null, empty payload.
    Null,
    /// `$` length-prefixed binary string.
    BlobString,
    /// `!` length-prefixed error message.
    BlobError,
    /// `=` length-prefixed string with a three-letter format prefix.
    VerbatimString,
    /// `*` ordered sequence of elements.
    Array,
    /// `%` key-value pairs; the announced count is the pair count.
    Map,
    /// `~` unordered collection of elements.
    Set,
    /// `|` metadata map annotating the reply that follows it.
    Attribute,
    /// `>` unsolicited out-of-band message.
    Push,
    /// `$?` blob delivered as chunks of unknown total length.
    StreamedString,
    /// `;` one chunk of a streamed string.
    StreamedStringPart,
}

impl Kind {
    /// Classify the marker byte that introduces a frame.
    pub(crate) fn from_marker(marker: u8) -> Result<Self, Error> {
        match marker {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Number),
            b',' => Ok(Self::Double),
            b'(' => Ok(Self::BigNumber),
            b'#' => Ok(Self::Boolean),
            b'_' => Ok(Self::Null),
            b'$' => Ok(Self::BlobString),
            b'!' => Ok(Self::BlobError),
            b'=' => Ok(Self::VerbatimString),
            b'*' => Ok(Self::Array),
            b'%' => Ok(Self::Map),
            b'~' => Ok(Self::Set),
            b'|' => Ok(Self::Attribute),
            b'>' => Ok(Self::Push),
            b';' => Ok(Self::StreamedStringPart),
            _ => Err(Error::InvalidType),
        }
    }

    /// The marker byte this kind is written with.
    #[must_use]
    pub fn marker(self) -> u8 {
        match self {
            Self::SimpleString => b'+',
            Self::SimpleError => b'-',
            Self::Number => b':',
            Self::Double => b',',
            Self::BigNumber => b'(',
            Self::Boolean => b'#',
            Self::Null => b'_',
            Self::BlobString | Self::StreamedString => b'$',
            Self::BlobError => b'!',
            Self::VerbatimString => b'=',
            Self::Array => b'*',
            Self::Map => b'%',
            Self::Set => b'~',
            Self::Attribute => b'|',
            Self::Push => b'>',
            Self::StreamedStringPart => b';',
        }
    }

    /// True for kinds that carry a value and no children.
    #[must_use]
    pub fn is_leaf(self) -> bool { !self.is_aggregate() }

    /// True for kinds that contain other values.
    #[must_use]
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            Self::Array | Self::Map | Self::Set | Self::Attribute | Self::Push
        )
    }

    /// True for kinds delivered incrementally with an explicit end marker.
    #[must_use]
    pub fn is_streamed(self) -> bool {
        matches!(self, Self::StreamedString | Self::StreamedStringPart)
    }

    /// True for the blob family, whose payload follows on a separate line.
    #[must_use]
    pub fn is_blob(self) -> bool {
        matches!(
            self,
            Self::BlobString | Self::BlobError | Self::VerbatimString
        )
    }

    /// True for kinds whose announced count is doubled on the frame stack
    /// because elements arrive as key-value pairs.
    #[must_use]
    pub fn is_paired(self) -> bool { matches!(self, Self::Map | Self::Attribute) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b'+', Kind::SimpleString)]
    #[case(b'-', Kind::SimpleError)]
    #[case(b':', Kind::Number)]
    #[case(b',', Kind::Double)]
    #[case(b'(', Kind::BigNumber)]
    #[case(b'#', Kind::Boolean)]
    #[case(b'_', Kind::Null)]
    #[case(b'$', Kind::BlobString)]
    #[case(b'!', Kind::BlobError)]
    #[case(b'=', Kind::VerbatimString)]
    #[case(b'*', Kind::Array)]
    #[case(b'%', Kind::Map)]
    #[case(b'~', Kind::Set)]
    #[case(b'|', Kind::Attribute)]
    #[case(b'>', Kind::Push)]
    fn marker_round_trip(#[case] marker: u8, #[case] kind: Kind) {
        assert_eq!(Kind::from_marker(marker).unwrap(), kind);
        assert_eq!(kind.marker(), marker);
    }

    #[test]
    fn unknown_marker_is_invalid_type() {
        assert!(matches!(Kind::from_marker(b'@'), Err(Error::InvalidType)));
    }

    #[test]
    fn categories_are_disjoint() {
        for marker in [b'+', b'-', b':', b',', b'(', b'#', b'_', b'$', b'!', b'='] {
            let kind = Kind::from_marker(marker).unwrap();
            assert!(kind.is_leaf());
            assert!(!kind.is_aggregate());
        }
        for marker in [b'*', b'%', b'~', b'|', b'>'] {
            let kind = Kind::from_marker(marker).unwrap();
            assert!(kind.is_aggregate());
            assert!(!kind.is_leaf());
        }
    }

    #[test]
    fn paired_kinds_are_map_and_attribute() {
        assert!(Kind::Map.is_paired());
        assert!(Kind::Attribute.is_paired());
        assert!(!Kind::Array.is_paired());
        assert!(!Kind::Push.is_paired());
    }
}
