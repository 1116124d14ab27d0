//! Line terminators and line comparators.

use std::cmp::Ordering;
use std::fmt;

pub const LF: &[u8] = b"\n";
pub const CRLF: &[u8] = b"\r\n";

/// Canonical line terminator appended to every persisted or written line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::Lf => LF,
            LineEnding::CrLf => CRLF,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineEnding::Lf => f.write_str("LF"),
            LineEnding::CrLf => f.write_str("CRLF"),
        }
    }
}

/// Strips every trailing CR and LF byte from the line.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map_or(0, |pos| pos + 1);

    &line[..end]
}

/// Byte-wise ascending order. Default comparator.
pub fn ascending(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Byte-wise descending order.
pub fn descending(a: &[u8], b: &[u8]) -> Ordering {
    b.cmp(a)
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use rstest::*;

    use super::{ascending, descending, trim_line_ending, LineEnding};

    #[rstest]
    #[case(b"apple", b"apple")]
    #[case(b"apple\n", b"apple")]
    #[case(b"apple\r\n", b"apple")]
    #[case(b"apple\r", b"apple")]
    #[case(b"apple\n\r\n\r", b"apple")]
    #[case(b"ap\rple\n", b"ap\rple")]
    #[case(b"\r\n", b"")]
    #[case(b"", b"")]
    fn test_trim_line_ending(#[case] line: &[u8], #[case] expected: &[u8]) {
        assert_eq!(trim_line_ending(line), expected);
    }

    #[test]
    fn test_line_ending_bytes() {
        assert_eq!(LineEnding::default(), LineEnding::Lf);
        assert_eq!(LineEnding::Lf.as_bytes(), b"\n");
        assert_eq!(LineEnding::CrLf.as_bytes(), b"\r\n");
        assert_eq!(LineEnding::CrLf.len(), 2);
    }

    #[test]
    fn test_comparators() {
        assert_eq!(ascending(b"a", b"b"), Ordering::Less);
        assert_eq!(ascending(b"a", b"a b"), Ordering::Less);
        assert_eq!(descending(b"a", b"b"), Ordering::Greater);
        assert_eq!(descending(b"c", b"c"), Ordering::Equal);
    }
}
