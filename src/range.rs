//! Single byte-range parsing and validation.
//!
//! Only the `from-to` and `from-` forms are accepted. Suffix ranges
//! (`bytes=-500`) are rejected as malformed, and of a comma-separated
//! range set only the first range is consulted; the rest are ignored.

use axum_extra::headers::ContentRange;

const BYTES_UNIT: &str = "bytes";

/// The header text did not match `bytes=X-Y` / `bytes=X-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedRange;

/// Why a raw range could not be resolved against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// The range has no usable start offset.
    Malformed,
    /// The range parsed but lies outside `[0, total_length)` or is inverted.
    NotSatisfiable,
}

impl From<MalformedRange> for RangeError {
    fn from(_: MalformedRange) -> Self {
        RangeError::Malformed
    }
}

/// A range as it appeared in the header, before it is checked against a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawRange {
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl RawRange {
    /// Resolve against `total_length`, filling in an open end with the last
    /// byte of the resource.
    pub fn resolve(self, total_length: u64) -> Result<RangeSpec, RangeError> {
        let from = self.from.ok_or(RangeError::Malformed)?;
        let last = total_length.checked_sub(1).ok_or(RangeError::NotSatisfiable)?;
        let to = self.to.unwrap_or(last);

        if to > last || from > to {
            return Err(RangeError::NotSatisfiable);
        }

        Ok(RangeSpec { from, to, total_length })
    }
}

/// A validated inclusive byte range. Always satisfies
/// `from <= to < total_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    from: u64,
    to: u64,
    total_length: u64,
}

impl RangeSpec {
    /// Validate an explicit `[from, to]` pair.
    pub fn new(from: u64, to: u64, total_length: u64) -> Result<Self, RangeError> {
        RawRange { from: Some(from), to: Some(to) }.resolve(total_length)
    }

    pub fn from(&self) -> u64 {
        self.from
    }

    pub fn to(&self) -> u64 {
        self.to
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Number of bytes in the range, `to - from + 1`.
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// `Content-Range: bytes from-to/total` for a 206 response.
    pub fn content_range(&self) -> ContentRange {
        ContentRange::bytes(self.from..=self.to, self.total_length)
            .expect("RangeSpec invariant keeps the content range valid")
    }
}

/// Parse the text of a `Range` header.
///
/// Empty input is not "no range" here; callers decide that before parsing.
pub fn parse_range_header(header: &str) -> Result<RawRange, MalformedRange> {
    let (unit, set) = header.trim().split_once('=').ok_or(MalformedRange)?;
    if !unit.trim_end().eq_ignore_ascii_case(BYTES_UNIT) {
        return Err(MalformedRange);
    }

    // single range only, later items are not syntax-checked
    let first = set.split(',').next().unwrap_or_default();
    let (from, to) = first.split_once('-').ok_or(MalformedRange)?;

    let from = parse_offset(from)?;
    let to = parse_offset(to)?;
    if from.is_none() && to.is_none() {
        return Err(MalformedRange);
    }

    Ok(RawRange { from, to })
}

fn parse_offset(text: &str) -> Result<Option<u64>, MalformedRange> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedRange);
    }
    text.parse().map(Some).map_err(|_| MalformedRange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::headers::{Header, HeaderMapExt};

    fn raw(from: Option<u64>, to: Option<u64>) -> RawRange {
        RawRange { from, to }
    }

    #[test]
    fn test_parse_range_header() {
        let tests = [
            ("bytes=0-100", Ok(raw(Some(0), Some(100)))),
            ("bytes=200-499", Ok(raw(Some(200), Some(499)))),
            ("bytes=100-", Ok(raw(Some(100), None))),
            ("bytes=0-0", Ok(raw(Some(0), Some(0)))),
            ("  bytes=5-9  ", Ok(raw(Some(5), Some(9)))),
            ("bytes= 5 - 9", Ok(raw(Some(5), Some(9)))),
            ("Bytes=5-9", Ok(raw(Some(5), Some(9)))),
            ("bytes=30-29", Ok(raw(Some(30), Some(29)))),
            ("bytes=0-100,200-300", Ok(raw(Some(0), Some(100)))),
            ("bytes=0-4,garbage", Ok(raw(Some(0), Some(4)))),
            ("bytes=-100", Ok(raw(None, Some(100)))),
            ("bytes=abc-def", Err(MalformedRange)),
            ("bytes=-", Err(MalformedRange)),
            ("bytes=5", Err(MalformedRange)),
            ("bytes=", Err(MalformedRange)),
            ("bytes=+5-9", Err(MalformedRange)),
            ("bytes=5-9-10", Err(MalformedRange)),
            ("bytes=99999999999999999999-", Err(MalformedRange)),
            ("bleets=100-324", Err(MalformedRange)),
            ("none", Err(MalformedRange)),
            ("", Err(MalformedRange)),
        ];

        for (i, (header, expected)) in tests.iter().enumerate() {
            let result = parse_range_header(header);
            assert_eq!(result, *expected, "Failed to parse range header #{i}: {header:?}");
        }
    }

    #[test]
    fn test_resolve_defaults_open_end_to_last_byte() {
        let spec = raw(Some(100), None).resolve(500).unwrap();
        assert_eq!((100, 499, 500), (spec.from(), spec.to(), spec.total_length()));
        assert_eq!(400, spec.len());
    }

    #[test]
    fn test_resolve_rejects_suffix_as_malformed() {
        assert_eq!(Err(RangeError::Malformed), raw(None, Some(100)).resolve(500));
    }

    #[test]
    fn test_resolve_scenarios() {
        assert_eq!(
            Ok((200, 499)),
            raw(Some(200), Some(499)).resolve(1000).map(|s| (s.from(), s.to()))
        );
        assert_eq!(Err(RangeError::NotSatisfiable), raw(Some(900), Some(1500)).resolve(1000));
        assert_eq!(Err(RangeError::NotSatisfiable), raw(Some(30), Some(29)).resolve(1000));
        assert_eq!(Err(RangeError::NotSatisfiable), raw(Some(1000), None).resolve(1000));
        assert_eq!(Err(RangeError::NotSatisfiable), raw(Some(0), Some(99)).resolve(0));
        assert_eq!(Err(RangeError::NotSatisfiable), raw(Some(0), None).resolve(0));
    }

    #[test]
    fn test_resolve_accepts_exactly_the_valid_triples() {
        for total in 0..8u64 {
            for from in 0..10u64 {
                for to in 0..10u64 {
                    let result = RangeSpec::new(from, to, total);
                    let valid = from <= to && to < total;
                    assert_eq!(valid, result.is_ok(), "from={from} to={to} total={total}");
                    if let Ok(spec) = result {
                        assert_eq!(to - from + 1, spec.len());
                    }
                }
            }
        }
    }

    #[test]
    fn test_content_range_round_trip() {
        for (from, to, total) in [(200, 499, 1000), (0, 0, 1), (0, 53, 54), (53, 53, 54)] {
            let spec = RangeSpec::new(from, to, total).unwrap();

            let mut headers = axum::http::HeaderMap::new();
            headers.typed_insert(spec.content_range());
            let value = headers.get("content-range").unwrap().clone();

            let decoded = ContentRange::decode(&mut [value].iter()).unwrap();
            assert_eq!(Some((from, to)), decoded.bytes_range());
            assert_eq!(Some(total), decoded.bytes_len());
        }
    }

    #[test]
    fn test_content_range_text() {
        let spec = RangeSpec::new(200, 499, 1000).unwrap();
        let mut headers = axum::http::HeaderMap::new();
        headers.typed_insert(spec.content_range());
        assert_eq!(
            Some(&HeaderValue::from_static("bytes 200-499/1000")),
            headers.get("content-range")
        );
    }
}
