//! Path-segment escaping shared by the extractor and identity normalization.
//!
//! Every identity comparison runs on escaped representations, so the escaping
//! must be stable: the character set mirrors the one used by the upstream
//! services when they build resource paths (unreserved characters plus
//! `$ & + : = @` stay literal, everything else is percent-encoded with
//! upper-case hex).

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Escape a raw (decoded) value so it can be placed inside a path segment.
#[must_use]
pub fn path_escape(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// Canonical escaped form of a segment taken from a request path.
///
/// The segment is decoded first, so `alice%40example.com` and
/// `alice@example.com` canonicalize to the same string.
#[must_use]
pub fn canonical_segment(segment: &str) -> String {
    path_escape(&percent_decode_str(segment).decode_utf8_lossy())
}
