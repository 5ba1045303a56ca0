//! HTTP Range request handling
//!
//! Single `bytes` ranges only (RFC 7233). Multi-range and unknown units are
//! ignored and the full asset is served.

/// Inclusive byte range already clamped to the asset length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub const fn byte_count(self) -> usize {
        self.end - self.start + 1
    }

    pub fn content_range(self, total: usize) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// What to send for a request's Range header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable Range header: send the whole asset
    Full,
    /// 206 with this slice
    Partial(ByteRange),
    /// 416
    Unsatisfiable,
}

/// Resolve a Range header against an asset of `len` bytes
///
/// Supported forms: `bytes=start-end`, `bytes=start-`, `bytes=-suffix`.
///
/// # Examples
/// ```
/// use sitepack::http::range::{resolve, ByteRange, RangeOutcome};
///
/// assert_eq!(
///     resolve(Some("bytes=0-99"), 1000),
///     RangeOutcome::Partial(ByteRange { start: 0, end: 99 })
/// );
/// assert_eq!(resolve(None, 1000), RangeOutcome::Full);
/// ```
pub fn resolve(header: Option<&str>, len: usize) -> RangeOutcome {
    let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if spec.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        return suffix(last, len);
    }

    let Ok(start) = first.parse::<usize>() else {
        return RangeOutcome::Full;
    };
    if start >= len {
        return RangeOutcome::Unsatisfiable;
    }

    let end = if last.is_empty() {
        len - 1
    } else {
        match last.parse::<usize>() {
            Ok(end) if end < start => return RangeOutcome::Unsatisfiable,
            Ok(end) => end.min(len - 1),
            Err(_) => return RangeOutcome::Full,
        }
    };

    RangeOutcome::Partial(ByteRange { start, end })
}

/// `bytes=-N`: the last N bytes
fn suffix(count: &str, len: usize) -> RangeOutcome {
    let Ok(count) = count.parse::<usize>() else {
        return RangeOutcome::Full;
    };
    if count == 0 || len == 0 {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Partial(ByteRange {
        start: len.saturating_sub(count),
        end: len - 1,
    })
}
