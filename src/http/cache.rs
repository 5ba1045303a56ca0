//! HTTP cache validation
//!
//! Strong `ETag`s derived from asset content and `If-None-Match` checks.

/// Quoted strong `ETag` for the given bytes, e.g. `"3f2a9c01b7d4e6a8"`
pub fn etag_for(content: &[u8]) -> String {
    let hash = blake3::hash(content);
    format!("\"{}\"", &hash.to_hex()[..16])
}

/// Whether `If-None-Match` matches `etag` (should answer 304)
///
/// Accepts a list of tags, the `*` wildcard and weak validators (`W/"..."`),
/// which compare weakly as GET requires.
pub fn if_none_match(header: Option<&str>, etag: &str) -> bool {
    header.is_some_and(|value| {
        value.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
    })
}
