//! Lenient semantic-version comparison.

use semver::Version;

/// Parse a version the way release tags are written in practice.
///
/// Accepts a leading `v`, and a missing minor or patch component (both
/// default to 0). Pre-release and build suffixes follow semver rules.
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('v')
        .or_else(|| raw.strip_prefix('V'))
        .unwrap_or(raw);

    let split = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, suffix) = raw.split_at(split);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).ok()
}

/// True when `fetched` is strictly newer than `dismissed`.
///
/// An unparsable fetched version never counts as newer. An unparsable
/// dismissed version counts as `0.0.0`.
pub fn is_newer(fetched: &str, dismissed: &str) -> bool {
    let Some(fetched) = parse_lenient(fetched) else {
        return false;
    };
    let dismissed = parse_lenient(dismissed).unwrap_or_else(|| Version::new(0, 0, 0));
    fetched > dismissed
}
