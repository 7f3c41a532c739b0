//! Release version ordering
//!
//! Package indexes use version strings that are mostly semver
//! (`1.8.6`, `7.3.0-atmel3.6.1-arduino7`) but sometimes short (`2.0`) or
//! free-form. [`ReleaseVersion`] gives all of them a total order so that
//! "latest installed" is well defined.

use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// A release version string with a total order
///
/// Strings that parse as semver (after padding a missing minor or patch
/// component) compare by semver precedence. Anything else sorts below every
/// parseable version and compares lexically with other unparseable strings.
#[derive(Debug, Clone)]
pub struct ReleaseVersion {
    raw: String,
    parsed: Option<Version>,
}

impl ReleaseVersion {
    /// Wrap a version string
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = parse_lenient(&raw);
        Self { raw, parsed }
    }

    /// The original string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The semver interpretation, if any
    pub fn semver(&self) -> Option<&Version> {
        self.parsed.as_ref()
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for ReleaseVersion {}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a.cmp(b).then_with(|| self.raw.cmp(&other.raw)),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for ReleaseVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Parse a version, padding `1` / `1.2` to `1.0.0` / `1.2.0`
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }

    let split_at = trimmed.find(|c: char| c == '-' || c == '+').unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let mut padded: Vec<&str> = parts.clone();
    while padded.len() < 3 {
        padded.push("0");
    }
    Version::parse(&format!("{}{rest}", padded.join("."))).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn compare(a: &str, b: &str) -> Ordering {
        ReleaseVersion::new(a).cmp(&ReleaseVersion::new(b))
    }

    fn is_newer(a: &str, b: &str) -> bool {
        compare(a, b) == Ordering::Greater
    }

    #[test]
    fn test_semver_ordering() {
        assert!(is_newer("1.8.6", "1.8.5"));
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(is_newer(
            "7.3.0-atmel3.6.1-arduino7",
            "5.4.0-atmel3.6.1-arduino2"
        ));
        assert!(!is_newer("1.0.0", "1.0.0"));
    }

    #[test]
    fn test_short_versions_are_padded() {
        assert_eq!(parse_lenient("2.0"), Some(Version::new(2, 0, 0)));
        assert_eq!(parse_lenient("3"), Some(Version::new(3, 0, 0)));
        assert!(is_newer("2.1", "2.0.5"));
    }

    #[test]
    fn test_short_version_with_prerelease() {
        let v = parse_lenient("6.3-arduino17").unwrap();
        assert_eq!(v.major, 6);
        assert_eq!(v.minor, 3);
        assert_eq!(v.pre.as_str(), "arduino17");
    }

    #[test]
    fn test_unparseable_sorts_below_parseable() {
        assert!(is_newer("0.0.1", "nightly"));
        assert_eq!(compare("beta", "alpha"), Ordering::Greater);
    }

    #[test]
    fn test_equal_semver_with_different_text_is_not_equal() {
        assert_ne!(compare("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_max_picks_latest() {
        let versions = ["1.6.23", "1.8.6", "1.8.10", "snapshot"];
        let latest = versions.iter().map(|v| ReleaseVersion::new(*v)).max().unwrap();
        assert_eq!(latest.as_str(), "1.8.10");
    }

    fn version_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..20, 0u32..20, 0u32..20).prop_map(|(a, b, c)| format!("{a}.{b}.{c}")),
            (0u32..20, 0u32..20).prop_map(|(a, b)| format!("{a}.{b}")),
            (0u32..20, 0u32..9).prop_map(|(a, n)| format!("{a}.0.0-arduino{n}")),
            "[a-z]{1,8}",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The ordering is total and antisymmetric
        #[test]
        fn prop_ordering_is_antisymmetric(a in version_strategy(), b in version_strategy()) {
            let va = ReleaseVersion::new(a.clone());
            let vb = ReleaseVersion::new(b.clone());
            prop_assert_eq!(va.cmp(&vb), vb.cmp(&va).reverse());
            prop_assert_eq!(va.cmp(&vb) == Ordering::Equal, a == b);
        }

        /// The ordering is transitive
        #[test]
        fn prop_ordering_is_transitive(
            a in version_strategy(),
            b in version_strategy(),
            c in version_strategy(),
        ) {
            let mut v = vec![
                ReleaseVersion::new(a),
                ReleaseVersion::new(b),
                ReleaseVersion::new(c),
            ];
            v.sort();
            prop_assert!(v[0] <= v[1] && v[1] <= v[2] && v[0] <= v[2]);
        }
    }
}
