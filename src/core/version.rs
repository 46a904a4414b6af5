use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single dot-separated piece of a version string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Component {
    Numeric(u64),
    Text(String),
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            // Tagged components ("rc1", "beta") sort below any release number
            (Self::Text(_), Self::Numeric(_)) => Ordering::Less,
            (Self::Numeric(_), Self::Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const ZERO: Component = Component::Numeric(0);

/// A parsed library version such as `2.10.3`.
///
/// Versions come from untrusted places (the remote service, a library's own
/// version query, a hand-edited cache file), so parsing never fails. Input
/// that cannot be parsed produces an *invalid* version that orders below every
/// valid one.
///
/// Missing trailing components are zero, so `1.2` and `1.2.0` are equal and
/// hash identically.
///
/// # Examples
///
/// ```
/// use lib_solver::core::version::Version;
///
/// assert_eq!(Version::parse("1.2"), Version::parse("1.2.0"));
/// assert!(Version::parse("2.10.3") > Version::parse("2.9"));
/// assert!(Version::parse("garbage!") < Version::parse("0"));
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    /// Components with trailing zeros removed; empty for `0` and for invalid input
    components: Vec<Component>,
    valid: bool,
}

impl Version {
    /// Parse a version string. Never fails.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let raw = s.trim().to_string();
        match parse_components(&raw) {
            Some(mut components) => {
                while components.last() == Some(&ZERO) {
                    components.pop();
                }
                Self {
                    raw,
                    components,
                    valid: true,
                }
            }
            None => Self {
                raw,
                components: Vec::new(),
                valid: false,
            },
        }
    }

    /// The lowest possible version, used when a version cannot be determined
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            raw: String::new(),
            components: Vec::new(),
            valid: false,
        }
    }

    /// Whether the source string was a well-formed version
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The trimmed source string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn parse_components(raw: &str) -> Option<Vec<Component>> {
    if raw.is_empty() {
        return None;
    }

    let mut components = Vec::new();
    for part in raw.split('.') {
        if part.is_empty() {
            return None;
        }
        // "3-beta" is release 3 with a pre-release tag
        if let Some((number, tag)) = part.split_once('-') {
            if is_number(number) && is_tag(tag) {
                components.push(Component::Numeric(number.parse().ok()?));
                components.push(Component::Text(tag.to_string()));
                continue;
            }
        }
        if is_number(part) {
            components.push(Component::Numeric(part.parse().ok()?));
        } else if is_tag(part) {
            components.push(Component::Text(part.to_string()));
        } else {
            return None;
        }
    }
    Some(components)
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_tag(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.valid, other.valid) {
            (false, false) => return Ordering::Equal,
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            (true, true) => {}
        }

        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).unwrap_or(&ZERO);
            let b = other.components.get(i).unwrap_or(&ZERO);
            match a.cmp(b) {
                Ordering::Equal => {}
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.valid.hash(state);
        self.components.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "{}", self.raw)
        } else {
            write!(f, "<invalid '{}'>", self.raw)
        }
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Compare two raw version strings.
///
/// ```
/// use std::cmp::Ordering;
/// use lib_solver::core::version::compare_versions;
///
/// assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
/// assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
/// ```
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Version) -> u64 {
        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        for (a, b) in [("1.2", "1.2.0"), ("1", "1.0.0.0"), ("0", "0.0"), ("2.0", "2")] {
            assert_eq!(compare_versions(a, b), Ordering::Equal, "{a} vs {b}");
            assert_eq!(hash_of(&Version::parse(a)), hash_of(&Version::parse(b)));
        }
    }

    #[test]
    fn test_numeric_components_compare_as_integers() {
        assert_eq!(compare_versions("2.10.3", "2.9.99"), Ordering::Greater);
        assert_eq!(compare_versions("1.02", "1.2"), Ordering::Equal);
        assert_eq!(compare_versions("1.2.1", "1.2"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "1.2.1"), Ordering::Less);
    }

    #[test]
    fn test_text_components_sort_below_numbers() {
        assert!(Version::parse("2.1.rc1") < Version::parse("2.1"));
        assert!(Version::parse("2.1.rc1") < Version::parse("2.1.rc2"));
        assert!(Version::parse("2.1.rc2") < Version::parse("2.1.0.1"));
    }

    #[test]
    fn test_pre_release_suffix_sorts_between_releases() {
        let beta = Version::parse("2.10.3-beta");
        assert!(beta.is_valid());
        assert!(beta > Version::parse("2.10"));
        assert!(beta > Version::parse("2.10.2"));
        assert!(beta < Version::parse("2.10.3"));
        assert!(Version::parse("2.10.3-alpha") < beta);
        assert_eq!(beta.as_str(), "2.10.3-beta");
    }

    #[test]
    fn test_invalid_input_is_lowest() {
        let invalid = ["", "   ", "1..2", ".1", "1.", "1.2/3", "v1 .2", "99999999999999999999999"];
        for s in invalid {
            let v = Version::parse(s);
            assert!(!v.is_valid(), "{s:?} should be invalid");
            assert!(v < Version::parse("0"), "{s:?} should sort below 0");
            assert_eq!(v, Version::invalid());
        }
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let v = Version::parse(" 2.8.0\n");
        assert!(v.is_valid());
        assert_eq!(v.as_str(), "2.8.0");
    }

    #[test]
    fn test_total_order_on_sample() {
        let sample = [
            "", "0", "0.0.1", "1", "1.0", "1.0.rc1", "1.2", "1.2.0", "1.2.3", "1.10", "1.9.9",
            "2", "2.0-beta", "2.10.3", "garbage!", "10",
        ];
        let versions: Vec<Version> = sample.iter().map(|s| Version::parse(s)).collect();

        for a in &versions {
            assert_eq!(a.cmp(a), Ordering::Equal);
            for b in &versions {
                // Antisymmetry
                assert_eq!(a.cmp(b), b.cmp(a).reverse(), "{a} vs {b}");
                for c in &versions {
                    // Transitivity
                    if a <= b && b <= c {
                        assert!(a <= c, "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_sorting() {
        let mut versions: Vec<Version> = ["2.10", "2.9", "junk!", "2.9.1", "1"]
            .into_iter()
            .map(Version::parse)
            .collect();
        versions.sort();
        let sorted: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(sorted, vec!["junk!", "1", "2.9", "2.9.1", "2.10"]);
    }

    #[test]
    fn test_serde_as_string() {
        let v = Version::parse("2.8.0");
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"2.8.0\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
