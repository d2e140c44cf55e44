//! Semantic version values used for protocol negotiation.
//!
//! Accepts `MAJOR.MINOR[.PATCH][-PRE][+BUILD]`. Ordering and equality only
//! consider the numeric triple; prerelease and build tags are carried along
//! for display.

use crate::core::{Error, Result};
use std::cmp::Ordering;
use std::str::FromStr;

/// A parsed semantic version.
#[derive(Clone, Debug)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl SemVer {
    /// Create a release version.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Parse a version string.
    pub fn parse(version: &str) -> Result<Self> {
        let invalid = || Error::InvalidMessageTypeVersion(version.to_string());

        let (rest, build) = match version.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (version, None),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid());
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = parse_numeric(part).ok_or_else(invalid)?;
        }

        if let Some(pre) = prerelease {
            if !valid_identifiers(pre) {
                return Err(invalid());
            }
        }
        if let Some(build) = build {
            if !valid_identifiers(build) {
                return Err(invalid());
            }
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            prerelease: prerelease.map(str::to_string),
            build: build.map(str::to_string),
        })
    }

    /// Versions are compatible when they share a major version.
    pub fn is_compatible(&self, other: &SemVer) -> bool {
        self.major == other.major
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

fn parse_numeric(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

fn valid_identifiers(s: &str) -> bool {
    s.split('.').all(|ident| {
        !ident.is_empty() && ident.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

impl FromStr for SemVer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for SemVer {}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple().cmp(&other.triple())
    }
}

impl std::hash::Hash for SemVer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.triple().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_major_minor() {
        let v = SemVer::parse("1.2").unwrap();
        assert_eq!(v, SemVer::new(1, 2, 0));
        assert_eq!(v.to_string(), "1.2.0");
    }

    #[test]
    fn test_parse_full() {
        let v = SemVer::parse("2.0.1-alpha.1+build-7").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2, 0, 1));
        assert_eq!(v.prerelease.as_deref(), Some("alpha.1"));
        assert_eq!(v.build.as_deref(), Some("build-7"));
        assert_eq!(v.to_string(), "2.0.1-alpha.1+build-7");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["1", "1.2.3.4", "01.0", "1.02", "a.b", "1.0-", "1.0+", "1..0", ""] {
            assert!(
                matches!(SemVer::parse(bad), Err(Error::InvalidMessageTypeVersion(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_zero_components_allowed() {
        assert_eq!(SemVer::parse("0.0.0").unwrap(), SemVer::new(0, 0, 0));
    }

    #[test]
    fn test_ordering() {
        let mut versions: Vec<SemVer> = ["2.0", "1.5", "1.0", "1.10"]
            .iter()
            .map(|v| v.parse().unwrap())
            .collect();
        versions.sort();
        let rendered: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, ["1.0.0", "1.5.0", "1.10.0", "2.0.0"]);
    }

    #[test]
    fn test_compatibility() {
        let a = SemVer::new(1, 0, 0);
        assert!(a.is_compatible(&SemVer::new(1, 9, 3)));
        assert!(!a.is_compatible(&SemVer::new(2, 0, 0)));
    }
}
