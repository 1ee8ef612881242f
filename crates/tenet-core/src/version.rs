//! Semantic-version parsing and range containment.
//!
//! Version comparison is numeric component-by-component, never
//! lexicographic. Both the store's version filter and the validation
//! orchestrator go through [`VersionRange::contains`], so the one
//! inclusive/exclusive policy (min inclusive, max exclusive) holds at
//! every call site.

use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// The `max_version` spelling that means "unbounded above".
pub const WILDCARD: &str = "*";

// ─── Version ─────────────────────────────────────────────────────────────────

/// A parsed `major.minor.patch` version. Derived `Ord` gives semantic
/// precedence because the fields are declared most-significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
  pub major: u64,
  pub minor: u64,
  pub patch: u64,
}

impl Version {
  pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
    Self { major, minor, patch }
  }

  /// Parse a `MAJOR.MINOR.PATCH` string. All three components must be
  /// present and numeric.
  pub fn parse(s: &str) -> Result<Self> {
    let malformed = || Error::MalformedVersion(s.to_owned());

    let mut parts = s.trim().split('.');
    let mut next = || -> Result<u64> {
      parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)
    };

    let version = Self::new(next()?, next()?, next()?);
    if parts.next().is_some() {
      return Err(malformed());
    }
    Ok(version)
  }
}

impl FromStr for Version {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

// ─── VersionRange ────────────────────────────────────────────────────────────

/// A fact's applicability window: `min` inclusive, `max` exclusive,
/// `None` max meaning unbounded above (stored as `"*"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
  pub min: Version,
  pub max: Option<Version>,
}

impl VersionRange {
  /// Parse the stored `min_version`/`max_version` pair.
  pub fn parse(min_version: &str, max_version: &str) -> Result<Self> {
    let min = Version::parse(min_version)?;
    let max = if max_version.trim() == WILDCARD {
      None
    } else {
      Some(Version::parse(max_version)?)
    };
    Ok(Self { min, max })
  }

  /// `min <= v < max` (no upper check when unbounded).
  pub fn contains(&self, v: Version) -> bool {
    v >= self.min && self.max.is_none_or(|max| v < max)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_and_orders_numerically() {
    let a = Version::parse("1.9.0").unwrap();
    let b = Version::parse("1.10.0").unwrap();
    // Lexicographic comparison would get this backwards.
    assert!(a < b);
    assert_eq!(b, Version::new(1, 10, 0));
  }

  #[test]
  fn rejects_malformed_versions() {
    for bad in ["", "1", "1.0", "1.0.0.0", "a.b.c", "1.0.x", "*"] {
      assert!(
        matches!(Version::parse(bad), Err(Error::MalformedVersion(_))),
        "{bad:?} should not parse"
      );
    }
  }

  #[test]
  fn display_round_trips() {
    let v = Version::parse("2.10.3").unwrap();
    assert_eq!(v.to_string(), "2.10.3");
  }

  #[test]
  fn contains_is_min_inclusive_max_exclusive() {
    let range = VersionRange::parse("1.0.0", "2.0.0").unwrap();
    assert!(range.contains(Version::parse("1.0.0").unwrap()));
    assert!(range.contains(Version::parse("1.5.0").unwrap()));
    assert!(!range.contains(Version::parse("2.0.0").unwrap()));
    assert!(!range.contains(Version::parse("0.9.9").unwrap()));
  }

  #[test]
  fn wildcard_max_is_unbounded() {
    let range = VersionRange::parse("1.0.0", "*").unwrap();
    assert!(range.contains(Version::parse("999.0.0").unwrap()));
    assert!(!range.contains(Version::parse("0.1.0").unwrap()));
  }

  #[test]
  fn wildcard_min_is_rejected() {
    assert!(VersionRange::parse("*", "2.0.0").is_err());
  }
}
