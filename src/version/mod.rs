// src/version/mod.rs

//! Release versions and release requirements
//!
//! Staged projects may hold several versions; approval transfers the latest
//! one, so versions need a total order. Strict semantic versions are
//! compared with `semver`. Everything else is split into a numeric release
//! part and an optional pre/post-release tag (`1.0rc1`, `2.0.post1`,
//! `3.1.dev2`) and compared component-wise.

use crate::error::{Error, Result};
use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// Rank of a pre/post-release tag relative to the final release
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Phase {
    Dev,
    Alpha,
    Beta,
    Candidate,
    Final,
    Post,
}

impl Phase {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "dev" => Some(Phase::Dev),
            "a" | "alpha" => Some(Phase::Alpha),
            "b" | "beta" => Some(Phase::Beta),
            "rc" | "c" | "pre" | "preview" => Some(Phase::Candidate),
            "post" | "rev" | "r" => Some(Phase::Post),
            _ => None,
        }
    }
}

/// A parsed release version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion {
    original: String,
    release: Vec<u64>,
    phase: Phase,
    phase_number: u64,
    /// Unrecognised trailing text, compared lexicographically
    local: String,
}

impl ReleaseVersion {
    /// Parse a version string
    ///
    /// Examples:
    /// - "1.2.3" -> release=[1, 2, 3]
    /// - "2.0rc1" -> release=[2, 0], candidate 1
    /// - "1.0.post2" -> release=[1, 0], post-release 2
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        if body.is_empty() {
            return Err(Error::BadRequest(format!("Empty version '{}'", s)));
        }

        let mut release = Vec::new();
        let mut rest = body;
        loop {
            let digits = rest.chars().take_while(char::is_ascii_digit).count();
            if digits == 0 {
                break;
            }
            let number = rest[..digits].parse::<u64>().map_err(|e| {
                Error::BadRequest(format!("Invalid version '{}': {}", s, e))
            })?;
            release.push(number);
            rest = &rest[digits..];
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        if release.is_empty() {
            return Err(Error::BadRequest(format!(
                "Version '{}' does not start with a number",
                s
            )));
        }

        let (phase, phase_number, local) = parse_suffix(rest);

        Ok(Self {
            original: trimmed.to_string(),
            release,
            phase,
            phase_number,
            local,
        })
    }

    /// Convert to a semver::Version when the string is strict semver
    fn to_semver(&self) -> Option<Version> {
        Version::parse(&self.original).ok()
    }

    /// Compare two release versions
    pub fn compare(&self, other: &ReleaseVersion) -> Ordering {
        if let (Some(v1), Some(v2)) = (self.to_semver(), other.to_semver()) {
            return v1.cmp(&v2);
        }

        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        self.phase
            .cmp(&other.phase)
            .then(self.phase_number.cmp(&other.phase_number))
            .then_with(|| self.local.cmp(&other.local))
    }
}

fn parse_suffix(rest: &str) -> (Phase, u64, String) {
    let cleaned = rest.trim_start_matches(['.', '-', '_']).to_ascii_lowercase();
    if cleaned.is_empty() {
        return (Phase::Final, 0, String::new());
    }

    let tag_len = cleaned.chars().take_while(char::is_ascii_alphabetic).count();
    let (tag, after) = cleaned.split_at(tag_len);
    match Phase::from_tag(tag) {
        Some(phase) => {
            let after = after.trim_start_matches(['.', '-', '_']);
            let digits = after.chars().take_while(char::is_ascii_digit).count();
            let number = after[..digits].parse::<u64>().unwrap_or(0);
            (phase, number, after[digits..].to_string())
        }
        None => (Phase::Final, 0, cleaned),
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pick the latest of a set of version strings
///
/// Versions that do not parse sort below every parseable one and among
/// themselves lexicographically.
pub fn latest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions.into_iter().max_by(|a, b| {
        match (ReleaseVersion::parse(a), ReleaseVersion::parse(b)) {
            (Ok(va), Ok(vb)) => va.cmp(&vb),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => a.cmp(b),
        }
    })
}

/// A pinned release, `name==version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequirement {
    pub name: String,
    pub version: String,
}

impl ReleaseRequirement {
    /// Parse a `name==version` release specification
    ///
    /// Any other operator, or a missing one, is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || {
            Error::BadRequest(
                "The release specification needs to be of this form: name==version".to_string(),
            )
        };

        let (name, version) = s.split_once("==").ok_or_else(invalid)?;
        let name = name.trim();
        let version = version.trim();
        if name.is_empty()
            || version.is_empty()
            || name.contains(['<', '>', '=', '!', '~', ','])
            || version.contains(['<', '>', '=', '!', '~', ','])
        {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

impl fmt::Display for ReleaseRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let v = ReleaseVersion::parse("1.2.3").unwrap();
        assert_eq!(v.release, vec![1, 2, 3]);
        assert_eq!(v.phase, Phase::Final);
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn test_parse_prerelease() {
        let v = ReleaseVersion::parse("2.0rc1").unwrap();
        assert_eq!(v.release, vec![2, 0]);
        assert_eq!(v.phase, Phase::Candidate);
        assert_eq!(v.phase_number, 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(ReleaseVersion::parse("").is_err());
        assert!(ReleaseVersion::parse("latest").is_err());
    }

    #[test]
    fn test_compare_numeric_components() {
        let v1 = ReleaseVersion::parse("1.9").unwrap();
        let v2 = ReleaseVersion::parse("1.10").unwrap();
        assert!(v1 < v2);
        assert_eq!(
            ReleaseVersion::parse("1.0").unwrap().cmp(&ReleaseVersion::parse("1.0.0").unwrap()),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_phases() {
        let dev = ReleaseVersion::parse("1.0.dev1").unwrap();
        let alpha = ReleaseVersion::parse("1.0a1").unwrap();
        let rc = ReleaseVersion::parse("1.0rc2").unwrap();
        let fin = ReleaseVersion::parse("1.0").unwrap();
        let post = ReleaseVersion::parse("1.0.post1").unwrap();
        assert!(dev < alpha);
        assert!(alpha < rc);
        assert!(rc < fin);
        assert!(fin < post);
    }

    #[test]
    fn test_compare_semver() {
        let v1 = ReleaseVersion::parse("1.2.3-beta.1").unwrap();
        let v2 = ReleaseVersion::parse("1.2.3").unwrap();
        assert!(v1 < v2);
    }

    #[test]
    fn test_latest() {
        assert_eq!(latest(["1.0", "1.10", "1.9"]), Some("1.10"));
        assert_eq!(latest(["2.0rc1", "1.5"]), Some("2.0rc1"));
        assert_eq!(latest(["nightly", "0.1"]), Some("0.1"));
        assert_eq!(latest(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_requirement_parse() {
        let req = ReleaseRequirement::parse("pkg==1.0").unwrap();
        assert_eq!(req.name, "pkg");
        assert_eq!(req.version, "1.0");
        assert_eq!(req.to_string(), "pkg==1.0");
    }

    #[test]
    fn test_requirement_rejects_other_operators() {
        assert!(ReleaseRequirement::parse("pkg").is_err());
        assert!(ReleaseRequirement::parse("pkg>=1.0").is_err());
        assert!(ReleaseRequirement::parse("pkg===1.0").is_err());
        assert!(ReleaseRequirement::parse("pkg==1.0,<2").is_err());
        assert!(ReleaseRequirement::parse("==1.0").is_err());
    }
}
