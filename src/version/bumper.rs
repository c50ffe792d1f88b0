//! Semantic version model with an alpha pre-release counter.
//!
//! Versions have the shape `MAJOR.MINOR.PATCH[-alpha.N][+META]`. Build metadata
//! is carried for display only and never takes part in comparisons or bumps.

use crate::error::{Result, VersionError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Kind of version bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    /// Bump patch version (x.y.Z)
    Patch,
    /// Bump minor version (x.Y.0)
    Minor,
    /// Bump major version (X.0.0)
    Major,
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBump::Patch => write!(f, "patch"),
            VersionBump::Minor => write!(f, "minor"),
            VersionBump::Major => write!(f, "major"),
        }
    }
}

/// A parsed `MAJOR.MINOR.PATCH[-alpha.N][+META]` version
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct SemanticVersion {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
    /// Alpha pre-release counter (always >= 1 when present)
    pub alpha: Option<u64>,
    /// Build metadata, ignored by comparisons and bumps
    pub build: Option<String>,
}

impl SemanticVersion {
    /// Create a release version without alpha counter or metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            alpha: None,
            build: None,
        }
    }

    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self> {
        let parsed = semver::Version::parse(input.trim()).map_err(|e| VersionError::ParseFailed {
            version: input.to_string(),
            source: e,
        })?;

        let alpha = if parsed.pre.is_empty() {
            None
        } else {
            let counter = parsed
                .pre
                .as_str()
                .strip_prefix("alpha.")
                .and_then(|n| n.parse::<u64>().ok())
                .filter(|n| *n >= 1)
                .ok_or_else(|| VersionError::InvalidVersion {
                    version: input.to_string(),
                    reason: "only '-alpha.N' pre-releases are supported".to_string(),
                })?;
            Some(counter)
        };

        let build = (!parsed.build.is_empty()).then(|| parsed.build.as_str().to_string());

        Ok(Self {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            alpha,
            build,
        })
    }

    /// Whether this version carries an alpha counter
    pub fn is_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// `MAJOR.MINOR.PATCH` without pre-release or metadata
    pub fn base(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// Compute the next version.
    ///
    /// With `want_alpha` an in-flight alpha only advances its counter; a release
    /// version gets the regular bump plus `-alpha.1`. Without `want_alpha` an
    /// alpha is promoted (patch strips the suffix, minor/major reset the lower
    /// components) and a release version gets the regular bump.
    pub fn bump(&self, kind: VersionBump, want_alpha: bool) -> Self {
        let (major, minor, patch) = match (self.alpha, want_alpha) {
            (Some(_), true) => (self.major, self.minor, self.patch),
            (Some(_), false) => match kind {
                VersionBump::Patch => (self.major, self.minor, self.patch),
                VersionBump::Minor => (self.major, self.minor, 0),
                VersionBump::Major => (self.major, 0, 0),
            },
            (None, _) => match kind {
                VersionBump::Patch => (self.major, self.minor, self.patch + 1),
                VersionBump::Minor => (self.major, self.minor + 1, 0),
                VersionBump::Major => (self.major + 1, 0, 0),
            },
        };

        let alpha = match (self.alpha, want_alpha) {
            (Some(n), true) => Some(n + 1),
            (None, true) => Some(1),
            (_, false) => None,
        };

        Self {
            major,
            minor,
            patch,
            alpha,
            build: None,
        }
    }

    /// One provisional step used for cascaded dependents: `alpha.N+1` when
    /// already alpha, otherwise `patch+1` with `alpha.1`.
    pub fn cascade_step(&self) -> Self {
        self.bump(VersionBump::Patch, true)
    }
}

impl FromStr for SemanticVersion {
    type Err = crate::error::MprError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(n) = self.alpha {
            write!(f, "-alpha.{}", n)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.alpha, other.alpha) {
                (None, None) => Ordering::Equal,
                // A release sorts after any of its alphas
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

/// Check whether `version` satisfies `requirement`.
///
/// `^X.Y.Z` needs a matching major, `~X.Y.Z` a matching major.minor. Any other
/// requirement shape (exact literals included) is reported compatible.
pub fn is_compatible(requirement: &str, version: &str) -> bool {
    let requirement = requirement.trim();
    if let Some(required) = requirement.strip_prefix('^') {
        leading_components(required, 1) == leading_components(version, 1)
    } else if let Some(required) = requirement.strip_prefix('~') {
        leading_components(required, 2) == leading_components(version, 2)
    } else {
        true
    }
}

fn leading_components(version: &str, count: usize) -> Vec<&str> {
    version.trim().split('.').take(count).collect()
}
