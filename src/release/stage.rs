use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Release stage, which decides the version shape and whether tags are made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStage {
    /// Development snapshot, `BASE+dev.TIMESTAMP`
    Dev,
    /// Release candidate, `BASErc1`
    Rc,
    /// Production release of the base version, tagged and cascaded
    Prod,
}

impl ReleaseStage {
    /// Version string released at this stage for `base`.
    ///
    /// Build metadata already on `base` is dropped first.
    pub fn version_for(&self, base: &str, at: DateTime<Utc>) -> String {
        let base = base.split('+').next().unwrap_or(base);
        match self {
            ReleaseStage::Dev => format!("{}+dev.{}", base, at.format("%Y%m%d%H%M%S")),
            ReleaseStage::Rc => format!("{}rc1", base),
            ReleaseStage::Prod => base.to_string(),
        }
    }

    /// Whether releases at this stage are tagged
    pub fn is_tagged(&self) -> bool {
        matches!(self, ReleaseStage::Prod)
    }
}

impl fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseStage::Dev => write!(f, "dev"),
            ReleaseStage::Rc => write!(f, "rc"),
            ReleaseStage::Prod => write!(f, "prod"),
        }
    }
}
