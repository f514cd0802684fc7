//! Time bounds for collaborator calls.
//!
//! Every collaborator call is wrapped in a timeout. A single default
//! applies to all stages unless a stage has its own override.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Stage;

/// Default per-call bound in seconds (5 min)
pub const DEFAULT_STAGE_TIMEOUT_SECONDS: u64 = 300;

fn default_timeout_seconds() -> u64 {
    DEFAULT_STAGE_TIMEOUT_SECONDS
}

/// Timeout configuration as written in config files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Bound applied to every stage without an override
    #[serde(default = "default_timeout_seconds")]
    pub default_seconds: u64,

    /// Per-stage overrides in seconds
    #[serde(default)]
    pub stages: HashMap<Stage, u64>,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            default_seconds: default_timeout_seconds(),
            stages: HashMap::new(),
        }
    }
}

/// Resolved per-stage time bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTimeouts {
    default: Duration,
    overrides: HashMap<Stage, Duration>,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECONDS))
    }
}

impl StageTimeouts {
    /// Same bound for every stage
    pub fn uniform(bound: Duration) -> Self {
        Self {
            default: bound,
            overrides: HashMap::new(),
        }
    }

    /// Override the bound for one stage
    pub fn with_stage(mut self, stage: Stage, bound: Duration) -> Self {
        self.overrides.insert(stage, bound);
        self
    }

    /// Effective bound for a stage
    pub fn for_stage(&self, stage: Stage) -> Duration {
        self.overrides.get(&stage).copied().unwrap_or(self.default)
    }

    pub fn default_bound(&self) -> Duration {
        self.default
    }

    /// Bound of every stage, in pipeline order
    pub fn all(&self) -> BTreeMap<Stage, Duration> {
        Stage::ALL
            .into_iter()
            .map(|stage| (stage, self.for_stage(stage)))
            .collect()
    }
}

impl From<&TimeoutSettings> for StageTimeouts {
    fn from(settings: &TimeoutSettings) -> Self {
        Self {
            default: Duration::from_secs(settings.default_seconds),
            overrides: settings
                .stages
                .iter()
                .map(|(stage, secs)| (*stage, Duration::from_secs(*secs)))
                .collect(),
        }
    }
}
