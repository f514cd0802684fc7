//! Stage identifiers for the document analysis pipeline.
//!
//! The set of stages is fixed and totally ordered. Ordering and
//! prerequisites live in `core::graph`; this module only names them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One step of the fixed analysis sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Text extraction from the uploaded document
    Extraction,

    /// Claim extraction from the document text
    Claims,

    /// Related-work discovery
    SimilarPapers,

    /// Research group discovery
    ResearchGroups,

    /// Contact discovery within the research groups
    Contacts,

    /// Thesis discovery
    Theses,

    /// Patent discovery
    Patents,

    /// Verification of the extracted claims
    VerifiedClaims,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 8] = [
        Stage::Extraction,
        Stage::Claims,
        Stage::SimilarPapers,
        Stage::ResearchGroups,
        Stage::Contacts,
        Stage::Theses,
        Stage::Patents,
        Stage::VerifiedClaims,
    ];

    /// Wire name (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Claims => "claims",
            Stage::SimilarPapers => "similarPapers",
            Stage::ResearchGroups => "researchGroups",
            Stage::Contacts => "contacts",
            Stage::Theses => "theses",
            Stage::Patents => "patents",
            Stage::VerifiedClaims => "verifiedClaims",
        }
    }

    /// Position of this stage in pipeline order
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Human-readable label for logs and the CLI
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Extraction => "Text extraction",
            Stage::Claims => "Claims",
            Stage::SimilarPapers => "Similar papers",
            Stage::ResearchGroups => "Research groups",
            Stage::Contacts => "Contacts",
            Stage::Theses => "Theses",
            Stage::Patents => "Patents",
            Stage::VerifiedClaims => "Verified claims",
        }
    }

    /// Whether a valid cache entry is trusted as-is, or the hydrated
    /// payload must pass its validation again before it counts as fresh.
    pub fn freshness(&self) -> Freshness {
        match self {
            Stage::Extraction => Freshness::Revalidate,
            _ => Freshness::CacheSufficient,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache freshness rule for a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// A schema-valid cache entry is fresh on its own
    CacheSufficient,

    /// The cached payload is validated again on hydration
    Revalidate,
}

#[derive(Debug, Clone, Error)]
#[error("Unknown stage '{0}'")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    /// Accepts the wire name (`similarPapers`) as well as snake/kebab
    /// spellings (`similar_papers`, `similar-papers`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}
