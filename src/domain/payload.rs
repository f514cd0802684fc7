//! Stage result payloads.
//!
//! Each stage produces a typed payload. Collaborators return raw JSON;
//! `StagePayload::from_response` normalizes it into the stage's shape and
//! rejects anything unusable before it can be stored as a success.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stage::Stage;

/// Payload of a successful stage, tagged by stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "data", rename_all = "camelCase")]
pub enum StagePayload {
    Extraction(ExtractionPayload),
    Claims(ClaimsPayload),
    SimilarPapers(SimilarPapersPayload),
    ResearchGroups(ResearchGroupsPayload),
    Contacts(ContactsPayload),
    Theses(ThesesPayload),
    Patents(PatentsPayload),
    VerifiedClaims(VerifiedClaimsPayload),
}

impl StagePayload {
    /// Stage this payload belongs to
    pub fn stage(&self) -> Stage {
        match self {
            StagePayload::Extraction(_) => Stage::Extraction,
            StagePayload::Claims(_) => Stage::Claims,
            StagePayload::SimilarPapers(_) => Stage::SimilarPapers,
            StagePayload::ResearchGroups(_) => Stage::ResearchGroups,
            StagePayload::Contacts(_) => Stage::Contacts,
            StagePayload::Theses(_) => Stage::Theses,
            StagePayload::Patents(_) => Stage::Patents,
            StagePayload::VerifiedClaims(_) => Stage::VerifiedClaims,
        }
    }

    /// Normalize a raw collaborator response into the payload for `stage`.
    ///
    /// Returns a description of what is wrong when the response cannot be
    /// used (missing fields, wrong types, empty required content).
    pub fn from_response(stage: Stage, raw: Value) -> Result<Self, String> {
        fn decode<T: serde::de::DeserializeOwned>(stage: Stage, raw: Value) -> Result<T, String> {
            serde_json::from_value(raw)
                .map_err(|e| format!("{} response does not match the expected shape: {}", stage, e))
        }

        let payload = match stage {
            Stage::Extraction => StagePayload::Extraction(decode(stage, raw)?),
            Stage::Claims => StagePayload::Claims(decode(stage, raw)?),
            Stage::SimilarPapers => StagePayload::SimilarPapers(decode(stage, raw)?),
            Stage::ResearchGroups => StagePayload::ResearchGroups(decode(stage, raw)?),
            Stage::Contacts => StagePayload::Contacts(decode(stage, raw)?),
            Stage::Theses => StagePayload::Theses(decode(stage, raw)?),
            Stage::Patents => StagePayload::Patents(decode(stage, raw)?),
            Stage::VerifiedClaims => StagePayload::VerifiedClaims(decode(stage, raw)?),
        };

        payload.validate()?;
        Ok(payload)
    }

    /// Check the invariants a stored payload must satisfy
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StagePayload::Extraction(p) => {
                if p.text.trim().is_empty() {
                    return Err("extraction produced no text".to_string());
                }
            }
            StagePayload::Claims(p) => {
                if let Some(pos) = p.claims.iter().position(|c| c.text.trim().is_empty()) {
                    return Err(format!("claim #{} has empty text", pos + 1));
                }
            }
            StagePayload::SimilarPapers(p) => {
                if p.papers.iter().any(|paper| paper.title.trim().is_empty()) {
                    return Err("similar paper without a title".to_string());
                }
            }
            StagePayload::ResearchGroups(p) => {
                if p.groups.iter().any(|g| g.name.trim().is_empty()) {
                    return Err("research group without a name".to_string());
                }
            }
            StagePayload::Contacts(p) => {
                if p.contacts.iter().any(|c| c.name.trim().is_empty()) {
                    return Err("contact without a name".to_string());
                }
            }
            StagePayload::Theses(p) => {
                if p.theses.iter().any(|t| t.title.trim().is_empty()) {
                    return Err("thesis without a title".to_string());
                }
            }
            StagePayload::Patents(p) => {
                if p.patents.iter().any(|t| t.title.trim().is_empty()) {
                    return Err("patent without a title".to_string());
                }
            }
            StagePayload::VerifiedClaims(p) => {
                if p.verifications.iter().any(|v| v.claim_id.trim().is_empty()) {
                    return Err("verification without a claim id".to_string());
                }
            }
        }
        Ok(())
    }

    pub fn as_extraction(&self) -> Option<&ExtractionPayload> {
        match self {
            StagePayload::Extraction(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_claims(&self) -> Option<&ClaimsPayload> {
        match self {
            StagePayload::Claims(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_research_groups(&self) -> Option<&ResearchGroupsPayload> {
        match self {
            StagePayload::ResearchGroups(p) => Some(p),
            _ => None,
        }
    }

    /// One-line description for events and the CLI
    pub fn summary(&self) -> String {
        match self {
            StagePayload::Extraction(p) => {
                format!("{} pages, {} chars", p.pages, p.text.chars().count())
            }
            StagePayload::Claims(p) => format!("{} claims", p.claims.len()),
            StagePayload::SimilarPapers(p) => format!("{} papers", p.papers.len()),
            StagePayload::ResearchGroups(p) => format!("{} groups", p.groups.len()),
            StagePayload::Contacts(p) => format!("{} contacts", p.contacts.len()),
            StagePayload::Theses(p) => format!("{} theses", p.theses.len()),
            StagePayload::Patents(p) => format!("{} patents", p.patents.len()),
            StagePayload::VerifiedClaims(p) => {
                let supported = p
                    .verifications
                    .iter()
                    .filter(|v| v.verdict == Verdict::Supported)
                    .count();
                format!("{}/{} claims supported", supported, p.verifications.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPayload {
    pub text: String,
    #[serde(default)]
    pub pages: u32,
}

impl ExtractionPayload {
    /// Fixed result used for sample documents
    pub fn placeholder() -> Self {
        Self {
            text: "Reference sample: text is bundled with the sample dataset.".to_string(),
            pages: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsPayload {
    #[serde(default)]
    pub summary: String,
    pub claims: Vec<Claim>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub relevance: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPapersPayload {
    #[serde(default)]
    pub text: String,
    pub papers: Vec<Paper>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchGroup {
    pub name: String,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub lead: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchGroupsPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub groups: Vec<ResearchGroup>,
}

impl ResearchGroupsPayload {
    /// Whether at least one structured group record was produced
    pub fn has_groups(&self) -> bool {
        !self.groups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactsPayload {
    #[serde(default)]
    pub text: String,
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thesis {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThesesPayload {
    #[serde(default)]
    pub text: String,
    pub theses: Vec<Thesis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patent {
    pub title: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatentsPayload {
    #[serde(default)]
    pub text: String,
    pub patents: Vec<Patent>,
}

/// Outcome of checking one claim against the gathered evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Contested,
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimVerification {
    pub claim_id: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedClaimsPayload {
    #[serde(default)]
    pub text: String,
    pub verifications: Vec<ClaimVerification>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_claims() {
        let raw = json!({
            "summary": "Two claims",
            "claims": [
                { "id": "c1", "text": "Method A beats baseline B" },
                { "id": "c2", "text": "Dataset is public", "category": "data" }
            ]
        });

        let payload = StagePayload::from_response(Stage::Claims, raw).unwrap();
        assert_eq!(payload.stage(), Stage::Claims);
        assert_eq!(payload.as_claims().unwrap().claims.len(), 2);
        assert_eq!(payload.summary(), "2 claims");
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let raw = json!({ "summary": "no claims field" });
        let err = StagePayload::from_response(Stage::Claims, raw).unwrap_err();
        assert!(err.contains("claims"));
    }

    #[test]
    fn test_empty_extraction_is_rejected() {
        let raw = json!({ "text": "   ", "pages": 3 });
        let err = StagePayload::from_response(Stage::Extraction, raw).unwrap_err();
        assert!(err.contains("no text"));
    }

    #[test]
    fn test_research_groups_may_be_empty() {
        let raw = json!({ "text": "Nothing found" });
        let payload = StagePayload::from_response(Stage::ResearchGroups, raw).unwrap();
        assert!(!payload.as_research_groups().unwrap().has_groups());
    }

    #[test]
    fn test_tagged_serialization() {
        let payload = StagePayload::Extraction(ExtractionPayload {
            text: "Hello".to_string(),
            pages: 12,
        });

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["stage"], "extraction");
        assert_eq!(value["data"]["pages"], 12);

        let parsed: StagePayload = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_verified_claims_summary() {
        let payload = StagePayload::VerifiedClaims(VerifiedClaimsPayload {
            text: String::new(),
            verifications: vec![
                ClaimVerification {
                    claim_id: "c1".to_string(),
                    verdict: Verdict::Supported,
                    rationale: String::new(),
                    sources: vec![],
                },
                ClaimVerification {
                    claim_id: "c2".to_string(),
                    verdict: Verdict::Contested,
                    rationale: String::new(),
                    sources: vec![],
                },
            ],
        });

        assert_eq!(payload.summary(), "1/2 claims supported");
    }
}
