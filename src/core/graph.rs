//! Stage dependency graph.
//!
//! Pure static data: the pipeline order and, per stage, which stages must
//! hold a success before it may run. Nothing advances a stage whose
//! prerequisites are not all successful.

use crate::domain::Stage;

/// Pipeline order
pub static STAGE_ORDER: [Stage; 8] = Stage::ALL;

/// Stages that must hold a success before `stage` may run
pub fn prerequisites_of(stage: Stage) -> &'static [Stage] {
    match stage {
        Stage::Extraction => &[],
        Stage::Claims => &[Stage::Extraction],
        Stage::SimilarPapers => &[Stage::Claims],
        Stage::ResearchGroups => &[Stage::Claims, Stage::SimilarPapers],
        Stage::Contacts => &[Stage::ResearchGroups],
        Stage::Theses => &[Stage::ResearchGroups],
        Stage::Patents => &[Stage::Claims],
        Stage::VerifiedClaims => &[
            Stage::Claims,
            Stage::SimilarPapers,
            Stage::ResearchGroups,
            Stage::Patents,
        ],
    }
}

/// Stage after `stage` in pipeline order
pub fn next_stage(stage: Stage) -> Option<Stage> {
    STAGE_ORDER.get(stage.index() + 1).copied()
}

/// `stage` and everything after it
pub fn stages_from(stage: Stage) -> &'static [Stage] {
    &STAGE_ORDER[stage.index()..]
}

/// Stages that list `stage` as a prerequisite, directly or transitively
pub fn dependents_of(stage: Stage) -> Vec<Stage> {
    let mut dependents: Vec<Stage> = Vec::new();

    for candidate in stages_from(stage).iter().skip(1) {
        let depends = prerequisites_of(*candidate)
            .iter()
            .any(|p| *p == stage || dependents.contains(p));
        if depends {
            dependents.push(*candidate);
        }
    }

    dependents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerequisites_precede_stage() {
        for stage in STAGE_ORDER {
            for prereq in prerequisites_of(stage) {
                assert!(
                    prereq.index() < stage.index(),
                    "{} must come before {}",
                    prereq,
                    stage
                );
            }
        }
    }

    #[test]
    fn test_next_stage() {
        assert_eq!(next_stage(Stage::Extraction), Some(Stage::Claims));
        assert_eq!(next_stage(Stage::Patents), Some(Stage::VerifiedClaims));
        assert_eq!(next_stage(Stage::VerifiedClaims), None);
    }

    #[test]
    fn test_verified_claims_prerequisites() {
        let prereqs = prerequisites_of(Stage::VerifiedClaims);
        assert_eq!(prereqs.len(), 4);
        assert!(prereqs.contains(&Stage::Patents));
        assert!(!prereqs.contains(&Stage::Theses));
    }

    #[test]
    fn test_stages_from() {
        let tail = stages_from(Stage::Theses);
        assert_eq!(tail, &[Stage::Theses, Stage::Patents, Stage::VerifiedClaims]);
        assert_eq!(stages_from(Stage::Extraction).len(), 8);
    }

    #[test]
    fn test_dependents_are_transitive() {
        let dependents = dependents_of(Stage::SimilarPapers);
        assert_eq!(
            dependents,
            vec![
                Stage::ResearchGroups,
                Stage::Contacts,
                Stage::Theses,
                Stage::VerifiedClaims
            ]
        );

        assert!(dependents_of(Stage::VerifiedClaims).is_empty());
        assert_eq!(dependents_of(Stage::Extraction).len(), 7);
    }
}
