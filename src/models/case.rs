//! Case readiness input supplied by the intake layer on every cycle.

use serde::{Deserialize, Serialize};

/// Separators that split the free-text constraints field into clauses.
const CLAUSE_SEPARATORS: [char; 3] = [';', ',', '\n'];

/// A point-in-time view of case readiness.
///
/// Never mutated by the engine. Field values are not validated here; a negative
/// readiness or an implausible gap count flows through the scoring as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseSnapshot {
    /// Organization the case is prepared for
    pub organization_name: String,

    /// Free-text narrative of the current matter
    pub narrative: String,

    /// Stated objectives
    pub objectives: String,

    /// Free-text constraints, separated by `;`, `,` or newlines
    pub constraints: String,

    /// Audience the outputs are prepared for
    pub target_audience: String,

    /// Decision deadline as entered by the user
    pub decision_deadline: String,

    /// Readiness score (0-100)
    pub readiness_score: i32,

    /// Number of unresolved critical gaps
    pub critical_gap_count: u32,

    /// Description of the most pressing critical gap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_critical_gap: Option<String>,

    /// Recommended document titles
    pub recommended_titles: Vec<String>,
}

impl CaseSnapshot {
    /// Returns true if any critical gap remains unresolved.
    pub fn has_critical_gaps(&self) -> bool {
        self.critical_gap_count > 0
    }

    /// Raw constraint clauses, keeping whitespace-only pieces.
    ///
    /// Used by complexity scoring, which counts every non-empty piece.
    pub fn raw_constraint_clauses(&self) -> impl Iterator<Item = &str> {
        self.constraints
            .split(CLAUSE_SEPARATORS)
            .filter(|clause| !clause.is_empty())
    }

    /// Trimmed, non-blank constraint clauses.
    pub fn constraint_clauses(&self) -> impl Iterator<Item = &str> {
        self.constraints
            .split(CLAUSE_SEPARATORS)
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
    }

    /// The named top critical gap, if it is present and non-empty.
    pub fn named_top_gap(&self) -> Option<&str> {
        self.top_critical_gap.as_deref().filter(|gap| !gap.is_empty())
    }
}
