use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The evaluator's relationship to the person being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    #[serde(rename = "SELF")]
    SelfReview,
    Manager,
    Peer,
    DirectReport,
}

impl Relationship {
    pub const ALL: [Relationship; 4] = [
        Relationship::SelfReview,
        Relationship::Manager,
        Relationship::Peer,
        Relationship::DirectReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::SelfReview => "SELF",
            Relationship::Manager => "MANAGER",
            Relationship::Peer => "PEER",
            Relationship::DirectReport => "DIRECT_REPORT",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRelationship(pub String);

impl fmt::Display for UnknownRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown relationship '{}', expected one of SELF, MANAGER, PEER, DIRECT_REPORT",
            self.0
        )
    }
}

impl FromStr for Relationship {
    type Err = UnknownRelationship;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relationship::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRelationship(s.to_string()))
    }
}

pub const STATUS_SUBMITTED: &str = "SUBMITTED";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub evaluator_id: Uuid,
    pub subject_id: Uuid,
    pub cycle_id: Uuid,
    pub relationship: String,
    pub general_feedback: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationRow {
    /// Rows only ever hold values written through `Relationship::as_str`.
    pub fn relationship(&self) -> Option<Relationship> {
        self.relationship.parse().ok()
    }
}

/// A detail row joined with its competency name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationDetailRow {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub competency_id: Uuid,
    pub competency_name: String,
    pub score: i32,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationWithDetails {
    #[serde(flatten)]
    pub evaluation: EvaluationRow,
    pub details: Vec<EvaluationDetailRow>,
}

/// A validated submission with competency names already resolved to ids.
#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub evaluator_id: Uuid,
    pub subject_id: Uuid,
    pub cycle_id: Uuid,
    pub relationship: Relationship,
    pub general_feedback: Option<String>,
    pub details: Vec<NewEvaluationDetail>,
}

#[derive(Debug, Clone)]
pub struct NewEvaluationDetail {
    pub competency_id: Uuid,
    pub competency_name: String,
    pub score: i32,
    pub comments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_parses_case_insensitively() {
        assert_eq!("self".parse::<Relationship>().unwrap(), Relationship::SelfReview);
        assert_eq!(
            " direct_report ".parse::<Relationship>().unwrap(),
            Relationship::DirectReport
        );
    }

    #[test]
    fn test_relationship_rejects_unknown_kind() {
        let err = "FRIEND".parse::<Relationship>().unwrap_err();
        assert!(err.to_string().contains("FRIEND"));
    }

    #[test]
    fn test_relationship_serde_uses_wire_names() {
        let json = serde_json::to_string(&Relationship::SelfReview).unwrap();
        assert_eq!(json, r#""SELF""#);
        let kind: Relationship = serde_json::from_str(r#""DIRECT_REPORT""#).unwrap();
        assert_eq!(kind, Relationship::DirectReport);
    }
}
