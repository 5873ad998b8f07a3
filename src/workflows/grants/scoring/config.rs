use serde::{Deserialize, Serialize};

use super::super::domain::TagCategory;

/// Which zero-match categories produce an entry in `FitReasons::issues`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePolicy {
    /// Every category with a requirement and no overlap is reported.
    #[default]
    AllCategories,
    /// Only causes and applicant types are reported.
    CausesAndApplicantTypes,
}

impl IssuePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "all_categories" => Some(Self::AllCategories),
            "legacy" | "causes_and_applicant_types" => Some(Self::CausesAndApplicantTypes),
            _ => None,
        }
    }

    pub fn flags(self, category: TagCategory) -> bool {
        match self {
            Self::AllCategories => true,
            Self::CausesAndApplicantTypes => {
                matches!(category, TagCategory::Cause | TagCategory::ApplicantType)
            }
        }
    }
}

/// Scoring knobs. Category budgets and level thresholds are fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub issue_policy: IssuePolicy,
}
