mod config;
mod rules;

pub use config::{IssuePolicy, ScoringConfig};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{Client, EligibilityProfile, Grant, GrantStatus, TagCategory};
use super::lookups::LookupCatalog;

/// Stateless scorer comparing a client profile against grant requirements.
#[derive(Debug, Clone, Default)]
pub struct FitScorer {
    config: ScoringConfig,
}

impl FitScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(
        &self,
        client: &EligibilityProfile,
        grant: &EligibilityProfile,
        lookups: &LookupCatalog,
    ) -> FitOutcome {
        let (fit_score, reasons) = rules::score_profiles(client, grant, lookups, &self.config);

        FitOutcome {
            fit_score,
            fit_level: FitLevel::from_score(fit_score),
            reasons,
        }
    }

    /// Score a client against every open grant, dropping zero scores and ranking
    /// the rest best first. Nothing is persisted.
    pub fn suggest<'a, I>(
        &self,
        client: &Client,
        grants: I,
        lookups: &LookupCatalog,
    ) -> Vec<MatchSuggestion>
    where
        I: IntoIterator<Item = &'a Grant>,
    {
        let mut suggestions: Vec<MatchSuggestion> = grants
            .into_iter()
            .filter(|grant| grant.status == GrantStatus::Open)
            .filter_map(|grant| {
                let outcome = self.score(&client.eligibility, &grant.eligibility, lookups);
                (outcome.fit_score > 0).then(|| MatchSuggestion {
                    grant: grant.clone(),
                    fit_score: outcome.fit_score,
                    fit_level: outcome.fit_level,
                    reasons: outcome.reasons,
                })
            })
            .collect();

        suggestions.sort_by(|left, right| {
            right
                .fit_score
                .cmp(&left.fit_score)
                .then_with(|| left.grant.name.cmp(&right.grant.name))
                .then_with(|| left.grant.id.cmp(&right.grant.id))
        });

        debug!(
            client_id = %client.id,
            suggestions = suggestions.len(),
            "generated match suggestions"
        );

        suggestions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitLevel {
    High,
    Medium,
    Low,
}

impl FitLevel {
    pub const fn from_score(score: u8) -> Self {
        if score >= 80 {
            Self::High
        } else if score >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Points one category contributed, kept so staff can audit a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: TagCategory,
    pub points: u8,
    pub budget: u8,
    pub matched: usize,
    pub required: usize,
}

/// Explainable output attached to suggestions and saved matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitReasons {
    #[serde(default)]
    pub matching_causes: Vec<String>,
    #[serde(default)]
    pub matching_applicant_types: Vec<String>,
    #[serde(default)]
    pub matching_provinces: Vec<String>,
    #[serde(default)]
    pub matching_flags: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub breakdown: Vec<CategoryScore>,
}

impl FitReasons {
    pub fn matching(&self, category: TagCategory) -> &[String] {
        match category {
            TagCategory::Cause => &self.matching_causes,
            TagCategory::ApplicantType => &self.matching_applicant_types,
            TagCategory::Province => &self.matching_provinces,
            TagCategory::EligibilityFlag => &self.matching_flags,
        }
    }

    pub(crate) fn matching_mut(&mut self, category: TagCategory) -> &mut Vec<String> {
        match category {
            TagCategory::Cause => &mut self.matching_causes,
            TagCategory::ApplicantType => &mut self.matching_applicant_types,
            TagCategory::Province => &mut self.matching_provinces,
            TagCategory::EligibilityFlag => &mut self.matching_flags,
        }
    }

    pub fn points_for(&self, category: TagCategory) -> Option<u8> {
        self.breakdown
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    pub fit_score: u8,
    pub fit_level: FitLevel,
    pub reasons: FitReasons,
}

/// Ephemeral recommendation returned by suggestion generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub grant: Grant,
    pub fit_score: u8,
    pub fit_level: FitLevel,
    pub reasons: FitReasons,
}
