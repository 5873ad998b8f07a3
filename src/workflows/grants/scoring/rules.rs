use std::collections::BTreeSet;

use super::super::domain::{EligibilityProfile, TagCategory, TagId};
use super::super::lookups::LookupCatalog;
use super::config::ScoringConfig;
use super::{CategoryScore, FitReasons};

pub(crate) const MAX_SCORE: u8 = 100;

pub(crate) const fn budget(category: TagCategory) -> u8 {
    match category {
        TagCategory::Cause => 30,
        TagCategory::ApplicantType => 30,
        TagCategory::Province => 30,
        TagCategory::EligibilityFlag => 10,
    }
}

pub(crate) struct CategoryResult {
    pub points: u8,
    pub matched: Vec<TagId>,
    pub required: usize,
}

/// Points for one category: the full budget when the grant sets no requirement,
/// otherwise the floored share of required tags the client holds.
pub(crate) fn score_category(
    category: TagCategory,
    client: &BTreeSet<TagId>,
    required: &BTreeSet<TagId>,
) -> CategoryResult {
    let budget = budget(category);
    if required.is_empty() {
        return CategoryResult {
            points: budget,
            matched: Vec::new(),
            required: 0,
        };
    }

    let matched: Vec<TagId> = required.intersection(client).cloned().collect();
    let points = (matched.len() * usize::from(budget)) / required.len();

    CategoryResult {
        points: u8::try_from(points).unwrap_or(budget).min(budget),
        matched,
        required: required.len(),
    }
}

pub(crate) fn score_profiles(
    client: &EligibilityProfile,
    grant: &EligibilityProfile,
    lookups: &LookupCatalog,
    config: &ScoringConfig,
) -> (u8, FitReasons) {
    let mut reasons = FitReasons::default();
    let mut total: u8 = 0;

    for category in TagCategory::ordered() {
        let result = score_category(category, client.tags(category), grant.tags(category));
        total = total.saturating_add(result.points);

        let names: Vec<String> = result
            .matched
            .iter()
            .map(|id| lookups.name_of(category, id))
            .collect();

        if result.required > 0 && result.matched.is_empty() && config.issue_policy.flags(category)
        {
            reasons
                .issues
                .push(format!("No matching {}", category.plural_label()));
        }

        reasons.breakdown.push(CategoryScore {
            category,
            points: result.points,
            budget: budget(category),
            matched: result.matched.len(),
            required: result.required,
        });
        *reasons.matching_mut(category) = names;
    }

    (total.min(MAX_SCORE), reasons)
}
