use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{Tag, TagCategory, TagId};

/// Lookup tables for the four eligibility categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LookupCatalog {
    tables: BTreeMap<TagCategory, BTreeMap<TagId, Tag>>,
}

impl LookupCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canadian provinces and the cause, applicant-type and flag vocabularies staff
    /// start from.
    pub fn standard() -> Self {
        let mut catalog = Self::new();

        for (code, name) in PROVINCES {
            catalog.insert(TagCategory::Province, Tag {
                id: TagId::from(*code),
                name: (*name).to_string(),
            });
        }

        for (category, names) in [
            (TagCategory::Cause, CAUSES),
            (TagCategory::ApplicantType, APPLICANT_TYPES),
            (TagCategory::EligibilityFlag, ELIGIBILITY_FLAGS),
        ] {
            for name in names {
                catalog.insert(category, Tag {
                    id: TagId(slugify(name)),
                    name: (*name).to_string(),
                });
            }
        }

        catalog
    }

    pub fn insert(&mut self, category: TagCategory, tag: Tag) {
        self.tables
            .entry(category)
            .or_default()
            .insert(tag.id.clone(), tag);
    }

    pub fn get(&self, category: TagCategory, id: &TagId) -> Option<&Tag> {
        self.tables.get(&category).and_then(|table| table.get(id))
    }

    /// Display name for a tag, falling back to the raw id for unknown tags.
    pub fn name_of(&self, category: TagCategory, id: &TagId) -> String {
        self.get(category, id)
            .map(|tag| tag.name.clone())
            .unwrap_or_else(|| id.0.clone())
    }

    /// Resolve a tag by id or case-insensitive name.
    pub fn resolve(&self, category: TagCategory, needle: &str) -> Option<&Tag> {
        let needle = needle.trim();
        let table = self.tables.get(&category)?;
        table.get(&TagId::from(needle)).or_else(|| {
            table
                .values()
                .find(|tag| tag.name.eq_ignore_ascii_case(needle))
        })
    }

    pub fn tags(&self, category: TagCategory) -> Vec<Tag> {
        self.tables
            .get(&category)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> impl Iterator<Item = (TagCategory, &Tag)> {
        self.tables
            .iter()
            .flat_map(|(category, table)| table.values().map(move |tag| (*category, tag)))
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lowercase, hyphen-separated identifier derived from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

const PROVINCES: &[(&str, &str)] = &[
    ("AB", "Alberta"),
    ("BC", "British Columbia"),
    ("MB", "Manitoba"),
    ("NB", "New Brunswick"),
    ("NL", "Newfoundland and Labrador"),
    ("NS", "Nova Scotia"),
    ("NT", "Northwest Territories"),
    ("NU", "Nunavut"),
    ("ON", "Ontario"),
    ("PE", "Prince Edward Island"),
    ("QC", "Quebec"),
    ("SK", "Saskatchewan"),
    ("YT", "Yukon"),
];

const CAUSES: &[&str] = &[
    "Arts & Culture",
    "Children & Youth",
    "Community Development",
    "Disabilities",
    "Education & Literacy",
    "Employment & Training",
    "Environment & Conservation",
    "Food Security",
    "Health & Wellness",
    "Homelessness & Housing",
    "Human Rights",
    "Immigration & Refugees",
    "Indigenous Peoples",
    "Mental Health",
    "Poverty Reduction",
    "Seniors",
    "Social Services",
    "Sports & Recreation",
    "Women & Girls",
];

const APPLICANT_TYPES: &[&str] = &[
    "Registered Charity",
    "Nonprofit Organization",
    "Charitable Foundation",
    "First Nations Band",
    "Indigenous Organization",
    "Social Enterprise",
    "Cooperative",
    "Community Association",
    "Educational Institution",
    "Healthcare Organization",
    "Religious Organization",
    "Municipality",
    "Individual (Sponsored)",
];

const ELIGIBILITY_FLAGS: &[&str] = &[
    "Indigenous-led",
    "Women-led",
    "Youth-led",
    "Black-led",
    "LGBTQ2S+-led",
    "Disability-led",
    "Immigrant-led",
    "Rural/Remote",
    "Francophone",
];
