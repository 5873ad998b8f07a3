mod parser;

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use super::domain::{
    DeadlineType, EligibilityProfile, GrantDraft, GrantStatus, TagCategory, DEFAULT_CURRENCY,
};
use super::lookups::LookupCatalog;
use parser::{parse_amount, CatalogRow};

#[derive(Debug, thiserror::Error)]
pub enum GrantImportError {
    #[error("failed to read grant catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid grant catalog CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {message}")]
    Row { line: u64, message: String },
}

impl GrantImportError {
    fn row(line: u64, message: impl Into<String>) -> Self {
        Self::Row {
            line,
            message: message.into(),
        }
    }
}

/// Tag name in the sheet with no counterpart in the lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedTag {
    pub line: u64,
    pub category: TagCategory,
    pub name: String,
}

/// Parsed catalog ready to be created through the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GrantImport {
    pub drafts: Vec<GrantDraft>,
    pub unresolved: Vec<UnresolvedTag>,
}

/// Reads a funder spreadsheet exported as CSV into grant drafts, resolving tag
/// names against the lookup catalog.
pub struct GrantCatalogImporter;

impl GrantCatalogImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        lookups: &LookupCatalog,
    ) -> Result<GrantImport, GrantImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, lookups)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        lookups: &LookupCatalog,
    ) -> Result<GrantImport, GrantImportError> {
        let mut import = GrantImport::default();

        for row in parser::parse_rows(reader)? {
            if row.name.trim().is_empty() {
                warn!(line = row.line, "skipping grant row without a name");
                continue;
            }
            let draft = draft_from_row(&row, lookups, &mut import.unresolved)?;
            import.drafts.push(draft);
        }

        for tag in &import.unresolved {
            warn!(
                line = tag.line,
                category = tag.category.label(),
                name = %tag.name,
                "unknown tag in grant catalog"
            );
        }

        Ok(import)
    }
}

fn draft_from_row(
    row: &CatalogRow,
    lookups: &LookupCatalog,
    unresolved: &mut Vec<UnresolvedTag>,
) -> Result<GrantDraft, GrantImportError> {
    let status = match row.status.as_deref() {
        Some(value) => GrantStatus::parse(value).ok_or_else(|| {
            GrantImportError::row(row.line, format!("unknown status '{value}'"))
        })?,
        None => GrantStatus::default(),
    };
    let deadline_type = match row.deadline_type.as_deref() {
        Some(value) => DeadlineType::parse(value).ok_or_else(|| {
            GrantImportError::row(row.line, format!("unknown deadline type '{value}'"))
        })?,
        None => DeadlineType::default(),
    };
    let deadline_at = row
        .deadline
        .as_deref()
        .map(|value| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                GrantImportError::row(row.line, format!("deadline '{value}' is not YYYY-MM-DD"))
            })
        })
        .transpose()?;
    let amount_min = amount(row.line, row.amount_min.as_deref())?;
    let amount_max = amount(row.line, row.amount_max.as_deref())?;

    let mut eligibility = EligibilityProfile::default();
    for (category, names) in [
        (TagCategory::Cause, &row.causes),
        (TagCategory::ApplicantType, &row.applicant_types),
        (TagCategory::Province, &row.provinces),
        (TagCategory::EligibilityFlag, &row.eligibility_flags),
    ] {
        for name in names {
            match lookups.resolve(category, name) {
                Some(tag) => {
                    eligibility.tags_mut(category).insert(tag.id.clone());
                }
                None => unresolved.push(UnresolvedTag {
                    line: row.line,
                    category,
                    name: name.clone(),
                }),
            }
        }
    }

    Ok(GrantDraft {
        name: row.name.trim().to_string(),
        funder: row.funder.clone(),
        description: row.description.clone(),
        source_url: row.source_url.clone(),
        notes: row.notes.clone(),
        status,
        deadline_type,
        deadline_at,
        next_deadline_at: None,
        amount_min,
        amount_max,
        currency: row
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        eligibility,
    })
}

fn amount(line: u64, value: Option<&str>) -> Result<Option<u64>, GrantImportError> {
    value
        .map(|raw| {
            parse_amount(raw).ok_or_else(|| {
                GrantImportError::row(line, format!("amount '{raw}' is not a number"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use super::super::domain::TagId;

    const HEADER: &str = "Name,Funder,Status,Deadline Type,Deadline,Amount Min,Amount Max,\
Causes,Applicant Types,Provinces,Eligibility Flags\n";

    fn parse_catalog(csv: String) -> Result<GrantImport, GrantImportError> {
        GrantCatalogImporter::from_reader(Cursor::new(csv), &LookupCatalog::standard())
    }

    #[test]
    fn resolves_tag_names_against_lookups() {
        let row = "Community Health Fund,Harbour Foundation,open,fixed,2025-03-31,\"$5,000\",\
25000,Health & Wellness;children & youth,Registered Charity,ON|BC,\n";
        let csv = format!("{HEADER}{row}");
        let import = parse_catalog(csv).expect("import succeeds");

        assert!(import.unresolved.is_empty(), "{:?}", import.unresolved);
        let draft = &import.drafts[0];
        assert_eq!(draft.name, "Community Health Fund");
        assert_eq!(draft.status, GrantStatus::Open);
        assert_eq!(draft.deadline_type, DeadlineType::Fixed);
        assert_eq!(draft.deadline_at, NaiveDate::from_ymd_opt(2025, 3, 31));
        assert_eq!(draft.amount_min, Some(5_000));
        assert_eq!(draft.amount_max, Some(25_000));
        assert_eq!(draft.currency, "CAD");
        assert!(draft.eligibility.causes.contains(&TagId::from("health-wellness")));
        assert!(draft.eligibility.causes.contains(&TagId::from("children-youth")));
        assert!(draft.eligibility.provinces.contains(&TagId::from("ON")));
        assert!(draft.eligibility.provinces.contains(&TagId::from("BC")));
        assert_eq!(draft.eligibility.applicant_types.len(), 1);
    }

    #[test]
    fn unknown_tags_are_reported_not_fatal() {
        let csv = format!("{HEADER}Arts Grant,,,,,,,Underwater Basket Weaving,,,\n");
        let import = parse_catalog(csv).expect("import succeeds");

        assert_eq!(import.drafts.len(), 1);
        assert!(import.drafts[0].eligibility.causes.is_empty());
        assert_eq!(
            import.unresolved,
            vec![UnresolvedTag {
                line: 2,
                category: TagCategory::Cause,
                name: "Underwater Basket Weaving".into(),
            }]
        );
    }

    #[test]
    fn rows_without_names_are_skipped() {
        let csv = format!("{HEADER},Someone,open,,,,,,,,\nReal Grant,,,,,,,,,,\n");
        let import = parse_catalog(csv).expect("import succeeds");
        assert_eq!(import.drafts.len(), 1);
        assert_eq!(import.drafts[0].status, GrantStatus::Unknown);
        assert_eq!(import.drafts[0].deadline_type, DeadlineType::Rolling);
    }

    #[test]
    fn invalid_status_names_the_line() {
        let csv = format!("{HEADER}Good,,open,,,,,,,,\nBad,,maybe,,,,,,,,\n");
        let err = parse_catalog(csv).expect_err("status is rejected");
        match err {
            GrantImportError::Row { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("maybe"));
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn amounts_accept_currency_formatting() {
        assert_eq!(parser::parse_amount("$1,500.75"), Some(1_500));
        assert_eq!(parser::parse_amount("n/a"), None);
        assert_eq!(
            parser::split_list_for_tests(" Health ; ;Youth "),
            vec!["Health".to_string(), "Youth".to_string()]
        );
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let err = GrantCatalogImporter::from_path("./does-not-exist.csv", &LookupCatalog::new())
            .expect_err("expected io error");
        assert!(matches!(err, GrantImportError::Io(_)));
    }
}
