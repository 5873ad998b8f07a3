use std::io::Read;

use serde::{Deserialize, Deserializer};

/// One spreadsheet row as exported from a funder list. `line` is the 1-based
/// position in the file, header included.
#[derive(Debug)]
pub(crate) struct CatalogRow {
    pub(crate) line: u64,
    pub(crate) name: String,
    pub(crate) funder: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) source_url: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) status: Option<String>,
    pub(crate) deadline_type: Option<String>,
    pub(crate) deadline: Option<String>,
    pub(crate) amount_min: Option<String>,
    pub(crate) amount_max: Option<String>,
    pub(crate) currency: Option<String>,
    pub(crate) causes: Vec<String>,
    pub(crate) applicant_types: Vec<String>,
    pub(crate) provinces: Vec<String>,
    pub(crate) eligibility_flags: Vec<String>,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<CatalogRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<RawRow>().enumerate() {
        let raw = record?;
        rows.push(CatalogRow {
            line: index as u64 + 2,
            name: raw.name,
            funder: raw.funder,
            description: raw.description,
            source_url: raw.source_url,
            notes: raw.notes,
            status: raw.status,
            deadline_type: raw.deadline_type,
            deadline: raw.deadline,
            amount_min: raw.amount_min,
            amount_max: raw.amount_max,
            currency: raw.currency,
            causes: split_list(raw.causes.as_deref()),
            applicant_types: split_list(raw.applicant_types.as_deref()),
            provinces: split_list(raw.provinces.as_deref()),
            eligibility_flags: split_list(raw.eligibility_flags.as_deref()),
        });
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Funder", default, deserialize_with = "empty_string_as_none")]
    funder: Option<String>,
    #[serde(
        rename = "Description",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    description: Option<String>,
    #[serde(rename = "URL", default, deserialize_with = "empty_string_as_none")]
    source_url: Option<String>,
    #[serde(rename = "Notes", default, deserialize_with = "empty_string_as_none")]
    notes: Option<String>,
    #[serde(rename = "Status", default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(
        rename = "Deadline Type",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    deadline_type: Option<String>,
    #[serde(rename = "Deadline", default, deserialize_with = "empty_string_as_none")]
    deadline: Option<String>,
    #[serde(
        rename = "Amount Min",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    amount_min: Option<String>,
    #[serde(
        rename = "Amount Max",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    amount_max: Option<String>,
    #[serde(rename = "Currency", default, deserialize_with = "empty_string_as_none")]
    currency: Option<String>,
    #[serde(rename = "Causes", default, deserialize_with = "empty_string_as_none")]
    causes: Option<String>,
    #[serde(
        rename = "Applicant Types",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    applicant_types: Option<String>,
    #[serde(rename = "Provinces", default, deserialize_with = "empty_string_as_none")]
    provinces: Option<String>,
    #[serde(
        rename = "Eligibility Flags",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    eligibility_flags: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Tag cells hold names separated by `;` (or `|` in older sheets).
fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|cell| {
            cell.split([';', '|'])
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a funding amount such as `$25,000` or `25000.00` into whole units.
pub(crate) fn parse_amount(value: &str) -> Option<u64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '$' | ',' | ' '))
        .collect();
    let whole = cleaned.split_once('.').map_or(cleaned.as_str(), |(whole, _)| whole);
    whole.parse().ok()
}

#[cfg(test)]
pub(crate) fn split_list_for_tests(value: &str) -> Vec<String> {
    split_list(Some(value))
}
