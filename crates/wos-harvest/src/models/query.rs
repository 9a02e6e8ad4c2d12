//! Search queries and harvest outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AuthorRow, PublicationRecord};

/// A university as known to the search API and to readers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Name used in the `OG=` filter.
    pub query_name: String,

    /// Name written into every row.
    pub display_name: String,
}

impl Organization {
    /// Create an organization.
    #[must_use]
    pub fn new(query_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { query_name: query_name.into(), display_name: display_name.into() }
    }

    /// Organization whose query and display names coincide.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { query_name: name.clone(), display_name: name }
    }

    /// Filesystem-safe stem derived from the display name.
    #[must_use]
    pub fn file_stem(&self) -> String {
        slugify(&self.display_name)
    }
}

/// Inclusive publication year filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    /// First year.
    pub start: u16,

    /// Last year.
    pub end: u16,
}

impl YearRange {
    /// Create a range, swapping bounds given in the wrong order.
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        if start <= end { Self { start, end } } else { Self { start: end, end: start } }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parameters of one organization's harvest; immutable per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Organization searched for.
    pub organization: Organization,

    /// Publication year filter.
    pub year_range: YearRange,

    /// Records requested per page.
    pub page_size: u32,
}

impl SearchQuery {
    /// Create a query.
    #[must_use]
    pub const fn new(organization: Organization, year_range: YearRange, page_size: u32) -> Self {
        Self { organization, year_range, page_size }
    }

    /// The API query expression, e.g. `OG="Koc University" AND FPY=1900-2030`.
    #[must_use]
    pub fn expression(&self) -> String {
        format!(
            "OG=\"{}\" AND FPY={}",
            self.organization.query_name.replace('"', ""),
            self.year_range
        )
    }

    /// Pages needed for `total` records at `effective_limit` per page; never below one.
    #[must_use]
    pub fn page_count(&self, total: u64, effective_limit: u32) -> u32 {
        let limit = if effective_limit == 0 { self.page_size.max(1) } else { effective_limit };
        let pages = total.div_ceil(u64::from(limit)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

/// One fetched batch of results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// One-based page number.
    pub number: u32,

    /// Records on the page.
    pub records: Vec<PublicationRecord>,
}

/// A page that was given up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPage {
    /// One-based page number.
    pub page: u32,

    /// Why it was dropped.
    pub reason: String,
}

/// What happened while fetching one organization.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestReport {
    /// Total records reported by the API.
    pub total_records: u64,

    /// Pages the query spans.
    pub total_pages: u32,

    /// Pages fetched successfully.
    pub fetched_pages: u32,

    /// Pages dropped after retries or errors.
    pub failed_pages: Vec<FailedPage>,

    /// Backoff waits taken across all pages.
    pub backoff_waits: u32,
}

impl HarvestReport {
    /// True when every page arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }
}

/// Pages fetched for one organization together with the fetch report.
#[derive(Debug, Clone)]
pub struct Harvest {
    /// Query that produced the pages.
    pub query: SearchQuery,

    /// Fetched pages in ascending page order; dropped pages are absent.
    pub pages: Vec<Page>,

    /// Fetch accounting.
    pub report: HarvestReport,
}

impl Harvest {
    /// Records across all pages, in page order.
    pub fn records(&self) -> impl Iterator<Item = &PublicationRecord> {
        self.pages.iter().flat_map(|page| page.records.iter())
    }

    /// Number of records fetched.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(|page| page.records.len()).sum()
    }
}

/// Normalized rows for one organization.
#[derive(Debug, Clone)]
pub struct OrganizationTable {
    /// Organization the rows belong to.
    pub organization: Organization,

    /// Flattened rows.
    pub rows: Vec<AuthorRow>,

    /// Fetch accounting.
    pub report: HarvestReport,
}

/// Result of a multi-organization run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Organizations harvested (possibly with dropped pages).
    pub tables: Vec<OrganizationTable>,

    /// Organizations whose first page failed, with the error text.
    pub failed: Vec<(Organization, String)>,
}

/// Lowercase ASCII stem: alphanumerics kept, everything else folded into `_`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = fold_diacritic(c);
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn fold_diacritic(c: char) -> char {
    match c {
        'ç' | 'Ç' => 'c',
        'ğ' | 'Ğ' => 'g',
        'ı' | 'İ' => 'i',
        'ö' | 'Ö' => 'o',
        'ş' | 'Ş' => 's',
        'ü' | 'Ü' => 'u',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_format() {
        let query = SearchQuery::new(
            Organization::new("Koc University", "Koç University"),
            YearRange::new(1900, 2030),
            50,
        );
        assert_eq!(query.expression(), "OG=\"Koc University\" AND FPY=1900-2030");
    }

    #[test]
    fn test_page_count() {
        let query = SearchQuery::new(Organization::named("X"), YearRange::new(2000, 2001), 50);
        assert_eq!(query.page_count(0, 50), 1);
        assert_eq!(query.page_count(50, 50), 1);
        assert_eq!(query.page_count(51, 50), 2);
        assert_eq!(query.page_count(120, 50), 3);
        assert_eq!(query.page_count(120, 0), 3);
    }

    #[test]
    fn test_year_range_swaps() {
        let range = YearRange::new(2030, 1900);
        assert_eq!(range.to_string(), "1900-2030");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Yaşar Üniversitesi"), "yasar_universitesi");
        assert_eq!(slugify("Universitat Internacional de Catalunya (UIC)"), "universitat_internacional_de_catalunya_uic");
        assert_eq!(Organization::named("Koç University").file_stem(), "koc_university");
    }
}
