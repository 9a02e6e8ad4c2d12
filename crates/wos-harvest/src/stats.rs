//! Aggregates over flattened tables.
//!
//! Publication counts are always over distinct `uid`s; author rows of the
//! same publication are never double-counted.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::AuthorRow;

/// Default number of authors in a summary.
pub const DEFAULT_TOP_AUTHORS: usize = 10;

/// Number of organizations returned by a ranking.
pub const RANKING_SIZE: usize = 10;

/// Default and maximum row counts for publication queries.
pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 10_000;

/// Summary of one organization's table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Flattened rows, authors included.
    pub total_rows: usize,

    /// Distinct publications.
    pub total_publications: usize,

    /// Distinct publications per publish year. Rows without a year are skipped.
    pub by_year: BTreeMap<i32, usize>,

    /// Authors with the most distinct publications, ties broken by name.
    pub top_authors: Vec<AuthorCount>,

    /// Mean citation count over distinct publications; 0 for empty tables.
    pub average_citations: f64,
}

/// One entry of [`Summary::top_authors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub author: String,
    pub publications: usize,
}

/// One entry of an organization ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub organization: String,
    pub publications: usize,
}

/// What a ranking matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankBy {
    /// Substring of the joined author keywords.
    Keyword(String),
    /// Substring of the source title.
    Journal(String),
}

impl RankBy {
    fn matches(&self, row: &AuthorRow) -> bool {
        let (field, needle) = match self {
            Self::Keyword(term) => (row.author_keywords.as_deref(), term),
            Self::Journal(term) => (row.source_title.as_deref(), term),
        };
        field.is_some_and(|value| value.to_lowercase().contains(&needle.to_lowercase()))
    }
}

/// Summarize a table.
#[must_use]
pub fn summarize(rows: &[AuthorRow], top: usize) -> Summary {
    let mut publications: HashMap<&str, &AuthorRow> = HashMap::new();
    let mut author_uids: HashMap<&str, HashSet<&str>> = HashMap::new();

    for row in rows {
        publications.entry(row.uid.as_str()).or_insert(row);
        if let Some(name) = row.author_display_name.as_deref() {
            author_uids.entry(name).or_default().insert(row.uid.as_str());
        }
    }

    let mut by_year = BTreeMap::new();
    for row in publications.values() {
        if let Some(year) = row.publish_year {
            *by_year.entry(year).or_insert(0) += 1;
        }
    }

    let mut top_authors: Vec<AuthorCount> = author_uids
        .into_iter()
        .map(|(author, uids)| AuthorCount { author: author.to_string(), publications: uids.len() })
        .collect();
    top_authors.sort_by(|a, b| b.publications.cmp(&a.publications).then_with(|| a.author.cmp(&b.author)));
    top_authors.truncate(top);

    let average_citations = if publications.is_empty() {
        0.0
    } else {
        let total: u64 = publications.values().map(|row| row.citation_count).sum();
        total as f64 / publications.len() as f64
    };

    Summary {
        total_rows: rows.len(),
        total_publications: publications.len(),
        by_year,
        top_authors,
        average_citations,
    }
}

/// Rank organizations by distinct publications matching `by`.
///
/// Organizations with no match are left out. Ties are broken by name.
#[must_use]
pub fn rank_organizations<'a, I>(tables: I, by: &RankBy) -> Vec<Ranking>
where
    I: IntoIterator<Item = (&'a str, &'a [AuthorRow])>,
{
    let mut ranking: Vec<Ranking> = tables
        .into_iter()
        .map(|(organization, rows)| {
            let matched: HashSet<&str> =
                rows.iter().filter(|row| by.matches(row)).map(|row| row.uid.as_str()).collect();
            Ranking { organization: organization.to_string(), publications: matched.len() }
        })
        .filter(|entry| entry.publications > 0)
        .collect();

    ranking.sort_by(|a, b| {
        b.publications.cmp(&a.publications).then_with(|| a.organization.cmp(&b.organization))
    });
    ranking.truncate(RANKING_SIZE);
    ranking
}

/// Row filter for publication queries.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub year: Option<i32>,
    pub author: Option<String>,
    pub limit: Option<usize>,
}

impl RowFilter {
    /// Effective limit, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Rows matching the filter, in table order.
#[must_use]
pub fn filter_rows<'a>(rows: &'a [AuthorRow], filter: &RowFilter) -> Vec<&'a AuthorRow> {
    let author = filter.author.as_deref().map(str::to_lowercase);

    rows.iter()
        .filter(|row| filter.year.is_none_or(|year| row.publish_year == Some(year)))
        .filter(|row| author.as_deref().is_none_or(|needle| row.author_matches(needle)))
        .take(filter.limit())
        .collect()
}

/// Most frequent values of a column, for question context.
#[must_use]
pub fn top_values(rows: &[AuthorRow], column: crate::models::Column, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in rows {
        if let Some(value) = column.value(row) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let mut values: Vec<(String, usize)> = counts.into_iter().collect();
    values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    values.truncate(n);
    values
}
