//! Flatten publication records into one row per (publication, author).
//!
//! Multi-valued fields follow a single policy:
//! - singleton-typed lists (`types`, `sourceTypes`) keep their first element;
//! - keyword lists (`keywords.authorKeywords`) are joined with `", "`.
//!
//! A record without authors still yields exactly one row, with the three
//! author columns empty, so it is counted in every aggregate.

use std::collections::HashSet;

use crate::models::{AuthorName, AuthorRow, Page, PublicationRecord};

/// Separator for joined keyword lists.
pub const KEYWORD_SEPARATOR: &str = ", ";

/// Flatten records in order, tagging every row with `organization`.
#[must_use]
pub fn normalize(records: &[PublicationRecord], organization: &str) -> Vec<AuthorRow> {
    let mut rows = Vec::with_capacity(records.len() * 4);
    for record in records {
        rows.extend(normalize_record(record, organization));
    }
    rows
}

/// Flatten fetched pages in page order.
#[must_use]
pub fn normalize_pages(pages: &[Page], organization: &str) -> Vec<AuthorRow> {
    let mut rows = Vec::with_capacity(pages.iter().map(|p| p.records.len()).sum::<usize>() * 4);
    for page in pages {
        rows.extend(normalize(&page.records, organization));
    }
    rows
}

/// Flatten one record: one row per author, or one author-less row.
#[must_use]
pub fn normalize_record(record: &PublicationRecord, organization: &str) -> Vec<AuthorRow> {
    let base = publication_row(record, organization);
    let authors = record.authors();

    if authors.is_empty() {
        return vec![base];
    }

    authors.iter().map(|author| with_author(&base, author)).collect()
}

/// Drop repeated (uid, author display name) pairs, keeping the first occurrence.
#[must_use]
pub fn dedupe_rows(rows: Vec<AuthorRow>) -> Vec<AuthorRow> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert((row.uid.clone(), row.author_display_name.clone())))
        .collect()
}

fn publication_row(record: &PublicationRecord, organization: &str) -> AuthorRow {
    let source = record.source.as_ref();
    let citation = record.primary_citation();

    AuthorRow {
        uid: record.uid.clone(),
        title: record.title.clone(),
        document_type: first_of(&record.types),
        source_type: first_of(&record.source_types),
        source_title: source.and_then(|s| s.source_title.clone()),
        publish_year: source.and_then(|s| s.publish_year),
        volume: source.and_then(|s| s.volume.clone()),
        issue: source.and_then(|s| s.issue.clone()),
        pages: source.and_then(|s| s.pages.as_ref()).and_then(|p| p.range.clone()),
        doi: record.identifiers.as_ref().and_then(|i| i.doi.clone()),
        issn: record.identifiers.as_ref().and_then(|i| i.issn.clone()),
        author_keywords: record
            .keywords
            .as_ref()
            .and_then(|k| join_non_empty(&k.author_keywords)),
        author_display_name: None,
        author_wos_standard: None,
        author_researcher_id: None,
        citation_db: citation.and_then(|c| c.db.clone()),
        citation_count: citation.and_then(|c| c.count).unwrap_or(0),
        organization: organization.to_string(),
    }
}

fn with_author(base: &AuthorRow, author: &AuthorName) -> AuthorRow {
    AuthorRow {
        author_display_name: author.display_name.clone(),
        author_wos_standard: author.wos_standard.clone(),
        author_researcher_id: author.researcher_id.clone(),
        ..base.clone()
    }
}

fn first_of(values: &[String]) -> Option<String> {
    values.first().cloned()
}

fn join_non_empty(values: &[String]) -> Option<String> {
    let parts: Vec<&str> =
        values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).collect();
    if parts.is_empty() { None } else { Some(parts.join(KEYWORD_SEPARATOR)) }
}
