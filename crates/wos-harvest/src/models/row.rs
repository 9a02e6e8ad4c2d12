//! Flattened (publication × author) row.

use serde::{Deserialize, Serialize};

/// One output row per (publication, author) pair.
///
/// Field names serialize to the fixed spreadsheet header so JSON and CSV
/// sinks share one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRow {
    #[serde(rename = "UID")]
    pub uid: String,

    #[serde(rename = "Title")]
    pub title: Option<String>,

    #[serde(rename = "Document Type")]
    pub document_type: Option<String>,

    #[serde(rename = "Source Type")]
    pub source_type: Option<String>,

    #[serde(rename = "Source Title")]
    pub source_title: Option<String>,

    #[serde(rename = "Publish Year")]
    pub publish_year: Option<i32>,

    #[serde(rename = "Volume")]
    pub volume: Option<String>,

    #[serde(rename = "Issue")]
    pub issue: Option<String>,

    #[serde(rename = "Pages")]
    pub pages: Option<String>,

    #[serde(rename = "DOI")]
    pub doi: Option<String>,

    #[serde(rename = "ISSN")]
    pub issn: Option<String>,

    /// Author keywords joined with `", "`.
    #[serde(rename = "Author Keywords")]
    pub author_keywords: Option<String>,

    #[serde(rename = "Author Display Name")]
    pub author_display_name: Option<String>,

    #[serde(rename = "Author WoS Standard")]
    pub author_wos_standard: Option<String>,

    #[serde(rename = "Author Researcher ID")]
    pub author_researcher_id: Option<String>,

    #[serde(rename = "Citation DB")]
    pub citation_db: Option<String>,

    /// Times cited in the primary citation database; 0 when unknown.
    #[serde(rename = "Citation Count", default)]
    pub citation_count: u64,

    #[serde(rename = "Organization")]
    pub organization: String,
}

impl AuthorRow {
    /// True when the row stands in for a publication without authors.
    #[must_use]
    pub const fn is_authorless(&self) -> bool {
        self.author_display_name.is_none()
            && self.author_wos_standard.is_none()
            && self.author_researcher_id.is_none()
    }

    /// Case-insensitive substring match on display and standardized name.
    #[must_use]
    pub fn author_matches(&self, needle_lower: &str) -> bool {
        [&self.author_display_name, &self.author_wos_standard]
            .into_iter()
            .flatten()
            .any(|name| name.to_lowercase().contains(needle_lower))
    }
}

/// Columns of the flattened table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Uid,
    Title,
    DocumentType,
    SourceType,
    SourceTitle,
    PublishYear,
    Volume,
    Issue,
    Pages,
    Doi,
    Issn,
    AuthorKeywords,
    AuthorDisplayName,
    AuthorWosStandard,
    AuthorResearcherId,
    CitationDb,
    CitationCount,
    Organization,
}

impl Column {
    /// Every column in header order.
    pub const ALL: [Self; 18] = [
        Self::Uid,
        Self::Title,
        Self::DocumentType,
        Self::SourceType,
        Self::SourceTitle,
        Self::PublishYear,
        Self::Volume,
        Self::Issue,
        Self::Pages,
        Self::Doi,
        Self::Issn,
        Self::AuthorKeywords,
        Self::AuthorDisplayName,
        Self::AuthorWosStandard,
        Self::AuthorResearcherId,
        Self::CitationDb,
        Self::CitationCount,
        Self::Organization,
    ];

    /// Header text as written by the sinks.
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Uid => "UID",
            Self::Title => "Title",
            Self::DocumentType => "Document Type",
            Self::SourceType => "Source Type",
            Self::SourceTitle => "Source Title",
            Self::PublishYear => "Publish Year",
            Self::Volume => "Volume",
            Self::Issue => "Issue",
            Self::Pages => "Pages",
            Self::Doi => "DOI",
            Self::Issn => "ISSN",
            Self::AuthorKeywords => "Author Keywords",
            Self::AuthorDisplayName => "Author Display Name",
            Self::AuthorWosStandard => "Author WoS Standard",
            Self::AuthorResearcherId => "Author Researcher ID",
            Self::CitationDb => "Citation DB",
            Self::CitationCount => "Citation Count",
            Self::Organization => "Organization",
        }
    }

    /// Cell value rendered as text.
    #[must_use]
    pub fn value(self, row: &AuthorRow) -> Option<String> {
        match self {
            Self::Uid => Some(row.uid.clone()),
            Self::Title => row.title.clone(),
            Self::DocumentType => row.document_type.clone(),
            Self::SourceType => row.source_type.clone(),
            Self::SourceTitle => row.source_title.clone(),
            Self::PublishYear => row.publish_year.map(|y| y.to_string()),
            Self::Volume => row.volume.clone(),
            Self::Issue => row.issue.clone(),
            Self::Pages => row.pages.clone(),
            Self::Doi => row.doi.clone(),
            Self::Issn => row.issn.clone(),
            Self::AuthorKeywords => row.author_keywords.clone(),
            Self::AuthorDisplayName => row.author_display_name.clone(),
            Self::AuthorWosStandard => row.author_wos_standard.clone(),
            Self::AuthorResearcherId => row.author_researcher_id.clone(),
            Self::CitationDb => row.citation_db.clone(),
            Self::CitationCount => Some(row.citation_count.to_string()),
            Self::Organization => Some(row.organization.clone()),
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.header())
    }
}
