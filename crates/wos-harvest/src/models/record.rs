//! Publication record model matching the Web of Science Starter API schema.

use serde::{Deserialize, Deserializer, Serialize};

/// One page of search results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Paging metadata.
    #[serde(default)]
    pub metadata: SearchMetadata,

    /// Records on this page.
    #[serde(default)]
    pub hits: Vec<PublicationRecord>,
}

/// Paging metadata returned with every page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// Total matching records.
    #[serde(default)]
    pub total: u64,

    /// Page number echoed back.
    #[serde(default)]
    pub page: u32,

    /// Effective page size.
    #[serde(default)]
    pub limit: u32,
}

/// A publication from Web of Science.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationRecord {
    /// Unique WoS accession number (e.g. `WOS:000123456700001`).
    #[serde(default)]
    pub uid: String,

    /// Publication title.
    #[serde(default)]
    pub title: Option<String>,

    /// Document types (e.g. "Article").
    #[serde(default)]
    pub types: Vec<String>,

    /// Source types (e.g. "Journal").
    #[serde(default)]
    pub source_types: Vec<String>,

    /// Where it was published.
    #[serde(default)]
    pub source: Option<Source>,

    /// Contributor names.
    #[serde(default)]
    pub names: Option<Names>,

    /// Citation counts per citation database.
    #[serde(default)]
    pub citations: Vec<CitationEntry>,

    /// External identifiers.
    #[serde(default)]
    pub identifiers: Option<Identifiers>,

    /// Keyword lists.
    #[serde(default)]
    pub keywords: Option<Keywords>,
}

impl PublicationRecord {
    /// Authors listed on the record, empty when absent.
    #[must_use]
    pub fn authors(&self) -> &[AuthorName] {
        self.names.as_ref().map_or(&[], |n| n.authors.as_slice())
    }

    /// Primary (first) citation entry.
    #[must_use]
    pub fn primary_citation(&self) -> Option<&CitationEntry> {
        self.citations.first()
    }
}

/// Publication source block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Journal or book title.
    #[serde(default)]
    pub source_title: Option<String>,

    /// Publication year.
    #[serde(default)]
    pub publish_year: Option<i32>,

    /// Volume; the API sends strings but older dumps carry numbers.
    #[serde(default, deserialize_with = "string_or_number")]
    pub volume: Option<String>,

    /// Issue.
    #[serde(default, deserialize_with = "string_or_number")]
    pub issue: Option<String>,

    /// Page information.
    #[serde(default)]
    pub pages: Option<Pages>,
}

/// Page range block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pages {
    /// Range such as "101-115".
    #[serde(default)]
    pub range: Option<String>,
}

/// Contributor names block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Names {
    /// Authors in byline order.
    #[serde(default)]
    pub authors: Vec<AuthorName>,
}

/// One author of a publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorName {
    /// Name as printed.
    #[serde(default)]
    pub display_name: Option<String>,

    /// WoS standardized name (e.g. "Doe, J").
    #[serde(default)]
    pub wos_standard: Option<String>,

    /// ResearcherID.
    #[serde(default)]
    pub researcher_id: Option<String>,
}

/// Citation count in one citation database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationEntry {
    /// Citation database (e.g. "WOS").
    #[serde(default)]
    pub db: Option<String>,

    /// Times cited.
    #[serde(default)]
    pub count: Option<u64>,
}

/// External identifiers block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifiers {
    /// Digital Object Identifier.
    #[serde(default)]
    pub doi: Option<String>,

    /// ISSN.
    #[serde(default)]
    pub issn: Option<String>,
}

/// Keyword lists block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keywords {
    /// Keywords supplied by the authors.
    #[serde(default)]
    pub author_keywords: Vec<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
