//! Data models for Web of Science entities and the flattened table.
//!
//! Wire models use `#[serde(default)]` for every optional field and
//! `#[serde(rename_all = "camelCase")]` to match API naming.

mod query;
mod record;
mod row;

pub use query::{
    BatchReport, FailedPage, Harvest, HarvestReport, Organization, OrganizationTable, Page,
    SearchQuery, YearRange, slugify,
};
pub use record::{
    AuthorName, CitationEntry, Identifiers, Keywords, Names, Pages, PublicationRecord, SearchMetadata,
    SearchResponse, Source,
};
pub use row::{AuthorRow, Column};
