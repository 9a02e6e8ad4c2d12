//! Where the service gets its tables from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::client::WosClient;
use crate::config::Config;
use crate::error::PipelineResult;
use crate::export::{COMBINED_STEM, latest_table};
use crate::models::{AuthorRow, Organization};
use crate::pipeline::{PipelineOptions, query_for, run_query};

/// Produces one organization's table.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Load the full table for `organization`.
    async fn load(&self, organization: &Organization) -> PipelineResult<Vec<AuthorRow>>;
}

/// Tables previously written by `fetch` into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl TableSource for DirectorySource {
    async fn load(&self, organization: &Organization) -> PipelineResult<Vec<AuthorRow>> {
        let dir = self.dir.clone();
        let organization = organization.clone();
        tokio::task::spawn_blocking(move || load_from_dir(&dir, &organization))
            .await
            .map_err(std::io::Error::other)?
    }
}

/// Rows for one organization from a single table.
///
/// The organization's own table (newest dated stem first) is used when present,
/// otherwise the newest combined table. Rows are then matched on the
/// `Organization` column.
fn load_from_dir(dir: &Path, organization: &Organization) -> PipelineResult<Vec<AuthorRow>> {
    let table = match latest_table(dir, &organization.file_stem())? {
        Some(table) => table,
        None => latest_table(dir, COMBINED_STEM)?.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no table files for {} in {}", organization.display_name, dir.display()),
            )
        })?,
    };

    tracing::debug!(
        organization = %organization.display_name,
        table = %table.base,
        format = ?table.format,
        parts = table.parts.len(),
        "Reading table"
    );

    let mut rows = table.read()?;
    rows.retain(|row| row.organization == organization.display_name);
    Ok(rows)
}

/// Tables harvested live from the API at load time.
#[derive(Debug, Clone)]
pub struct LiveSource {
    client: WosClient,
    config: Config,
    options: PipelineOptions,
}

impl LiveSource {
    #[must_use]
    pub const fn new(client: WosClient, config: Config, options: PipelineOptions) -> Self {
        Self { client, config, options }
    }
}

#[async_trait]
impl TableSource for LiveSource {
    async fn load(&self, organization: &Organization) -> PipelineResult<Vec<AuthorRow>> {
        let query = query_for(&self.config, organization.clone());
        let table = run_query(&self.client, &query, self.options).await?;
        if !table.report.is_complete() {
            tracing::warn!(
                organization = %organization.display_name,
                failed_pages = table.report.failed_pages.len(),
                "Serving partial table"
            );
        }
        Ok(table.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{OutputFormat, write_table};

    fn rows(organization: &str, n: usize) -> Vec<AuthorRow> {
        (0..n)
            .map(|i| AuthorRow {
                uid: format!("WOS:{i}"),
                organization: organization.to_string(),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_directory_source_reads_parts() {
        let dir = tempfile::tempdir().unwrap();
        let org = Organization::new("Koc University", "Koç University");
        write_table(&rows("Koç University", 5), dir.path(), &org.file_stem(), OutputFormat::Json, 2)
            .unwrap();

        let loaded = DirectorySource::new(dir.path()).load(&org).await.unwrap();
        assert_eq!(loaded.len(), 5);
    }

    #[tokio::test]
    async fn test_directory_source_filters_foreign_rows() {
        let dir = tempfile::tempdir().unwrap();
        let org = Organization::named("Ege University");
        let mut mixed = rows("Ege University", 2);
        mixed.extend(rows("Ege University Hospital", 3));
        write_table(&mixed, dir.path(), "ege_university_2024_01_01", OutputFormat::Json, 100).unwrap();

        let loaded = DirectorySource::new(dir.path()).load(&org).await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_directory_source_reads_combined_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut combined = rows("A", 2);
        combined.extend(rows("B", 4));
        write_table(&combined, dir.path(), COMBINED_STEM, OutputFormat::Json, 100).unwrap();

        let loaded = DirectorySource::new(dir.path()).load(&Organization::named("B")).await.unwrap();
        assert_eq!(loaded.len(), 4);
    }

    #[tokio::test]
    async fn test_directory_source_reads_one_table_per_organization() {
        let dir = tempfile::tempdir().unwrap();
        let org = Organization::new("Koc University", "Koç University");
        let table = rows("Koç University", 3);
        write_table(&table, dir.path(), &org.file_stem(), OutputFormat::Json, 100).unwrap();
        write_table(&table, dir.path(), COMBINED_STEM, OutputFormat::Json, 100).unwrap();
        write_table(&table, dir.path(), "koc_university_2025_07_17", OutputFormat::Json, 2).unwrap();

        let loaded = DirectorySource::new(dir.path()).load(&org).await.unwrap();
        assert_eq!(loaded, table);
    }

    #[tokio::test]
    async fn test_directory_source_reads_csv_tables() {
        let dir = tempfile::tempdir().unwrap();
        let org = Organization::named("Ege University");
        write_table(&rows("Ege University", 4), dir.path(), &org.file_stem(), OutputFormat::Csv, 3).unwrap();

        let loaded = DirectorySource::new(dir.path()).load(&org).await.unwrap();
        assert_eq!(loaded, rows("Ege University", 4));
    }

    #[tokio::test]
    async fn test_directory_source_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let result = DirectorySource::new(dir.path()).load(&Organization::named("Nowhere")).await;
        assert!(result.is_err());
    }
}
