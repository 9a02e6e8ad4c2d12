//! File sinks for the flattened table.
//!
//! Whole tables only: no appends, no partial writes. Tables larger than the
//! row ceiling are split into numbered part files.

mod json;
mod spreadsheet;

pub use json::{read_json, write_json};
pub use spreadsheet::{read_csv, write_csv};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::models::AuthorRow;

/// Stem prefix of tables holding every organization's rows.
pub const COMBINED_STEM: &str = "all_organizations";

/// Output file format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON array of rows.
    #[default]
    Json,
    /// CSV with the fixed header.
    Csv,
}

impl OutputFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Format of a table file, judged by its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Write a table as `<stem>.<ext>`, or as `<stem>_part<N>.<ext>` files of at
/// most `row_ceiling` rows each when it does not fit in one.
///
/// Returns the written paths in part order.
pub fn write_table(
    rows: &[AuthorRow],
    dir: &Path,
    stem: &str,
    format: OutputFormat,
    row_ceiling: usize,
) -> PipelineResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let ceiling = row_ceiling.max(1);

    if rows.len() <= ceiling {
        let path = dir.join(format!("{stem}.{}", format.extension()));
        write_one(rows, &path, format)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "Table written");
        return Ok(vec![path]);
    }

    tracing::warn!(rows = rows.len(), ceiling, "Table exceeds row ceiling, splitting");

    let mut paths = Vec::new();
    for (index, chunk) in rows.chunks(ceiling).enumerate() {
        let path = dir.join(format!("{stem}_part{}.{}", index + 1, format.extension()));
        write_one(chunk, &path, format)?;
        tracing::info!(path = %path.display(), rows = chunk.len(), "Part written");
        paths.push(path);
    }
    Ok(paths)
}

fn write_one(rows: &[AuthorRow], path: &Path, format: OutputFormat) -> PipelineResult<()> {
    match format {
        OutputFormat::Json => write_json(rows, path),
        OutputFormat::Csv => write_csv(rows, path),
    }
}

/// One logical table on disk: a base stem in one format, split into parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFiles {
    /// File stem without any `_part<N>` suffix.
    pub base: String,

    /// Format shared by every part.
    pub format: OutputFormat,

    /// Part files in part order.
    pub parts: Vec<PathBuf>,
}

impl TableFiles {
    /// Read every part, in order.
    pub fn read(&self) -> PipelineResult<Vec<AuthorRow>> {
        let mut rows = Vec::new();
        for path in &self.parts {
            rows.extend(read_table_file(path, self.format)?);
        }
        Ok(rows)
    }

    /// True for tables written with `--combined`.
    #[must_use]
    pub fn is_combined(&self) -> bool {
        is_variant_of(&self.base, COMBINED_STEM)
    }
}

/// Tables in `dir` whose stem starts with `stem`, sorted by base name.
///
/// A base written in both formats is listed once, as JSON.
pub fn list_tables(dir: &Path, stem: &str) -> PipelineResult<Vec<TableFiles>> {
    let mut found: BTreeMap<(String, OutputFormat), Vec<(u32, PathBuf)>> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(format) = OutputFormat::from_path(&path) else {
            continue;
        };
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !name.starts_with(stem) {
            continue;
        }
        let (base, part) = split_part(name);
        found.entry((base.to_string(), format)).or_default().push((part, path.clone()));
    }

    let mut tables: Vec<TableFiles> = Vec::with_capacity(found.len());
    for ((base, format), mut parts) in found {
        if tables.last().is_some_and(|t| t.base == base) {
            tracing::debug!(base = %base, ?format, "Skipping second format of table");
            continue;
        }
        parts.sort();
        tables.push(TableFiles { base, format, parts: parts.into_iter().map(|(_, p)| p).collect() });
    }
    Ok(tables)
}

/// Part files of every table in `dir` starting with `stem`, grouped by table
/// and in part order within each table.
pub fn table_files(dir: &Path, stem: &str) -> PipelineResult<Vec<PathBuf>> {
    Ok(list_tables(dir, stem)?.into_iter().flat_map(|t| t.parts).collect())
}

/// The newest table written under `stem`: the plain `<stem>` table or a dated
/// `<stem>_<YYYY_MM_DD>` one, dated tables winning and the latest date first.
pub fn latest_table(dir: &Path, stem: &str) -> PipelineResult<Option<TableFiles>> {
    Ok(list_tables(dir, stem)?
        .into_iter()
        .filter(|t| is_variant_of(&t.base, stem))
        .max_by(|a, b| a.base.cmp(&b.base)))
}

/// Load the tables in `dir`, grouped by the rows' organization.
///
/// Each organization is taken from a single table so that re-running `fetch`
/// into the same directory never repeats rows: its own tables come before
/// combined ones, and among those the greatest (newest dated) stem wins.
/// Unreadable tables are skipped.
pub fn load_directory(dir: &Path) -> PipelineResult<BTreeMap<String, Vec<AuthorRow>>> {
    let mut tables = list_tables(dir, "")?;
    tables.sort_by(|a, b| a.is_combined().cmp(&b.is_combined()).then_with(|| b.base.cmp(&a.base)));

    let mut by_organization: BTreeMap<String, Vec<AuthorRow>> = BTreeMap::new();
    for table in tables {
        let rows = match table.read() {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(table = %table.base, error = %err, "Skipping unreadable table");
                continue;
            }
        };
        tracing::info!(table = %table.base, rows = rows.len(), "Loaded table");

        let mut found: BTreeMap<String, Vec<AuthorRow>> = BTreeMap::new();
        for row in rows {
            found.entry(row.organization.clone()).or_default().push(row);
        }
        for (organization, rows) in found {
            by_organization.entry(organization).or_insert(rows);
        }
    }

    Ok(by_organization)
}

fn read_table_file(path: &Path, format: OutputFormat) -> PipelineResult<Vec<AuthorRow>> {
    match format {
        OutputFormat::Json => read_json(path),
        OutputFormat::Csv => read_csv(path),
    }
}

/// `name` is `stem` itself or `stem` followed by a `_`-separated date.
fn is_variant_of(name: &str, stem: &str) -> bool {
    match name.strip_prefix(stem) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('_')
            .is_some_and(|date| !date.is_empty() && date.chars().all(|c| c.is_ascii_digit() || c == '_')),
        None => false,
    }
}

/// Split `<base>_part<N>` into its base and part number; whole tables are part 0.
fn split_part(stem: &str) -> (&str, u32) {
    stem.rsplit_once("_part")
        .and_then(|(base, n)| n.parse().ok().map(|n| (base, n)))
        .unwrap_or((stem, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize, organization: &str) -> Vec<AuthorRow> {
        (0..n)
            .map(|i| AuthorRow {
                uid: format!("WOS:{i}"),
                organization: organization.to_string(),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_split_part() {
        assert_eq!(split_part("koc_university"), ("koc_university", 0));
        assert_eq!(split_part("koc_university_part2"), ("koc_university", 2));
        assert_eq!(split_part("koc_university_part10"), ("koc_university", 10));
        assert_eq!(split_part("x_partial"), ("x_partial", 0));
    }

    #[test]
    fn test_single_file_at_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_table(&rows(5, "Org"), dir.path(), "org", OutputFormat::Json, 5).unwrap();
        assert_eq!(paths, vec![dir.path().join("org.json")]);
    }

    #[test]
    fn test_split_above_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_table(&rows(11, "Org"), dir.path(), "org", OutputFormat::Json, 5).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("org_part3.json"));

        let sizes: Vec<usize> = paths.iter().map(|p| read_json(p).unwrap().len()).collect();
        assert_eq!(sizes, [5, 5, 1]);
    }

    #[test]
    fn test_table_files_orders_parts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        write_table(&rows(25, "Org"), dir.path(), "org", OutputFormat::Json, 2).unwrap();
        let files = table_files(dir.path(), "org").unwrap();
        assert_eq!(files.len(), 13);
        assert!(files[1].ends_with("org_part2.json"));
        assert!(files[12].ends_with("org_part13.json"));
    }

    #[test]
    fn test_load_directory_groups_by_organization() {
        let dir = tempfile::tempdir().unwrap();
        write_table(&rows(3, "A"), dir.path(), "a", OutputFormat::Json, 100).unwrap();
        write_table(&rows(2, "B"), dir.path(), "b", OutputFormat::Csv, 100).unwrap();
        std::fs::write(dir.path().join("broken.json"), "not json").unwrap();

        let tables = load_directory(dir.path()).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables["A"].len(), 3);
        assert_eq!(tables["B"], rows(2, "B"));
    }

    #[test]
    fn test_load_directory_takes_each_organization_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut combined = rows(3, "A");
        combined.extend(rows(2, "B"));
        write_table(&rows(3, "A"), dir.path(), "a", OutputFormat::Json, 100).unwrap();
        write_table(&rows(3, "A"), dir.path(), "a_2025_07_17", OutputFormat::Json, 2).unwrap();
        write_table(&combined, dir.path(), COMBINED_STEM, OutputFormat::Json, 100).unwrap();

        let tables = load_directory(dir.path()).unwrap();
        assert_eq!(tables["A"].len(), 3);
        assert_eq!(tables["B"].len(), 2);
    }

    #[test]
    fn test_latest_table_prefers_newest_dated_stem() {
        let dir = tempfile::tempdir().unwrap();
        write_table(&rows(1, "Org"), dir.path(), "org", OutputFormat::Json, 100).unwrap();
        write_table(&rows(2, "Org"), dir.path(), "org_2024_12_31", OutputFormat::Json, 100).unwrap();
        write_table(&rows(3, "Org"), dir.path(), "org_2025_01_02", OutputFormat::Csv, 2).unwrap();
        write_table(&rows(9, "Org"), dir.path(), "org_hospital", OutputFormat::Json, 100).unwrap();

        let table = latest_table(dir.path(), "org").unwrap().unwrap();
        assert_eq!(table.base, "org_2025_01_02");
        assert_eq!(table.format, OutputFormat::Csv);
        assert_eq!(table.parts.len(), 2);
        assert_eq!(table.read().unwrap(), rows(3, "Org"));

        assert!(latest_table(dir.path(), "other").unwrap().is_none());
    }

    #[test]
    fn test_same_table_in_both_formats_listed_once() {
        let dir = tempfile::tempdir().unwrap();
        write_table(&rows(2, "Org"), dir.path(), "org", OutputFormat::Csv, 100).unwrap();
        write_table(&rows(2, "Org"), dir.path(), "org", OutputFormat::Json, 100).unwrap();

        let tables = list_tables(dir.path(), "org").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].format, OutputFormat::Json);
    }

    #[test]
    fn test_variant_stems() {
        assert!(is_variant_of("koc_university", "koc_university"));
        assert!(is_variant_of("koc_university_2025_07_17", "koc_university"));
        assert!(!is_variant_of("koc_university_hospital", "koc_university"));
        assert!(!is_variant_of("koc_university_", "koc_university"));
        assert!(!is_variant_of("ege", "koc"));
    }
}
