//! CSV table sink (spreadsheet export).

use std::path::Path;

use crate::error::PipelineResult;
use crate::models::{AuthorRow, Column};

/// Write rows as CSV under the fixed header.
pub fn write_csv(rows: &[AuthorRow], path: &Path) -> PipelineResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(Column::ALL.iter().map(|c| c.header()))?;

    for row in rows {
        writer.write_record(
            Column::ALL.iter().map(|c| c.value(row).map(|v| guard_formula(&v)).unwrap_or_default()),
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Read rows back from a CSV written by [`write_csv`].
///
/// Columns are matched by header name; empty cells become nulls.
pub fn read_csv(path: &Path) -> PipelineResult<Vec<AuthorRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record: csv::StringRecord = record?.iter().map(unguard_formula).collect();
        rows.push(record.deserialize(Some(&headers))?);
    }
    Ok(rows)
}

const FORMULA_PREFIXES: [char; 4] = ['=', '+', '-', '@'];

/// Prefix cells a spreadsheet would evaluate as formulas.
fn guard_formula(s: &str) -> String {
    if s.starts_with(FORMULA_PREFIXES) { format!("'{s}") } else { s.to_string() }
}

fn unguard_formula(s: &str) -> &str {
    s.strip_prefix('\'').filter(|rest| rest.starts_with(FORMULA_PREFIXES)).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_formula() {
        assert_eq!(guard_formula("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(guard_formula("@cmd"), "'@cmd");
        assert_eq!(guard_formula("Plain, with comma"), "Plain, with comma");
    }

    #[test]
    fn test_unguard_formula() {
        assert_eq!(unguard_formula("'=SUM(A1)"), "=SUM(A1)");
        assert_eq!(unguard_formula("'quoted"), "'quoted");
        assert_eq!(unguard_formula("plain"), "plain");
    }

    #[test]
    fn test_read_csv_restores_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = vec![
            AuthorRow {
                uid: "WOS:1".to_string(),
                title: Some("-1 is odd, \"really\"".to_string()),
                publish_year: Some(2020),
                author_display_name: Some("Doe, Jane".to_string()),
                citation_count: 4,
                organization: "Org".to_string(),
                ..Default::default()
            },
            AuthorRow { uid: "WOS:2".to_string(), organization: "Org".to_string(), ..Default::default() },
        ];

        write_csv(&rows, &path).unwrap();
        assert_eq!(read_csv(&path).unwrap(), rows);
    }

    #[test]
    fn test_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = vec![AuthorRow {
            uid: "WOS:1".to_string(),
            title: Some("Graphs, \"quoted\"".to_string()),
            author_display_name: Some("Doe, Jane".to_string()),
            citation_count: 4,
            organization: "Org".to_string(),
            ..Default::default()
        }];

        write_csv(&rows, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), Column::ALL.len());
        assert_eq!(&headers[0], "UID");
        assert_eq!(&headers[16], "Citation Count");

        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[1], "Graphs, \"quoted\"");
        assert_eq!(&record[12], "Doe, Jane");
        assert_eq!(&record[16], "4");
        assert_eq!(&record[13], "");
    }
}
