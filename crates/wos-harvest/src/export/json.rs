//! JSON table sink.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::PipelineResult;
use crate::models::AuthorRow;

/// Write rows as a pretty-printed JSON array.
pub fn write_json(rows: &[AuthorRow], path: &Path) -> PipelineResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read a JSON array written by [`write_json`].
pub fn read_json(path: &Path) -> PipelineResult<Vec<AuthorRow>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
