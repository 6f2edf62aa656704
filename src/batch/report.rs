//! CSV report writer
//!
//! One file per image, only when something survived filtering. Every field
//! is double-quoted and embedded quotes are doubled; nothing else is escaped.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;

use super::filter::ReportRow;

pub const FULL_HEADER: &[&str] = &["IMAGE", "FILE", "TASK", "ERROR"];
pub const COMPACT_HEADER: &[&str] = &["FILE", "ERROR"];

/// Column layout of a report file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportLayout {
    /// IMAGE, FILE, TASK, ERROR
    #[default]
    Full,
    /// FILE, ERROR with the unsplit diagnostic
    Compact,
}

impl FromStr for ReportLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ReportLayout::Full),
            "compact" => Ok(ReportLayout::Compact),
            _ => Err(format!("Invalid report layout: {}. Valid options: full, compact", s)),
        }
    }
}

impl ReportLayout {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            ReportLayout::Full => FULL_HEADER,
            ReportLayout::Compact => COMPACT_HEADER,
        }
    }

    fn fields(&self, identifier: &str, row: &ReportRow) -> Vec<String> {
        match self {
            ReportLayout::Full => vec![
                identifier.to_string(),
                row.coordinate.real_path.clone(),
                row.task.clone().unwrap_or_default(),
                row.message.clone(),
            ],
            ReportLayout::Compact => vec![row.coordinate.real_path.clone(), row.raw_message().to_string()],
        }
    }
}

/// Quote a field, doubling embedded quotes
pub fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// One CSV line without terminator
pub fn format_record<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| quote_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Report file name for an identifier
pub fn report_file_name(identifier: &str) -> String {
    format!("unknowns-{}.csv", identifier.replace([':', '/', '\\'], "_"))
}

/// Write `rows` to `path`, or create nothing when there are no rows
///
/// A report left at `path` by an earlier run is removed first.
pub fn write_report(path: &Path, identifier: &str, layout: ReportLayout, rows: &[ReportRow]) -> io::Result<bool> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    if rows.is_empty() {
        return Ok(false);
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut out = BufWriter::new(options.open(path)?);
    writeln!(out, "{}", format_record(layout.header()))?;
    for row in rows {
        writeln!(out, "{}", format_record(&layout.fields(identifier, row)))?;
    }
    out.flush()?;

    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(true)
}

/// Writes reports into one results directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    layout: ReportLayout,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, layout: ReportLayout) -> Self {
        Self {
            dir: dir.into(),
            layout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn layout(&self) -> ReportLayout {
        self.layout
    }

    /// Create the results directory (owner-only) if it does not exist
    pub fn ensure_dir(&self) -> io::Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir)
    }

    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir.join(report_file_name(identifier))
    }

    /// Returns the report path when a file was written
    pub fn write(&self, identifier: &str, rows: &[ReportRow]) -> io::Result<Option<PathBuf>> {
        let path = self.path_for(identifier);
        let written = write_report(&path, identifier, self.layout, rows)?;
        Ok(written.then_some(path))
    }
}
