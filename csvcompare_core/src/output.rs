use crate::record::{CellDiff, Record};
use crate::result::ComparisonResult;
use crate::visitor::{ComparisonSource, ComparisonVisitor};
use chrono::Local;
use csv::{Writer, WriterBuilder};
use csvcompare_common::{CompareError, ComparisonOptions, Result};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Row category, one output file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Kept,
    Deleted,
    Inserted,
    Modified,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Kept,
        Category::Deleted,
        Category::Inserted,
        Category::Modified,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Category::Kept => "kept.csv",
            Category::Deleted => "deleted.csv",
            Category::Inserted => "inserted.csv",
            Category::Modified => "modified.csv",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Visitor that writes each row category to its own CSV file.
///
/// Every comparison gets a fresh `<location>/<timestamp>/` directory.
/// Files are opened on the first row of their category and closed when
/// the comparison finishes. Null cells are written as empty fields.
#[derive(Debug, Default)]
pub struct OutputWriter {
    dir: Option<PathBuf>,
    writers: [Option<Writer<File>>; 4],
}

impl OutputWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory of the current (or last) comparison
    pub fn output_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn write_row(
        &mut self,
        category: Category,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        let dir = self.dir.as_deref().ok_or_else(|| {
            CompareError::Visitor("Output writer used before comparison started".to_string())
        })?;
        let path = dir.join(category.file_name());
        let slot = &mut self.writers[category.slot()];

        if slot.is_none() {
            let mut builder = WriterBuilder::new();
            builder.flexible(true);
            if let Some(separator) = options.line_separator() {
                builder.terminator(separator.terminator());
            }
            let mut writer = builder
                .from_path(&path)
                .map_err(|e| CompareError::csv(&path, e))?;

            if options.result_options().include_headers() && !header.is_empty() {
                writer
                    .write_record(header)
                    .map_err(|e| CompareError::csv(&path, e))?;
            }
            debug!("Opened output file {:?}", path);
            *slot = Some(writer);
        }

        if let Some(writer) = slot.as_mut() {
            writer
                .write_record(row.cells().iter().map(|cell| cell.as_deref().unwrap_or("")))
                .map_err(|e| CompareError::csv(&path, e))?;
        }
        Ok(())
    }

    fn close_all(&mut self) -> Result<()> {
        for category in Category::ALL {
            if let Some(mut writer) = self.writers[category.slot()].take() {
                writer.flush().map_err(|e| {
                    let dir = self.dir.as_deref().unwrap_or_else(|| Path::new(""));
                    CompareError::file_io(dir.join(category.file_name()), e)
                })?;
            }
        }
        Ok(())
    }
}

/// Create a fresh timestamped directory under `location`.
///
/// A numeric suffix is added when another run already claimed the same
/// millisecond.
pub fn create_timestamped_dir(location: &Path) -> Result<PathBuf> {
    fs::create_dir_all(location).map_err(|e| CompareError::file_io(location, e))?;
    let stamp = Local::now().format("%Y%m%d.%H%M%S%.3f").to_string();

    let mut attempt = 0usize;
    loop {
        let name = if attempt == 0 {
            stamp.clone()
        } else {
            format!("{}-{}", stamp, attempt)
        };
        let candidate = location.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(CompareError::file_io(&candidate, e)),
        }
    }
}

impl ComparisonVisitor for OutputWriter {
    fn comparison_started(
        &mut self,
        options: &ComparisonOptions,
        _source: &ComparisonSource,
    ) -> Result<()> {
        self.close_all()?;
        let dir = create_timestamped_dir(options.result_options().location())?;
        debug!("Writing comparison output to {:?}", dir);
        self.dir = Some(dir);
        Ok(())
    }

    fn row_kept(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        self.write_row(Category::Kept, options, header, row)
    }

    fn row_deleted(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        self.write_row(Category::Deleted, options, header, row)
    }

    fn row_inserted(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        self.write_row(Category::Inserted, options, header, row)
    }

    fn row_modified(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
        _diffs: &[CellDiff],
    ) -> Result<()> {
        self.write_row(Category::Modified, options, header, row)
    }

    fn comparison_finished(
        &mut self,
        _options: &ComparisonOptions,
        _source: &ComparisonSource,
        _result: &ComparisonResult,
    ) -> Result<()> {
        self.close_all()
    }
}
