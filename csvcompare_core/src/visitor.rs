use crate::record::{CellDiff, Record};
use crate::result::ComparisonResult;
use csvcompare_common::{ComparisonOptions, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// The pair of files handed to one comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonSource {
    expected: PathBuf,
    actual: PathBuf,
}

impl ComparisonSource {
    pub fn new(expected: impl Into<PathBuf>, actual: impl Into<PathBuf>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn expected(&self) -> &Path {
        &self.expected
    }

    pub fn actual(&self) -> &Path {
        &self.actual
    }
}

/// Observer of a comparison's lifecycle and row classifications.
///
/// Every hook defaults to a no-op. Visitors run synchronously in
/// registration order; an `Err` from any hook aborts the comparison.
pub trait ComparisonVisitor {
    fn comparison_started(
        &mut self,
        _options: &ComparisonOptions,
        _source: &ComparisonSource,
    ) -> Result<()> {
        Ok(())
    }

    fn row_kept(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        _row: &Record,
    ) -> Result<()> {
        Ok(())
    }

    fn row_deleted(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        _row: &Record,
    ) -> Result<()> {
        Ok(())
    }

    fn row_inserted(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        _row: &Record,
    ) -> Result<()> {
        Ok(())
    }

    /// `diffs` lists the differing cells in column order.
    fn row_modified(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        _row: &Record,
        _diffs: &[CellDiff],
    ) -> Result<()> {
        Ok(())
    }

    fn comparison_finished(
        &mut self,
        _options: &ComparisonOptions,
        _source: &ComparisonSource,
        _result: &ComparisonResult,
    ) -> Result<()> {
        Ok(())
    }
}

impl<V: ComparisonVisitor + ?Sized> ComparisonVisitor for &mut V {
    fn comparison_started(
        &mut self,
        options: &ComparisonOptions,
        source: &ComparisonSource,
    ) -> Result<()> {
        (**self).comparison_started(options, source)
    }

    fn row_kept(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        (**self).row_kept(options, header, row)
    }

    fn row_deleted(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        (**self).row_deleted(options, header, row)
    }

    fn row_inserted(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        (**self).row_inserted(options, header, row)
    }

    fn row_modified(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
        diffs: &[CellDiff],
    ) -> Result<()> {
        (**self).row_modified(options, header, row, diffs)
    }

    fn comparison_finished(
        &mut self,
        options: &ComparisonOptions,
        source: &ComparisonSource,
        result: &ComparisonResult,
    ) -> Result<()> {
        (**self).comparison_finished(options, source, result)
    }
}

impl<V: ComparisonVisitor + ?Sized> ComparisonVisitor for Box<V> {
    fn comparison_started(
        &mut self,
        options: &ComparisonOptions,
        source: &ComparisonSource,
    ) -> Result<()> {
        (**self).comparison_started(options, source)
    }

    fn row_kept(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        (**self).row_kept(options, header, row)
    }

    fn row_deleted(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        (**self).row_deleted(options, header, row)
    }

    fn row_inserted(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
    ) -> Result<()> {
        (**self).row_inserted(options, header, row)
    }

    fn row_modified(
        &mut self,
        options: &ComparisonOptions,
        header: &[String],
        row: &Record,
        diffs: &[CellDiff],
    ) -> Result<()> {
        (**self).row_modified(options, header, row, diffs)
    }

    fn comparison_finished(
        &mut self,
        options: &ComparisonOptions,
        source: &ComparisonSource,
        result: &ComparisonResult,
    ) -> Result<()> {
        (**self).comparison_finished(options, source, result)
    }
}

/// Visitor that reports every comparison event through `tracing`.
#[derive(Debug, Default)]
pub struct TracingVisitor;

impl TracingVisitor {
    pub fn new() -> Self {
        Self
    }
}

impl ComparisonVisitor for TracingVisitor {
    fn comparison_started(
        &mut self,
        options: &ComparisonOptions,
        source: &ComparisonSource,
    ) -> Result<()> {
        info!("Expected CSV: {}", source.expected().display());
        info!("Actual CSV:   {}", source.actual().display());
        debug!(
            "Column id: {}, headers: {}, selection: {:?}, charset: {}",
            options.column_id(),
            options.has_headers(),
            options.selection(),
            options.charset().map_or("auto", |c| c.name())
        );
        Ok(())
    }

    fn row_kept(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        row: &Record,
    ) -> Result<()> {
        trace!("Kept {:?}", row.fields());
        Ok(())
    }

    fn row_deleted(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        row: &Record,
    ) -> Result<()> {
        debug!("Deleted {:?}", row.fields());
        Ok(())
    }

    fn row_inserted(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        row: &Record,
    ) -> Result<()> {
        debug!("Inserted {:?}", row.fields());
        Ok(())
    }

    fn row_modified(
        &mut self,
        _options: &ComparisonOptions,
        _header: &[String],
        row: &Record,
        diffs: &[CellDiff],
    ) -> Result<()> {
        debug!("Modified {:?}", row.fields());
        for diff in diffs {
            debug!("  {}: {:?} -> {:?}", diff.column, diff.expected, diff.actual);
        }
        Ok(())
    }

    fn comparison_finished(
        &mut self,
        _options: &ComparisonOptions,
        _source: &ComparisonSource,
        result: &ComparisonResult,
    ) -> Result<()> {
        info!(
            "Kept: {}, deleted: {}, inserted: {}, modified: {}",
            result.kept().len(),
            result.deleted().len(),
            result.inserted().len(),
            result.modified().len()
        );
        Ok(())
    }
}
