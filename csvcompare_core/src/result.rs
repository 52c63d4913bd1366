use crate::record::{CellDiff, Record};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A row present on both sides with at least one differing cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedRow {
    /// The row as found in the actual file
    pub record: Record,
    pub diffs: Vec<CellDiff>,
}

/// Outcome of comparing one expected file with one actual file.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    expected: PathBuf,
    actual: PathBuf,
    header: Vec<String>,
    has_deleted: bool,
    has_inserted: bool,
    has_modified: bool,
    kept: Vec<Record>,
    deleted: Vec<Record>,
    inserted: Vec<Record>,
    modified: Vec<ModifiedRow>,
    output_dir: Option<PathBuf>,
}

impl ComparisonResult {
    pub fn expected(&self) -> &Path {
        &self.expected
    }

    pub fn actual(&self) -> &Path {
        &self.actual
    }

    /// Header of the expected file, projected onto the selected columns
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn has_deleted(&self) -> bool {
        self.has_deleted
    }

    pub fn has_inserted(&self) -> bool {
        self.has_inserted
    }

    pub fn has_modified(&self) -> bool {
        self.has_modified
    }

    pub fn has_diff(&self) -> bool {
        self.has_deleted || self.has_inserted || self.has_modified
    }

    /// Actual rows identical to their expected counterpart, in actual-file order
    pub fn kept(&self) -> &[Record] {
        &self.kept
    }

    /// Expected rows never matched, in expected-file order
    pub fn deleted(&self) -> &[Record] {
        &self.deleted
    }

    /// Actual rows whose key is unknown to the expected file
    pub fn inserted(&self) -> &[Record] {
        &self.inserted
    }

    pub fn modified(&self) -> &[ModifiedRow] {
        &self.modified
    }

    /// Directory holding the output files, if any were written
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
}

/// Accumulates classified rows during a comparison.
///
/// Driven by the engine alongside the visitors; the only way out is the
/// immutable [`ComparisonResult`] returned by [`ResultCollector::finish`].
#[derive(Debug, Default)]
pub(crate) struct ResultCollector {
    has_deleted: bool,
    has_inserted: bool,
    has_modified: bool,
    kept: Vec<Record>,
    deleted: Vec<Record>,
    inserted: Vec<Record>,
    modified: Vec<ModifiedRow>,
}

impl ResultCollector {
    pub(crate) fn row_kept(&mut self, row: Record) {
        self.kept.push(row);
    }

    pub(crate) fn row_deleted(&mut self, row: Record) {
        self.has_deleted = true;
        self.deleted.push(row);
    }

    pub(crate) fn row_inserted(&mut self, row: Record) {
        self.has_inserted = true;
        self.inserted.push(row);
    }

    pub(crate) fn row_modified(&mut self, row: Record, diffs: Vec<CellDiff>) {
        self.has_modified = true;
        self.modified.push(ModifiedRow { record: row, diffs });
    }

    pub(crate) fn finish(
        self,
        expected: &Path,
        actual: &Path,
        header: Vec<String>,
        output_dir: Option<PathBuf>,
    ) -> ComparisonResult {
        ComparisonResult {
            expected: expected.to_path_buf(),
            actual: actual.to_path_buf(),
            header,
            has_deleted: self.has_deleted,
            has_inserted: self.has_inserted,
            has_modified: self.has_modified,
            kept: self.kept,
            deleted: self.deleted,
            inserted: self.inserted,
            modified: self.modified,
            output_dir,
        }
    }
}

/// Result for one file pair of a bulk comparison.
#[derive(Debug, Clone, Serialize)]
pub struct PairResult {
    /// Path shared by both files relative to their directory
    pub relative_path: PathBuf,
    pub result: ComparisonResult,
}

/// Outcome of comparing two directories of CSV files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkResult {
    results: Vec<PairResult>,
    expected_only: Vec<PathBuf>,
    actual_only: Vec<PathBuf>,
}

impl BulkResult {
    pub(crate) fn new(
        results: Vec<PairResult>,
        expected_only: Vec<PathBuf>,
        actual_only: Vec<PathBuf>,
    ) -> Self {
        Self {
            results,
            expected_only,
            actual_only,
        }
    }

    /// Whether at least one file pair differs
    pub fn has_diff(&self) -> bool {
        self.diff_total() > 0
    }

    /// Number of file pairs that differ
    pub fn diff_total(&self) -> usize {
        self.results.iter().filter(|pair| pair.result.has_diff()).count()
    }

    /// Every compared pair, sorted by relative path
    pub fn results(&self) -> &[PairResult] {
        &self.results
    }

    /// Files found only under the expected directory (not compared)
    pub fn expected_only(&self) -> &[PathBuf] {
        &self.expected_only
    }

    /// Files found only under the actual directory (not compared)
    pub fn actual_only(&self) -> &[PathBuf] {
        &self.actual_only
    }
}
