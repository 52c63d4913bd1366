use serde::Serialize;

/// Rendering of a null cell in keys and cell differences.
pub const NULL_CELL: &str = "NULL";

/// One parsed CSV row, projected onto the selected columns.
///
/// A cell is `None` when the row has no field at that position. Equality
/// is by value, cell for cell, so a null cell only equals another null cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Record(Vec<Option<String>>);

impl Record {
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self(cells)
    }

    /// Build a record where every cell is present.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(|f| Some(f.into())).collect())
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|cell| cell.as_deref())
    }

    /// Cell value with nulls (and out-of-range positions) rendered as `NULL`
    pub fn normalized(&self, index: usize) -> &str {
        self.get(index).unwrap_or(NULL_CELL)
    }

    /// All cells, nulls rendered as `NULL`
    pub fn fields(&self) -> Vec<&str> {
        (0..self.0.len()).map(|i| self.normalized(i)).collect()
    }
}

/// A single column-level mismatch of a modified row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellDiff {
    /// Header name, or the column position when the file has no header
    pub column: String,
    pub expected: String,
    pub actual: String,
}

/// Collect the cells where `expected` and `actual` disagree.
///
/// The scan covers the header and both rows; columns past the header are
/// labelled by position.
pub fn cell_diffs(header: &[String], expected: &Record, actual: &Record) -> Vec<CellDiff> {
    let span = header.len().max(expected.len()).max(actual.len());

    let mut diffs = Vec::new();
    for index in 0..span {
        if expected.get(index) != actual.get(index) {
            let column = header
                .get(index)
                .cloned()
                .unwrap_or_else(|| index.to_string());
            diffs.push(CellDiff {
                column,
                expected: expected.normalized(index).to_string(),
                actual: actual.normalized(index).to_string(),
            });
        }
    }
    diffs
}
