use crate::charset::{self, DecodingReader};
use crate::record::Record;
use csv::{Reader, ReaderBuilder, StringRecord};
use csvcompare_common::{
    not_in_selection, ColumnId, ColumnSelection, CompareError, ComparisonOptions, Result,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

const WITHOUT_HEADERS: &str = "CSV without headers, select column indexes instead";

/// Open a CSV file for row-by-row reading with the charset and line
/// separator from `options`. Header rows are returned as ordinary records.
pub(crate) fn open_reader(
    path: &Path,
    options: &ComparisonOptions,
) -> Result<Reader<DecodingReader<File>>> {
    let encoding = charset::resolve(path, options.charset());
    let input = charset::open(path, encoding)?;

    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true);
    if let Some(separator) = options.line_separator() {
        builder.terminator(separator.terminator());
    }
    Ok(builder.from_reader(input))
}

/// Maps raw CSV rows onto the selected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<usize>),
}

impl Projection {
    /// Build the projection for one file from its raw header row.
    pub fn new(
        selection: &ColumnSelection,
        header: Option<&StringRecord>,
        path: &Path,
    ) -> Result<Self> {
        match selection {
            ColumnSelection::All => Ok(Projection::All),
            ColumnSelection::Indexes(indexes) => Ok(Projection::Columns(indexes.clone())),
            ColumnSelection::Names(names) => {
                // An empty file has no header row and nothing to project
                let Some(header) = header else {
                    return Ok(Projection::Columns(Vec::new()));
                };

                names
                    .iter()
                    .map(|name| {
                        header.iter().position(|h| h == name).ok_or_else(|| {
                            CompareError::Config(format!(
                                "Column '{}' not found in header of {}",
                                name,
                                path.display()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Projection::Columns)
            }
        }
    }

    pub fn record(&self, raw: &StringRecord) -> Record {
        match self {
            Projection::All => Record::new(raw.iter().map(|f| Some(f.to_string())).collect()),
            Projection::Columns(indexes) => Record::new(
                indexes
                    .iter()
                    .map(|&i| raw.get(i).map(str::to_string))
                    .collect(),
            ),
        }
    }

    pub fn header(&self, raw: &StringRecord) -> Vec<String> {
        match self {
            Projection::All => raw.iter().map(str::to_string).collect(),
            Projection::Columns(indexes) => indexes
                .iter()
                .map(|&i| raw.get(i).map(str::to_string).unwrap_or_else(|| i.to_string()))
                .collect(),
        }
    }
}

/// A CSV file loaded fully into memory.
#[derive(Debug, Clone)]
pub struct RecordSource {
    path: PathBuf,
    header: Vec<String>,
    column_id: usize,
    records: Vec<Record>,
}

impl RecordSource {
    /// Parse `path` and resolve the identity column against the active
    /// column selection.
    pub fn load(path: &Path, options: &ComparisonOptions) -> Result<Self> {
        let mut reader = open_reader(path, options)?;
        let mut rows = reader.records();

        let raw_header = if options.has_headers() {
            rows.next()
                .transpose()
                .map_err(|e| CompareError::csv(path, e))?
        } else {
            None
        };

        let projection = Projection::new(options.selection(), raw_header.as_ref(), path)?;

        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|e| CompareError::csv(path, e))?;
            records.push(projection.record(&row));
        }
        let decoded_as = reader.get_ref().encoding();

        let header = raw_header
            .as_ref()
            .map(|raw| projection.header(raw))
            .unwrap_or_default();
        let raw_names: Vec<String> = raw_header
            .iter()
            .flat_map(|raw| raw.iter().map(str::to_string))
            .collect();
        let width = records
            .first()
            .map(Record::len)
            .unwrap_or(raw_names.len());

        let column_id = resolve_column_id(
            options.selection(),
            options.column_id(),
            options.has_headers(),
            &raw_names,
            width,
        )
        .map_err(|e| match e {
            CompareError::Config(msg) => {
                CompareError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        debug!(
            "Loaded {} records from {:?} as {} (column id at {})",
            records.len(),
            path,
            decoded_as.name(),
            column_id
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            column_id,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Projected header; empty when header extraction is disabled
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Position of the identity column inside projected records
    pub fn column_id(&self) -> usize {
        self.column_id
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_parts(self) -> (Vec<String>, usize, Vec<Record>) {
        (self.header, self.column_id, self.records)
    }
}

/// Resolve the identity column to a position inside projected records.
///
/// With a selection the identity must be one of the selected names or
/// indexes; without one it is looked up in the raw header (names) or in
/// `0..width` (indexes).
pub(crate) fn resolve_column_id(
    selection: &ColumnSelection,
    column_id: &ColumnId,
    has_headers: bool,
    raw_header: &[String],
    width: usize,
) -> Result<usize> {
    match (selection, column_id) {
        (ColumnSelection::Names(_), _) | (_, ColumnId::Name(_)) if !has_headers => {
            Err(CompareError::Config(WITHOUT_HEADERS.to_string()))
        }
        (ColumnSelection::Names(names), ColumnId::Name(name)) => names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| not_in_selection(column_id, names.as_slice())),
        (ColumnSelection::Indexes(indexes), ColumnId::Index(index)) => indexes
            .iter()
            .position(|i| i == index)
            .ok_or_else(|| not_in_selection(column_id, indexes.as_slice())),
        (ColumnSelection::Names(names), ColumnId::Index(_)) => {
            Err(not_in_selection(column_id, names.as_slice()))
        }
        (ColumnSelection::Indexes(indexes), ColumnId::Name(_)) => {
            Err(not_in_selection(column_id, indexes.as_slice()))
        }
        (ColumnSelection::All, ColumnId::Name(name)) => raw_header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| not_in_selection(column_id, raw_header)),
        (ColumnSelection::All, ColumnId::Index(index)) => {
            if *index < width {
                Ok(*index)
            } else {
                let all: Vec<usize> = (0..width).collect();
                Err(not_in_selection(column_id, all.as_slice()))
            }
        }
    }
}
