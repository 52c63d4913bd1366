use crate::{CompareError, Result};
use encoding_rs::Encoding;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default base directory for comparison output files.
pub const DEFAULT_OUTPUT_LOCATION: &str = "build/csvcompare";

/// Which columns of a CSV file take part in the comparison.
///
/// A selection projects every row, header included, onto the selected
/// columns in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSelection {
    /// Every column participates
    #[default]
    All,
    /// Columns picked by header name (requires headers)
    Names(Vec<String>),
    /// Columns picked by 0-based position
    Indexes(Vec<usize>),
}

impl ColumnSelection {
    pub fn is_all(&self) -> bool {
        matches!(self, ColumnSelection::All)
    }
}

/// The identity column whose value joins expected and actual rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnId {
    Name(String),
    Index(usize),
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnId::Name(name) => write!(f, "{}", name),
            ColumnId::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for ColumnId {
    fn from(name: &str) -> Self {
        ColumnId::Name(name.to_string())
    }
}

impl From<String> for ColumnId {
    fn from(name: String) -> Self {
        ColumnId::Name(name)
    }
}

impl From<usize> for ColumnId {
    fn from(index: usize) -> Self {
        ColumnId::Index(index)
    }
}

/// Record terminator used when reading and writing CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSeparator {
    /// `\r\n` on write; `\r`, `\n` or `\r\n` on read
    CrLf,
    /// A single terminator byte
    Byte(u8),
}

impl LineSeparator {
    /// Parse a separator such as `"\n"`, `"\r\n"` or `";"`.
    ///
    /// Shell-friendly names are accepted too: `crlf`, `lf`, `cr` and `tab`
    /// (any case), or the escapes `\r\n`, `\n`, `\r` and `\t` typed literally.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "crlf" | "\\r\\n" => return Ok(LineSeparator::CrLf),
            "lf" | "\\n" => return Ok(LineSeparator::Byte(b'\n')),
            "cr" | "\\r" => return Ok(LineSeparator::Byte(b'\r')),
            "tab" | "\\t" => return Ok(LineSeparator::Byte(b'\t')),
            _ => {}
        }

        match value.as_bytes() {
            b"\r\n" => Ok(LineSeparator::CrLf),
            [byte] if byte.is_ascii() => Ok(LineSeparator::Byte(*byte)),
            _ => Err(CompareError::Config(format!(
                "Unsupported line separator {:?}: use crlf, lf, cr, tab or one ASCII character",
                value
            ))),
        }
    }

    pub fn terminator(&self) -> csv::Terminator {
        match self {
            LineSeparator::CrLf => csv::Terminator::CRLF,
            LineSeparator::Byte(byte) => csv::Terminator::Any(*byte),
        }
    }
}

/// Controls where and how comparison output files are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultOptions {
    location: PathBuf,
    write_outputs: bool,
    include_headers: bool,
}

impl ResultOptions {
    pub fn builder() -> ResultOptionsBuilder {
        ResultOptionsBuilder::default()
    }

    /// Base directory; each comparison writes into a timestamped subdirectory
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn write_outputs(&self) -> bool {
        self.write_outputs
    }

    pub fn include_headers(&self) -> bool {
        self.include_headers
    }
}

impl Default for ResultOptions {
    fn default() -> Self {
        ResultOptionsBuilder::default().build()
    }
}

#[derive(Debug, Clone)]
pub struct ResultOptionsBuilder {
    location: PathBuf,
    write_outputs: bool,
    include_headers: bool,
}

impl Default for ResultOptionsBuilder {
    fn default() -> Self {
        Self {
            location: PathBuf::from(DEFAULT_OUTPUT_LOCATION),
            write_outputs: true,
            include_headers: true,
        }
    }
}

impl ResultOptionsBuilder {
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = location.into();
        self
    }

    pub fn write_outputs(mut self, enabled: bool) -> Self {
        self.write_outputs = enabled;
        self
    }

    pub fn include_headers(mut self, enabled: bool) -> Self {
        self.include_headers = enabled;
        self
    }

    pub fn build(self) -> ResultOptions {
        ResultOptions {
            location: self.location,
            write_outputs: self.write_outputs,
            include_headers: self.include_headers,
        }
    }
}

/// Immutable settings for one CSV comparison.
///
/// Built through [`ComparisonOptions::builder`], which rejects every
/// combination that can be judged without looking at the data.
#[derive(Debug, Clone)]
pub struct ComparisonOptions {
    charset: Option<&'static Encoding>,
    headers: bool,
    selection: ColumnSelection,
    column_id: ColumnId,
    line_separator: Option<LineSeparator>,
    strict_keys: bool,
    result_options: ResultOptions,
}

impl ComparisonOptions {
    pub fn builder() -> ComparisonOptionsBuilder {
        ComparisonOptionsBuilder::default()
    }

    /// Charset override; `None` means detect per file
    pub fn charset(&self) -> Option<&'static Encoding> {
        self.charset
    }

    /// Whether the first row of each file is a header row
    pub fn has_headers(&self) -> bool {
        self.headers
    }

    pub fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    pub fn column_id(&self) -> &ColumnId {
        &self.column_id
    }

    pub fn line_separator(&self) -> Option<LineSeparator> {
        self.line_separator
    }

    /// Whether a duplicate identity value in the expected file is an error
    pub fn strict_keys(&self) -> bool {
        self.strict_keys
    }

    pub fn result_options(&self) -> &ResultOptions {
        &self.result_options
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonOptionsBuilder {
    charset: Option<&'static Encoding>,
    charset_label: Option<String>,
    headers: bool,
    selection: ColumnSelection,
    column_id: Option<ColumnId>,
    line_separator: Option<String>,
    strict_keys: bool,
    result_options: ResultOptions,
}

impl Default for ComparisonOptionsBuilder {
    fn default() -> Self {
        Self {
            charset: None,
            charset_label: None,
            headers: true,
            selection: ColumnSelection::All,
            column_id: None,
            line_separator: None,
            strict_keys: false,
            result_options: ResultOptions::default(),
        }
    }
}

impl ComparisonOptionsBuilder {
    pub fn charset(mut self, encoding: &'static Encoding) -> Self {
        self.charset = Some(encoding);
        self.charset_label = None;
        self
    }

    /// Charset by WHATWG label (e.g. `"utf-8"`, `"windows-1252"`)
    pub fn charset_label(mut self, label: impl Into<String>) -> Self {
        self.charset_label = Some(label.into());
        self.charset = None;
        self
    }

    pub fn without_headers(mut self) -> Self {
        self.headers = false;
        self
    }

    pub fn headers(mut self, enabled: bool) -> Self {
        self.headers = enabled;
        self
    }

    pub fn select_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = ColumnSelection::Names(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn select_column_indexes<I>(mut self, indexes: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        self.selection = ColumnSelection::Indexes(indexes.into_iter().collect());
        self
    }

    pub fn column_id(mut self, column_id: impl Into<ColumnId>) -> Self {
        self.column_id = Some(column_id.into());
        self
    }

    pub fn line_separator(mut self, separator: impl Into<String>) -> Self {
        self.line_separator = Some(separator.into());
        self
    }

    pub fn strict_keys(mut self, enabled: bool) -> Self {
        self.strict_keys = enabled;
        self
    }

    pub fn result_options(mut self, options: ResultOptions) -> Self {
        self.result_options = options;
        self
    }

    pub fn build(self) -> Result<ComparisonOptions> {
        let column_id = self.column_id.ok_or_else(|| {
            CompareError::Config("A column id must be selected to match rows".to_string())
        })?;

        if let ColumnId::Name(name) = &column_id {
            if name.is_empty() {
                return Err(CompareError::Config("Column id cannot be empty".to_string()));
            }
        }

        if !self.headers
            && (matches!(self.selection, ColumnSelection::Names(_))
                || matches!(column_id, ColumnId::Name(_)))
        {
            return Err(CompareError::Config(
                "CSV without headers, select column indexes instead".to_string(),
            ));
        }

        match (&self.selection, &column_id) {
            (ColumnSelection::Names(names), _) if names.is_empty() => {
                return Err(CompareError::Config("Selected columns cannot be empty".to_string()));
            }
            (ColumnSelection::Indexes(indexes), _) if indexes.is_empty() => {
                return Err(CompareError::Config("Selected columns cannot be empty".to_string()));
            }
            (ColumnSelection::Names(names), ColumnId::Name(name)) if !names.contains(name) => {
                return Err(not_in_selection(&column_id, names.as_slice()));
            }
            (ColumnSelection::Indexes(indexes), ColumnId::Index(index))
                if !indexes.contains(index) =>
            {
                return Err(not_in_selection(&column_id, indexes.as_slice()));
            }
            (ColumnSelection::Names(names), ColumnId::Index(_)) => {
                return Err(not_in_selection(&column_id, names.as_slice()));
            }
            (ColumnSelection::Indexes(indexes), ColumnId::Name(_)) => {
                return Err(not_in_selection(&column_id, indexes.as_slice()));
            }
            _ => {}
        }

        let charset = match self.charset_label {
            Some(label) => Some(Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                CompareError::Config(format!("Unknown charset '{}'", label))
            })?),
            None => self.charset,
        };

        let line_separator = self
            .line_separator
            .as_deref()
            .map(LineSeparator::parse)
            .transpose()?;

        Ok(ComparisonOptions {
            charset,
            headers: self.headers,
            selection: self.selection,
            column_id,
            line_separator,
            strict_keys: self.strict_keys,
            result_options: self.result_options,
        })
    }
}

/// Error for an identity column outside the active column selection.
pub fn not_in_selection<T: fmt::Debug>(column_id: &ColumnId, selected: &[T]) -> CompareError {
    CompareError::Config(format!(
        "Column id '{}' is not in selected columns {:?}",
        column_id, selected
    ))
}
