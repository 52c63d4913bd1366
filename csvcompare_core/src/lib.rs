pub mod bulk;
pub mod charset;
pub mod engine;
pub mod output;
pub mod record;
pub mod result;
pub mod scanner;
pub mod source;
pub mod visitor;

pub use bulk::{compare_directories, BulkComparator};
pub use engine::{compare, compare_source, Comparator};
pub use output::OutputWriter;
pub use record::{CellDiff, Record, NULL_CELL};
pub use result::{BulkResult, ComparisonResult, ModifiedRow, PairResult};
pub use scanner::FileScanner;
pub use source::RecordSource;
pub use visitor::{ComparisonSource, ComparisonVisitor, TracingVisitor};

pub use csvcompare_common::{
    ColumnId, ColumnSelection, CompareError, ComparisonOptions, ComparisonOptionsBuilder,
    LineSeparator, Result, ResultOptions,
};
