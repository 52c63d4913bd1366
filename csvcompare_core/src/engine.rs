use crate::output::OutputWriter;
use crate::record::{cell_diffs, Record};
use crate::result::{ComparisonResult, ResultCollector};
use crate::source::{open_reader, Projection, RecordSource};
use crate::visitor::{ComparisonSource, ComparisonVisitor};
use csvcompare_common::{CompareError, ComparisonOptions, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compare two CSV files with the default visitors.
///
/// Output files are written when `options` asks for them.
pub fn compare(
    expected: &Path,
    actual: &Path,
    options: &ComparisonOptions,
) -> Result<ComparisonResult> {
    compare_source(&ComparisonSource::new(expected, actual), options)
}

/// Compare a pre-built expected/actual pair with the default visitors.
pub fn compare_source(
    source: &ComparisonSource,
    options: &ComparisonOptions,
) -> Result<ComparisonResult> {
    Comparator::new(options.clone()).compare_source(source)
}

/// Registered visitors, the built-in output writer first.
struct VisitorChain<'a> {
    output: Option<OutputWriter>,
    visitors: Vec<Box<dyn ComparisonVisitor + 'a>>,
}

impl<'a> VisitorChain<'a> {
    fn each<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut dyn ComparisonVisitor) -> Result<()>,
    {
        if let Some(output) = self.output.as_mut() {
            f(output)?;
        }
        for visitor in self.visitors.iter_mut() {
            f(visitor.as_mut())?;
        }
        Ok(())
    }
}

/// Hash-join engine comparing an expected CSV file with an actual one.
///
/// The expected file is loaded into a key → row map; the actual file is
/// then streamed row by row. Each actual row is inserted, kept or
/// modified; expected rows left in the map afterwards are deleted.
pub struct Comparator<'a> {
    options: ComparisonOptions,
    chain: VisitorChain<'a>,
}

impl<'a> Comparator<'a> {
    /// Engine with the output writer registered when the options ask for
    /// output files.
    pub fn new(options: ComparisonOptions) -> Self {
        let output = if options.result_options().write_outputs() {
            Some(OutputWriter::new())
        } else {
            None
        };
        Self {
            options,
            chain: VisitorChain {
                output,
                visitors: Vec::new(),
            },
        }
    }

    /// Register a visitor; visitors run in registration order.
    pub fn with_visitor<V>(mut self, visitor: V) -> Self
    where
        V: ComparisonVisitor + 'a,
    {
        self.chain.visitors.push(Box::new(visitor));
        self
    }

    pub fn add_visitor(&mut self, visitor: Box<dyn ComparisonVisitor + 'a>) {
        self.chain.visitors.push(visitor);
    }

    pub fn options(&self) -> &ComparisonOptions {
        &self.options
    }

    pub fn compare(&mut self, expected: &Path, actual: &Path) -> Result<ComparisonResult> {
        self.compare_source(&ComparisonSource::new(expected, actual))
    }

    pub fn compare_source(&mut self, source: &ComparisonSource) -> Result<ComparisonResult> {
        let started = Instant::now();
        debug!("Expected CSV file: {:?}", source.expected());
        debug!("Actual CSV file: {:?}", source.actual());

        let outcome = self.run(source);

        info!(
            "CSV comparison of {:?} finished in {:.3}s",
            source.actual(),
            started.elapsed().as_secs_f64()
        );
        outcome
    }

    fn run(&mut self, source: &ComparisonSource) -> Result<ComparisonResult> {
        let options = &self.options;
        let chain = &mut self.chain;

        chain.each(|v| v.comparison_started(options, source))?;

        let expected = RecordSource::load(source.expected(), options)?;
        let (header, column_id, records) = expected.into_parts();

        // key -> (position in expected file, row)
        let mut expected_rows: HashMap<String, (usize, Record)> =
            HashMap::with_capacity(records.len());
        for (position, record) in records.into_iter().enumerate() {
            let key = record.normalized(column_id).to_string();
            if expected_rows.contains_key(&key) {
                if options.strict_keys() {
                    return Err(CompareError::DuplicateKey {
                        path: source.expected().to_path_buf(),
                        key,
                    });
                }
                warn!(
                    "Duplicate column id value '{}' in {:?}, keeping the last row",
                    key,
                    source.expected()
                );
            }
            expected_rows.insert(key, (position, record));
        }

        let mut collector = ResultCollector::default();
        let actual_path = source.actual();
        let mut reader = open_reader(actual_path, options)?;
        let mut rows = reader.records();

        let projection = if options.has_headers() {
            let raw_header = rows
                .next()
                .transpose()
                .map_err(|e| CompareError::csv(actual_path, e))?;
            Projection::new(options.selection(), raw_header.as_ref(), actual_path)?
        } else {
            Projection::new(options.selection(), None, actual_path)?
        };

        for row in rows {
            let row = row.map_err(|e| CompareError::csv(actual_path, e))?;
            let actual = projection.record(&row);
            let key = actual.normalized(column_id);

            match expected_rows.remove(key) {
                None => {
                    chain.each(|v| v.row_inserted(options, &header, &actual))?;
                    collector.row_inserted(actual);
                }
                Some((_, expected)) if expected == actual => {
                    chain.each(|v| v.row_kept(options, &header, &actual))?;
                    collector.row_kept(actual);
                }
                Some((_, expected)) => {
                    let diffs = cell_diffs(&header, &expected, &actual);
                    chain.each(|v| v.row_modified(options, &header, &actual, &diffs))?;
                    collector.row_modified(actual, diffs);
                }
            }
        }

        let mut remaining: Vec<(usize, Record)> = expected_rows.into_values().collect();
        remaining.sort_unstable_by_key(|(position, _)| *position);
        for (_, expected) in remaining {
            chain.each(|v| v.row_deleted(options, &header, &expected))?;
            collector.row_deleted(expected);
        }

        let output_dir = chain
            .output
            .as_ref()
            .and_then(|output| output.output_dir())
            .map(Path::to_path_buf);
        let result = collector.finish(source.expected(), actual_path, header, output_dir);

        chain.each(|v| v.comparison_finished(options, source, &result))?;
        debug!(
            "Comparison result for {:?}: has_diff={}",
            actual_path,
            result.has_diff()
        );
        Ok(result)
    }
}
