use crate::engine::Comparator;
use crate::result::{BulkResult, PairResult};
use crate::scanner::FileScanner;
use crate::visitor::{ComparisonSource, ComparisonVisitor};
use csvcompare_common::{ComparisonOptions, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

type VisitorFactory = Box<dyn Fn() -> Vec<Box<dyn ComparisonVisitor>> + Send + Sync>;

/// Compare every pair of same-named files under two directories.
pub fn compare_directories(
    expected_dir: &Path,
    actual_dir: &Path,
    options: &ComparisonOptions,
) -> Result<BulkResult> {
    BulkComparator::new(options.clone()).compare(expected_dir, actual_dir)
}

/// Directory-level comparator.
///
/// Files are paired by their path relative to each root. Every pair runs
/// through its own [`Comparator`] with the shared options; files present
/// on one side only are listed in the result but not compared.
pub struct BulkComparator {
    options: ComparisonOptions,
    ignore_patterns: Vec<String>,
    follow_symlinks: bool,
    parallel: bool,
    visitors: Option<VisitorFactory>,
}

impl BulkComparator {
    pub fn new(options: ComparisonOptions) -> Self {
        Self {
            options,
            ignore_patterns: Vec::new(),
            follow_symlinks: false,
            parallel: false,
            visitors: None,
        }
    }

    /// Gitignore-style patterns excluded from both directory scans
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Follow symbolic links while scanning both directories
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.follow_symlinks = enabled;
        self
    }

    /// Compare pairs on the rayon thread pool. Without the `parallel`
    /// feature pairs are always compared sequentially.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Factory for the extra visitors attached to each pair's comparator
    pub fn visitors<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Vec<Box<dyn ComparisonVisitor>> + Send + Sync + 'static,
    {
        self.visitors = Some(Box::new(factory));
        self
    }

    pub fn options(&self) -> &ComparisonOptions {
        &self.options
    }

    pub fn compare(&self, expected_dir: &Path, actual_dir: &Path) -> Result<BulkResult> {
        let started = Instant::now();
        let scanner = FileScanner::new()
            .with_ignore_patterns(&self.ignore_patterns)
            .follow_symlinks(self.follow_symlinks);
        let expected_files: BTreeSet<PathBuf> = scanner.scan(expected_dir)?.into_iter().collect();
        let actual_files: BTreeSet<PathBuf> = scanner.scan(actual_dir)?.into_iter().collect();

        let paired: Vec<PathBuf> = expected_files.intersection(&actual_files).cloned().collect();
        let expected_only: Vec<PathBuf> =
            expected_files.difference(&actual_files).cloned().collect();
        let actual_only: Vec<PathBuf> =
            actual_files.difference(&expected_files).cloned().collect();

        info!(
            "Bulk comparison: {} pairs, {} expected only, {} actual only",
            paired.len(),
            expected_only.len(),
            actual_only.len()
        );
        for path in &expected_only {
            debug!("No actual counterpart for {:?}", path);
        }
        for path in &actual_only {
            debug!("No expected counterpart for {:?}", path);
        }

        let results = self.compare_pairs(&paired, expected_dir, actual_dir)?;
        let bulk = BulkResult::new(results, expected_only, actual_only);

        info!(
            "Bulk comparison finished in {:.3}s: {} of {} pairs differ",
            started.elapsed().as_secs_f64(),
            bulk.diff_total(),
            bulk.results().len()
        );
        Ok(bulk)
    }

    #[cfg(feature = "parallel")]
    fn compare_pairs(
        &self,
        paired: &[PathBuf],
        expected_dir: &Path,
        actual_dir: &Path,
    ) -> Result<Vec<PairResult>> {
        if self.parallel {
            paired
                .par_iter()
                .map(|relative| self.compare_pair(relative, expected_dir, actual_dir))
                .collect()
        } else {
            paired
                .iter()
                .map(|relative| self.compare_pair(relative, expected_dir, actual_dir))
                .collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn compare_pairs(
        &self,
        paired: &[PathBuf],
        expected_dir: &Path,
        actual_dir: &Path,
    ) -> Result<Vec<PairResult>> {
        if self.parallel {
            debug!("Built without the parallel feature, comparing sequentially");
        }
        paired
            .iter()
            .map(|relative| self.compare_pair(relative, expected_dir, actual_dir))
            .collect()
    }

    fn compare_pair(
        &self,
        relative: &Path,
        expected_dir: &Path,
        actual_dir: &Path,
    ) -> Result<PairResult> {
        let source = ComparisonSource::new(expected_dir.join(relative), actual_dir.join(relative));
        let mut comparator = Comparator::new(self.options.clone());
        if let Some(factory) = &self.visitors {
            for visitor in factory() {
                comparator.add_visitor(visitor);
            }
        }

        let result = comparator.compare_source(&source)?;
        Ok(PairResult {
            relative_path: relative.to_path_buf(),
            result,
        })
    }
}
