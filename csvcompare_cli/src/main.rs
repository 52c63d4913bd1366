use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use csvcompare_common::{
    ensure_config, load_config, load_config_from, save_config, AppConfig, ComparisonOptions,
    LoadedConfig,
};
use csvcompare_core::{
    BulkComparator, BulkResult, Comparator, ComparisonResult, ComparisonSource, ComparisonVisitor,
    ModifiedRow, Record, TracingVisitor,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit code when the compared files differ
const EXIT_DIFF: i32 = 2;

#[derive(Parser)]
#[command(name = "csvcompare")]
#[command(author = "CsvCompare Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Key-based comparison of CSV files and directories", long_about = None)]
struct Cli {
    /// Read defaults from this config file instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare an expected CSV file with an actual one
    Compare {
        /// Expected CSV file
        expected: PathBuf,

        /// Actual CSV file
        actual: PathBuf,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Compare every same-named CSV file under two directories
    Bulk {
        /// Directory of expected CSV files
        expected_dir: PathBuf,

        /// Directory of actual CSV files
        actual_dir: PathBuf,

        #[command(flatten)]
        options: OptionArgs,

        /// Compare file pairs in parallel
        #[arg(short, long)]
        parallel: bool,

        /// Ignore patterns (can be specified multiple times)
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Follow symbolic links
        #[arg(short = 'L', long)]
        follow_symlinks: bool,
    },

    /// Show the active configuration file
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,

        /// Keep the config file next to the executable
        #[arg(long)]
        portable: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct OptionArgs {
    /// Name of the column identifying a row
    #[arg(long, conflicts_with = "id_index", required_unless_present = "id_index")]
    id_name: Option<String>,

    /// Position of the column identifying a row
    #[arg(long)]
    id_index: Option<usize>,

    /// Compare only these columns, by name (comma separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "column_indexes")]
    columns: Vec<String>,

    /// Compare only these columns, by position (comma separated)
    #[arg(long, value_delimiter = ',')]
    column_indexes: Vec<usize>,

    /// Treat the first row as data rather than a header
    #[arg(long)]
    no_headers: bool,

    /// Charset of the input files, detected when omitted (e.g. "windows-1252")
    #[arg(long)]
    charset: Option<String>,

    /// Record terminator: crlf, lf, cr, tab or a single character such as ";"
    #[arg(long)]
    line_separator: Option<String>,

    /// Base directory for output files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not write kept/deleted/inserted/modified files
    #[arg(long)]
    no_output: bool,

    /// Do not write the header row into output files
    #[arg(long)]
    no_output_headers: bool,

    /// Fail on duplicate row ids in the expected file
    #[arg(long)]
    strict: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    // Initialize tracing to stderr (so JSON output can go cleanly to stdout)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Compare {
            expected,
            actual,
            options,
        } => run_compare(cli.config.as_deref(), &expected, &actual, &options),
        Commands::Bulk {
            expected_dir,
            actual_dir,
            options,
            parallel,
            ignore,
            follow_symlinks,
        } => run_bulk(
            cli.config.as_deref(),
            &expected_dir,
            &actual_dir,
            &options,
            parallel,
            ignore,
            follow_symlinks,
        ),
        Commands::Config { init, portable } => {
            run_config(cli.config.as_deref(), init, portable).map(|()| false)
        }
    };

    match outcome {
        Ok(false) => {}
        Ok(true) => std::process::exit(EXIT_DIFF),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn load(config_path: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let loaded = match config_path {
        Some(path) => load_config_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => load_config(false).context("Failed to load config")?,
    };
    if loaded.exists {
        info!("Using config file: {}", loaded.path.display());
    }
    Ok(loaded)
}

/// Merge command line flags over the config file defaults.
fn build_options(args: &OptionArgs, config: &AppConfig) -> anyhow::Result<ComparisonOptions> {
    let mut defaults = config.clone();
    if let Some(dir) = &args.output_dir {
        defaults.output_dir = dir.clone();
    }
    defaults.write_outputs &= !args.no_output;
    defaults.include_headers &= !args.no_output_headers;
    let result_options = defaults.result_options();

    let mut builder = ComparisonOptions::builder()
        .headers(!args.no_headers)
        .strict_keys(args.strict || config.strict_keys)
        .result_options(result_options);

    if let Some(name) = &args.id_name {
        builder = builder.column_id(name.as_str());
    } else if let Some(index) = args.id_index {
        builder = builder.column_id(index);
    }

    if !args.columns.is_empty() {
        builder = builder.select_columns(args.columns.iter().cloned());
    } else if !args.column_indexes.is_empty() {
        builder = builder.select_column_indexes(args.column_indexes.iter().copied());
    }

    if let Some(charset) = args.charset.as_ref().or(config.charset.as_ref()) {
        builder = builder.charset_label(charset.clone());
    }
    if let Some(separator) = &args.line_separator {
        builder = builder.line_separator(separator.clone());
    }

    builder.build().context("Invalid comparison options")
}

fn run_compare(
    config_path: Option<&Path>,
    expected: &Path,
    actual: &Path,
    args: &OptionArgs,
) -> anyhow::Result<bool> {
    let loaded = load(config_path)?;
    let options = build_options(args, &loaded.config)?;

    let result = Comparator::new(options)
        .with_visitor(TracingVisitor::new())
        .compare(expected, actual)
        .with_context(|| {
            format!(
                "Comparison of {} with {} failed",
                expected.display(),
                actual.display()
            )
        })?;

    if args.json {
        let report = build_compare_report(&result);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_compare_summary(&result);
    }

    Ok(result.has_diff())
}

fn run_bulk(
    config_path: Option<&Path>,
    expected_dir: &Path,
    actual_dir: &Path,
    args: &OptionArgs,
    parallel: bool,
    ignore_patterns: Vec<String>,
    follow_symlinks: bool,
) -> anyhow::Result<bool> {
    let loaded = load(config_path)?;
    let options = build_options(args, &loaded.config)?;

    let mut patterns = loaded.config.ignore_patterns.clone();
    patterns.extend(ignore_patterns);

    info!("Comparing:");
    info!("  Expected: {}", expected_dir.display());
    info!("  Actual:   {}", actual_dir.display());

    let progress = (!args.json && std::io::stderr().is_terminal()).then(create_spinner);
    let mut comparator = BulkComparator::new(options)
        .ignore_patterns(patterns)
        .follow_symlinks(follow_symlinks)
        .parallel(parallel);
    if let Some(pb) = &progress {
        let pb = pb.clone();
        comparator = comparator.visitors(move || {
            vec![Box::new(ProgressVisitor { pb: pb.clone() }) as Box<dyn ComparisonVisitor>]
        });
    }

    let outcome = comparator.compare(expected_dir, actual_dir);
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let bulk = outcome.with_context(|| {
        format!(
            "Bulk comparison of {} with {} failed",
            expected_dir.display(),
            actual_dir.display()
        )
    })?;

    if args.json {
        let report = build_bulk_report(expected_dir, actual_dir, &bulk);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_bulk_summary(&bulk);
    }

    Ok(bulk.has_diff())
}

fn run_config(config_path: Option<&Path>, init: bool, portable: bool) -> anyhow::Result<()> {
    let loaded = match config_path {
        Some(path) => {
            let loaded = load(config_path)?;
            if init && !loaded.exists {
                save_config(path, &loaded.config).context("Failed to write config")?;
            }
            loaded
        }
        None if init => ensure_config(portable).context("Failed to write config")?,
        None => load_config(portable).context("Failed to load config")?,
    };

    println!("Config file: {}", loaded.path.display());
    if !loaded.exists && !init {
        println!("(not created yet, using defaults)");
    }
    println!();
    print!("{}", loaded.config.to_toml()?);
    Ok(())
}

/// Ticks the bulk spinner once per finished file pair
struct ProgressVisitor {
    pb: ProgressBar,
}

impl ComparisonVisitor for ProgressVisitor {
    fn comparison_finished(
        &mut self,
        _options: &ComparisonOptions,
        source: &ComparisonSource,
        _result: &ComparisonResult,
    ) -> csvcompare_core::Result<()> {
        self.pb.inc(1);
        self.pb.set_message(source.actual().display().to_string());
        Ok(())
    }
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {pos} compared {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_compare_summary(result: &ComparisonResult) {
    println!("\n{}", "=".repeat(80));
    println!("Comparison Results");
    println!("{}", "=".repeat(80));
    println!("Expected: {}", result.expected().display());
    println!("Actual:   {}", result.actual().display());

    for row in result.deleted() {
        println!("  -  {}", row.fields().join(","));
    }
    for row in result.inserted() {
        println!("  +  {}", row.fields().join(","));
    }
    for modified in result.modified() {
        println!("  ~  {}", modified.record.fields().join(","));
        for diff in &modified.diffs {
            println!("       {}: {} -> {}", diff.column, diff.expected, diff.actual);
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("Summary:");
    println!("  Kept:      {}", result.kept().len());
    println!("  Deleted:   {}", result.deleted().len());
    println!("  Inserted:  {}", result.inserted().len());
    println!("  Modified:  {}", result.modified().len());
    if let Some(dir) = result.output_dir() {
        println!("  Output:    {}", dir.display());
    }
    println!("{}", "=".repeat(80));
}

fn print_bulk_summary(bulk: &BulkResult) {
    println!("\n{}", "=".repeat(80));
    println!("Bulk Comparison Results");
    println!("{}", "=".repeat(80));

    for pair in bulk.results() {
        let status = if pair.result.has_diff() { "  !=  " } else { "  ==  " };
        println!("{} {}", status, pair.relative_path.display());
    }
    for path in bulk.expected_only() {
        println!("  <<   {}", path.display());
    }
    for path in bulk.actual_only() {
        println!("  >>   {}", path.display());
    }

    println!("\n{}", "=".repeat(80));
    println!("Summary:");
    println!("  Compared:       {}", bulk.results().len());
    println!("  Different:      {}", bulk.diff_total());
    println!("  Expected only:  {}", bulk.expected_only().len());
    println!("  Actual only:    {}", bulk.actual_only().len());
    println!("{}", "=".repeat(80));
}

#[derive(Serialize)]
struct JsonCompareReport<'a> {
    expected: String,
    actual: String,
    has_diff: bool,
    summary: JsonSummary,
    output_dir: Option<String>,
    deleted: &'a [Record],
    inserted: &'a [Record],
    modified: &'a [ModifiedRow],
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct JsonSummary {
    kept: usize,
    deleted: usize,
    inserted: usize,
    modified: usize,
}

#[derive(Serialize)]
struct JsonBulkReport {
    expected_dir: String,
    actual_dir: String,
    has_diff: bool,
    diff_total: usize,
    pairs: Vec<JsonPair>,
    expected_only: Vec<String>,
    actual_only: Vec<String>,
}

#[derive(Serialize)]
struct JsonPair {
    path: String,
    has_diff: bool,
    summary: JsonSummary,
    output_dir: Option<String>,
}

fn summary_of(result: &ComparisonResult) -> JsonSummary {
    JsonSummary {
        kept: result.kept().len(),
        deleted: result.deleted().len(),
        inserted: result.inserted().len(),
        modified: result.modified().len(),
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn build_compare_report(result: &ComparisonResult) -> JsonCompareReport<'_> {
    JsonCompareReport {
        expected: display_path(result.expected()),
        actual: display_path(result.actual()),
        has_diff: result.has_diff(),
        summary: summary_of(result),
        output_dir: result.output_dir().map(display_path),
        deleted: result.deleted(),
        inserted: result.inserted(),
        modified: result.modified(),
    }
}

fn build_bulk_report(expected_dir: &Path, actual_dir: &Path, bulk: &BulkResult) -> JsonBulkReport {
    JsonBulkReport {
        expected_dir: display_path(expected_dir),
        actual_dir: display_path(actual_dir),
        has_diff: bulk.has_diff(),
        diff_total: bulk.diff_total(),
        pairs: bulk
            .results()
            .iter()
            .map(|pair| JsonPair {
                path: display_path(&pair.relative_path),
                has_diff: pair.result.has_diff(),
                summary: summary_of(&pair.result),
                output_dir: pair.result.output_dir().map(display_path),
            })
            .collect(),
        expected_only: bulk.expected_only().iter().map(|p| display_path(p)).collect(),
        actual_only: bulk.actual_only().iter().map(|p| display_path(p)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csvcompare_common::{ColumnId, ColumnSelection};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn option_args(cli: Cli) -> OptionArgs {
        match cli.command {
            Commands::Compare { options, .. } | Commands::Bulk { options, .. } => options,
            Commands::Config { .. } => panic!("expected a comparison command"),
        }
    }

    #[test]
    fn test_compare_requires_a_column_id() {
        assert!(Cli::try_parse_from(["csvcompare", "compare", "a.csv", "b.csv"]).is_err());
        assert!(Cli::try_parse_from([
            "csvcompare", "compare", "a.csv", "b.csv", "--id-name", "id", "--id-index", "0",
        ])
        .is_err());
    }

    #[test]
    fn test_name_and_index_selection_conflict() {
        assert!(Cli::try_parse_from([
            "csvcompare",
            "compare",
            "a.csv",
            "b.csv",
            "--id-index",
            "0",
            "--columns",
            "id",
            "--column-indexes",
            "0",
        ])
        .is_err());
    }

    #[test]
    fn test_build_options_from_flags() {
        let args = option_args(parse(&[
            "csvcompare",
            "compare",
            "a.csv",
            "b.csv",
            "--id-name",
            "id",
            "--columns",
            "id,name",
            "--output-dir",
            "/tmp/out",
            "--no-output-headers",
            "--strict",
            "--charset",
            "latin1",
        ]));

        let options = build_options(&args, &AppConfig::default()).unwrap();
        assert_eq!(options.column_id(), &ColumnId::Name("id".to_string()));
        assert_eq!(
            options.selection(),
            &ColumnSelection::Names(vec!["id".to_string(), "name".to_string()])
        );
        assert!(options.strict_keys());
        assert_eq!(options.result_options().location(), Path::new("/tmp/out"));
        assert!(options.result_options().write_outputs());
        assert!(!options.result_options().include_headers());
        assert_eq!(options.charset().map(|c| c.name()), Some("windows-1252"));
    }

    #[test]
    fn test_config_supplies_defaults() {
        let args = option_args(parse(&[
            "csvcompare", "bulk", "exp", "act", "--id-index", "1", "--no-headers",
        ]));
        let config = AppConfig {
            output_dir: PathBuf::from("reports"),
            write_outputs: false,
            strict_keys: true,
            charset: Some("utf-8".to_string()),
            ..AppConfig::default()
        };

        let options = build_options(&args, &config).unwrap();
        assert_eq!(options.column_id(), &ColumnId::Index(1));
        assert!(!options.has_headers());
        assert!(options.strict_keys());
        assert_eq!(options.result_options().location(), Path::new("reports"));
        assert!(!options.result_options().write_outputs());
        assert_eq!(options.result_options(), &config.result_options());
        assert_eq!(options.charset().map(|c| c.name()), Some("UTF-8"));
    }

    #[test]
    fn test_invalid_combination_is_reported() {
        let args = option_args(parse(&[
            "csvcompare", "compare", "a.csv", "b.csv", "--id-name", "id", "--no-headers",
        ]));
        let err = build_options(&args, &AppConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("select column indexes instead"));
    }

    #[test]
    fn test_bulk_flags() {
        let cli = parse(&[
            "csvcompare", "bulk", "exp", "act", "--id-index", "0", "-p", "-i", "*.bak", "-i",
            "tmp/", "-L",
        ]);
        match cli.command {
            Commands::Bulk {
                parallel,
                ignore,
                follow_symlinks,
                ..
            } => {
                assert!(parallel);
                assert!(follow_symlinks);
                assert_eq!(ignore, vec!["*.bak".to_string(), "tmp/".to_string()]);
            }
            _ => panic!("expected bulk command"),
        }
    }
}
