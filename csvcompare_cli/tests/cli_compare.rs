use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper struct to manage expected/actual test files
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        TestFixture {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a file with content relative to the fixture root
    fn create_file<P: AsRef<Path>>(&self, path: P, content: &str) -> PathBuf {
        let file_path = self.temp_dir.path().join(path.as_ref());

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    fn path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.temp_dir.path().join(path.as_ref())
    }

    fn arg<P: AsRef<Path>>(&self, path: P) -> String {
        self.path(path).to_string_lossy().to_string()
    }
}

/// Helper to run the CLI binary with an isolated config location
fn run_cli(args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_csvcompare");
    let config_dir = TempDir::new().expect("Failed to create config dir");
    Command::new(exe)
        .args(args)
        .env("XDG_CONFIG_HOME", config_dir.path())
        .env("APPDATA", config_dir.path())
        .env("HOME", config_dir.path())
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command")
}

fn run_cli_json(args: &[&str], expected_code: i32) -> Value {
    let output = run_cli(args);
    assert_eq!(
        output.status.code(),
        Some(expected_code),
        "unexpected status {}\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout not utf-8");
    serde_json::from_str(&stdout).expect("invalid json output")
}

#[test]
fn test_identical_files_exit_zero() {
    let fixture = TestFixture::new();
    fixture.create_file("expected.csv", "id,name\n1,Ann\n2,Ben\n");
    fixture.create_file("actual.csv", "id,name\n2,Ben\n1,Ann\n");

    let output = run_cli(&[
        "compare",
        &fixture.arg("expected.csv"),
        &fixture.arg("actual.csv"),
        "--id-name",
        "id",
        "--no-output",
    ]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Kept:      2"));
    assert!(stdout.contains("Modified:  0"));
}

#[test]
fn test_differences_exit_two_and_are_reported() {
    let fixture = TestFixture::new();
    fixture.create_file("expected.csv", "id,name\n1,Bob\n2,Ben\n");
    fixture.create_file("actual.csv", "id,name\n1,Rob\n3,Cat\n");

    let report = run_cli_json(
        &[
            "compare",
            &fixture.arg("expected.csv"),
            &fixture.arg("actual.csv"),
            "--id-index",
            "0",
            "--no-output",
            "--json",
        ],
        2,
    );

    assert_eq!(report["has_diff"], Value::Bool(true));
    assert_eq!(report["summary"]["deleted"], 1);
    assert_eq!(report["summary"]["inserted"], 1);
    assert_eq!(report["summary"]["modified"], 1);
    assert_eq!(report["deleted"][0][1], "Ben");
    assert_eq!(report["inserted"][0][0], "3");

    let diff = &report["modified"][0]["diffs"][0];
    assert_eq!(diff["column"], "name");
    assert_eq!(diff["expected"], "Bob");
    assert_eq!(diff["actual"], "Rob");
}

#[test]
fn test_output_files_are_written() {
    let fixture = TestFixture::new();
    fixture.create_file("expected.csv", "id,name\n1,Ann\n2,Ben\n");
    fixture.create_file("actual.csv", "id,name\n1,Ann\n");

    let report = run_cli_json(
        &[
            "compare",
            &fixture.arg("expected.csv"),
            &fixture.arg("actual.csv"),
            "--id-name",
            "id",
            "--output-dir",
            &fixture.arg("out"),
            "--json",
        ],
        2,
    );

    let dir = PathBuf::from(report["output_dir"].as_str().expect("output dir"));
    assert!(dir.starts_with(fixture.path("out")));
    assert_eq!(
        fs::read_to_string(dir.join("deleted.csv")).unwrap(),
        "id,name\n2,Ben\n"
    );
    assert_eq!(fs::read_to_string(dir.join("kept.csv")).unwrap(), "id,name\n1,Ann\n");
}

#[test]
fn test_bad_options_exit_one() {
    let fixture = TestFixture::new();
    fixture.create_file("expected.csv", "1,a\n");
    fixture.create_file("actual.csv", "1,a\n");

    let output = run_cli(&[
        "compare",
        &fixture.arg("expected.csv"),
        &fixture.arg("actual.csv"),
        "--id-name",
        "id",
        "--no-headers",
        "--no-output",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("select column indexes instead"));
}

#[test]
fn test_missing_file_exit_one() {
    let fixture = TestFixture::new();
    fixture.create_file("expected.csv", "id\n1\n");

    let output = run_cli(&[
        "compare",
        &fixture.arg("expected.csv"),
        &fixture.arg("missing.csv"),
        "--id-name",
        "id",
        "--no-output",
    ]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_named_line_separator_is_accepted() {
    let fixture = TestFixture::new();
    fixture.create_file("expected.csv", "id,name\r\n1,Ann\r\n2,Ben\r\n");
    fixture.create_file("actual.csv", "id,name\r\n2,Ben\r\n1,Ann\r\n");

    let output = run_cli(&[
        "compare",
        &fixture.arg("expected.csv"),
        &fixture.arg("actual.csv"),
        "--id-index",
        "0",
        "--line-separator",
        "crlf",
        "--no-output",
    ]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Kept:      2"));
}

#[test]
fn test_bulk_reports_pairs_and_unmatched_files() {
    let fixture = TestFixture::new();
    fixture.create_file("expected/a.csv", "id,v\n1,a\n");
    fixture.create_file("actual/a.csv", "id,v\n1,a\n");
    fixture.create_file("expected/b.csv", "id,v\n1,b\n");
    fixture.create_file("actual/b.csv", "id,v\n1,B\n");
    fixture.create_file("expected/sub/c.csv", "id,v\n1,c\n");
    fixture.create_file("actual/sub/c.csv", "id,v\n1,c\n");
    fixture.create_file("expected/only.csv", "id\n1\n");
    fixture.create_file("actual/notes.bak", "id\n1\n");

    let report = run_cli_json(
        &[
            "bulk",
            &fixture.arg("expected"),
            &fixture.arg("actual"),
            "--id-name",
            "id",
            "--no-output",
            "--parallel",
            "--ignore",
            "*.bak",
            "--json",
        ],
        2,
    );

    assert_eq!(report["diff_total"], 1);
    assert_eq!(report["pairs"].as_array().unwrap().len(), 3);
    assert_eq!(report["pairs"][1]["path"], "b.csv");
    assert_eq!(report["pairs"][1]["has_diff"], Value::Bool(true));
    assert_eq!(report["expected_only"][0], "only.csv");
    assert!(report["actual_only"].as_array().unwrap().is_empty());
}

#[test]
fn test_bulk_identical_directories_exit_zero() {
    let fixture = TestFixture::new();
    fixture.create_file("expected/a.csv", "id,v\n1,a\n");
    fixture.create_file("actual/a.csv", "id,v\n1,a\n");

    let output = run_cli(&[
        "bulk",
        &fixture.arg("expected"),
        &fixture.arg("actual"),
        "--id-index",
        "0",
        "--no-output",
    ]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Different:      0"));
}

#[test]
#[cfg(unix)]
fn test_bulk_follow_symlinks_flag() {
    let fixture = TestFixture::new();
    let shared = TempDir::new().expect("Failed to create target dir");
    fs::write(shared.path().join("t.csv"), "id,v\n1,a\n").unwrap();
    fixture.create_file("expected/linked/t.csv", "id,v\n1,a\n");
    fs::create_dir_all(fixture.path("actual")).unwrap();
    std::os::unix::fs::symlink(shared.path(), fixture.path("actual/linked"))
        .expect("Failed to create symlink");

    let expected = fixture.arg("expected");
    let actual = fixture.arg("actual");
    let args: [&str; 7] = [
        "bulk",
        &expected,
        &actual,
        "--id-name",
        "id",
        "--no-output",
        "--json",
    ];
    let plain = run_cli_json(&args, 0);
    assert!(plain["pairs"].as_array().unwrap().is_empty());
    assert_eq!(plain["expected_only"][0], "linked/t.csv");

    let mut followed_args = args.to_vec();
    followed_args.push("--follow-symlinks");
    let followed = run_cli_json(&followed_args, 0);
    assert_eq!(followed["pairs"].as_array().unwrap().len(), 1);
    assert!(followed["expected_only"].as_array().unwrap().is_empty());
}

#[test]
fn test_config_file_supplies_defaults() {
    let fixture = TestFixture::new();
    fixture.create_file("expected.csv", "id,name\n1,Ann\n");
    fixture.create_file("actual.csv", "id,name\n1,Ann\n");
    fixture.create_file(
        "csvcompare.toml",
        &format!(
            "output_dir = {:?}\ninclude_headers = false\n",
            fixture.arg("reports")
        ),
    );

    let report = run_cli_json(
        &[
            "compare",
            &fixture.arg("expected.csv"),
            &fixture.arg("actual.csv"),
            "--id-name",
            "id",
            "--config",
            &fixture.arg("csvcompare.toml"),
            "--json",
        ],
        0,
    );

    let dir = PathBuf::from(report["output_dir"].as_str().expect("output dir"));
    assert!(dir.starts_with(fixture.path("reports")));
    assert_eq!(fs::read_to_string(dir.join("kept.csv")).unwrap(), "1,Ann\n");
}
