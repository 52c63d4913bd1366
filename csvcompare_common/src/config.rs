use crate::{CompareError, ResultOptions, DEFAULT_OUTPUT_LOCATION};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "csvcompare.toml";

/// Defaults applied by the command line tool before its own flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base directory for kept/deleted/inserted/modified output files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Whether to write output files at all
    #[serde(default = "default_true")]
    pub write_outputs: bool,

    /// Whether output files start with the header row
    #[serde(default = "default_true")]
    pub include_headers: bool,

    /// Charset label used instead of detection (e.g. "utf-8")
    #[serde(default)]
    pub charset: Option<String>,

    /// Fail on duplicate column id values in the expected file
    #[serde(default)]
    pub strict_keys: bool,

    /// Ignore patterns for bulk comparisons (e.g. "*.bak", "tmp/")
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            write_outputs: true,
            include_headers: true,
            charset: None,
            strict_keys: false,
            ignore_patterns: Vec::new(),
            portable_mode: false,
        }
    }
}

impl AppConfig {
    pub fn to_toml(&self) -> Result<String, CompareError> {
        toml::to_string_pretty(self).map_err(|e| CompareError::Serialization(e.to_string()))
    }

    pub fn result_options(&self) -> ResultOptions {
        ResultOptions::builder()
            .location(self.output_dir.clone())
            .write_outputs(self.write_outputs)
            .include_headers(self.include_headers)
            .build()
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_LOCATION)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
    pub portable: bool,
}

pub fn load_config(prefer_portable: bool) -> Result<LoadedConfig, CompareError> {
    let (path, portable) = resolve_config_path(prefer_portable)?;
    let mut loaded = load_config_from(&path)?;
    loaded.config.portable_mode = portable;
    loaded.portable = portable;
    Ok(loaded)
}

/// Load a config file from an explicit path; a missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<LoadedConfig, CompareError> {
    let exists = path.exists();

    let config = if exists {
        let data = fs::read_to_string(path).map_err(|e| CompareError::file_io(path, e))?;
        toml::from_str(&data).map_err(|e| {
            CompareError::Serialization(format!("{}: {}", path.display(), e))
        })?
    } else {
        AppConfig::default()
    };

    Ok(LoadedConfig {
        portable: config.portable_mode,
        config,
        path: path.to_path_buf(),
        exists,
    })
}

pub fn ensure_config(prefer_portable: bool) -> Result<LoadedConfig, CompareError> {
    let loaded = load_config(prefer_portable)?;
    if !loaded.exists {
        save_config(&loaded.path, &loaded.config)?;
    }
    Ok(loaded)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), CompareError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CompareError::file_io(parent, e))?;
    }

    fs::write(path, config.to_toml()?).map_err(|e| CompareError::file_io(path, e))?;
    Ok(())
}

fn resolve_config_path(prefer_portable: bool) -> Result<(PathBuf, bool), CompareError> {
    if let Some(portable_path) = portable_config_path() {
        if prefer_portable || portable_path.exists() {
            return Ok((portable_path, true));
        }
    }

    let dirs = ProjectDirs::from("", "csvcompare", "csvcompare")
        .ok_or_else(|| CompareError::Config("Unable to determine config directory".to_string()))?;
    Ok((dirs.config_dir().join(CONFIG_FILE_NAME), false))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}
