use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::finder::DEFAULT_THRESHOLD;
use crate::histogram::DEFAULT_BINS;
use crate::report::REPORT_FORMATS;
use crate::scanner::DEFAULT_EXTENSIONS;

/// Configuration stored in the .imgdupsrc file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FinderConfig {
    /// Pairs whose histogram difference is below this are duplicates
    #[serde(default = "default_threshold")]
    pub threshold: u64,

    /// Histogram bins per color channel (1-256)
    #[serde(default = "default_bins")]
    pub bins: usize,

    /// Number of worker threads per phase
    #[serde(default)]
    pub parallel: Option<usize>,

    /// File extensions treated as images
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Default file include patterns
    #[serde(default)]
    pub include: Vec<String>,

    /// Default file exclude patterns
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Skip files and directories whose names start with a dot
    #[serde(default)]
    pub skip_hidden: bool,

    /// Default report format
    #[serde(default = "default_format")]
    pub format: String,

    /// Whether to print the report as JSON to stdout
    #[serde(default)]
    pub json: bool,

    /// Whether to show a progress bar
    #[serde(default)]
    pub progress: bool,
}

fn default_threshold() -> u64 {
    DEFAULT_THRESHOLD
}

fn default_bins() -> usize {
    DEFAULT_BINS
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            bins: default_bins(),
            parallel: None,
            extensions: default_extensions(),
            include: Vec::new(),
            exclude: Vec::new(),
            skip_hidden: false,
            format: default_format(),
            json: false,
            progress: false,
        }
    }
}

impl FinderConfig {
    /// Get the path to the user's config file
    pub fn get_config_path() -> Result<PathBuf> {
        let path = {
            #[cfg(not(target_family = "windows"))]
            {
                // Unix-style: ~/.imgdupsrc
                let home_dir = dirs::home_dir().context("Could not determine home directory")?;
                home_dir.join(".imgdupsrc")
            }

            #[cfg(target_family = "windows")]
            {
                // %APPDATA%\imgdups\config.toml, or %USERPROFILE%\.imgdupsrc as fallback
                match dirs::config_dir() {
                    Some(config_dir) => config_dir.join("imgdups").join("config.toml"),
                    None => dirs::home_dir()
                        .context("Could not determine home directory")?
                        .join(".imgdupsrc"),
                }
            }
        };

        log::debug!("Config path: {:?}, exists: {}", path, path.exists());
        Ok(path)
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path. A missing file yields the
    /// defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: FinderConfig = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?;
                config
                    .validate()
                    .with_context(|| format!("Invalid config file: {:?}", path))?;
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read config file: {:?}", path)),
        }
    }

    /// Reject values that would only fail once a scan has finished.
    pub fn validate(&self) -> Result<()> {
        if !REPORT_FORMATS.contains(&self.format.as_str()) {
            anyhow::bail!(
                "Unsupported report format '{}', expected one of: {}",
                self.format,
                REPORT_FORMATS.join(", ")
            );
        }
        Ok(())
    }

    /// Save the configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save the configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Create a default configuration file if it doesn't exist. Returns
    /// whether a file was written.
    pub fn create_default_if_not_exists() -> Result<bool> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            return Ok(false);
        }
        Self::default().save_to_path(&config_path)?;
        Ok(true)
    }
}
