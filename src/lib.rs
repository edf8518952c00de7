// src/lib.rs

pub mod cancel;
pub mod commands;
pub mod config;
pub mod error;
pub mod finder;
pub mod grouping;
pub mod histogram;
pub mod progress;
pub mod record;
pub mod report;
pub mod scanner;
pub mod scorer;

pub use cancel::CancelToken;
pub use error::{DecodeError, FinderError, HistogramError};
pub use finder::{find, DuplicateFinder, FindResult, FinderOptions, DEFAULT_THRESHOLD};
pub use grouping::Group;
pub use histogram::{BinCount, Channel, Histogram};
pub use progress::{ChannelProgress, NoProgress, Phase, ProgressSink, ProgressUpdate};
pub use record::{ImageRecord, PairScore};

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::FinderConfig;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// The directory to scan for similar images.
    pub directory: PathBuf,

    /// Histogram difference below which two images count as duplicates.
    #[clap(
        short,
        long,
        help = "Group images whose histogram difference is below this value (default: 10000000)"
    )]
    pub threshold: Option<u64>,

    /// Number of histogram bins per color channel.
    #[clap(long, help = "Histogram bins per color channel, 1-256 (default: 256)")]
    pub bins: Option<usize>,

    /// Number of parallel threads per phase. Defaults to auto-detected number of cores.
    #[clap(short, long, help = "Number of parallel threads (default: auto)")]
    pub parallel: Option<usize>,

    /// File extensions to treat as images.
    #[clap(
        long = "ext",
        value_delimiter = ',',
        help = "Image file extensions, comma-separated (default: jpg,jpeg)"
    )]
    pub extensions: Vec<String>,

    /// Include files matching the given glob pattern. Can be specified multiple times.
    #[clap(long, help = "Include specific file patterns (glob)")]
    pub include: Vec<String>,

    /// Exclude files matching the given glob pattern. Can be specified multiple times.
    #[clap(long, help = "Exclude specific file patterns (glob)")]
    pub exclude: Vec<String>,

    #[clap(long, help = "Skip files and directories whose names start with a dot")]
    pub skip_hidden: bool,

    /// Write a file containing the duplicate groups.
    #[clap(short, long, help = "Write the duplicate report to a file (e.g., duplicates.json)")]
    pub output: Option<PathBuf>,

    /// Output format for the report file.
    #[clap(short, long, value_parser = clap::builder::PossibleValuesParser::new(["json", "toml"]), help = "Format for the output file [json|toml]")]
    pub format: Option<String>,

    /// Print the report as JSON to stdout instead of the human-readable listing.
    #[clap(long, help = "Output results in JSON format to stdout")]
    pub json: bool,

    /// Show a progress bar while histograms are created and compared.
    #[clap(long, help = "Show a progress bar during the scan")]
    pub progress: bool,

    /// Verbosity level.
    #[clap(short, long, action = clap::ArgAction::Count, help = "Verbosity level (-v, -vv, -vvv)")]
    pub verbose: u8,

    /// Write log output to a file.
    #[clap(short, long, help = "Enable logging to a file (default: imgdups.log)")]
    pub log: bool,

    /// Specify a custom log file path.
    #[clap(long, value_name = "PATH", help = "Specify a custom log file path")]
    pub log_file: Option<PathBuf>,

    /// Path to a custom config file. If provided, overrides the default ~/.imgdupsrc file.
    #[clap(long, help = "Path to a custom config file (overrides the default ~/.imgdupsrc)")]
    pub config_file: Option<PathBuf>,
}

impl Cli {
    /// Parse the process arguments and fill unset options from the config file.
    pub fn with_config() -> anyhow::Result<Self> {
        let mut cli = Self::parse();
        cli.load_config()?;
        Ok(cli)
    }

    /// Like [`Cli::with_config`], for an explicit argument list.
    pub fn try_with_config_from<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cli = Self::try_parse_from(args)?;
        cli.load_config()?;
        Ok(cli)
    }

    fn load_config(&mut self) -> anyhow::Result<()> {
        let config = match &self.config_file {
            Some(config_path) => FinderConfig::load_from_path(config_path)?,
            None => {
                let config = FinderConfig::load()?;
                // Only create a config file at the default location
                if let Err(e) = FinderConfig::create_default_if_not_exists() {
                    log::debug!("Could not create default config file: {}", e);
                }
                config
            }
        };
        self.apply_config(config);
        Ok(())
    }

    /// Apply config values to arguments that weren't given on the command line
    pub fn apply_config(&mut self, config: FinderConfig) {
        if self.threshold.is_none() {
            self.threshold = Some(config.threshold);
        }

        if self.bins.is_none() {
            self.bins = Some(config.bins);
        }

        if self.parallel.is_none() {
            self.parallel = config.parallel;
        }

        if self.extensions.is_empty() {
            self.extensions = config.extensions;
        }

        if self.include.is_empty() && !config.include.is_empty() {
            self.include = config.include;
        }

        if self.exclude.is_empty() && !config.exclude.is_empty() {
            self.exclude = config.exclude;
        }

        // Booleans can only be switched on by the config, never off
        self.skip_hidden |= config.skip_hidden;
        self.json |= config.json;
        self.progress |= config.progress;

        if self.format.is_none() {
            self.format = Some(config.format);
        }
    }

    /// Options for the duplicate search, with defaults for anything unset.
    pub fn finder_options(&self) -> FinderOptions {
        let defaults = FinderOptions::default();
        FinderOptions {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            bins: self.bins.unwrap_or(defaults.bins),
            parallel: self.parallel,
            extensions: if self.extensions.is_empty() {
                defaults.extensions
            } else {
                self.extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_string())
                    .collect()
            },
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            skip_hidden: self.skip_hidden,
        }
    }

    pub fn output_format(&self) -> &str {
        self.format.as_deref().unwrap_or("json")
    }
}
