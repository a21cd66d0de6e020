//! Command-line arguments and their merge onto the configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use foldersync_core::config::{Config, ConfigBuilder, ValidationError};
use foldersync_core::domain::{CompareMode, PathCase, RecordFormat, SymlinkPolicy};

/// Mirror SOURCE onto REPLICA every INTERVAL seconds
#[derive(Debug, Parser)]
#[command(name = "foldersync", version, about = "One-way periodic folder mirror")]
pub struct Cli {
    /// Directory tree to mirror from
    pub source: Option<PathBuf>,

    /// Directory tree to mirror onto (created if missing)
    pub replica: Option<PathBuf>,

    /// Seconds between the end of one cycle and the start of the next
    pub interval: Option<u64>,

    /// Operation log file (appended to, created if missing)
    pub log_file: Option<PathBuf>,

    /// YAML file providing defaults for any setting
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How files present on both sides are compared: metadata or checksum
    #[arg(long, value_name = "MODE")]
    pub compare: Option<CompareMode>,

    /// How symbolic links are treated: follow or skip
    #[arg(long, value_name = "POLICY")]
    pub symlinks: Option<SymlinkPolicy>,

    /// Match relative paths case-insensitively
    #[arg(long)]
    pub case_insensitive: bool,

    /// Format of the operation log: text or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<RecordFormat>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Verbose diagnostics (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not echo operation records to the console
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Loads the configuration file, if any
    ///
    /// An explicit `--config` must be readable. The default location may be
    /// absent, but a file found there must parse.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config file {}", path.display())),
            None => Self::load_default_config(&Config::default_path()),
        }
    }

    fn load_default_config(path: &Path) -> Result<Config> {
        Config::load_if_exists(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))
    }

    /// Applies the command-line values on top of `base` and validates
    pub fn resolve(&self, base: Config) -> Result<Config, Vec<ValidationError>> {
        let mut builder = ConfigBuilder::from_config(base);

        if let Some(source) = &self.source {
            builder = builder.sync_source(source.clone());
        }
        if let Some(replica) = &self.replica {
            builder = builder.sync_replica(replica.clone());
        }
        if let Some(interval) = self.interval {
            builder = builder.sync_interval_secs(interval);
        }
        if let Some(file) = &self.log_file {
            builder = builder.logging_file(file.clone());
        }
        if let Some(mode) = self.compare {
            builder = builder.sync_compare(mode);
        }
        if let Some(policy) = self.symlinks {
            builder = builder.sync_symlinks(policy);
        }
        if self.case_insensitive {
            builder = builder.sync_case_sensitivity(PathCase::Insensitive);
        }
        if let Some(format) = self.log_format {
            builder = builder.logging_format(format);
        }

        builder.build_validated()
    }

    /// Diagnostic filter directive when `RUST_LOG` is unset
    pub fn log_directive(&self, configured: &str) -> String {
        match self.verbose {
            0 => configured.to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}
