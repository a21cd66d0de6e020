//! Configuration module for foldersync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Command-line arguments are applied on top of a loaded [`Config`] through
//! the builder.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{CompareMode, PathCase, RecordFormat, SymlinkPolicy};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for foldersync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Mirror settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory tree to mirror from. Required before the first cycle.
    pub source: Option<PathBuf>,
    /// Directory tree to mirror onto. Created if missing.
    pub replica: Option<PathBuf>,
    /// Seconds to wait between the end of one cycle and the start of the next.
    pub interval_secs: u64,
    /// How files present on both sides are compared.
    pub compare: CompareMode,
    /// How symbolic links are treated while scanning.
    pub symlinks: SymlinkPolicy,
    /// Whether relative paths are matched case-sensitively.
    pub case_sensitivity: PathCase,
}

/// Operation log and diagnostics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Diagnostic level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path of the operation log file. Required before the first cycle.
    pub file: Option<PathBuf>,
    /// Format of operation log lines.
    pub format: RecordFormat,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path`, or [`Config::default`] when no file exists there.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_if_exists(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_yaml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/foldersync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("foldersync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: None,
            replica: None,
            interval_secs: 60,
            compare: CompareMode::default(),
            symlinks: SymlinkPolicy::default(),
            case_sensitivity: PathCase::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: RecordFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Paths are checked
    /// against the filesystem, so call this after command-line overrides
    /// have been applied.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        match &self.sync.source {
            None => errors.push(ValidationError {
                field: "sync.source".into(),
                message: "is required".into(),
            }),
            Some(source) if !source.exists() => errors.push(ValidationError {
                field: "sync.source".into(),
                message: format!("directory does not exist: {}", source.display()),
            }),
            Some(source) if !source.is_dir() => errors.push(ValidationError {
                field: "sync.source".into(),
                message: format!("not a directory: {}", source.display()),
            }),
            Some(_) => {}
        }

        match &self.sync.replica {
            None => errors.push(ValidationError {
                field: "sync.replica".into(),
                message: "is required".into(),
            }),
            Some(replica) if replica.exists() && !replica.is_dir() => {
                errors.push(ValidationError {
                    field: "sync.replica".into(),
                    message: format!("not a directory: {}", replica.display()),
                })
            }
            Some(_) => {}
        }

        if let (Some(source), Some(replica)) = (&self.sync.source, &self.sync.replica) {
            let source = resolve(source);
            let replica = resolve(replica);
            if source == replica {
                errors.push(ValidationError {
                    field: "sync.replica".into(),
                    message: "must differ from sync.source".into(),
                });
            } else if replica.starts_with(&source) {
                errors.push(ValidationError {
                    field: "sync.replica".into(),
                    message: format!("is inside sync.source ({})", source.display()),
                });
            } else if source.starts_with(&replica) {
                errors.push(ValidationError {
                    field: "sync.replica".into(),
                    message: format!("contains sync.source ({})", source.display()),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.logging.file.is_none() {
            errors.push(ValidationError {
                field: "logging.file".into(),
                message: "is required".into(),
            });
        }

        errors
    }
}

/// Canonical form of `path`, resolving through the nearest existing ancestor
/// so paths that do not exist yet still compare correctly.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            resolve(parent).join(name)
        }
        _ => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] (or a loaded config) and allows selective
/// overrides.
///
/// # Example
///
/// ```rust,no_run
/// use foldersync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_source(PathBuf::from("/data/photos"))
///     .sync_replica(PathBuf::from("/backup/photos"))
///     .sync_interval_secs(300)
///     .logging_file(PathBuf::from("/var/log/foldersync.log"))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Create a builder that overrides an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn sync_source(mut self, source: PathBuf) -> Self {
        self.config.sync.source = Some(source);
        self
    }

    pub fn sync_replica(mut self, replica: PathBuf) -> Self {
        self.config.sync.replica = Some(replica);
        self
    }

    pub fn sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.interval_secs = seconds;
        self
    }

    pub fn sync_compare(mut self, mode: CompareMode) -> Self {
        self.config.sync.compare = mode;
        self
    }

    pub fn sync_symlinks(mut self, policy: SymlinkPolicy) -> Self {
        self.config.sync.symlinks = policy;
        self
    }

    pub fn sync_case_sensitivity(mut self, case: PathCase) -> Self {
        self.config.sync.case_sensitivity = case;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    pub fn logging_format(mut self, format: RecordFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
