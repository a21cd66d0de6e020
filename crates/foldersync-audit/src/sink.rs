//! Log sink adapters
//!
//! Implementations of [`ILogSink`] for the destinations the binary and the
//! tests need: an append-only file, stdout, a fan-out over several sinks and
//! an in-memory buffer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use foldersync_core::ports::{ILogSink, SinkError};

// ============================================================================
// FileLogSink
// ============================================================================

/// Appends lines to a file, creating it if missing
///
/// Every line is flushed before `append_line` returns.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Opens `path` for appending
    ///
    /// # Errors
    /// Returns `SinkError::Io` if the file cannot be created or opened for
    /// writing. The binary treats this as a fatal startup error.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }
}

impl ILogSink for FileLogSink {
    fn append_line(&self, line: &str) -> Result<(), SinkError> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| SinkError::Closed(format!("{} lock poisoned", self.path.display())))?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }
}

// ============================================================================
// ConsoleLogSink
// ============================================================================

/// Writes lines to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLogSink;

impl ILogSink for ConsoleLogSink {
    fn append_line(&self, line: &str) -> Result<(), SinkError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

// ============================================================================
// FanOutSink
// ============================================================================

/// Forwards every line to each inner sink in order
///
/// All sinks are attempted even if one fails; the first error is returned.
#[derive(Clone)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn ILogSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Arc<dyn ILogSink>>) -> Self {
        Self { sinks }
    }
}

impl ILogSink for FanOutSink {
    fn append_line(&self, line: &str) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.append_line(line) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// MemoryLogSink
// ============================================================================

/// Collects lines in memory
///
/// Can be configured to start failing after a number of lines, to exercise
/// fatal sink handling.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
    fail_after: Option<usize>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that accepts `n` lines and rejects every line after that
    pub fn failing_after(n: usize) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            fail_after: Some(n),
        }
    }

    /// Snapshot of the lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ILogSink for MemoryLogSink {
    fn append_line(&self, line: &str) -> Result<(), SinkError> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| SinkError::Closed("memory sink lock poisoned".into()))?;
        if let Some(limit) = self.fail_after {
            if lines.len() >= limit {
                return Err(SinkError::Closed(format!("memory sink full after {limit} lines")));
            }
        }
        lines.push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sync.log");

        let sink = FileLogSink::open(&path).unwrap();
        sink.append_line("first").unwrap();
        sink.append_line("second").unwrap();
        drop(sink);

        // Reopening appends instead of truncating
        let sink = FileLogSink::open(&path).unwrap();
        sink.append_line("third").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\nthird\n");
    }

    #[test]
    fn test_file_sink_open_fails_for_missing_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let result = FileLogSink::open(&tmp.path().join("missing").join("sync.log"));
        assert!(matches!(result, Err(SinkError::Io(_))));
    }

    #[test]
    fn test_fan_out_writes_to_all() {
        let a = Arc::new(MemoryLogSink::new());
        let b = Arc::new(MemoryLogSink::new());
        let fan = FanOutSink::new(vec![a.clone(), b.clone()]);

        fan.append_line("hello").unwrap();

        assert_eq!(a.lines(), vec!["hello"]);
        assert_eq!(b.lines(), vec!["hello"]);
    }

    #[test]
    fn test_fan_out_attempts_every_sink_and_reports_failure() {
        let broken = Arc::new(MemoryLogSink::failing_after(0));
        let healthy = Arc::new(MemoryLogSink::new());
        let fan = FanOutSink::new(vec![broken.clone(), healthy.clone()]);

        assert!(fan.append_line("line").is_err());
        assert_eq!(healthy.lines(), vec!["line"]);
        assert!(broken.lines().is_empty());
    }

    #[test]
    fn test_memory_sink_failing_after() {
        let sink = MemoryLogSink::failing_after(2);
        sink.append_line("1").unwrap();
        sink.append_line("2").unwrap();
        assert!(matches!(sink.append_line("3"), Err(SinkError::Closed(_))));
        assert_eq!(sink.lines().len(), 2);
    }
}
