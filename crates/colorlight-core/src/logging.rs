//! Logging configuration
//!
//! Describes where and how verbosely the binaries log. The subscriber itself is
//! installed by the binary crate; this module only owns the settings and the
//! log-directory housekeeping.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level name (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Log to stderr
    pub console_output: bool,
    /// Log to a file in `log_directory`
    pub file_output: bool,
    /// Directory for log files
    pub log_directory: PathBuf,
    /// Number of log files kept by [`LogConfig::cleanup_old_logs`]
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_directory: PathBuf::from("logs"),
            max_log_files: 10,
        }
    }
}

const LOG_FILE_PREFIX: &str = "colorlight_";
const LOG_FILE_EXTENSION: &str = "log";

impl LogConfig {
    /// Parsed level, falling back to INFO for unknown names
    pub fn parse_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }

    /// Create the log directory if needed
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        fs::create_dir_all(&self.log_directory)
    }

    /// Path of the log file for this session
    pub fn current_log_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        self.log_directory
            .join(format!("{}{}.{}", LOG_FILE_PREFIX, stamp, LOG_FILE_EXTENSION))
    }

    /// Delete the oldest log files beyond `max_log_files`.
    ///
    /// Returns the number of files removed.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_directory.exists() {
            return Ok(0);
        }

        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_log_file(path))
            .collect();

        if logs.len() <= self.max_log_files {
            return Ok(0);
        }

        // Timestamped names sort chronologically
        logs.sort();
        let excess = logs.len() - self.max_log_files;
        for path in &logs[..excess] {
            fs::remove_file(path)?;
        }
        Ok(excess)
    }
}

fn is_log_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX));
    let ext_matches = path.extension().and_then(|e| e.to_str()) == Some(LOG_FILE_EXTENSION);
    name_matches && ext_matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_fallback() {
        let mut config = LogConfig::default();
        assert_eq!(config.parse_level(), LevelFilter::INFO);

        config.level = "debug".to_string();
        assert_eq!(config.parse_level(), LevelFilter::DEBUG);

        config.level = "chatty".to_string();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_directory: dir.path().to_path_buf(),
            max_log_files: 2,
            ..LogConfig::default()
        };

        for stamp in ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"] {
            fs::write(dir.path().join(format!("colorlight_{}.log", stamp)), "x").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(config.cleanup_old_logs().unwrap(), 2);
        assert!(!dir.path().join("colorlight_2024-01-01.log").exists());
        assert!(dir.path().join("colorlight_2024-01-04.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_current_log_path_is_inside_directory() {
        let config = LogConfig::default();
        let path = config.current_log_path();
        assert!(path.starts_with("logs"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("log"));
    }
}
