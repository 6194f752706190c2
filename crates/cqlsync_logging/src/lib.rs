//! Shared logging setup for cqlsync binaries.
//!
//! Console output always goes to stderr. With a log directory configured, a
//! second layer appends plain text to `<dir>/<app>.log`.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "cqlsync=info,cqlsync_controller=info,cqlsync_db=info";
const VERBOSE_LOG_FILTER: &str = "cqlsync=debug,cqlsync_controller=debug,cqlsync_db=debug";

/// A log file larger than this is moved aside to `<app>.log.1` on startup.
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug level, plus a line per closed statement span with its duration.
    pub verbose: bool,
    pub log_dir: Option<&'a Path>,
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let span_events = if config.verbose {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let file_layer = match config.log_dir {
        Some(dir) => {
            let writer = LogFile::open(dir, config.app_name)
                .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_span_events(span_events.clone())
                    .with_filter(env_filter(config.verbose)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_filter(env_filter(config.verbose)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

/// Path of the log file for `app_name` inside `dir`.
pub fn log_file_path(dir: &Path, app_name: &str) -> PathBuf {
    dir.join(format!("{}.log", sanitize_name(app_name)))
}

/// Append-only log file shared by every writer the fmt layer makes.
#[derive(Clone)]
struct LogFile {
    inner: Arc<Mutex<File>>,
}

impl LogFile {
    fn open(dir: &Path, app_name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = log_file_path(dir, app_name);
        if fs::metadata(&path).map(|m| m.len() > MAX_LOG_FILE_SIZE).unwrap_or(false) {
            let mut backup = path.clone().into_os_string();
            backup.push(".1");
            fs::rename(&path, backup)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFile {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?
            .flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name_is_sanitized() {
        let path = log_file_path(Path::new("/var/log"), "cql sync/dev");
        assert_eq!(path, PathBuf::from("/var/log/cql_sync_dev.log"));
    }

    #[test]
    fn test_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = LogFile::open(dir.path(), "cqlsync").unwrap();
        first.write_all(b"one\n").unwrap();
        let mut second = LogFile::open(dir.path(), "cqlsync").unwrap();
        second.write_all(b"two\n").unwrap();

        let contents = fs::read_to_string(log_file_path(dir.path(), "cqlsync")).unwrap();
        assert_eq!(contents, "one\ntwo\n");
    }

    #[test]
    fn test_oversized_log_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_file_path(dir.path(), "cqlsync");
        let file = File::create(&path).unwrap();
        file.set_len(MAX_LOG_FILE_SIZE + 1).unwrap();

        LogFile::open(dir.path(), "cqlsync").unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert!(dir.path().join("cqlsync.log.1").exists());
    }

    #[test]
    fn test_verbose_filter_raises_level() {
        assert!(default_filter(true).contains("cqlsync_db=debug"));
        assert!(default_filter(false).contains("cqlsync_db=info"));
    }
}
