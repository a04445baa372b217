//! Log writer module
//!
//! Thread-safe log output to stdout/stderr or a single log file, with a
//! quiet switch that drops everything but errors.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    /// stdout for info, stderr for errors
    Console,
    /// Everything appended to one file
    File(Mutex<File>),
}

/// Thread-safe log writer
pub struct LogWriter {
    target: LogTarget,
    quiet: bool,
}

impl LogWriter {
    fn new(log_file: Option<&str>, quiet: bool) -> io::Result<Self> {
        let target = match log_file {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Console,
        };
        Ok(Self { target, quiet })
    }

    /// Write an informational line, dropped when quiet
    pub fn write_info(&self, message: &str) {
        if self.is_quiet() {
            return;
        }
        match &self.target {
            LogTarget::Console => println!("{message}"),
            LogTarget::File(file) => append(file, message),
        }
    }

    /// Write an error line, always emitted
    pub fn write_error(&self, message: &str) {
        match &self.target {
            LogTarget::Console => eprintln!("{message}"),
            LogTarget::File(file) => append(file, message),
        }
    }

    pub const fn is_quiet(&self) -> bool {
        self.quiet
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

fn append(file: &Mutex<File>, message: &str) {
    if let Ok(mut f) = file.lock() {
        let _ = writeln!(f, "{message}");
    }
}

/// Initialize the global log writer
///
/// This should be called once at application startup.
/// Returns error if the log file cannot be opened.
pub fn init(log_file: Option<&str>, quiet: bool) -> io::Result<()> {
    let writer = LogWriter::new(log_file, quiet)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Get the global log writer, if initialized
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_target_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/dev.log");
        let writer = LogWriter::new(Some(path.to_str().unwrap()), false).unwrap();
        writer.write_info("first");
        writer.write_error("second");
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_quiet_keeps_errors_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.log");
        let writer = LogWriter::new(Some(path.to_str().unwrap()), true).unwrap();
        writer.write_info("hidden");
        writer.write_error("shown");
        assert!(writer.is_quiet());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "shown\n");
    }
}
