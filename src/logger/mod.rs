//! Logger module
//!
//! Provides logging utilities for the dev server including:
//! - Server lifecycle logging
//! - Per-request access lines
//! - Handler process output
//! - Error and warning logging

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use chrono::Local;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(config.logging.log_file.as_deref(), config.dev.quiet)
}

fn stamp(tag: &str, message: &str) -> String {
    format!("{} {tag} {message}", Local::now().format("%H:%M:%S"))
}

/// Write to info log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_info(message: &str) {
    write_info(&stamp("ℹ", message));
}

pub fn log_success(message: &str) {
    write_info(&stamp("✔", message));
}

pub fn log_warning(message: &str) {
    write_info(&stamp("⚠", message));
}

pub fn log_error(message: &str) {
    write_error(&stamp("✖", message));
}

pub fn log_server_listening(addr: &SocketAddr, config: &Config) {
    log_success(&format!("Server listening on port: {}", addr.port()));
    log_info(&format!("Local: http://{addr}"));
    log_info(&format!(
        "Handlers: {} (prefix {})",
        config.api_dir().display(),
        config.project.api_prefix
    ));
    log_info(&format!("Static files: {}", config.public_dir().display()));
    if config.dev.module_cache {
        log_info("Module cache enabled: handlers reload only on SIGHUP or restart");
    } else {
        log_info("Module cache disabled: handlers reload on every request");
    }
}

/// Log a finished request; `200` is reported as a success
pub fn log_request_finished(entry: &AccessLogEntry, format: &str) {
    let line = entry.format(format);
    if entry.status == 200 {
        log_success(&line);
    } else {
        log_info(&line);
    }
}

/// Forward one line a handler process wrote to stderr
pub fn log_handler_output(handler: &Path, line: &str) {
    write_info(&stamp("│", &format!("[{}] {line}", handler.display())));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_error(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_success_timed(message: &str, elapsed: Duration) {
    log_success(&format!("{message} [{}ms]", elapsed.as_millis()));
}
