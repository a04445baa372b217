// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub project: ProjectConfig,
    pub dev: DevConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Listening socket configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Ports picked at random after an address-in-use failure
    pub fallback_port_min: u16,
    pub fallback_port_max: u16,
    /// Hard cutoff for bind attempts, including the first one
    pub max_bind_attempts: u32,
}

/// Project layout, relative paths are resolved against `root`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProjectConfig {
    pub root: String,
    pub api_dir: String,
    pub public_dir: String,
    /// Path prefix routed to handler files, e.g. `/api/`
    pub api_prefix: String,
    /// Manifest that may name a build command
    pub manifest: String,
}

/// Development toggles
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct DevConfig {
    /// Keep loaded handlers across requests instead of reloading them
    pub module_cache: bool,
    /// Suppress all logging except errors
    pub quiet: bool,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Access log format (dev, combined, json)
    pub access_log_format: String,
    /// Log file path (optional, stdout/stderr if not set)
    #[serde(default)]
    pub log_file: Option<String>,
}
