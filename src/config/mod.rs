// Configuration module entry point
// Loads layered configuration and resolves the project layout

mod state;
mod types;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub use state::AppState;
pub use types::Config;

/// Config file looked up in the project root, without extension
pub const CONFIG_FILE_NAME: &str = "devserver";

impl Config {
    /// Load configuration: defaults, then the optional config file, then
    /// `DEVSERVER_*` environment variables (e.g. `DEVSERVER_SERVER__PORT`)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.fallback_port_min", 3333)?
            .set_default("server.fallback_port_max", 3443)?
            .set_default("server.max_bind_attempts", 10)?
            .set_default("project.root", ".")?
            .set_default("project.api_dir", "api")?
            .set_default("project.public_dir", "public")?
            .set_default("project.api_prefix", "/api/")?
            .set_default("project.manifest", "package.json")?
            .set_default("dev.module_cache", false)?
            .set_default("dev.quiet", false)?
            .set_default("http.server_name", "devserver")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("logging.access_log_format", "dev")?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("DEVSERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Socket address for a given port on the configured host
    pub fn socket_addr(&self, port: u16) -> Result<SocketAddr, String> {
        self.server
            .host
            .parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, port))
            .map_err(|e| format!("Invalid host '{}': {e}", self.server.host))
    }

    pub fn root_dir(&self) -> PathBuf {
        PathBuf::from(&self.project.root)
    }

    pub fn api_dir(&self) -> PathBuf {
        self.resolve(&self.project.api_dir)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.resolve(&self.project.public_dir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.project.manifest)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir().join(path)
        }
    }
}

#[cfg(test)]
impl Config {
    /// Defaults rooted at `root`, for tests
    pub fn for_root(root: &Path) -> Self {
        let mut cfg = Self::load_from("__no_such_devserver_config__").expect("defaults load");
        cfg.project.root = root.to_string_lossy().into_owned();
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::for_root(Path::new("/srv/app"));
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.fallback_port_min, 3333);
        assert_eq!(cfg.server.fallback_port_max, 3443);
        assert_eq!(cfg.project.api_prefix, "/api/");
        assert!(!cfg.dev.module_cache);
        assert!(!cfg.dev.quiet);
        assert_eq!(cfg.api_dir(), PathBuf::from("/srv/app/api"));
        assert_eq!(cfg.public_dir(), PathBuf::from("/srv/app/public"));
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::for_root(Path::new("."));
        assert_eq!(cfg.socket_addr(8080).unwrap().to_string(), "127.0.0.1:8080");
    }
}
