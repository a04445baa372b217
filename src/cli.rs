// Command-line interface
// Flags override the layered configuration

use clap::Parser;

use crate::config::{Config, CONFIG_FILE_NAME};

#[derive(Parser, Debug)]
#[command(name = "devserver")]
#[command(about = "Local dev server for serverless-style api handlers", long_about = None)]
pub struct Cli {
    /// Port to listen on (a random fallback port is used when it is taken)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Project root containing api/, public/ and the manifest
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Keep loaded handlers across requests instead of reloading them
    #[arg(short, long)]
    pub cache: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file, without extension (defaults to `devserver` in the project root)
    #[arg(long)]
    pub config: Option<String>,
}

impl Cli {
    /// Config file path the layered configuration is read from
    pub fn config_path(&self) -> String {
        self.config.clone().unwrap_or_else(|| {
            std::path::Path::new(self.dir.as_deref().unwrap_or("."))
                .join(CONFIG_FILE_NAME)
                .to_string_lossy()
                .into_owned()
        })
    }

    /// Apply flags on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.dir {
            config.project.root.clone_from(dir);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.cache {
            config.dev.module_cache = true;
        }
        if self.quiet {
            config.dev.quiet = true;
        }
    }
}
