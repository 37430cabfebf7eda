//! CLI argument definitions for the Veritas application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Veritas - a research assistant that answers from the sources you give it.
#[derive(Parser, Debug)]
#[command(name = "veritas", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Gateway API base URL used by session commands.
    #[arg(short = 'g', long = "gateway-url", global = true)]
    pub gateway_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway in front of the answering engine.
    Serve {
        /// Address to bind.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind.
        #[arg(short = 'p', long)]
        port: Option<u16>,
        /// Base URL of the answering engine.
        #[arg(short = 'e', long = "engine-url")]
        engine_url: Option<String>,
    },
    /// Ingest a web page into the knowledge base.
    IngestUrl {
        url: String,
    },
    /// Upload documents into the knowledge base.
    IngestFiles {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a single question.
    Ask {
        query: String,
    },
    /// Delete everything in the knowledge base.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Interactive session.
    Chat,
}

pub const CONFIG_ENV: &str = "VERITAS_CONFIG";
pub const PORT_ENV: &str = "VERITAS_PORT";
pub const ENGINE_URL_ENV: &str = "AI_SERVICE_URL";
pub const GATEWAY_URL_ENV: &str = "VERITAS_GATEWAY_URL";

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VERITAS_CONFIG env var > ~/.veritas/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        pick(
            self.config.clone(),
            env_var(CONFIG_ENV).map(PathBuf::from),
            default_config_path(),
        )
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve the gateway URL for session commands.
    ///
    /// Priority: --gateway-url flag > VERITAS_GATEWAY_URL env var > config file value.
    pub fn resolve_gateway_url(&self, config_url: &str) -> String {
        pick(
            self.gateway_url.clone(),
            env_var(GATEWAY_URL_ENV),
            config_url.to_string(),
        )
    }
}

/// Resolve the gateway port.
///
/// Priority: --port flag > VERITAS_PORT env var > config file value.
pub fn resolve_port(flag: Option<u16>, config_port: u16) -> u16 {
    let env = env_var(PORT_ENV).and_then(|v| v.parse::<u16>().ok());
    pick(flag, env, config_port)
}

/// Resolve the engine address the gateway forwards to.
///
/// Priority: --engine-url flag > AI_SERVICE_URL env var > config file value.
pub fn resolve_engine_url(flag: Option<String>, config_url: &str) -> String {
    pick(flag, env_var(ENGINE_URL_ENV), config_url.to_string())
}

fn pick<T>(flag: Option<T>, env: Option<T>, fallback: T) -> T {
    flag.or(env).unwrap_or(fallback)
}

/// An env var that is set and not blank.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".veritas").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".veritas").join("config.toml");
    }
    PathBuf::from("config.toml")
}
