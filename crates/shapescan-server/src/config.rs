//! Server settings from flags with environment fallbacks.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command line of the `shapescan-server` binary. Every flag falls back to
/// the environment variable of the same name in upper snake case.
#[derive(Parser, Debug, Clone)]
#[command(name = "shapescan-server")]
#[command(about = "HTTP upload service turning reference-sheet photos into SVG and DXF")]
#[command(version)]
pub struct ServerConfig {
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Public origin used to build the returned asset URLs.
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Root directory for per-request outputs, served under `/output`.
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Comma separated CORS origins; `*` allows any.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    #[arg(long, env = "SCAN_TIMEOUT_SECS", default_value_t = 60)]
    pub scan_timeout_secs: u64,

    /// Concurrent pipeline runs; defaults to the number of CPUs.
    #[arg(long, env = "SCAN_WORKERS")]
    pub scan_workers: Option<usize>,

    /// Pipeline configuration (JSON); defaults apply when absent.
    #[arg(long, env = "SCAN_CONFIG")]
    pub scan_config: Option<PathBuf>,

    /// Emit JSON log lines instead of the human readable format.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl ServerConfig {
    pub fn settings(&self) -> ServerSettings {
        ServerSettings {
            base_url: self.base_url.clone(),
            output_dir: self.output_dir.clone(),
            allowed_origins: parse_origins(&self.allowed_origins),
            scan_timeout: Duration::from_secs(self.scan_timeout_secs),
            workers: self.scan_workers.unwrap_or_else(default_workers).max(1),
        }
    }
}

/// Resolved runtime settings shared by every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub base_url: String,
    pub output_dir: PathBuf,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub scan_timeout: Duration,
    pub workers: usize,
}

impl ServerSettings {
    /// Settings for a server writing into `output_dir`, otherwise defaults.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            output_dir: output_dir.into(),
            allowed_origins: Vec::new(),
            scan_timeout: Duration::from_secs(60),
            workers: default_workers(),
        }
    }

    /// Public URL of `file_name` produced for `request_id`.
    pub fn asset_url(&self, request_id: &str, file_name: &str) -> String {
        format!(
            "{}/output/{request_id}/{file_name}",
            self.base_url.trim_end_matches('/')
        )
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Split a comma separated origin list; a `*` entry yields the empty
/// (allow-any) list.
pub fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if origins.iter().any(|o| o == "*") {
        Vec::new()
    } else {
        origins
    }
}
