use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

fn default_max_file_size() -> u64 {
    // 10 MB in bytes
    10 * 1024 * 1024
}

/// Settings for the HTTP adapter only; the summary engine takes everything it
/// needs per call.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let bind_addr = std::env::var("SUMMARY_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("SUMMARY_BIND_ADDR is not a socket address")?;

        let max_file_size = match std::env::var("SUMMARY_MAX_FILE_SIZE") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("SUMMARY_MAX_FILE_SIZE is not a byte count: {}", raw))?,
            Err(_) => default_max_file_size(),
        };

        Ok(Config {
            bind_addr,
            max_file_size,
        })
    }
}
