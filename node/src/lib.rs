use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::Level;

pub mod application;
pub mod defaults;

/// Configuration for a node, loaded from YAML.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_json_logs")]
    pub json_logs: bool,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Bearer token required to scrape `/metrics`. Open when unset or blank.
    #[serde(default)]
    pub metrics_token: Option<String>,
    /// OTLP endpoint to export traces to. Tracing export is off when unset.
    #[serde(default)]
    pub trace_endpoint: Option<String>,
    #[serde(default = "default_trace_sample_rate")]
    pub trace_sample_rate: f64,

    #[serde(default = "default_mempool_max_transactions")]
    pub mempool_max_transactions: usize,
    #[serde(default = "default_expire_interval_ms")]
    pub expire_interval_ms: u64,
    #[serde(default = "default_fork_db_max_blocks")]
    pub fork_db_max_blocks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: default_json_logs(),
            worker_threads: default_worker_threads(),
            metrics_port: default_metrics_port(),
            metrics_token: None,
            trace_endpoint: None,
            trace_sample_rate: default_trace_sample_rate(),
            mempool_max_transactions: default_mempool_max_transactions(),
            expire_interval_ms: default_expire_interval_ms(),
            fork_db_max_blocks: default_fork_db_max_blocks(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("trace_sample_rate must be within [0, 1] (got {value})")]
    InvalidSampleRate { value: f64 },
}

pub struct ValidatedConfig {
    pub log_level: Level,
    pub json_logs: bool,
    pub worker_threads: usize,
    pub metrics_port: u16,
    pub metrics_token: Option<String>,
    pub trace_endpoint: Option<String>,
    pub trace_sample_rate: f64,

    pub mempool_max_transactions: usize,
    pub expire_interval: Duration,
    pub fork_db_max_blocks: usize,
}

impl fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("log_level", &self.log_level.as_str())
            .field("json_logs", &self.json_logs)
            .field("worker_threads", &self.worker_threads)
            .field("metrics_port", &self.metrics_port)
            .field("metrics_auth", &self.metrics_token.is_some())
            .field("trace_endpoint", &self.trace_endpoint)
            .field("trace_sample_rate", &self.trace_sample_rate)
            .field("mempool_max_transactions", &self.mempool_max_transactions)
            .field("expire_interval", &self.expire_interval)
            .field("fork_db_max_blocks", &self.fork_db_max_blocks)
            .finish()
    }
}

fn default_log_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_string()
}

fn default_json_logs() -> bool {
    defaults::DEFAULT_JSON_LOGS
}

fn default_worker_threads() -> usize {
    defaults::DEFAULT_WORKER_THREADS
}

fn default_metrics_port() -> u16 {
    defaults::DEFAULT_METRICS_PORT
}

fn default_trace_sample_rate() -> f64 {
    defaults::DEFAULT_TRACE_SAMPLE_RATE
}

fn default_mempool_max_transactions() -> usize {
    defaults::DEFAULT_MEMPOOL_MAX_TRANSACTIONS
}

fn default_expire_interval_ms() -> u64 {
    defaults::DEFAULT_EXPIRE_INTERVAL_MS
}

fn default_fork_db_max_blocks() -> usize {
    defaults::DEFAULT_FORK_DB_MAX_BLOCKS
}

fn ensure_nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value: 0 });
    }
    Ok(())
}

/// Blank strings count as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn ensure_nonzero_u64(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        ensure_nonzero("worker_threads", self.worker_threads)?;
        ensure_nonzero("mempool_max_transactions", self.mempool_max_transactions)?;
        ensure_nonzero_u64("expire_interval_ms", self.expire_interval_ms)?;
        ensure_nonzero("fork_db_max_blocks", self.fork_db_max_blocks)?;

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        if !(0.0..=1.0).contains(&self.trace_sample_rate) {
            return Err(ConfigError::InvalidSampleRate {
                value: self.trace_sample_rate,
            });
        }

        Ok(ValidatedConfig {
            log_level,
            json_logs: self.json_logs,
            worker_threads: self.worker_threads,
            metrics_port: self.metrics_port,
            metrics_token: non_blank(self.metrics_token),
            trace_endpoint: non_blank(self.trace_endpoint),
            trace_sample_rate: self.trace_sample_rate,
            mempool_max_transactions: self.mempool_max_transactions,
            expire_interval: Duration::from_millis(self.expire_interval_ms),
            fork_db_max_blocks: self.fork_db_max_blocks,
        })
    }
}

impl ValidatedConfig {
    pub fn application(&self) -> application::Config {
        application::Config {
            mempool_max_transactions: self.mempool_max_transactions,
            fork_db_max_blocks: self.fork_db_max_blocks,
        }
    }
}

#[cfg(test)]
mod tests;
