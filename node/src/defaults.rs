//! Default values for optional [crate::Config] fields.

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = false;
pub const DEFAULT_WORKER_THREADS: usize = 2;
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Fraction of traces exported when an OTLP endpoint is configured.
pub const DEFAULT_TRACE_SAMPLE_RATE: f64 = 1.0;

/// The maximum number of transactions in the mempool.
pub const DEFAULT_MEMPOOL_MAX_TRANSACTIONS: usize = 100_000;

/// How often expired transactions are dropped.
pub const DEFAULT_EXPIRE_INTERVAL_MS: u64 = 1_000;

/// The maximum number of unconfirmed blocks tracked above the root.
pub const DEFAULT_FORK_DB_MAX_BLOCKS: usize = 10_000;
