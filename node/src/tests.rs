use super::*;

#[test]
fn config_defaults_fill_missing_fields() {
    let config: Config = serde_yaml::from_str("log_level: debug\n").unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(
        config.mempool_max_transactions,
        defaults::DEFAULT_MEMPOOL_MAX_TRANSACTIONS
    );
    assert_eq!(config.fork_db_max_blocks, defaults::DEFAULT_FORK_DB_MAX_BLOCKS);

    let validated = config.validate().unwrap();
    assert_eq!(validated.log_level, Level::DEBUG);
    assert_eq!(
        validated.expire_interval,
        Duration::from_millis(defaults::DEFAULT_EXPIRE_INTERVAL_MS)
    );
}

#[test]
fn config_empty_document_uses_defaults() {
    let config: Config = serde_yaml::from_str("{}").unwrap();
    let validated = config.validate().unwrap();
    assert_eq!(validated.log_level, Level::INFO);
    assert_eq!(validated.metrics_port, defaults::DEFAULT_METRICS_PORT);
    assert!(!validated.json_logs);
}

#[test]
fn config_rejects_bad_log_level() {
    let config = Config {
        log_level: "loud".to_string(),
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidLogLevel { value }) if value == "loud"
    ));
}

#[test]
fn config_rejects_zero_sizes() {
    for (field, config) in [
        (
            "worker_threads",
            Config {
                worker_threads: 0,
                ..Config::default()
            },
        ),
        (
            "mempool_max_transactions",
            Config {
                mempool_max_transactions: 0,
                ..Config::default()
            },
        ),
        (
            "expire_interval_ms",
            Config {
                expire_interval_ms: 0,
                ..Config::default()
            },
        ),
        (
            "fork_db_max_blocks",
            Config {
                fork_db_max_blocks: 0,
                ..Config::default()
            },
        ),
    ] {
        match config.validate() {
            Err(ConfigError::InvalidNonZero { field: got, value }) => {
                assert_eq!(got, field);
                assert_eq!(value, 0);
            }
            other => panic!("expected {field} to be rejected, got {other:?}"),
        }
    }
}

#[test]
fn config_round_trips_through_yaml() {
    let config = Config {
        json_logs: true,
        metrics_port: 9999,
        ..Config::default()
    };
    let encoded = serde_yaml::to_string(&config).unwrap();
    let decoded: Config = serde_yaml::from_str(&encoded).unwrap();
    assert!(decoded.json_logs);
    assert_eq!(decoded.metrics_port, 9999);
}

#[test]
fn config_blank_optional_strings_are_unset() {
    let config: Config = serde_yaml::from_str(
        "metrics_token: \"  \"\ntrace_endpoint: \" http://collector:4317 \"\n",
    )
    .unwrap();
    let validated = config.validate().unwrap();
    assert_eq!(validated.metrics_token, None);
    assert_eq!(
        validated.trace_endpoint.as_deref(),
        Some("http://collector:4317")
    );
    assert_eq!(validated.trace_sample_rate, defaults::DEFAULT_TRACE_SAMPLE_RATE);
}

#[test]
fn config_debug_hides_metrics_token() {
    let config = Config {
        metrics_token: Some("hunter2".to_string()),
        ..Config::default()
    };
    let validated = config.validate().unwrap();
    assert_eq!(validated.metrics_token.as_deref(), Some("hunter2"));
    assert!(!format!("{validated:?}").contains("hunter2"));
}

#[test]
fn config_rejects_out_of_range_sample_rate() {
    for rate in [-0.1, 1.5, f64::NAN] {
        let config = Config {
            trace_sample_rate: rate,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSampleRate { .. })
        ));
    }
}
