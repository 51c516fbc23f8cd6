use anyhow::{Context, Result};
use ardent_node::{application::Application, Config, ValidatedConfig};
use ardent_types::genesis_state;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use clap::{Arg, ArgAction, Command};
use commonware_runtime::tokio::tracing::Config as TraceConfig;
use commonware_runtime::{tokio, Clock, Metrics, Runner, Spawner};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::UNIX_EPOCH,
};
use tracing::{debug, error, info};

fn trace_config(config: &ValidatedConfig) -> Option<TraceConfig> {
    config.trace_endpoint.clone().map(|endpoint| TraceConfig {
        endpoint,
        name: "ardent-node".to_string(),
        rate: config.trace_sample_rate,
    })
}

#[derive(Clone)]
struct MetricsState {
    context: tokio::Context,
    token: Option<Arc<str>>,
}

/// Serve the registry at `/metrics`, requiring `Authorization: Bearer <token>` when configured.
async fn metrics(
    State(state): State<MetricsState>,
    headers: HeaderMap,
) -> Result<Response<Body>, StatusCode> {
    if let Some(token) = state.token.as_deref() {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if bearer != Some(token) {
            debug!("rejected metrics scrape");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(state.context.encode()))
        .map_err(|err| {
            error!(?err, "failed to build metrics response");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

fn serve_metrics(context: tokio::Context, config: &ValidatedConfig) {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.metrics_port);
    let state = MetricsState {
        context: context.clone(),
        token: config.metrics_token.as_deref().map(Arc::from),
    };
    context.with_label("metrics").spawn(move |_| async move {
        let listener = match ::tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(%addr, ?err, "failed to bind metrics listener");
                return;
            }
        };
        info!(%addr, auth = state.token.is_some(), "serving metrics");
        let router = Router::new().route("/metrics", get(metrics)).with_state(state);
        if let Err(err) = axum::serve(listener, router).await {
            error!(%addr, ?err, "metrics server stopped");
        }
    });
}

fn print_dry_run_report(config: &ValidatedConfig) {
    println!("dry-run report");
    println!("  log_level: {} (json={})", config.log_level, config.json_logs);
    println!("  worker_threads: {}", config.worker_threads);
    println!(
        "  metrics: port={} auth={}",
        config.metrics_port,
        config.metrics_token.is_some()
    );
    println!(
        "  tracing: endpoint={} rate={}",
        config.trace_endpoint.as_deref().unwrap_or("off"),
        config.trace_sample_rate
    );
    println!(
        "  mempool: max_transactions={} expire_interval={:?}",
        config.mempool_max_transactions, config.expire_interval
    );
    println!("  fork_db: max_blocks={}", config.fork_db_max_blocks);
}

fn main() {
    if let Err(err) = main_result() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn main_result() -> Result<()> {
    // Parse arguments
    let matches = Command::new("node")
        .about("Node tracking pending transactions and candidate blocks.")
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Validate config and exit without starting the node")
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("config").long("config").required(true))
        .get_matches();
    let dry_run = matches.get_flag("dry-run");

    // Load config
    let config_file = matches
        .get_one::<String>("config")
        .context("missing --config")?;
    let config_file = std::fs::read_to_string(config_file)
        .with_context(|| format!("Could not read config file {config_file}"))?;
    let config: Config =
        serde_yaml::from_str(&config_file).context("Could not parse config file")?;
    let config = config.validate().context("Invalid config")?;

    if dry_run {
        print_dry_run_report(&config);
        println!("config ok");
        return Ok(());
    }

    // Initialize runtime
    let cfg = tokio::Config::default()
        .with_worker_threads(config.worker_threads)
        .with_catch_panics(true);
    let executor = tokio::Runner::new(cfg);

    // Start runtime
    executor.start(|context| async move {
        let context = context.with_label("ardent");

        // Configure telemetry
        tokio::telemetry::init(
            context.with_label("telemetry"),
            tokio::telemetry::Logging {
                level: config.log_level,
                json: config.json_logs,
            },
            None,
            trace_config(&config),
        );
        info!(?config, "loaded config");
        serve_metrics(context.clone(), &config);

        // Start from genesis
        let root = genesis_state();
        info!(root = ?root.id, "initialized fork database");
        let mut application =
            Application::new(context.with_label("application"), config.application(), root);

        // Expire transactions on every tick
        loop {
            context.sleep(config.expire_interval).await;
            let now = match context.current().duration_since(UNIX_EPOCH) {
                Ok(elapsed) => elapsed.as_secs(),
                Err(err) => {
                    error!(?err, "clock is before the unix epoch");
                    continue;
                }
            };
            let expired = application.on_tick(now);
            debug!(
                now,
                expired,
                pending = application.mempool().len(),
                head = application.fork_db().head().block_num,
                "tick"
            );
        }
    });

    Ok(())
}
