//! Failure detector drive.
//!
//! Runs the detector against synthetic traffic and prints what it learned.
//!
//! ```text
//!   traffic generator ──▶ collector ──▶ pump ──▶ batch queue (namespace/service)
//!                                                     │
//!                                  workers ◀──────────┘
//!                                     │
//!                                     ▼
//!                     service → endpoint → weight / status ──▶ snapshot (JSON)
//! ```
//!
//! Generated samples mimic one service (`etcd`) deployed in ten namespaces
//! across three endpoints, with each request failing half of the time.

use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use failure_detector::config::{load_config, DetectorConfig};
use failure_detector::health::{ChannelSink, EndpointSample, FailureDetector, Outcome};
use failure_detector::lifecycle::{signals, Shutdown};
use failure_detector::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "failure-detector")]
#[command(about = "Drive the passive failure detector with synthetic traffic", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured worker count.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of samples to generate.
    #[arg(short, long, default_value_t = 100_000)]
    samples: usize,

    /// Time to let workers drain before printing the snapshot.
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Probability that a generated request fails.
    #[arg(long, default_value_t = 0.5)]
    failure_rate: f64,
}

fn random_sample(rng: &mut impl Rng, failure_rate: f64) -> Result<EndpointSample, url::ParseError> {
    let namespace = rng.gen_range(0..10).to_string();
    let url = Url::parse(&format!("https://1.1.1.{}:6443", rng.gen_range(0..3)))?;
    let outcome = if rng.gen_bool(failure_rate.clamp(0.0, 1.0)) {
        Outcome::Failure
    } else {
        Outcome::Success
    };
    Ok(EndpointSample::new(namespace, "etcd", Some(url), outcome))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers.count = workers;
    }

    logging::init_logging(&config.observability);
    tracing::info!("failure-detector v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        workers = config.workers.count,
        window = config.evaluator.window,
        step_percent = config.evaluator.step_percent,
        service_ttl_secs = config.store.service_ttl_secs,
        endpoint_ttl_secs = config.store.endpoint_ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr, config.store.endpoint_ttl()),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (sink, mut changes) = ChannelSink::new();
    let workers = config.workers.count;
    let detector = Arc::new(FailureDetector::builder(config).sink(Arc::new(sink)).build());

    let shutdown = Arc::new(Shutdown::new());
    let running = {
        let detector = detector.clone();
        let signal = shutdown.subscribe();
        tokio::spawn(async move { detector.run(signal, workers).await })
    };
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { signals::trigger_on_signal(&shutdown).await });
    }

    let collector = detector.collector();
    let mut rng = rand::thread_rng();
    for _ in 0..cli.samples {
        if shutdown.is_triggered() {
            break;
        }
        let sample = random_sample(&mut rng, cli.failure_rate)?;
        if collector.send(sample).await.is_err() {
            tracing::warn!("Collector closed, stopping traffic");
            break;
        }
    }
    drop(rng);

    tokio::time::sleep(Duration::from_millis(cli.settle_ms)).await;
    shutdown.trigger();
    running.await??;

    let mut change_count = 0usize;
    while changes.try_recv().is_ok() {
        change_count += 1;
    }
    tracing::info!(changes = change_count, "Endpoint changes observed");

    println!("{}", serde_json::to_string_pretty(&detector.snapshot())?);

    tracing::info!("Shutdown complete");
    Ok(())
}
