//! # Example: proxy_pool
//!
//! Keeps an in-memory proxy pool between its limits.
//!
//! - `FakeCrawler` emits random `ip:port` candidates until stopped.
//! - `FakeChecker` accepts roughly 60% of them after a short "probe".
//! - A background task expires proxies so the pool keeps draining.
//!
//! ## Flow
//! ```text
//! PoolController::run_until_signal()
//!     ├─► check(): count < lower_limit ?
//!     ├─► run_cycle()
//!     │     ├─► FakeCrawler ──► queue ──► FakeChecker ──► Store (+1)
//!     │     └─► Watchdog: count > upper × ratio ──► stop crawler
//!     └─► sleep(check_interval_time), reset, repeat
//! expiry task: Store (-1) every second
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example proxy_pool -- -v
//! cargo run --example proxy_pool -- --config pool.toml
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use poolvisor::{
    Crawler, Event, EventKind, LogWriter, PoolConfig, PoolController, ResourceCounter, Sink,
    StageError, Subscribe, Validator, Verbosity, Verdict, init_tracing,
};
use rand::Rng;

#[derive(Parser, Debug)]
#[command(about = "Keeps a fake proxy pool between its limits")]
struct Args {
    /// TOML config file; demo timings are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every poll and check.
    #[arg(short, long)]
    verbose: bool,

    /// Errors only.
    #[arg(short, long)]
    quiet: bool,
}

/// Shared in-memory pool; doubles as the resource counter.
#[derive(Default)]
struct Store {
    proxies: Mutex<HashSet<String>>,
}

impl Store {
    fn insert(&self, proxy: String) -> bool {
        self.proxies.lock().unwrap().insert(proxy)
    }

    fn expire_one(&self) {
        let mut proxies = self.proxies.lock().unwrap();
        if let Some(victim) = proxies.iter().next().cloned() {
            proxies.remove(&victim);
        }
    }

    fn len(&self) -> u64 {
        self.proxies.lock().unwrap().len() as u64
    }
}

struct StoreCounter(Arc<Store>);

#[async_trait]
impl ResourceCounter for StoreCounter {
    async fn count(&self) -> Result<u64, StageError> {
        Ok(self.0.len())
    }
}

struct FakeCrawler;

#[async_trait]
impl Crawler for FakeCrawler {
    type Item = String;

    fn name(&self) -> &str {
        "fake-crawler"
    }

    async fn crawl(&self, sink: &Sink<String>) -> Result<(), StageError> {
        while !sink.is_stopped() {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let proxy = {
                let mut rng = rand::rng();
                format!(
                    "10.{}.{}.{}:{}",
                    rng.random_range(0..=255),
                    rng.random_range(0..=255),
                    rng.random_range(1..=254),
                    rng.random_range(1024..=65535)
                )
            };
            sink.put(proxy).await?;
        }
        Ok(())
    }
}

struct FakeChecker(Arc<Store>);

#[async_trait]
impl Validator for FakeChecker {
    type Item = String;

    fn name(&self) -> &str {
        "fake-checker"
    }

    async fn validate(&self, proxy: String) -> Result<Verdict, StageError> {
        let (latency, alive) = {
            let mut rng = rand::rng();
            (rng.random_range(10..80), rng.random_bool(0.6))
        };
        tokio::time::sleep(Duration::from_millis(latency)).await;
        if alive && self.0.insert(proxy) {
            Ok(Verdict::Accepted)
        } else {
            Ok(Verdict::Rejected)
        }
    }
}

/// Counts watchdog trips and prints a line per finished cycle.
#[derive(Default)]
struct CycleSummary {
    trips: AtomicU64,
}

#[async_trait]
impl Subscribe for CycleSummary {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::WatchdogTripped => {
                self.trips.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::CycleFinished => println!(
                "[summary] cycle={} {} trips_so_far={}",
                ev.cycle.unwrap_or(0),
                ev.reason.as_deref().unwrap_or("-"),
                self.trips.load(Ordering::Relaxed)
            ),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "summary"
    }
}

fn demo_config() -> PoolConfig {
    PoolConfig {
        lower_limit: 10,
        upper_limit: 40,
        upper_limit_ratio: 0.9,
        check_cycle_time: Duration::from_secs(2),
        check_interval_time: Duration::from_secs(5),
        watchdog_max_interval: Duration::from_millis(500),
        consumer_workers: 4,
        ..PoolConfig::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(Verbosity::from_flags(args.verbose, args.quiet))
        .context("installing tracing subscriber")?;

    let cfg = match &args.config {
        Some(path) => PoolConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => demo_config(),
    };

    let store = Arc::new(Store::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(LogWriter::new()),
        Arc::new(CycleSummary::default()),
    ];
    let controller = PoolController::builder(
        cfg,
        Arc::new(StoreCounter(Arc::clone(&store))),
        FakeCrawler,
        FakeChecker(Arc::clone(&store)),
    )
    .with_subscribers(subs)
    .build()
    .context("invalid pool config")?;

    let expiry = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tick.tick().await;
                store.expire_one();
            }
        })
    };

    controller.run_until_signal().await?;
    expiry.abort();
    println!("final pool size: {}", store.len());
    Ok(())
}
