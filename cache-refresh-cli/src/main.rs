//! cache-refresh CLI
//!
//! Runs refresh scenarios against the in-memory store and measures how
//! concurrent refreshers behave with and without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache_refresh::{Expiration, Expire, Refresh, RefreshExt};
use cache_refresh_core::{CacheStore, RefreshConfig};
use cache_refresh_store::{CallCounts, MemoryStore, StoreConfig};

const COUNTER_KEY: &str = "counter";

/// cache-refresh - locked read-compute-write for cache keys
#[derive(Parser)]
#[command(name = "cache-refresh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canonical refresh scenarios and show the store calls each makes
    Demo {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Increment a shared counter from several threads
    Race {
        /// Number of refreshing threads
        #[arg(short, long, default_value = "8")]
        threads: u64,
        /// Refreshes per thread
        #[arg(short, long, default_value = "50")]
        iterations: u64,
        /// Use a store without lock support
        #[arg(long)]
        no_lock: bool,
        /// Seconds to wait for the lock (defaults to CACHE_REFRESH_WAIT_SECONDS or 10)
        #[arg(short, long, env = "CACHE_REFRESH_WAIT_SECONDS")]
        wait: Option<u64>,
        /// Milliseconds of simulated work inside each refresh
        #[arg(long, default_value = "1")]
        work_millis: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "cache_refresh=debug,info"
    } else {
        "cache_refresh=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Demo { json } => cmd_demo(json),
        Commands::Race {
            threads,
            iterations,
            no_lock,
            wait,
            work_millis,
        } => cmd_race(threads, iterations, no_lock, wait, work_millis),
    }
}

/// One demo case: optional seed value, default TTL, and the callback to run.
struct Scenario {
    name: &'static str,
    seed: Option<&'static str>,
    ttl: Option<Expiration>,
    callback: fn(Option<String>, &mut Expire) -> Option<String>,
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "missing key, value computed, no TTL",
            seed: None,
            ttl: None,
            callback: |item, _| item.or_else(|| Some("new".into())),
        },
        Scenario {
            name: "existing key, expired now",
            seed: Some("bar"),
            ttl: None,
            callback: |_, expire| {
                expire.now();
                None
            },
        },
        Scenario {
            name: "missing key, nothing computed",
            seed: None,
            ttl: None,
            callback: |_, _| None,
        },
        Scenario {
            name: "TTL 90 overridden to 60 by the callback",
            seed: Some("bar"),
            ttl: Some(Expiration::seconds(90)),
            callback: |item, expire| {
                expire.at(Expiration::seconds(60));
                item
            },
        },
    ]
}

/// Run the canonical scenarios
fn cmd_demo(json: bool) -> Result<()> {
    let mut results = Vec::new();

    for scenario in scenarios() {
        let store = MemoryStore::<String>::new();
        if let Some(seed) = scenario.seed {
            store.forever("foo", seed.to_owned())?;
        }

        let before = store.calls();
        let result = store
            .refresh("foo")
            .put(scenario.callback, scenario.ttl)
            .with_context(|| format!("scenario '{}' failed", scenario.name))?;
        let calls = store.calls().since(&before);
        let stored = store.get("foo")?;

        results.push((scenario.name, result, stored, calls));
    }

    if json {
        let report: Vec<_> = results
            .iter()
            .map(|(name, result, stored, calls)| {
                serde_json::json!({
                    "scenario": name,
                    "result": result,
                    "stored": stored,
                    "calls": calls,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Refresh scenarios".cyan().bold());
    for (name, result, stored, calls) in &results {
        println!("\n{} {}", "▸".cyan(), name.bold());
        println!("   {} {:?}", "Returned:".dimmed(), result);
        println!("   {} {:?}", "Stored:".dimmed(), stored);
        println!("   {} {}", "Calls:".dimmed(), describe_calls(calls));
    }

    Ok(())
}

fn describe_calls(calls: &CallCounts) -> String {
    let mut parts = Vec::new();
    for (label, count) in [
        ("lock", calls.locks),
        ("get", calls.gets),
        ("put", calls.puts),
        ("forever", calls.forevers),
        ("forget", calls.forgets),
    ] {
        if count > 0 {
            parts.push(format!("{label}×{count}"));
        }
    }
    if calls.mutations() == 0 {
        parts.push("no mutation".yellow().to_string());
    }
    parts.join(", ")
}

/// Number of refreshes a race performs
fn race_total(threads: u64, iterations: u64) -> Result<u64> {
    threads
        .checked_mul(iterations)
        .with_context(|| format!("{threads} threads × {iterations} refreshes overflows u64"))
}

/// Increment a shared counter from several threads
fn cmd_race(threads: u64, iterations: u64, no_lock: bool, wait: Option<u64>, work_millis: u64) -> Result<()> {
    let mut config = RefreshConfig::from_env();
    if let Some(wait) = wait {
        config = config.with_wait(wait);
    }

    let store = MemoryStore::<u64>::with_config(StoreConfig {
        enable_locks: !no_lock,
        lock_retry_millis: 5,
    });
    let work = Duration::from_millis(work_millis);
    let total = race_total(threads, iterations)?;
    let failures = AtomicU64::new(0);

    println!(
        "{} {} threads × {} refreshes ({})",
        "🏁 Racing:".cyan().bold(),
        threads,
        iterations,
        if no_lock { "unlocked".red() } else { "locked".green() }
    );

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..iterations {
                    let outcome = Refresh::with_config(&store, COUNTER_KEY, &config).put(
                        |count, _| {
                            let next = count.unwrap_or(0) + 1;
                            if !work.is_zero() {
                                std::thread::sleep(work);
                            }
                            Some(next)
                        },
                        None,
                    );
                    if let Err(error) = outcome {
                        warn!(%error, "Refresh failed");
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                    pb.inc(1);
                }
            });
        }
    });
    pb.finish();
    let elapsed = start.elapsed();

    let failed = failures.load(Ordering::Relaxed);
    let expected = total - failed;
    let counter = store.get(COUNTER_KEY)?.unwrap_or(0);
    let lost = expected.saturating_sub(counter);
    let stats = store.stats();

    println!("\n   {} {}", "Counter:".dimmed(), counter);
    println!("   {} {}", "Expected:".dimmed(), expected);
    println!("   {} {}", "Failed refreshes:".dimmed(), failed);
    println!("   {} {:?}", "Elapsed:".dimmed(), elapsed);
    println!(
        "   {} {} valid, {} expired, {} locks held",
        "Store:".dimmed(),
        stats.valid_entries,
        stats.expired_entries,
        stats.held_locks
    );

    if lost == 0 {
        println!("\n{}", "✅ No lost updates.".green().bold());
    } else {
        println!("\n{} {}", "⚠️  Lost updates:".red().bold(), lost);
        println!("   Refreshing without a lock is last-writer-wins.");
    }

    Ok(())
}
