use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use itemvoid_core::{BakedItem, ItemStack, VoidConfig};
use itemvoid_store::{Batch, VoidManager};
use serde::Deserialize;
use tokio::io::AsyncBufReadExt;
use tokio::signal;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "itemvoidctl", version, about = "ItemVoid CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// YAML/JSON config file (keys: recursive-scan-depth)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Override recursive-scan-depth
    #[arg(long = "depth", global = true)]
    depth: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover every stack in a file, poll once and print the baked batch
    Scan {
        /// JSON or YAML file holding one stack or a list of stacks
        file: PathBuf,
        /// Queue entries to drain (negative: all)
        #[arg(long = "count", default_value_t = -1, allow_negative_numbers = true)]
        count: i64,
    },
    /// Read one JSON stack per stdin line and print batches on a fixed cadence
    Watch {
        #[arg(long = "interval-ms", default_value_t = 1000)]
        interval_ms: u64,
        /// Queue entries drained per tick (negative: all)
        #[arg(long = "batch", default_value_t = -1, allow_negative_numbers = true)]
        batch: i64,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StackDoc {
    Many(Vec<ItemStack>),
    One(ItemStack),
}

fn init_tracing() {
    let env = std::env::var("ITEMVOID_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    let Ok(addr) = std::env::var("ITEMVOID_METRICS_ADDR") else { return };
    let Ok(sock) = addr.parse::<std::net::SocketAddr>() else {
        warn!(addr = %addr, "invalid ITEMVOID_METRICS_ADDR; expected host:port");
        return;
    };
    match metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(sock).install() {
        Ok(()) => info!(addr = %addr, recorder = "prometheus", "metrics recorder installed; serving /metrics"),
        Err(e) => warn!(error = %e, recorder = "prometheus", "failed to install metrics recorder"),
    }
}

fn load_config(cli: &Cli) -> Result<VoidConfig> {
    let mut cfg = VoidConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(depth) = cli.depth {
        cfg = VoidConfig::with_depth(depth).validate().context("--depth")?;
    }
    Ok(cfg)
}

fn load_stacks(path: &Path) -> Result<Vec<ItemStack>> {
    let doc = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed: StackDoc = if is_json {
        serde_json::from_str(&doc).with_context(|| format!("parsing {} as JSON", path.display()))?
    } else {
        serde_yaml::from_str(&doc).with_context(|| format!("parsing {} as YAML", path.display()))?
    };
    Ok(match parsed {
        StackDoc::Many(v) => v,
        StackDoc::One(s) => vec![s],
    })
}

fn render_ts(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

fn display_name(stack: &ItemStack) -> &str {
    stack.meta.as_ref().and_then(|m| m.display_name.as_deref()).unwrap_or("-")
}

/// Stable order for printing; the batch itself is unordered.
fn ordered(batch: Batch<ItemStack>) -> Vec<BakedItem<ItemStack>> {
    let mut items: Vec<_> = batch.into_iter().collect();
    items.sort_by(|a, b| {
        a.discovered_at()
            .cmp(&b.discovered_at())
            .then_with(|| a.stack().material.as_str().cmp(b.stack().material.as_str()))
            .then_with(|| display_name(a.stack()).cmp(display_name(b.stack())))
    });
    items
}

fn print_batch(output: Output, batch: Batch<ItemStack>) -> Result<()> {
    let items = ordered(batch);
    match output {
        Output::Human => {
            for item in &items {
                let s = item.stack();
                println!("{:<24} {:<32} x{:<3} {}", render_ts(item.discovered_at()), s.material, s.amount, display_name(s));
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(&items)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let mgr: VoidManager<ItemStack> = VoidManager::new(cfg)?;
    info!(depth = mgr.max_parse_depth(), "item void manager ready");

    match cli.command {
        Commands::Scan { ref file, count } => {
            let stacks = load_stacks(file)?;
            debug!(file = %file.display(), stacks = stacks.len(), "scan loaded");
            mgr.discover_all(stacks);
            let batch = mgr.poll_items(count).await;
            print_batch(cli.output, batch)?;
            if mgr.pending() > 0 {
                info!(pending = mgr.pending(), "entries left in queue");
            }
        }
        Commands::Watch { interval_ms, batch } => {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(l)) => {
                                if l.trim().is_empty() { continue; }
                                match serde_json::from_str::<ItemStack>(&l) {
                                    Ok(stack) => mgr.discover(stack),
                                    Err(e) => {
                                        metrics::counter!("itemvoid_cli_malformed_lines_total", 1u64);
                                        warn!(error = %e, "skipping malformed line");
                                    }
                                }
                            }
                            Ok(None) => {
                                debug!("stdin closed; draining and exiting watch loop");
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, "stdin read failed");
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        let out = mgr.poll_items(batch).await;
                        if !out.is_empty() { print_batch(cli.output, out)?; }
                    }
                    _ = signal::ctrl_c() => {
                        info!("interrupted; draining");
                        break;
                    }
                }
            }
            let rest = mgr.poll_items(-1).await;
            if !rest.is_empty() { print_batch(cli.output, rest)?; }
        }
    }
    mgr.shutdown();
    Ok(())
}
