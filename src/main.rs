mod event;
mod logging;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use event::{Event, EventHandler};
use sysglance::config::{self, LoadedConfig, load_config, load_config_from_path};
use sysglance::report::{DashboardView, OutputFormat};
use sysglance::system::collector::Collector;
use sysglance::system::host::HostInfo;

#[derive(Parser)]
#[command(
    name = "sysglance",
    about = "Headless system dashboard: samples procfs counters and prints them each tick"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Output format: text, json
    #[arg(long)]
    output: Option<String>,

    /// CPU usage formula: legacy, busy
    #[arg(long)]
    cpu_formula: Option<String>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,

    /// Root of the proc filesystem
    #[arg(long)]
    proc_root: Option<PathBuf>,

    /// Root of the sys filesystem
    #[arg(long)]
    sys_root: Option<PathBuf>,

    /// Stop after this many ticks (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    iterations: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let loaded = load_config_for_cli(&cli);
    let json_logs = cli.log_json || loaded.config.general.log_format.eq_ignore_ascii_case("json");
    logging::init_tracing(&loaded.config.general.log_level, json_logs)?;
    loaded.log_fallback();
    let config = loaded.config;

    if config.general.tick_ms == 0 {
        return Err(eyre!("tick period must be greater than 0"));
    }

    run(config, cli.iterations).await
}

async fn run(config: config::Config, iterations: u64) -> Result<()> {
    let format = OutputFormat::from_str_config(&config.general.output);
    let top = config.general.top_processes;
    let host = HostInfo::collect();
    let mut collector = Collector::from_config(&config);
    let mut events = EventHandler::new(Duration::from_millis(config.general.tick_ms));

    tracing::info!(
        proc_root = %collector.procfs().proc_root().display(),
        clock_ticks = collector.constants().clock_ticks_per_second,
        page_size = collector.constants().page_size,
        "sampling started"
    );

    let mut tick = 0u64;
    while let Some(event) = events.next().await {
        match event {
            Event::Tick => {
                tick += 1;
                let report = collector.refresh(Instant::now());
                let view = DashboardView::new(tick, &host, &report, &collector, top);
                println!("{}", view.render(format)?);
                if iterations > 0 && tick >= iterations {
                    break;
                }
            }
            Event::Shutdown => break,
        }
    }

    tracing::info!(ticks = tick, "sampling stopped");
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> LoadedConfig {
    let mut loaded = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    let config = &mut loaded.config;

    if let Some(tick) = cli.tick_ms {
        config.general.tick_ms = tick;
    }
    if let Some(ref output) = cli.output {
        config.general.output = output.clone();
    }
    if let Some(ref formula) = cli.cpu_formula {
        config.general.cpu_formula = formula.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(ref root) = cli.proc_root {
        config.paths.proc_root = root.clone();
    }
    if let Some(ref root) = cli.sys_root {
        config.paths.sys_root = root.clone();
    }

    loaded
}
