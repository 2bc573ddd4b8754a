use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{info, warn};
use vtimer_core::{TimerConfig, TimerHandle, TimerKind, TimerMode};
use vtimer_scheduler::{timer_from_config, Timer, TimerExt};

/// Run a scripted timer scenario on a virtual or live clock.
///
/// Schedules one immediate, one timeout and one interval that clears itself
/// after `--ticks` firings, then prints every firing with the timer's clock.
#[derive(Debug, Parser)]
#[command(name = "vtimer", version)]
struct Cli {
    /// Config file (default: $VTIMER_CONFIG, then ~/.vtimer/vtimer.toml).
    #[arg(long)]
    config: Option<String>,

    /// Clock to run on: `virtual` or `live`. Overrides the config file.
    #[arg(long)]
    mode: Option<TimerMode>,

    /// Initial virtual time in ms. Overrides the config file.
    #[arg(long)]
    start_time: Option<u64>,

    /// Timeout delay in ms.
    #[arg(long, default_value_t = 1_000.0)]
    timeout: f64,

    /// Interval period in ms.
    #[arg(long, default_value_t = 250.0)]
    every: f64,

    /// Interval firings before it clears itself.
    #[arg(long, default_value_t = 3)]
    ticks: u32,

    /// Print one JSON object per firing.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Firing {
    kind: TimerKind,
    at: u64,
    elapsed_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vtimer=info,vtimer_scheduler=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > VTIMER_CONFIG env > ~/.vtimer/vtimer.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("VTIMER_CONFIG").ok());
    let mut config = TimerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        TimerConfig::default()
    });
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if cli.start_time.is_some() {
        config.start_time = cli.start_time;
    }

    LocalSet::new().run_until(run_scenario(cli, config)).await
}

async fn run_scenario(cli: Cli, config: TimerConfig) -> anyhow::Result<()> {
    let timer: Rc<dyn Timer> = Rc::from(timer_from_config(&config));
    let started = Instant::now();
    let origin = timer.now();
    info!(mode = %config.mode, origin, "scenario started");

    let (tx, mut rx) = mpsc::unbounded_channel::<Firing>();
    let report = {
        let timer = Rc::clone(&timer);
        move |tx: &mpsc::UnboundedSender<Firing>, kind: TimerKind| {
            let _ = tx.send(Firing {
                kind,
                at: timer.now(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
    };

    {
        let (tx, report) = (tx.clone(), report.clone());
        timer.immediate(move || report(&tx, TimerKind::Immediate));
    }
    {
        let (tx, report) = (tx.clone(), report.clone());
        timer.timeout(move || report(&tx, TimerKind::Timeout), cli.timeout)?;
    }
    if cli.ticks > 0 {
        let own: Rc<RefCell<Option<TimerHandle>>> = Rc::new(RefCell::new(None));
        let (tx, report, me) = (tx.clone(), report.clone(), Rc::clone(&own));
        let t = Rc::clone(&timer);
        let ticks = cli.ticks;
        let mut fired = 0;
        let handle = timer.interval(
            move || {
                report(&tx, TimerKind::Interval);
                fired += 1;
                if fired == ticks {
                    if let Some(h) = me.borrow().as_ref() {
                        t.clear_interval(h);
                    }
                }
            },
            cli.every,
        )?;
        *own.borrow_mut() = Some(handle);
    }
    drop(tx);

    let expected = 2 + cli.ticks as usize;
    for _ in 0..expected {
        let Some(firing) = rx.recv().await else {
            break;
        };
        if cli.json {
            println!("{}", serde_json::to_string(&firing)?);
        } else {
            println!(
                "{:<9} at {} (+{} ms virtual, {} ms wall)",
                firing.kind.to_string(),
                firing.at,
                firing.at.saturating_sub(origin),
                firing.elapsed_ms
            );
        }
    }

    info!(
        now = timer.now(),
        wall_ms = started.elapsed().as_millis() as u64,
        "scenario finished"
    );
    timer.clear_all();
    Ok(())
}
