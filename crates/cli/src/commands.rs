// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use console::style;
use mediasync_config::{Config, ConfigManager};
use mediasync_core::SyncErrorCode;
use mediasync_engine::{
    AddOptions, LoopbackBridge, MediaSynchroniser, RendererEvent, RendererHost, RendererSnapshot,
    RendererTable, Scheduler, SessionEvent, SyncContext, SynchronizerRegistry,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

const MASTER_TIMELINE: &str = "urn:dvb:css:timeline:pts";
const SLAVE_TIMELINE: &str = "urn:dvb:css:timeline:temi:1:1";

/// Write a default config file
pub fn config_init(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default configuration")?;
    if created {
        println!(
            "{} Created {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!("Config already exists at {}", manager.config_path().display());
    }
    Ok(())
}

/// Print the effective configuration
pub fn config_show(config: &Config) -> Result<()> {
    println!("\n{}", style("Sync").bold().cyan());
    println!("  Heartbeat interval: {}", format_millis(config.sync.heartbeat_interval_ms));
    println!("  Poll interval:      {}", format_millis(config.sync.poll_interval_ms));
    println!("  Tolerance widening: {}", format_millis(config.sync.tolerance_widening_ms));
    println!(
        "  Broadband streams:  {} with broadcast, {} without",
        config.sync.max_broadband_streams_with_broadcast,
        config.sync.max_broadband_streams_no_broadcast
    );
    println!("\n{}", style("Logging").bold().cyan());
    println!("  Level:      {}", config.logging.level);
    println!("  Timestamps: {}", config.logging.timestamps);
    Ok(())
}

/// Check the config file and list every invalid value
pub fn config_validate(manager: &ConfigManager) -> Result<()> {
    let errors = manager
        .validate()
        .context("Failed to read configuration")?;
    if errors.is_empty() {
        println!("{} Configuration is valid", style("✓").green().bold());
        return Ok(());
    }

    for error in &errors {
        println!("  {} {}", style("✗").red(), error);
    }
    bail!("{} invalid configuration value(s)", errors.len());
}

/// Parameters of a drift simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub drift: f64,
    pub tolerance_ms: f64,
    pub seconds: u64,
    pub step: Duration,
    pub realtime: bool,
}

impl SimulationParams {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let drift = *matches
            .get_one::<f64>("drift")
            .ok_or_else(|| anyhow::anyhow!("Drift is required"))?;
        if !(drift > -1.0 && drift.is_finite()) {
            bail!("Drift must leave the slave playing forward, got {}", drift);
        }
        let tolerance_ms = *matches
            .get_one::<f64>("tolerance")
            .ok_or_else(|| anyhow::anyhow!("Tolerance is required"))?;
        let seconds = *matches
            .get_one::<u64>("seconds")
            .ok_or_else(|| anyhow::anyhow!("Seconds are required"))?;
        let step_ms = *matches
            .get_one::<u64>("step")
            .ok_or_else(|| anyhow::anyhow!("Step is required"))?;

        Ok(Self {
            drift,
            tolerance_ms,
            seconds,
            step: Duration::from_millis(step_ms),
            realtime: matches.get_flag("realtime"),
        })
    }
}

/// One hard seek observed on the slave
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub at: Duration,
    pub master_time: f64,
    pub slave_time: f64,
}

/// Outcome of a drift simulation
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub corrections: Vec<Correction>,
    pub errors: Vec<SyncErrorCode>,
    pub final_drift: f64,
}

/// Runs a master and a slave playing at `1 + drift` through one session
pub async fn run_simulation(params: &SimulationParams, config: &Config) -> Result<SimulationReport> {
    let table = Rc::new(RendererTable::new());
    let bridge = Rc::new(LoopbackBridge::new());
    let scheduler = Rc::new(Scheduler::new());
    let ctx = SyncContext {
        registry: Rc::new(SynchronizerRegistry::new()),
        bridge: bridge.clone(),
        host: table.clone(),
        scheduler: scheduler.clone(),
        config: config.sync.clone(),
    };

    let horizon = params.seconds as f64 + 60.0;
    let master = table.insert(RendererSnapshot::element("master.mp4").playing());
    let slave = table.insert(
        RendererSnapshot::element("slave.mp4")
            .playing()
            .with_buffered(vec![(0.0, horizon)]),
    );
    table.pin_playback_rate(slave, Some(1.0 + params.drift))?;

    let corrections = Rc::new(RefCell::new(Vec::new()));
    {
        let sink = corrections.clone();
        let host = Rc::downgrade(&table);
        let clock = Rc::downgrade(&scheduler);
        table.events(slave)?.subscribe(move |event| {
            if *event != RendererEvent::Seeked {
                return;
            }
            let (Some(host), Some(clock)) = (host.upgrade(), clock.upgrade()) else {
                return;
            };
            let time_of = |id| host.snapshot(id).map(|s| s.current_time).unwrap_or(f64::NAN);
            sink.borrow_mut().push(Correction {
                at: clock.now(),
                master_time: time_of(master),
                slave_time: time_of(slave),
            });
        });
    }

    let session = MediaSynchroniser::new(ctx);
    let errors = Rc::new(RefCell::new(Vec::new()));
    {
        let sink = errors.clone();
        session.events().subscribe(move |event| {
            if let SessionEvent::Error { last_error, .. } = event {
                sink.borrow_mut().push(*last_error);
            }
        });
    }

    session.init_media_synchroniser(master, MASTER_TIMELINE)?;
    session.add_media_object(
        slave,
        SLAVE_TIMELINE,
        AddOptions::default().with_tolerance_ms(params.tolerance_ms),
    )?;
    bridge.flush();
    if !session.is_initialised() {
        bail!("Synchroniser failed to start: {:?}", errors.borrow());
    }
    log::info!(
        "Simulation running: drift {:+}, tolerance {} ms, {}s in {:?} steps",
        params.drift,
        params.tolerance_ms,
        params.seconds,
        params.step
    );

    let total = Duration::from_secs(params.seconds);
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        let step = params.step.min(total - elapsed);
        table.advance_playback(step);
        if params.realtime {
            scheduler.drive(step, step).await?;
        } else {
            scheduler.advance(step);
        }
        elapsed += step;
    }

    let position = |id| table.snapshot(id).map(|s| s.current_time);
    let final_drift = position(slave)? - position(master)?;
    drop(session);

    let corrections = corrections.borrow().clone();
    let errors = errors.borrow().clone();
    Ok(SimulationReport {
        corrections,
        errors,
        final_drift,
    })
}

/// Runs a simulation and prints every correction
pub async fn simulate(params: &SimulationParams, config: &Config) -> Result<()> {
    println!(
        "Simulating {}s with the slave {} at {:+.1}% (tolerance {} ms + {} ms widening)",
        params.seconds,
        if params.drift >= 0.0 { "ahead" } else { "behind" },
        params.drift * 100.0,
        params.tolerance_ms,
        config.sync.tolerance_widening_ms
    );

    let report = run_simulation(params, config).await?;

    if report.corrections.is_empty() {
        println!("No corrections were needed.");
    } else {
        println!("\n{} Corrections", style(report.corrections.len()).bold().cyan());
        println!("{}", "=".repeat(48));
        for correction in &report.corrections {
            println!(
                "  {:>9}  master {:>9}  slave -> {:>9}",
                format_elapsed(correction.at),
                format_seconds(correction.master_time),
                format_seconds(correction.slave_time)
            );
        }
    }

    for code in &report.errors {
        println!("  {} error {}: {}", style("!").yellow(), code, code.description());
    }
    println!("\nFinal drift: {}", format_signed_millis(report.final_drift));
    Ok(())
}

fn format_millis(millis: u64) -> String {
    if millis >= 1000 && millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

fn format_elapsed(at: Duration) -> String {
    let total = at.as_millis();
    let minutes = total / 60_000;
    let seconds = (total % 60_000) as f64 / 1000.0;
    if minutes > 0 {
        format!("{}m{:06.3}s", minutes, seconds)
    } else {
        format!("{:.3}s", seconds)
    }
}

fn format_seconds(seconds: f64) -> String {
    format!("{:.3}s", seconds)
}

fn format_signed_millis(seconds: f64) -> String {
    format!("{:+.0}ms", seconds * 1000.0)
}
