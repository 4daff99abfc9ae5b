// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod filter;
pub mod inventory;
pub mod logging;
pub mod types;
pub mod watch;
pub mod watchdog;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::Config;
use crate::engine::{
    CoreEngine, EngineEvent, EngineHandle, EngineOptions, EngineRuntime, RunPlanner,
    TriggerSource,
};
use crate::events::{EventBus, EventEnvelope, RunEvent};
use crate::exec::ProcessExecutor;
use crate::inventory::TestInventory;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config + inventory loading
/// - engine core / executor / watchdog
/// - (optional) file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let root_dir = config_root_dir(&config_path);
    let inventory_path = if cfg.inventory_path.is_absolute() {
        cfg.inventory_path.clone()
    } else {
        root_dir.join(&cfg.inventory_path)
    };
    let inventory = match inventory::load_inventory(&inventory_path) {
        Ok(inventory) => inventory,
        Err(err) => {
            warn!(
                path = ?inventory_path,
                error = %err,
                "could not load test inventory; starting empty until discovery publishes one"
            );
            TestInventory::default()
        }
    };

    if args.dry_run {
        print_dry_run(&cfg, &inventory);
        return Ok(());
    }

    // Engine event channel.
    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(64);
    let events = EventBus::new(256);

    // Hang watchdog starts in its bootstrap phase until boot completes.
    let bootstrap = watchdog::bootstrap_timeout_from_env();
    let watchdog_handle = watchdog::spawn_watchdog(bootstrap, cfg.hang_timeout, events.clone());

    // Process executor (real implementation in production).
    let executor = ProcessExecutor::new(
        &cfg,
        engine_tx.clone(),
        events.clone(),
        watchdog_handle.clone(),
    );

    // Construct the pure core engine (single source of truth for semantics).
    let planner = RunPlanner::new(
        cfg.filter.clone(),
        cfg.test_type,
        cfg.only_application_module,
        inventory,
    );
    let options = EngineOptions {
        exit_when_idle: args.once,
    };
    let core = CoreEngine::new(cfg.mode, planner, options);

    // Construct the async IO shell around the core.
    let (runtime, status_rx) =
        EngineRuntime::new(core, engine_rx, executor, events.clone(), watchdog_handle);
    let handle = EngineHandle::new(engine_tx.clone(), events.clone(), status_rx);

    // Optional file watcher (disabled in --once mode).
    let _watcher_handle = if !args.once {
        let profile = watch::WatchProfile::from_config(&cfg.watch)?;
        Some(watch::spawn_watcher(
            root_dir,
            profile,
            cfg.watch.use_hash,
            inventory_path,
            engine_tx.clone(),
        )?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = engine_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(EngineEvent::ShutdownRequested).await;
        });
    }

    if cfg.console.enabled {
        spawn_summary_printer(handle.subscribe());
    }

    // The bundled binary is its own host: configuration is live at this
    // point, so boot is complete and the configured hang timeout applies.
    handle.boot_completed().await?;

    // Seed the startup run. `--once` is an explicit run-now request; a
    // watch session goes through normal mode gating instead.
    let startup = if args.once {
        TriggerSource::Manual
    } else {
        TriggerSource::Startup
    };
    handle.request_run(startup).await?;

    runtime.run().await?;
    Ok(())
}

/// Figure out a sensible project root for watching.
///
/// - If the config path has a non-empty parent (e.g. "configs/Testwatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Testwatch.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print run summaries and watchdog dumps to stdout for interactive use.
fn spawn_summary_printer(mut rx: broadcast::Receiver<EventEnvelope>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => match envelope.event {
                    RunEvent::RunFinished { summary } => {
                        let status = if summary.is_success() { "OK" } else { "FAILED" };
                        println!(
                            "run #{}: {} ({} passed, {} failed, {} errored, {} skipped) in {:.1?}",
                            summary.run_id,
                            status,
                            summary.passed(),
                            summary.failed(),
                            summary.errored(),
                            summary.skipped.len(),
                            summary.duration,
                        );
                    }
                    RunEvent::WatchdogFired { dump } => {
                        println!(
                            "[watchdog] no test activity for {:.1?}; see log for diagnostics",
                            dump.quiet_for
                        );
                    }
                    RunEvent::ModeChanged { mode } => {
                        println!("continuous testing is now {mode}");
                    }
                    _ => {}
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "summary printer lagged behind the event stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Simple dry-run output: print the resolved setup and the tests a run
/// would select right now.
fn print_dry_run(cfg: &Config, inventory: &TestInventory) {
    println!("testwatch dry-run");
    println!("  mode = {}", cfg.mode);
    println!("  type = {}", cfg.test_type);
    println!("  only_application_module = {}", cfg.only_application_module);
    println!("  hang_detection_timeout = {:?}", cfg.hang_timeout);
    if let Some(launch) = &cfg.launch {
        println!(
            "  launch = {} {:?} (wait {:?})",
            launch.artifact, launch.target, launch.wait_time
        );
    }
    println!();

    let planner = RunPlanner::new(
        cfg.filter.clone(),
        cfg.test_type,
        cfg.only_application_module,
        inventory.clone(),
    );
    let plan = planner.build_plan(0, TriggerSource::Manual);
    println!("selected tests ({}):", plan.selected());
    for phase in &plan.phases {
        for test in &phase.tests {
            println!("  - [{}] {} ({})", phase.kind, test.class_name, test.module);
        }
    }
    if !plan.skipped.is_empty() {
        println!("skipped ({}):", plan.skipped.len());
        for skip in &plan.skipped {
            println!("  - {}: {}", skip.class_name, skip.reason);
        }
    }

    debug!("dry-run complete (no execution)");
}
