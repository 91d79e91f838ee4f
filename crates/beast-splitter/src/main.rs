mod cli;
mod logging;

use std::{
    process::ExitCode,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};

use beast_net::{Direction, Engine, ReadMode};
use clap::Parser;
use cli::Cli;

/// How long the main loop sleeps between ticks. Matches the original's
/// roughly-10Hz polling cadence.
const TICK_SLEEP: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    logging::init(&cli.log_level);

    if cli.endpoint_count() == 0 {
        tracing::error!("no listeners or dial targets configured (--in-server/--out-server/--in-connect/--out-connect)");
        return ExitCode::FAILURE;
    }

    let mut engine = match Engine::new(cli.engine_config()) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(%err, "failed to initialize poller");
            return ExitCode::FAILURE;
        }
    };

    for raw in &cli.in_server {
        let addrs = match cli.server_group(raw) {
            Ok(addrs) => addrs,
            Err(msg) => {
                tracing::error!("{msg}");
                return ExitCode::FAILURE;
            }
        };
        match engine.add_service(&addrs, Direction::Input, ReadMode::BeastData) {
            Ok(_) => tracing::info!(?addrs, "listening (beast-server-input)"),
            Err(err) => {
                tracing::error!(%err, ?addrs, "failed to start input listener");
                return ExitCode::FAILURE;
            }
        }
    }

    for raw in &cli.out_server {
        let addrs = match cli.server_group(raw) {
            Ok(addrs) => addrs,
            Err(msg) => {
                tracing::error!("{msg}");
                return ExitCode::FAILURE;
            }
        };
        match engine.add_service(&addrs, Direction::Output, ReadMode::Ignore) {
            Ok(_) => tracing::info!(?addrs, "listening (beast-server-output)"),
            Err(err) => {
                tracing::error!(%err, ?addrs, "failed to start output listener");
                return ExitCode::FAILURE;
            }
        }
    }

    for &addr in &cli.in_connect {
        engine.add_dial_target(addr, Direction::Input);
        tracing::info!(%addr, "registered dial target (beast-client-input)");
    }
    for &addr in &cli.out_connect {
        engine.add_dial_target(addr, Direction::Output);
        tracing::info!(%addr, "registered dial target (beast-client-output)");
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(err) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            tracing::warn!(%err, "failed to install SIGINT handler");
        }
    }

    while running.load(Ordering::SeqCst) {
        if let Err(err) = engine.tick() {
            tracing::error!(%err, "tick failed");
            return ExitCode::FAILURE;
        }
        std::thread::sleep(TICK_SLEEP);
    }

    tracing::info!("shutting down");
    ExitCode::SUCCESS
}
