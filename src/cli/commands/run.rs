//! Run command - relay files until interrupted.

use std::time::Duration;

use anyhow::{Context, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::config::Settings;
use crate::relay::FeedRelay;

/// How often the wait checks that the relay is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_millis(500);

/// Why the run command stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Interrupted,
    RelayStopped,
}

/// Start the relay, block until Ctrl-C, then shut down gracefully.
pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("installing Ctrl-C handler")?;

    let relay = FeedRelay::from_settings(settings)?;
    let handle = relay.start()?;

    let stop = wait_for_stop(&stop_rx, LIVENESS_INTERVAL, || handle.is_running());

    let report = handle.shutdown()?;
    println!("{}", serde_json::to_string_pretty(&report.stats)?);

    if stop == Stop::RelayStopped {
        bail!("relay stopped unexpectedly");
    }
    Ok(())
}

/// Wait for a stop signal while `is_running` holds.
fn wait_for_stop(
    stop_rx: &Receiver<()>,
    interval: Duration,
    is_running: impl Fn() -> bool,
) -> Stop {
    loop {
        match stop_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return Stop::Interrupted,
            Err(RecvTimeoutError::Timeout) => {
                if !is_running() {
                    tracing::error!("[run] detector thread exited");
                    return Stop::RelayStopped;
                }
            }
        }
    }
}
