//! Signal intake for the runner.
//!
//! Termination signals become stop events on the controller channel, so the
//! cleanup guarantee holds no matter how the scheduler tears us down.
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::events::{Event, StopSource};

/// Spawn the task that forwards SIGINT/SIGTERM/SIGQUIT into the controller.
///
/// The task keeps reading signals until `quit` is cancelled, which the
/// controller does on its terminal transition; repeated signals collapse in
/// the controller.
#[cfg(unix)]
pub fn spawn_signal_intake(
    events: UnboundedSender<Event>,
    quit: CancellationToken,
) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGINT handler: {e}");
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                return;
            }
        };
        let mut sigquit = match signal(SignalKind::quit()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGQUIT handler: {e}");
                return;
            }
        };

        loop {
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
                _ = sigquit.recv() => "SIGQUIT",
                _ = quit.cancelled() => {
                    info!("signal intake is quitting");
                    return;
                }
            };
            info!(signal = name, "received termination signal");
            let _ = events.send(Event::Stop {
                source: StopSource::Signal,
            });
        }
    })
}
