use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::{debug, info};

/// Recurring render-only tick. Overdue/imminent flags depend on wall-clock
/// time, so the display goes stale even when no command arrives; a tick tells
/// the caller to rebuild the view from unchanged state.
///
/// `run` blocks its caller and owns no thread of its own; dropping or
/// signalling the paired `StopHandle` ends the loop, so teardown never leaks
/// a pending callback.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    stop_rx: Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct StopHandle {
    stop_tx: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        // A dead receiver means the loop is already gone.
        let _ = self.stop_tx.send(());
    }
}

impl Ticker {
    pub fn new(interval: Duration) -> (Self, StopHandle) {
        let (stop_tx, stop_rx) = mpsc::channel();
        (Self { interval, stop_rx }, StopHandle { stop_tx })
    }

    /// Invoke `on_tick` every interval until stopped. A tick callback error
    /// also ends the loop and is propagated.
    #[tracing::instrument(skip(self, on_tick))]
    pub fn run<F>(self, mut on_tick: F) -> anyhow::Result<()>
    where
        F: FnMut() -> anyhow::Result<()>,
    {
        info!(interval_secs = self.interval.as_secs(), "ticker running");

        loop {
            match self.stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    debug!("tick");
                    on_tick()?;
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("ticker stopped");
                    return Ok(());
                }
            }
        }
    }
}
