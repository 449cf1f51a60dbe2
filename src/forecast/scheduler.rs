use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{ForecastInput, Forecaster, TrialResult};

/// Results of one finished, still-current computation.
#[derive(Debug, Clone)]
pub struct ForecastBatch {
    pub epoch: u64,
    pub results: Vec<TrialResult>,
}

enum Command {
    Request(Arc<ForecastInput>),
    Now(Arc<ForecastInput>),
}

/// Coalesces bursts of recompute requests behind a debounce window and runs
/// each surviving computation on the blocking pool.
///
/// Finished batches arrive on the receiver returned by [`ForecastScheduler::spawn`];
/// batches superseded by a newer request are never delivered.
pub struct ForecastScheduler {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ForecastScheduler {
    pub fn spawn(
        forecaster: Arc<Forecaster>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ForecastBatch>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_loop(rx, forecaster, debounce, results_tx));
        (ForecastScheduler { commands, task }, results_rx)
    }

    /// Spawn with the debounce window taken from the forecaster's configuration.
    pub fn from_config(
        forecaster: Arc<Forecaster>,
    ) -> (Self, mpsc::UnboundedReceiver<ForecastBatch>) {
        let debounce = Duration::from_millis(forecaster.config().debounce_ms);
        Self::spawn(forecaster, debounce)
    }

    /// Ask for a recompute once the input stops changing for the debounce window.
    pub fn request(&self, input: ForecastInput) {
        let _ = self.commands.send(Command::Request(Arc::new(input)));
    }

    /// Recompute immediately, discarding any request still waiting out its window.
    pub fn compute_now(&self, input: ForecastInput) {
        let _ = self.commands.send(Command::Now(Arc::new(input)));
    }

    /// Stop accepting requests and wait for the loop to wind down.
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}

async fn run_loop(
    mut rx: mpsc::UnboundedReceiver<Command>,
    forecaster: Arc<Forecaster>,
    debounce: Duration,
    results: mpsc::UnboundedSender<ForecastBatch>,
) {
    let mut pending: Option<Arc<ForecastInput>> = None;
    loop {
        let command = match pending.take() {
            Some(input) => {
                tokio::select! {
                    command = rx.recv() => {
                        // a newer request restarts the window
                        if command.is_none() {
                            dispatch(&forecaster, input, &results);
                        }
                        command
                    }
                    _ = tokio::time::sleep(debounce) => {
                        dispatch(&forecaster, input, &results);
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match command {
            Some(Command::Request(input)) => pending = Some(input),
            Some(Command::Now(input)) => dispatch(&forecaster, input, &results),
            None => break,
        }
    }
}

fn dispatch(
    forecaster: &Arc<Forecaster>,
    input: Arc<ForecastInput>,
    results: &mpsc::UnboundedSender<ForecastBatch>,
) {
    let epoch = forecaster.begin();
    let forecaster = Arc::clone(forecaster);
    let results = results.clone();
    tokio::spawn(async move {
        let worker = Arc::clone(&forecaster);
        let outcome =
            tokio::task::spawn_blocking(move || worker.compute_for_epoch(&input, epoch)).await;
        match outcome {
            Ok(Some(batch)) if forecaster.is_current(epoch) => {
                let _ = results.send(ForecastBatch {
                    epoch,
                    results: batch,
                });
            }
            Ok(_) => debug!(epoch, "Discarding superseded forecast"),
            Err(e) => error!(epoch, error = %e, "Forecast task failed"),
        }
    });
}
