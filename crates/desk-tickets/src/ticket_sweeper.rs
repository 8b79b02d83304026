use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use desk_core::current_unix_timestamp_ms;

use crate::ticket_config::DEFAULT_SWEEP_INTERVAL_MS;
use crate::ticket_lifecycle::TicketLifecycle;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Scheduling knobs for the expiry sweep.
pub struct TicketSweeperConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for TicketSweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

#[derive(Debug)]
/// Handle to the running sweep task. Dropping the handle without calling
/// [`shutdown`](Self::shutdown) detaches the task.
pub struct TicketSweeperHandle {
    enabled: bool,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TicketSweeperHandle {
    fn disabled() -> Self {
        Self {
            enabled: false,
            shutdown_tx: None,
            task: None,
        }
    }

    fn running(shutdown_tx: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            enabled: true,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Starts the recurring expiry sweep on the ambient Tokio runtime.
///
/// The sweep runs with system authority and shares the lifecycle's mutation
/// lock, so interaction-triggered transitions and ticks never interleave. A
/// failed tick (store unavailable) is logged and retried on the next one.
pub fn start_ticket_sweeper(
    config: TicketSweeperConfig,
    lifecycle: Arc<TicketLifecycle>,
) -> Result<TicketSweeperHandle> {
    if config.interval.is_zero() {
        anyhow::bail!("ticket sweep interval must be greater than zero");
    }
    if !config.enabled {
        return Ok(TicketSweeperHandle::disabled());
    }

    let handle = tokio::runtime::Handle::try_current()
        .context("ticket sweeper requires an active Tokio runtime")?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = handle.spawn(async move {
        run_ticket_sweep_loop(config, lifecycle, shutdown_rx).await;
    });
    Ok(TicketSweeperHandle::running(shutdown_tx, task))
}

async fn run_ticket_sweep_loop(
    config: TicketSweeperConfig,
    lifecycle: Arc<TicketLifecycle>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match lifecycle.sweep(current_unix_timestamp_ms()).await {
                    Ok(report) => {
                        if !report.closed.is_empty() {
                            tracing::debug!(
                                scanned = report.scanned,
                                closed = report.closed.len(),
                                "expiry sweep closed inactive tickets"
                            );
                        }
                    }
                    Err(error) => {
                        tracing::warn!("expiry sweep failed, retrying next tick: {error}");
                    }
                }
            }
            _ = &mut shutdown_rx => {
                break;
            }
        }
    }
}
