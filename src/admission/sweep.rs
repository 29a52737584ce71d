//! Periodic sweeping of idle client state.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::AdmissionGate;
use crate::clock::Clock;

/// Spawn a task that calls [`AdmissionGate::sweep`] every `every`.
///
/// The task exits once `shutdown` changes or its sender is dropped. Sweeping
/// only reclaims memory; decisions are the same with or without it.
pub fn spawn_sweeper(
    gate: Arc<AdmissionGate>,
    clock: Arc<dyn Clock>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        info!(interval_secs = every.as_secs_f64(), "Client sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = gate.sweep(clock.now());
                    if removed > 0 {
                        debug!(removed = removed, "Removed idle clients");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Client sweeper stopping");
                    break;
                }
            }
        }
    })
}
