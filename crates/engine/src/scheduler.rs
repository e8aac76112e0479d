//! The four periodic tasks that drive the engine.
//!
//! Each task owns its own interval and walks the configured basket on every
//! tick. Tick handlers are per-instrument and bounded, so a slow instrument
//! delays its neighbours within one pass but never wedges the whole task.
//! Handler errors are logged and the task keeps going; the only way a task
//! ends is the process shutting down.

use crate::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, warn};

/// Spawns the decision, monitor, sweep, and history tasks and runs until one
/// of them panics or the process is stopped.
pub async fn run(engine: Arc<Engine>) {
    let schedule = engine.schedule().clone();
    let mut tasks = JoinSet::new();

    {
        let engine = Arc::clone(&engine);
        let period = Duration::from_secs(schedule.decision_interval_secs);
        tasks.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for instrument in engine.instrument_names() {
                    if let Err(e) = engine.on_decision_tick(&instrument).await {
                        warn!(instrument = %instrument, error = %e, "decision tick failed");
                        engine.publish_error(format!("{instrument}: {e}"));
                    }
                }
            }
        });
    }

    {
        let engine = Arc::clone(&engine);
        let period = Duration::from_secs(schedule.monitor_interval_secs);
        tasks.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for instrument in engine.instrument_names() {
                    if let Err(e) = engine.on_monitor_tick(&instrument).await {
                        warn!(instrument = %instrument, error = %e, "monitor tick failed");
                        engine.publish_error(format!("{instrument}: {e}"));
                    }
                }
            }
        });
    }

    {
        let engine = Arc::clone(&engine);
        let period = Duration::from_secs(schedule.sweep_interval_secs);
        tasks.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for instrument in engine.instrument_names() {
                    if let Err(e) = engine.on_stale_order_sweep(&instrument).await {
                        warn!(instrument = %instrument, error = %e, "stale order sweep failed");
                    }
                }
            }
        });
    }

    {
        let engine = Arc::clone(&engine);
        let period = Duration::from_secs(schedule.history_refresh_secs);
        tasks.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for instrument in engine.instrument_names() {
                    if let Err(e) = engine.on_history_refresh(&instrument).await {
                        warn!(instrument = %instrument, error = %e, "history refresh failed");
                    }
                }
            }
        });
    }

    // The task loops never return, so a join result is always a panic or
    // an abort.
    while let Some(Err(e)) = tasks.join_next().await {
        error!(error = %e, "engine task aborted");
    }
}
