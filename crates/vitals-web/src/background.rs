//! Background processing: retention pruning.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{error, info};

use vitals_core::store::StoreError;

use crate::state::SharedStore;

/// Once a day, drop rows older than the retention window.
const PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Daily retention prune. The interval's first tick completes
/// immediately, so a prune also runs at startup.
pub(crate) async fn retention_loop(state: SharedStore, retention_days: u32) {
    let mut tick = tokio::time::interval(PRUNE_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tick.tick().await;

        let state_clone = state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let cutoff = (Utc::now() - ChronoDuration::days(i64::from(retention_days)))
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();
            let store = state_clone.lock().unwrap();
            let removed = store.prune_older_than(&cutoff)?;
            let counts = store.counts()?;
            Ok::<_, StoreError>((removed, counts))
        })
        .await;

        match result {
            Ok(Ok(((system_removed, stock_removed), counts))) => info!(
                system_removed,
                stock_removed,
                system_rows = counts.system,
                stock_rows = counts.stock,
                retention_days,
                "retention prune complete"
            ),
            Ok(Err(e)) => error!(error = %e, "retention prune failed"),
            Err(e) => error!(error = %e, "retention prune panicked"),
        }
    }
}
