//! Generic collection loop with cooperative remote stop.
//!
//! One loop instance drives one sample source: poll the stop endpoint,
//! collect, transmit, sleep. A tick's failure is logged and swallowed —
//! the next tick is the only retry. The loop terminates only on a remote
//! STOP command or process shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::uplink::Uplink;

/// Produces one telemetry sample per tick.
pub trait SampleSource {
    type Sample: Serialize;

    /// Collects a sample, or None when there is nothing to send this tick.
    fn collect(&mut self) -> Option<Self::Sample>;
}

pub struct CollectorLoop<U: Uplink> {
    name: &'static str,
    uplink: U,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl<U: Uplink> CollectorLoop<U> {
    pub fn new(
        name: &'static str,
        uplink: U,
        interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name,
            uplink,
            interval,
            running,
        }
    }

    /// Runs until a remote STOP command arrives or the running flag drops.
    pub fn run<S: SampleSource>(&mut self, source: &mut S) {
        info!(
            collector = self.name,
            interval_secs = self.interval.as_secs(),
            "starting collection loop"
        );

        let mut tick: u64 = 0;
        while self.running.load(Ordering::SeqCst) {
            if self.uplink.stop_requested() {
                info!(collector = self.name, "received STOP command, shutting down");
                break;
            }

            tick += 1;
            match source.collect() {
                Some(sample) => match serde_json::to_value(&sample) {
                    Ok(body) => match self.uplink.send(&body) {
                        Ok(()) => debug!(collector = self.name, tick, "sample transmitted"),
                        Err(e) => warn!(
                            collector = self.name,
                            tick,
                            error = %e,
                            "transmit failed, sample dropped"
                        ),
                    },
                    Err(e) => warn!(
                        collector = self.name,
                        tick,
                        error = %e,
                        "sample serialization failed"
                    ),
                },
                None => debug!(collector = self.name, tick, "no data this tick"),
            }

            self.sleep_interval();
        }

        info!(collector = self.name, ticks = tick, "collection loop stopped");
    }

    // Sleep in short slices so Ctrl-C takes effect promptly.
    fn sleep_interval(&self) {
        let slice = Duration::from_millis(100);
        let mut remaining = self.interval;
        while remaining > Duration::ZERO && self.running.load(Ordering::SeqCst) {
            let nap = remaining.min(slice);
            std::thread::sleep(nap);
            remaining = remaining.saturating_sub(nap);
        }
    }
}
