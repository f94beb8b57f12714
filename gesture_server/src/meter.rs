//! Frame rate metering.
//!
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

/// Frame counters of the pipeline stages.
#[derive(Default)]
pub struct Meter {
    captured_frames: AtomicU64,
    infered_frames: AtomicU64,
    published_frames: AtomicU64,
}

/// Counter values taken by [`Meter::take`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FrameCounts {
    pub captured: u64,
    pub infered: u64,
    pub published: u64,
}

impl FrameCounts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            captured_frames: AtomicU64::new(0),
            infered_frames: AtomicU64::new(0),
            published_frames: AtomicU64::new(0),
        }
    }

    pub fn tick_captured(&self) {
        self.captured_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_infered(&self) {
        self.infered_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_published(&self) {
        self.published_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset all counters.
    pub fn take(&self) -> FrameCounts {
        FrameCounts {
            captured: self.captured_frames.swap(0, Ordering::Relaxed),
            infered: self.infered_frames.swap(0, Ordering::Relaxed),
            published: self.published_frames.swap(0, Ordering::Relaxed),
        }
    }
}

/// Log the frame rates of the pipeline stages every two seconds.
pub fn spawn_meter_logger() -> JoinHandle<()> {
    tokio::spawn(async {
        let mut log_interval = interval(Duration::from_secs(2));
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let counts = METER.take();
            if counts.is_empty() {
                continue;
            }

            let elapsed = start.elapsed().as_secs_f32();
            log::info!(
                "Frames per second: captured {:.2}, infered {:.2}, streamed {:.2}",
                counts.captured as f32 / elapsed,
                counts.infered as f32 / elapsed,
                counts.published as f32 / elapsed,
            );
        }
    })
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn counters_reset_on_take() {
        let meter = Meter::new();
        meter.tick_captured();
        meter.tick_captured();
        meter.tick_infered();

        assert_eq!(
            meter.take(),
            FrameCounts {
                captured: 2,
                infered: 1,
                published: 0
            }
        );
        assert!(meter.take().is_empty());
    }
}
