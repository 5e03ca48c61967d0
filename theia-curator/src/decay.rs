//! Periodic decay sweep.
//!
//! Runs for the life of the process, bleeding energy out of the grid on a
//! fixed interval. Each sweep takes the grid lock once for the whole pass,
//! so deposits never observe a half-decayed grid.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use theia_core::grid::{DecayMode, SharedGrid};

/// The decay thread body.
pub struct DecayTask {
    grid: SharedGrid,
    interval: Duration,
    mode: DecayMode,
    shutdown: Arc<AtomicBool>,
}

impl DecayTask {
    pub fn new(
        grid: SharedGrid,
        interval: Duration,
        mode: DecayMode,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            grid,
            interval,
            mode,
            shutdown,
        }
    }

    /// Run until shutdown.
    pub fn run(self) {
        tracing::info!("Decay task started ({:?} every {:?})", self.mode, self.interval);

        let mut last_sweep = Instant::now();
        while !self.shutdown.load(Ordering::Relaxed) {
            // Sleep in short slices so shutdown is not delayed a whole interval
            thread::sleep(Duration::from_millis(100));
            if last_sweep.elapsed() < self.interval {
                continue;
            }
            last_sweep = Instant::now();

            let mut grid = self.grid.lock();
            grid.decay(&self.mode);
            tracing::trace!("Decay sweep done, total energy {:.4}", grid.total_energy());
        }

        tracing::info!("Decay task exiting");
    }

    /// Run on a named background thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("decay".to_string())
            .spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use theia_core::geom::Vec2;
    use theia_core::grid::{AttentionGrid, GridConfig};

    #[test]
    fn sweeps_drain_the_grid_over_time() {
        let grid: SharedGrid = Arc::new(Mutex::new(AttentionGrid::new(&GridConfig::default())));
        grid.lock()
            .deposit(Vec2::new(0.0, 0.0), Vec2::new(3.0, 0.0), 0.025);
        let initial = grid.lock().total_energy();
        assert!(initial > 0.0);

        let shutdown = Arc::new(AtomicBool::new(false));
        let task = DecayTask::new(
            Arc::clone(&grid),
            Duration::from_millis(120),
            DecayMode::Multiply { factor: 0.5 },
            Arc::clone(&shutdown),
        );
        let handle = task.spawn().unwrap();

        // A few intervals pass; energy must fall, never rise.
        std::thread::sleep(Duration::from_millis(600));
        let decayed = grid.lock().total_energy();
        assert!(decayed < initial);
        assert!(decayed >= 0.0);

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
