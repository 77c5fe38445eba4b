//! Status tracker: the latest published occupancy verdicts.
//!
//! The frame loop is the only writer and publishes a whole new snapshot per
//! frame; readers clone the current `Arc` and keep a consistent view even if
//! the next frame is published while they read. The lock is held only for
//! the pointer swap or clone.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Immutable per-frame verdicts, indexed by catalog position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Number of snapshots published before this one.
    pub version: u64,
    pub occupied: Vec<bool>,
}

impl StatusSnapshot {
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    pub fn is_occupied(&self, position: usize) -> Option<bool> {
        self.occupied.get(position).copied()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.iter().filter(|o| **o).count()
    }

    pub fn empty_count(&self) -> usize {
        self.len() - self.occupied_count()
    }

    /// One-line human summary, e.g. `v12 occupied 2/3 [1, 0, 1]`.
    pub fn summary(&self) -> String {
        let flags: Vec<&str> = self
            .occupied
            .iter()
            .map(|o| if *o { "1" } else { "0" })
            .collect();
        format!(
            "v{} occupied {}/{} [{}]",
            self.version,
            self.occupied_count(),
            self.len(),
            flags.join(", ")
        )
    }
}

pub struct StatusTracker {
    current: RwLock<Arc<StatusSnapshot>>,
}

impl StatusTracker {
    /// Tracker for `slots` spots, all initially empty.
    pub fn new(slots: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(StatusSnapshot {
                version: 0,
                occupied: vec![false; slots],
            })),
        }
    }

    pub fn slots(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    /// Replace the published verdicts. Returns the new version.
    pub fn publish(&self, occupied: Vec<bool>) -> Result<u64> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| anyhow!("status tracker lock poisoned"))?;
        if occupied.len() != guard.len() {
            return Err(anyhow!(
                "status has {} slots, tried to publish {}",
                guard.len(),
                occupied.len()
            ));
        }
        let version = guard.version + 1;
        *guard = Arc::new(StatusSnapshot { version, occupied });
        Ok(version)
    }

    pub fn snapshot(&self) -> Result<Arc<StatusSnapshot>> {
        let guard = self
            .current
            .read()
            .map_err(|_| anyhow!("status tracker lock poisoned"))?;
        Ok(Arc::clone(&guard))
    }
}

// ----------------------------------------------------------------------------
// Periodic reporter
// ----------------------------------------------------------------------------

/// Handle to a detached reporter thread.
///
/// Dropping the handle does not stop the thread; it runs until [`stop`] is
/// called or the process exits.
///
/// [`stop`]: ReporterHandle::stop
#[derive(Debug)]
pub struct ReporterHandle {
    shutdown: Arc<AtomicBool>,
}

impl ReporterHandle {
    /// Ask the reporter to exit after its current sleep.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Log the tracker's snapshot every `interval` on a background thread.
pub fn spawn_reporter(tracker: Arc<StatusTracker>, interval: Duration) -> Result<ReporterHandle> {
    if interval.is_zero() {
        return Err(anyhow!("report interval must be greater than zero"));
    }
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_thread = shutdown.clone();
    std::thread::Builder::new()
        .name("status-reporter".into())
        .spawn(move || loop {
            std::thread::sleep(interval);
            if shutdown_thread.load(Ordering::SeqCst) {
                break;
            }
            match tracker.snapshot() {
                Ok(snapshot) => log::info!("status {}", snapshot.summary()),
                Err(e) => {
                    log::error!("status reporter stopped: {}", e);
                    break;
                }
            }
        })?;
    Ok(ReporterHandle { shutdown })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_at_version_zero() -> Result<()> {
        let tracker = StatusTracker::new(3);
        let snap = tracker.snapshot()?;
        assert_eq!(snap.version, 0);
        assert_eq!(snap.occupied, vec![false, false, false]);
        assert_eq!(snap.empty_count(), 3);
        Ok(())
    }

    #[test]
    fn publish_swaps_whole_snapshot() -> Result<()> {
        let tracker = StatusTracker::new(2);
        let before = tracker.snapshot()?;
        assert_eq!(tracker.publish(vec![true, false])?, 1);
        assert_eq!(tracker.publish(vec![true, true])?, 2);

        // Readers holding an old snapshot keep seeing it.
        assert_eq!(before.occupied, vec![false, false]);
        let after = tracker.snapshot()?;
        assert_eq!(after.version, 2);
        assert_eq!(after.occupied_count(), 2);
        Ok(())
    }

    #[test]
    fn publish_rejects_wrong_length() {
        let tracker = StatusTracker::new(2);
        assert!(tracker.publish(vec![true]).is_err());
        assert!(tracker.publish(vec![true, true, true]).is_err());
    }

    #[test]
    fn summary_lists_flags() {
        let snap = StatusSnapshot {
            version: 12,
            occupied: vec![true, false, true],
        };
        assert_eq!(snap.summary(), "v12 occupied 2/3 [1, 0, 1]");
        assert_eq!(snap.is_occupied(1), Some(false));
        assert_eq!(snap.is_occupied(3), None);
    }

    #[test]
    fn concurrent_readers_see_consistent_snapshots() -> Result<()> {
        let tracker = Arc::new(StatusTracker::new(64));
        let reader = {
            let tracker = tracker.clone();
            std::thread::spawn(move || -> Result<()> {
                for _ in 0..1000 {
                    let snap = tracker.snapshot()?;
                    // Every publish writes all-true or all-false.
                    let first = snap.occupied[0];
                    assert!(snap.occupied.iter().all(|o| *o == first));
                }
                Ok(())
            })
        };
        for i in 0..1000 {
            tracker.publish(vec![i % 2 == 0; 64])?;
        }
        reader
            .join()
            .map_err(|_| anyhow!("reader thread panicked"))??;
        Ok(())
    }

    #[test]
    fn reporter_rejects_zero_interval() {
        let tracker = Arc::new(StatusTracker::new(1));
        assert!(spawn_reporter(tracker, Duration::ZERO).is_err());
    }

    #[test]
    fn reporter_stops_on_request() -> Result<()> {
        let tracker = Arc::new(StatusTracker::new(1));
        let handle = spawn_reporter(tracker.clone(), Duration::from_millis(5))?;
        std::thread::sleep(Duration::from_millis(20));
        handle.stop();
        // Only the tracker's own reference remains once the thread has exited.
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while Arc::strong_count(&tracker) > 1 {
            assert!(
                std::time::Instant::now() < deadline,
                "reporter thread still running after stop"
            );
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}
