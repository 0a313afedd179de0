use super::Tracker;
use crate::events::{Effect, Signal};
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct TickerConfig {
    pub interval_secs: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Recurring wake-up that finalizes the open period, bounding how stale
/// the persisted accrual can get when no transition arrives for a long
/// time. Effects produced by a tick (a limit crossed mid-period) are
/// handed to the caller-supplied sink.
pub struct Ticker {
    config: TickerConfig,
    running: Arc<AtomicBool>,
    tracker: Arc<Tracker>,
}

impl Ticker {
    pub fn new(tracker: Arc<Tracker>, config: TickerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            tracker,
        }
    }

    pub fn start<F>(&self, on_effects: F) -> thread::JoinHandle<()>
    where
        F: Fn(Vec<Effect>) + Send + 'static,
    {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let tracker = Arc::clone(&self.tracker);
        let interval = Duration::from_secs(self.config.interval_secs);

        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match tracker.handle_signal(&Signal::Tick) {
                    Ok(effects) => {
                        if !effects.is_empty() {
                            on_effects(effects);
                        }
                    }
                    Err(e) => warn!("Periodic finalize failed: {}", e),
                }

                thread::sleep(interval);
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrations, Database};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn setup() -> (Arc<Tracker>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        migrations::run(db.connection()).unwrap();
        (Arc::new(Tracker::new(Arc::new(Mutex::new(db)))), dir)
    }

    #[test]
    fn test_ticker_starts_and_stops() {
        let (tracker, _dir) = setup();
        let ticker = Ticker::new(tracker, TickerConfig { interval_secs: 1 });

        assert!(!ticker.is_running());

        let handle = ticker.start(|_| {});
        assert!(ticker.is_running());

        thread::sleep(Duration::from_millis(100));

        ticker.stop();
        handle.join().unwrap();

        assert!(!ticker.is_running());
    }
}
