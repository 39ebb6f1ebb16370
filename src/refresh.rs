//! Periodic recomputation driver for the host application: one cadence
//! for display refresh, a slower one for alert re-evaluation. The
//! engine itself stays synchronous; this only schedules the calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{interval, Duration};

pub type RefreshCallback = Arc<dyn Fn() + Send + Sync>;

const DEFAULT_DISPLAY_EVERY: Duration = Duration::from_secs(30);
const DEFAULT_ALERTS_EVERY: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct RefreshDriver {
    display_every: Duration,
    alerts_every: Duration,
    stop: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl RefreshDriver {
    pub fn new(display_every: Duration, alerts_every: Duration) -> Self {
        Self {
            display_every,
            alerts_every,
            stop: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 30 s display refresh, 2 min alert re-evaluation.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_DISPLAY_EVERY, DEFAULT_ALERTS_EVERY)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns both cadence loops. Each fires its callback immediately on
    /// start, then on every tick until `stop` is called. Calling `start`
    /// while already running is a no-op.
    pub fn start(&self, on_display: RefreshCallback, on_alerts: RefreshCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("refresh driver already running");
            return;
        }
        tracing::info!(
            display_every_ms = self.display_every.as_millis() as u64,
            alerts_every_ms = self.alerts_every.as_millis() as u64,
            "refresh driver started"
        );
        self.spawn_loop(self.display_every, on_display);
        self.spawn_loop(self.alerts_every, on_alerts);
    }

    fn spawn_loop(&self, every: Duration, callback: RefreshCallback) {
        let stop = self.stop.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        callback();
                    }
                    _ = stop.notified() => break,
                }
            }
        });
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stop.notify_waiters();
            tracing::info!("refresh driver stopped");
        }
    }
}
