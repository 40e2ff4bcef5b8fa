//! Connection health monitoring.
//!
//! The monitor fires a heartbeat callback on a fixed interval and counts
//! ticks that were never acknowledged. Once the count passes the liveness
//! threshold the connection is considered dead and the liveness callback
//! fires instead; the socket treats that the same as a transport failure.

use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type AsyncCallback = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

pub struct HealthMonitor {
    interval: Duration,
    liveness_threshold: u32,
    unacked: Arc<AtomicU32>,
    on_interval: std::sync::Mutex<Option<AsyncCallback>>,
    on_liveness: std::sync::Mutex<Option<AsyncCallback>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(interval: Duration, liveness_threshold: u32) -> Self {
        Self {
            interval,
            liveness_threshold,
            unacked: Arc::new(AtomicU32::new(0)),
            on_interval: std::sync::Mutex::new(None),
            on_liveness: std::sync::Mutex::new(None),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Sets the heartbeat callback, invoked once per interval tick.
    pub fn on_interval<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: AsyncCallback = Arc::new(move || Box::pin(callback()) as BoxFuture);
        *self.on_interval.lock().unwrap() = Some(callback);
    }

    /// Sets the callback fired when the liveness threshold is exceeded.
    pub fn on_liveness_threshold<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: AsyncCallback = Arc::new(move || Box::pin(callback()) as BoxFuture);
        *self.on_liveness.lock().unwrap() = Some(callback);
    }

    /// Acknowledges liveness, resetting the unacked-tick counter. Called by
    /// the socket whenever inbound traffic proves the connection is alive.
    pub fn ack(&self) {
        self.unacked.store(0, Ordering::SeqCst);
    }

    /// Starts the monitor loop. A previous loop, if any, is stopped first.
    pub fn start(self: &Arc<Self>) {
        self.stop();
        self.unacked.store(0, Ordering::SeqCst);

        let monitor = self.clone();
        let handle = tokio::task::spawn(async move {
            loop {
                tokio::time::sleep(monitor.interval).await;

                let missed = monitor.unacked.fetch_add(1, Ordering::SeqCst) + 1;
                if missed > monitor.liveness_threshold {
                    warn!(
                        target: "Socket/Health",
                        "Liveness threshold exceeded ({missed} unacked ticks)"
                    );
                    let callback = monitor.on_liveness.lock().unwrap().clone();
                    if let Some(callback) = callback {
                        callback().await;
                    }
                    return;
                }

                debug!(target: "Socket/Health", "Health check tick ({missed} unacked)");
                let callback = monitor.on_interval.lock().unwrap().clone();
                if let Some(callback) = callback {
                    callback().await;
                }
            }
        });
        *self.task.lock().unwrap() = Some(handle);
    }

    /// Stops the monitor loop. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn fires_interval_callback_until_threshold() {
        let monitor = Arc::new(HealthMonitor::new(Duration::from_millis(10), 3));
        let ticks = Arc::new(AtomicUsize::new(0));
        let dead = Arc::new(AtomicUsize::new(0));

        let ticks_clone = ticks.clone();
        monitor.on_interval(move || {
            let ticks = ticks_clone.clone();
            async move {
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        });
        let dead_clone = dead.clone();
        monitor.on_liveness_threshold(move || {
            let dead = dead_clone.clone();
            async move {
                dead.fetch_add(1, Ordering::SeqCst);
            }
        });

        monitor.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Three heartbeat ticks, then the fourth unacked tick trips the
        // threshold and the loop exits.
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(dead.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn ack_keeps_the_monitor_alive() {
        let monitor = Arc::new(HealthMonitor::new(Duration::from_millis(10), 2));
        let dead = Arc::new(AtomicUsize::new(0));

        monitor.on_interval(|| async {});
        let dead_clone = dead.clone();
        monitor.on_liveness_threshold(move || {
            let dead = dead_clone.clone();
            async move {
                dead.fetch_add(1, Ordering::SeqCst);
            }
        });

        monitor.start();
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(8)).await;
            monitor.ack();
        }
        assert_eq!(dead.load(Ordering::SeqCst), 0);
        assert!(monitor.is_running());
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let monitor = Arc::new(HealthMonitor::new(Duration::from_millis(10), 1));
        monitor.start();
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
    }
}
