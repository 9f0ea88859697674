use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

pub const REFRESH_PERIOD: Duration = Duration::from_secs(30);

/// Periodic refresh trigger. At most one timer runs at a time and it is
/// cancelled when stopped or dropped.
#[derive(Default)]
pub struct AutoRefresh {
    handle: Option<JoinHandle<()>>,
}

impl AutoRefresh {
    /// Calls `on_tick` every period until stopped or until it returns false.
    /// The first tick fires one full period after starting.
    pub fn start<F>(&mut self, on_tick: F)
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.stop();
        let mut interval = time::interval_at(Instant::now() + REFRESH_PERIOD, REFRESH_PERIOD);
        self.handle = Some(tokio::spawn(async move {
            loop {
                interval.tick().await;
                if !on_tick() {
                    debug!("auto-refresh receiver gone");
                    return;
                }
            }
        }));
        debug!(period = ?REFRESH_PERIOD, "auto-refresh started");
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("auto-refresh stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> bool + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::clone(&count);
        (count, move || {
            ticks.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (count, on_tick) = counter();
        let mut refresh = AutoRefresh::default();
        refresh.start(on_tick);
        assert!(refresh.is_running());

        time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        time::advance(REFRESH_PERIOD).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_cancels_future_ticks() {
        let (count, on_tick) = counter();
        let mut refresh = AutoRefresh::default();
        refresh.start(on_tick);
        refresh.stop();
        assert!(!refresh.is_running());

        time::advance(REFRESH_PERIOD * 3).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_keeps_a_single_timer() {
        let (count, on_tick) = counter();
        let mut refresh = AutoRefresh::default();
        refresh.start(on_tick);
        let (_, other) = counter();
        refresh.start(other);
        refresh.stop();
        let (count_b, on_tick_b) = counter();
        refresh.start(on_tick_b);

        time::advance(REFRESH_PERIOD).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_cancels_the_timer() {
        let (count, on_tick) = counter();
        {
            let mut refresh = AutoRefresh::default();
            refresh.start(on_tick);
        }
        time::advance(REFRESH_PERIOD * 2).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ends_when_the_callback_declines() {
        let mut refresh = AutoRefresh::default();
        refresh.start(|| false);
        time::advance(REFRESH_PERIOD).await;
        settle().await;
        assert!(!refresh.is_running());
    }
}
