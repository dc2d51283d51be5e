//! Cancellable one-second countdown used for reading phases and turn deadlines.

use std::time::Duration;

use serde::Serialize;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use utoipa::ToSchema;

const TICK: Duration = Duration::from_secs(1);

/// Countdown values mirrored into room snapshots and `timerUpdate` frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Total length of the countdown in seconds.
    pub duration: u32,
    /// Seconds left.
    pub remaining: u32,
    /// Whether a countdown is currently active.
    pub running: bool,
}

impl TimerState {
    /// State right after a countdown of `seconds` has been armed.
    pub fn started(seconds: u32) -> Self {
        Self {
            duration: seconds,
            remaining: seconds,
            running: true,
        }
    }

    /// Same values with the running flag cleared.
    pub fn stopped(self) -> Self {
        Self {
            running: false,
            ..self
        }
    }
}

/// A room's single countdown task.
///
/// Starting a new countdown always aborts the previous one first, so a room never has two
/// intervals firing concurrently.
#[derive(Debug, Default)]
pub struct RoomTimer {
    task: Option<JoinHandle<()>>,
}

impl RoomTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a countdown of `seconds`.
    ///
    /// `on_tick` receives the remaining seconds after every elapsed second (down to zero) and
    /// `on_expire` runs exactly once afterwards. Must be called from within a Tokio runtime.
    pub fn start<T, E>(&mut self, seconds: u32, on_tick: T, on_expire: E)
    where
        T: Fn(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.stop();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut remaining = seconds;
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;
                on_tick(remaining);
            }
            on_expire();
        });
        self.task = Some(task);
    }

    /// Cancel the running countdown, if any. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether a countdown is still pending.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RoomTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    fn counters() -> (Arc<Mutex<Vec<u32>>>, Arc<AtomicU32>) {
        (Arc::new(Mutex::new(Vec::new())), Arc::new(AtomicU32::new(0)))
    }

    async fn settle(millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_down_and_expires_once() {
        let (ticks, expired) = counters();
        let mut timer = RoomTimer::new();
        {
            let ticks = ticks.clone();
            let expired = expired.clone();
            timer.start(
                3,
                move |remaining| ticks.lock().unwrap().push(remaining),
                move || {
                    expired.fetch_add(1, Ordering::SeqCst);
                },
            );
        }

        settle(5_500).await;

        assert_eq!(*ticks.lock().unwrap(), vec![2, 1, 0]);
        assert_eq!(expired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_replaces_the_previous_countdown() {
        let (first_ticks, first_expired) = counters();
        let (second_ticks, second_expired) = counters();
        let mut timer = RoomTimer::new();
        {
            let ticks = first_ticks.clone();
            let expired = first_expired.clone();
            timer.start(
                5,
                move |remaining| ticks.lock().unwrap().push(remaining),
                move || {
                    expired.fetch_add(1, Ordering::SeqCst);
                },
            );
        }
        settle(2_500).await;
        {
            let ticks = second_ticks.clone();
            let expired = second_expired.clone();
            timer.start(
                2,
                move |remaining| ticks.lock().unwrap().push(remaining),
                move || {
                    expired.fetch_add(1, Ordering::SeqCst);
                },
            );
        }
        settle(10_500).await;

        assert_eq!(*first_ticks.lock().unwrap(), vec![4, 3]);
        assert_eq!(first_expired.load(Ordering::SeqCst), 0);
        assert_eq!(*second_ticks.lock().unwrap(), vec![1, 0]);
        assert_eq!(second_expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_silences_callbacks() {
        let (ticks, expired) = counters();
        let mut timer = RoomTimer::new();
        {
            let ticks = ticks.clone();
            let expired = expired.clone();
            timer.start(
                2,
                move |remaining| ticks.lock().unwrap().push(remaining),
                move || {
                    expired.fetch_add(1, Ordering::SeqCst);
                },
            );
        }
        assert!(timer.is_running());
        timer.stop();
        timer.stop();
        settle(4_500).await;

        assert!(ticks.lock().unwrap().is_empty());
        assert_eq!(expired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn timer_state_helpers() {
        let state = TimerState::started(90);
        assert_eq!(state.remaining, 90);
        assert!(state.running);
        let stopped = state.stopped();
        assert!(!stopped.running);
        assert_eq!(stopped.duration, 90);
    }
}
