use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::events::Event;

/// Smallest warning lead time. Limits at or below twice this value get no
/// warning at all, only the kill timer.
pub const MIN_BUFFER: Duration = Duration::from_secs(30);

/// Largest warning lead time.
pub const MAX_BUFFER: Duration = Duration::from_secs(5 * 60);

/// Warning lead time for a step time limit: a fifth of the limit, clamped
/// into `[MIN_BUFFER, MAX_BUFFER]`. `None` means the limit is too short to
/// warn about.
pub fn warning_buffer(limit: Duration) -> Option<Duration> {
    if limit <= MIN_BUFFER * 2 {
        return None;
    }
    Some(limit.mul_f64(0.2).clamp(MIN_BUFFER, MAX_BUFFER))
}

/// Per-step deadline primitive.
///
/// Arms a kill timer at the limit and, for long enough limits, a warning
/// timer shortly before it. Timer firings are delivered as events; a firing
/// that races a [`TimeTracker::stop`] may still be delivered once, and the
/// controller discards it by checking the step index against its state.
pub struct TimeTracker {
    step: usize,
    end: Instant,
    active: bool,
    warn_task: Option<JoinHandle<()>>,
    kill_task: Option<JoinHandle<()>>,
    events: UnboundedSender<Event>,
}

impl TimeTracker {
    /// Arm the timers for `step` with the given limit.
    pub fn start(step: usize, limit: Duration, events: UnboundedSender<Event>) -> Self {
        let mut tracker = Self {
            step,
            end: Instant::now() + limit,
            active: true,
            warn_task: None,
            kill_task: None,
            events,
        };
        tracker.schedule(limit);
        tracker
    }

    fn schedule(&mut self, limit: Duration) {
        self.abort_timers();
        self.end = Instant::now() + limit;

        if let Some(buffer) = warning_buffer(limit) {
            let events = self.events.clone();
            let step = self.step;
            self.warn_task = Some(tokio::spawn(async move {
                tokio::time::sleep(limit - buffer).await;
                let _ = events.send(Event::DeadlineWarn { step, buffer });
            }));
        }

        let events = self.events.clone();
        let step = self.step;
        self.kill_task = Some(tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            let _ = events.send(Event::DeadlineKill { step });
        }));

        debug!(step, ?limit, "deadline timers armed");
    }

    /// Push the deadline out (or in) by `delta` and reschedule both timers
    /// from the fresh remaining duration.
    ///
    /// Fails without touching the deadline when the timers are no longer
    /// active.
    pub fn apply_delta(&mut self, delta: Duration) -> CoreResult<()> {
        if !self.active {
            return Err(CoreError::TimerNotActive);
        }
        let new_end = self.end + delta;
        let remaining = new_end.saturating_duration_since(Instant::now());
        self.schedule(remaining);
        Ok(())
    }

    /// Milliseconds until the kill timer fires, zero once stopped.
    pub fn remaining_ms(&self) -> i64 {
        if !self.active {
            return 0;
        }
        self.end
            .saturating_duration_since(Instant::now())
            .as_millis() as i64
    }

    /// The step index these timers belong to.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Cancel both timers.
    pub fn stop(&mut self) {
        self.abort_timers();
        self.active = false;
    }

    fn abort_timers(&mut self) {
        if let Some(task) = self.warn_task.take() {
            task.abort();
        }
        if let Some(task) = self.kill_task.take() {
            task.abort();
        }
    }
}

impl Drop for TimeTracker {
    fn drop(&mut self) {
        self.abort_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn no_warning_for_short_limits() {
        assert_eq!(warning_buffer(Duration::from_secs(2)), None);
        assert_eq!(warning_buffer(Duration::from_secs(60)), None);
    }

    #[test]
    fn warning_buffer_is_clamped() {
        // 0.2 * 100s = 20s, below the minimum
        assert_eq!(
            warning_buffer(Duration::from_secs(100)),
            Some(MIN_BUFFER)
        );
        // 0.2 * 10min = 2min, inside the band
        assert_eq!(
            warning_buffer(Duration::from_secs(600)),
            Some(Duration::from_secs(120))
        );
        // 0.2 * 10h far exceeds the maximum
        assert_eq!(warning_buffer(Duration::from_secs(36_000)), Some(MAX_BUFFER));
    }

    #[tokio::test(start_paused = true)]
    async fn kill_fires_at_the_limit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _tracker = TimeTracker::start(3, Duration::from_secs(2), tx);
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(3)).await;
        match rx.recv().await {
            Some(Event::DeadlineKill { step }) => assert_eq!(step, 3),
            other => panic!("expected DeadlineKill, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn warning_precedes_kill_for_long_limits() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _tracker = TimeTracker::start(0, Duration::from_secs(600), tx);
        tokio::task::yield_now().await;

        // the warning is due at limit - buffer = 480s
        tokio::time::advance(Duration::from_secs(481)).await;
        match rx.recv().await {
            Some(Event::DeadlineWarn { step, buffer }) => {
                assert_eq!(step, 0);
                assert_eq!(buffer, Duration::from_secs(120));
            }
            other => panic!("expected DeadlineWarn, got {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(matches!(
            rx.recv().await,
            Some(Event::DeadlineKill { step: 0 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn short_limit_emits_no_warning() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _tracker = TimeTracker::start(0, Duration::from_secs(2), tx);
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(matches!(
            rx.recv().await,
            Some(Event::DeadlineKill { step: 0 })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_tracker_stays_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = TimeTracker::start(0, Duration::from_secs(2), tx);
        tracker.stop();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(tracker.remaining_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn apply_delta_reschedules_the_kill() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = TimeTracker::start(0, Duration::from_secs(10), tx);
        tokio::task::yield_now().await;

        tracker.apply_delta(Duration::from_secs(20)).unwrap();
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(rx.try_recv().is_err(), "kill must not fire at the old limit");

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(matches!(
            rx.recv().await,
            Some(Event::DeadlineKill { step: 0 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn apply_delta_fails_once_stopped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut tracker = TimeTracker::start(0, Duration::from_secs(10), tx);
        tracker.stop();

        let err = tracker.apply_delta(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, CoreError::TimerNotActive));
        assert_eq!(tracker.remaining_ms(), 0);
    }
}
