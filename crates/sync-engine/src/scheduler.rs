// crates/sync-engine/src/scheduler.rs
//! Repeating timers on a virtual clock
//!
//! The observer heartbeat and the correction clients' polls are the only
//! time-driven work in the engine. They are registered here instead of on a
//! runtime so that tests and simulations can step time deterministically;
//! `drive` and `run_for` tie the clock to wall time when needed.

use crate::error::{SyncError, SyncResult};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// Handle returned by `Scheduler::schedule_repeating`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Timer {
    period: Duration,
    next_due: Duration,
    callback: Rc<dyn Fn()>,
}

/// Deterministic virtual clock owning every repeating timer
pub struct Scheduler {
    now: Cell<Duration>,
    timers: RefCell<BTreeMap<TimerHandle, Timer>>,
    next_id: Cell<u64>,
}

impl Scheduler {
    /// Creates a scheduler at time zero
    pub fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            timers: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Calls `callback` every `period`, first one period from now
    pub fn schedule_repeating<F>(&self, period: Duration, callback: F) -> TimerHandle
    where
        F: Fn() + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let handle = TimerHandle(self.next_id.get());
        self.next_id.set(handle.0 + 1);
        self.timers.borrow_mut().insert(
            handle,
            Timer {
                period,
                next_due: self.now() + period,
                callback: Rc::new(callback),
            },
        );
        handle
    }

    /// Cancels a timer; returns false if it was not active
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.timers.borrow_mut().remove(&handle).is_some()
    }

    /// Returns true while the timer is scheduled
    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.borrow().contains_key(&handle)
    }

    /// Number of scheduled timers
    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Moves the clock forward, firing every timer that falls due
    ///
    /// Timers fire in due-time order, ties broken by creation order. A
    /// callback may schedule or cancel timers; a timer cancelled before its
    /// turn does not fire.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;

        loop {
            let due = {
                let timers = self.timers.borrow();
                timers
                    .iter()
                    .filter(|(_, timer)| timer.next_due <= target)
                    .min_by_key(|(handle, timer)| (timer.next_due, **handle))
                    .map(|(handle, timer)| (*handle, timer.next_due, timer.callback.clone()))
            };

            let Some((handle, due_at, callback)) = due else {
                break;
            };

            self.now.set(due_at);
            if let Some(timer) = self.timers.borrow_mut().get_mut(&handle) {
                timer.next_due = due_at + timer.period;
            }
            callback();
        }

        self.now.set(target);
    }

    /// Advances the clock in `resolution` steps paced by tokio's timer
    pub async fn drive(&self, total: Duration, resolution: Duration) -> SyncResult<()> {
        if resolution.is_zero() {
            return Err(SyncError::Custom(
                "Scheduler resolution must be positive".to_string(),
            ));
        }

        let start = tokio::time::Instant::now() + resolution;
        let mut ticker = tokio::time::interval_at(start, resolution);
        let mut remaining = total;

        while !remaining.is_zero() {
            ticker.tick().await;
            let step = remaining.min(resolution);
            self.advance(step);
            remaining -= step;
        }

        Ok(())
    }

    /// Runs `drive` on a dedicated current-thread runtime
    pub fn run_for(&self, total: Duration, resolution: Duration) -> SyncResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(self.drive(total, resolution))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<(&'static str, Duration)>>>, Rc<Scheduler>) {
        (Rc::new(RefCell::new(Vec::new())), Rc::new(Scheduler::new()))
    }

    #[test]
    fn test_repeating_timer_fires_each_period() {
        let (log, scheduler) = recorder();
        let l = log.clone();
        let s = scheduler.clone();
        scheduler.schedule_repeating(Duration::from_secs(2), move || l.borrow_mut().push(("poll", s.now())));

        scheduler.advance(Duration::from_secs(7));

        let times: Vec<_> = log.borrow().iter().map(|(_, t)| t.as_secs()).collect();
        assert_eq!(times, vec![2, 4, 6]);
        assert_eq!(scheduler.now(), Duration::from_secs(7));
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let (log, scheduler) = recorder();
        let l1 = log.clone();
        let s1 = scheduler.clone();
        scheduler.schedule_repeating(Duration::from_secs(3), move || l1.borrow_mut().push(("slow", s1.now())));
        let l2 = log.clone();
        let s2 = scheduler.clone();
        scheduler.schedule_repeating(Duration::from_secs(2), move || l2.borrow_mut().push(("fast", s2.now())));

        scheduler.advance(Duration::from_secs(6));

        let names: Vec<_> = log.borrow().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["fast", "slow", "fast", "slow", "fast"]);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let scheduler = Rc::new(Scheduler::new());
        let fired = Rc::new(Cell::new(0));

        let f = fired.clone();
        let handle = scheduler.schedule_repeating(Duration::from_secs(1), move || f.set(f.get() + 1));
        scheduler.advance(Duration::from_millis(1500));
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        scheduler.advance(Duration::from_secs(10));

        assert_eq!(fired.get(), 1);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn test_timer_cancelled_by_earlier_callback_in_same_advance() {
        let scheduler = Rc::new(Scheduler::new());
        let victim_fired = Rc::new(Cell::new(false));
        let victim = Rc::new(Cell::new(None));

        let s = scheduler.clone();
        let v = victim.clone();
        scheduler.schedule_repeating(Duration::from_secs(1), move || {
            if let Some(handle) = v.get() {
                s.cancel(handle);
            }
        });
        let flag = victim_fired.clone();
        victim.set(Some(
            scheduler.schedule_repeating(Duration::from_secs(1), move || flag.set(true)),
        ));

        scheduler.advance(Duration::from_secs(1));
        assert!(!victim_fired.get());
    }

    #[test]
    fn test_zero_period_is_clamped() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        scheduler.schedule_repeating(Duration::ZERO, move || f.set(f.get() + 1));

        scheduler.advance(Duration::from_millis(5));
        assert_eq!(fired.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_follows_tokio_time() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        scheduler.schedule_repeating(Duration::from_secs(2), move || f.set(f.get() + 1));

        let started = tokio::time::Instant::now();
        scheduler
            .drive(Duration::from_secs(5), Duration::from_millis(500))
            .await
            .unwrap();

        assert_eq!(fired.get(), 2);
        assert_eq!(scheduler.now(), Duration::from_secs(5));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_drive_rejects_zero_resolution() {
        let scheduler = Scheduler::new();
        let result = scheduler.drive(Duration::from_secs(1), Duration::ZERO).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_run_for_blocks_on_own_runtime() {
        let scheduler = Scheduler::new();
        scheduler
            .run_for(Duration::from_millis(30), Duration::from_millis(10))
            .unwrap();
        assert_eq!(scheduler.now(), Duration::from_millis(30));
    }
}
