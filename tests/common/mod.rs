// Shared test host: a virtual clock implementing the timer primitives
//
// Timers only fire from `advance`, in due order, so tests control exactly
// when callbacks run. Callbacks may schedule and clear timers re-entrantly.

#![allow(dead_code)] // Not every test binary uses every helper

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use timeout_monitor::{Callback, HostObject, TimerHost};
use tracing_subscriber::EnvFilter;

pub type Args = Vec<String>;

/// Install a test-friendly subscriber; `RUST_LOG=timeout_monitor=trace` to see events
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn args(values: &[&str]) -> Args {
    values.iter().map(|value| value.to_string()).collect()
}

struct Pending {
    id: u64,
    due: Duration,
    period: Option<Duration>,
    callback: Callback<Args>,
    args: Args,
}

/// Virtual-time timer host handing out ids from `first_id` upwards
pub struct FakeTimers {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    pending: RefCell<Vec<Pending>>,
    pub cleared_intervals: RefCell<Vec<u64>>,
    pub cleared_timeouts: RefCell<Vec<u64>>,
    pub scheduled: RefCell<Vec<(Duration, Args)>>,
}

impl FakeTimers {
    pub fn new(first_id: u64) -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            next_id: Cell::new(first_id),
            pending: RefCell::new(Vec::new()),
            cleared_intervals: RefCell::new(Vec::new()),
            cleared_timeouts: RefCell::new(Vec::new()),
            scheduled: RefCell::new(Vec::new()),
        }
    }

    /// Host object backed by a fresh fake clock
    pub fn host(first_id: u64) -> (Rc<Self>, Rc<HostObject<u64, Args>>) {
        let timers = Rc::new(Self::new(first_id));
        let host = Rc::new(HostObject::bind(Rc::clone(&timers)));
        (timers, host)
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Move the clock forward, firing every timer that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            let next = self
                .pending
                .borrow()
                .iter()
                .enumerate()
                .filter(|(_, timer)| timer.due <= target)
                .min_by_key(|(_, timer)| (timer.due, timer.id))
                .map(|(index, _)| index);
            let Some(index) = next else { break };

            let mut timer = self.pending.borrow_mut().remove(index);
            self.now.set(timer.due);
            (timer.callback)(timer.args.clone());

            if let Some(period) = timer.period {
                if !self.cleared_intervals.borrow().contains(&timer.id) {
                    timer.due += period;
                    self.pending.borrow_mut().push(timer);
                }
            }
        }
        self.now.set(target);
    }

    fn schedule(
        &self,
        callback: Callback<Args>,
        delay: Duration,
        args: Args,
        period: Option<Duration>,
    ) -> u64 {
        let id = self.next_id.replace(self.next_id.get() + 1);
        self.scheduled.borrow_mut().push((delay, args.clone()));
        self.pending.borrow_mut().push(Pending {
            id,
            due: self.now.get() + delay,
            period,
            callback,
            args,
        });
        id
    }

    fn cancel(&self, id: u64) {
        self.pending.borrow_mut().retain(|timer| timer.id != id);
    }
}

impl TimerHost for FakeTimers {
    type Handle = u64;
    type Args = Args;

    fn set_interval(&self, callback: Callback<Args>, delay: Duration, args: Args) -> u64 {
        let period = delay.max(Duration::from_millis(1));
        self.schedule(callback, period, args, Some(period))
    }

    fn clear_interval(&self, handle: u64) {
        self.cleared_intervals.borrow_mut().push(handle);
        self.cancel(handle);
    }

    fn set_timeout(&self, callback: Callback<Args>, delay: Duration, args: Args) -> u64 {
        self.schedule(callback, delay, args, None)
    }

    fn clear_timeout(&self, handle: u64) {
        self.cleared_timeouts.borrow_mut().push(handle);
        self.cancel(handle);
    }
}
