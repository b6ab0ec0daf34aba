//! Timer monitor: attaches to a host object and tracks outstanding timers
//!
//! While attached, the host's four timer members are replaced by wrappers
//! that delegate to the saved originals and keep two registries up to date:
//!
//! - `setInterval` registers the returned handle; the callback is passed
//!   through untouched and ticks never change the registry.
//! - `setTimeout` wraps the callback so that firing removes the handle
//!   before the original callback runs.
//! - `clearInterval` / `clearTimeout` remove the handle, then delegate,
//!   whether or not the handle was known.
//!
//! Registries belong to one attach/detach cycle. Wrappers and timeout
//! callbacks only hold weak references to them, so anything left over from
//! an earlier cycle delegates to the host without touching the monitor.

use crate::call_site::CallSite;
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::host::{Callback, ClearFn, HostObject, Member, Schedule, ScheduleFn};
use crate::registry::Registry;
use crate::report::Report;
use crate::resolver::CallSiteResolver;
use crate::stack_trace::{StackSource, TrackedCallerSource};
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::panic::Location;
use std::rc::{Rc, Weak};

/// Detects leaked intervals and timeouts on a [`HostObject`]
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use timeout_monitor::{HostObject, TimeoutMonitor};
///
/// let host: Rc<HostObject<u32, ()>> = Rc::new(
///     HostObject::builder()
///         .set_interval(|_| 1000)
///         .clear_interval(|_| {})
///         .set_timeout(|_| 1001)
///         .clear_timeout(|_| {})
///         .build(),
/// );
///
/// let mut monitor = TimeoutMonitor::attached_to(&host)?;
/// let handle = host.set_interval(|_| {}, Duration::from_millis(500), ())?;
/// assert_eq!(monitor.report().intervals.len(), 1);
///
/// host.clear_interval(handle)?;
/// assert!(monitor.report().is_clean());
/// monitor.detach()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct TimeoutMonitor<K, A, S = TrackedCallerSource> {
    shared: Rc<Shared<S>>,
    attachment: Option<Attachment<K, A>>,
}

/// Resolution state shared with the installed wrappers
struct Shared<S> {
    resolver: CallSiteResolver<S>,
    config: MonitorConfig,
}

impl<S: StackSource> Shared<S> {
    fn call_site(&self, anchor: &str, caller: &'static Location<'static>) -> Option<CallSite> {
        if !self.config.track_call_sites {
            return None;
        }
        self.resolver.resolve(anchor, caller)
    }
}

/// State held between `attach` and `detach`
struct Attachment<K, A> {
    host: Weak<HostObject<K, A>>,
    originals: Originals<K, A>,
    registries: Rc<Registries<K>>,
}

/// The host members saved at attach time
struct Originals<K, A> {
    set_interval: ScheduleFn<K, A>,
    clear_interval: ClearFn<K>,
    set_timeout: ScheduleFn<K, A>,
    clear_timeout: ClearFn<K>,
}

impl<K, A> Originals<K, A> {
    /// Snapshot all four members, failing on the first one missing
    fn save(host: &HostObject<K, A>) -> Result<Self> {
        let missing = |member| MonitorError::InvalidHost { member };
        Ok(Self {
            set_interval: host.set_interval_fn().ok_or(missing(Member::SetInterval))?,
            clear_interval: host
                .clear_interval_fn()
                .ok_or(missing(Member::ClearInterval))?,
            set_timeout: host.set_timeout_fn().ok_or(missing(Member::SetTimeout))?,
            clear_timeout: host
                .clear_timeout_fn()
                .ok_or(missing(Member::ClearTimeout))?,
        })
    }

    fn restore(self, host: &HostObject<K, A>) {
        host.replace_set_interval(Some(self.set_interval));
        host.replace_clear_interval(Some(self.clear_interval));
        host.replace_set_timeout(Some(self.set_timeout));
        host.replace_clear_timeout(Some(self.clear_timeout));
    }
}

#[derive(Debug)]
struct Registries<K> {
    intervals: RefCell<Registry<K>>,
    timeouts: RefCell<Registry<K>>,
}

impl<K> Default for Registries<K> {
    fn default() -> Self {
        Self {
            intervals: RefCell::new(Registry::default()),
            timeouts: RefCell::new(Registry::default()),
        }
    }
}

impl<K: Clone + Eq + fmt::Debug> Registries<K> {
    fn register_interval(&self, handle: K, site: Option<CallSite>) {
        if self.timeouts.borrow().contains(&handle) {
            tracing::warn!(?handle, "Interval handle is also an outstanding timeout");
        }
        tracing::trace!(?handle, ?site, "Registered interval");
        if !self.intervals.borrow_mut().insert(handle.clone(), site) {
            tracing::warn!(?handle, "Host reused an outstanding interval handle");
        }
    }

    fn register_timeout(&self, handle: K, site: Option<CallSite>) {
        if self.intervals.borrow().contains(&handle) {
            tracing::warn!(?handle, "Timeout handle is also an outstanding interval");
        }
        tracing::trace!(?handle, ?site, "Registered timeout");
        if !self.timeouts.borrow_mut().insert(handle.clone(), site) {
            tracing::warn!(?handle, "Host reused an outstanding timeout handle");
        }
    }

    fn report(&self) -> Report<K> {
        Report {
            intervals: self.intervals.borrow().snapshot(),
            timeouts: self.timeouts.borrow().snapshot(),
        }
    }
}

/// Handle of a wrapped timeout, shared with its replacement callback
struct TimeoutSlot<K> {
    handle: OnceCell<K>,
    fired: Cell<bool>,
}

impl<K, A> TimeoutMonitor<K, A>
where
    K: Clone + Eq + fmt::Debug + 'static,
    A: 'static,
{
    /// Detached monitor with the default configuration
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        Self::with_source(config, TrackedCallerSource)
    }

    /// Construct a monitor and attach it to `host` right away
    pub fn attached_to(host: &Rc<HostObject<K, A>>) -> Result<Self> {
        let mut monitor = Self::new();
        monitor.attach(host)?;
        Ok(monitor)
    }
}

impl<K, A> Default for TimeoutMonitor<K, A>
where
    K: Clone + Eq + fmt::Debug + 'static,
    A: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A, S> TimeoutMonitor<K, A, S>
where
    K: Clone + Eq + fmt::Debug + 'static,
    A: 'static,
    S: StackSource + 'static,
{
    /// Detached monitor resolving call sites from traces produced by `source`
    pub fn with_source(config: MonitorConfig, source: S) -> Self {
        let mut resolver = CallSiteResolver::new(source);
        if let Some(root) = &config.root {
            resolver = resolver.with_root(root.clone());
        }
        Self {
            shared: Rc::new(Shared { resolver, config }),
            attachment: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Take over the four timer members of `host`
    ///
    /// Fails without touching `host` when already attached or when a member
    /// is missing.
    pub fn attach(&mut self, host: &Rc<HostObject<K, A>>) -> Result<()> {
        if self.attachment.is_some() {
            return Err(MonitorError::AlreadyAttached);
        }
        let originals = Originals::save(host)?;
        let registries = Rc::new(Registries::default());

        host.replace_set_interval(Some(self.intercept_set_interval(
            Rc::clone(&originals.set_interval),
            Rc::downgrade(&registries),
        )));
        host.replace_clear_interval(Some(Self::intercept_clear(
            Rc::clone(&originals.clear_interval),
            Rc::downgrade(&registries),
            |registries| &registries.intervals,
        )));
        host.replace_set_timeout(Some(self.intercept_set_timeout(
            Rc::clone(&originals.set_timeout),
            Rc::downgrade(&registries),
        )));
        host.replace_clear_timeout(Some(Self::intercept_clear(
            Rc::clone(&originals.clear_timeout),
            Rc::downgrade(&registries),
            |registries| &registries.timeouts,
        )));

        self.attachment = Some(Attachment {
            host: Rc::downgrade(host),
            originals,
            registries,
        });
        tracing::debug!(
            track_call_sites = self.shared.config.track_call_sites,
            "Timer monitor attached"
        );
        Ok(())
    }

    /// Put the original members back and forget every outstanding timer
    pub fn detach(&mut self) -> Result<()> {
        let attachment = self.attachment.take().ok_or(MonitorError::NotAttached)?;

        match attachment.host.upgrade() {
            Some(host) => attachment.originals.restore(&host),
            None => tracing::warn!("Host dropped before detach; nothing to restore"),
        }

        let intervals = attachment.registries.intervals.borrow().len();
        let timeouts = attachment.registries.timeouts.borrow().len();
        attachment.registries.intervals.borrow_mut().clear();
        attachment.registries.timeouts.borrow_mut().clear();
        tracing::debug!(
            outstanding_intervals = intervals,
            outstanding_timeouts = timeouts,
            "Timer monitor detached"
        );
        Ok(())
    }

    /// Outstanding timers, empty while detached
    pub fn report(&self) -> Report<K> {
        self.attachment
            .as_ref()
            .map(|attachment| attachment.registries.report())
            .unwrap_or_default()
    }

    fn intercept_set_interval(
        &self,
        original: ScheduleFn<K, A>,
        registries: Weak<Registries<K>>,
    ) -> ScheduleFn<K, A> {
        let shared = Rc::clone(&self.shared);
        Rc::new(move |call: Schedule<A>| {
            let caller = call.caller;
            let handle = original(call);
            if let Some(registries) = registries.upgrade() {
                let site = shared.call_site(&shared.config.interval_anchor, caller);
                registries.register_interval(handle.clone(), site);
            }
            handle
        })
    }

    fn intercept_set_timeout(
        &self,
        original: ScheduleFn<K, A>,
        registries: Weak<Registries<K>>,
    ) -> ScheduleFn<K, A> {
        let shared = Rc::clone(&self.shared);
        Rc::new(move |call: Schedule<A>| {
            let Schedule {
                callback: mut user_callback,
                delay,
                args,
                caller,
            } = call;

            let slot = Rc::new(TimeoutSlot {
                handle: OnceCell::new(),
                fired: Cell::new(false),
            });
            let fired_slot = Rc::clone(&slot);
            let fired_registries = registries.clone();
            let callback: Callback<A> = Box::new(move |args: A| {
                if !fired_slot.fired.replace(true) {
                    if let (Some(handle), Some(registries)) =
                        (fired_slot.handle.get(), fired_registries.upgrade())
                    {
                        registries.timeouts.borrow_mut().remove(handle);
                        tracing::trace!(?handle, "Timeout fired");
                    }
                }
                user_callback(args);
            });

            let handle = original(Schedule {
                callback,
                delay,
                args,
                caller,
            });
            let _ = slot.handle.set(handle.clone());

            // A host may run the callback before returning the handle
            if slot.fired.get() {
                tracing::trace!(?handle, "Timeout fired during scheduling; not registered");
            } else if let Some(registries) = registries.upgrade() {
                let site = shared.call_site(&shared.config.timeout_anchor, caller);
                registries.register_timeout(handle.clone(), site);
            }
            handle
        })
    }

    fn intercept_clear(
        original: ClearFn<K>,
        registries: Weak<Registries<K>>,
        registry: fn(&Registries<K>) -> &RefCell<Registry<K>>,
    ) -> ClearFn<K> {
        Rc::new(move |handle: K| {
            if let Some(registries) = registries.upgrade() {
                if registry(registries.as_ref()).borrow_mut().remove(&handle).is_some() {
                    tracing::trace!(?handle, "Cleared");
                }
            }
            original(handle);
        })
    }
}

impl<K, A, S> fmt::Debug for TimeoutMonitor<K, A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutMonitor")
            .field("attached", &self.attachment.is_some())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
