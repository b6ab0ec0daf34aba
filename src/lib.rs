//! timeout-monitor - leaked-timer detection for test harnesses
//!
//! A [`TimeoutMonitor`] attaches to a [`HostObject`] exposing the four timer
//! primitives (`setInterval`, `clearInterval`, `setTimeout`,
//! `clearTimeout`), replaces them with pass-through wrappers, and keeps a
//! registry of every interval and timeout that has been scheduled but not yet
//! cleared or fired. Each entry carries the [`CallSite`] that scheduled it,
//! resolved from a stack trace captured at registration time.
//!
//! The monitor never schedules anything itself: delays, ordering, handles and
//! callback arguments seen by calling code are exactly those of the host.

pub mod call_site;
pub mod config;
pub mod error;
pub mod host;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod stack_trace;

pub use call_site::CallSite;
pub use config::MonitorConfig;
pub use error::{HostError, MonitorError, Result};
pub use host::{Callback, HostObject, Member, Schedule, TimerHost};
pub use monitor::TimeoutMonitor;
pub use registry::{Entry, Registry};
pub use report::Report;
pub use resolver::CallSiteResolver;
pub use stack_trace::{BacktraceSource, StackSource, StaticStack, TrackedCallerSource};
