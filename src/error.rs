//! Error taxonomy for the timer monitor
//!
//! Only protocol violations are errors. An unresolvable call site is an
//! absent value, and clearing an unknown handle is forwarded to the host.

use crate::host::Member;
use thiserror::Error;

/// Protocol violations raised by [`TimeoutMonitor`](crate::TimeoutMonitor)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Already attached: detach before attaching again")]
    AlreadyAttached,

    #[error("Not attached: attach must be called before detach")]
    NotAttached,

    #[error("Invalid host: `{member}` is missing")]
    InvalidHost { member: Member },
}

/// Errors raised when calling through a [`HostObject`](crate::HostObject)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    #[error("Host member `{0}` is not set")]
    MissingMember(Member),
}

/// Result type for monitor lifecycle operations
pub type Result<T> = std::result::Result<T, MonitorError>;
