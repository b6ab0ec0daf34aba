//! Monitor configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! ```toml
//! root = "/home/ci/project"
//! track_call_sites = true
//! interval_anchor = "setInterval"
//! timeout_anchor = "setTimeout"
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a [`TimeoutMonitor`](crate::TimeoutMonitor)
///
/// # Example
/// ```
/// use timeout_monitor::MonitorConfig;
///
/// let config = MonitorConfig::default();
/// assert!(config.track_call_sites);
/// assert_eq!(config.interval_anchor, "setInterval");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Root that call-site paths are made relative to
    ///
    /// Relative roots are anchored at the working directory. When unset,
    /// the working directory at the time of each registration is used.
    pub root: Option<PathBuf>,

    /// Capture a stack trace per registration and record its call site
    ///
    /// When disabled no trace is captured and every entry has an absent
    /// call site.
    pub track_call_sites: bool,

    /// Method name searched for (as `.<name>`) in traces of interval
    /// registrations
    pub interval_anchor: String,

    /// Method name searched for (as `.<name>`) in traces of timeout
    /// registrations
    pub timeout_anchor: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            root: None,
            track_call_sites: true,
            interval_anchor: "setInterval".to_string(),
            timeout_anchor: "setTimeout".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Anchors matching native Rust frames, for use with
    /// [`BacktraceSource`](crate::stack_trace::BacktraceSource)
    pub fn for_native_frames() -> Self {
        Self {
            interval_anchor: "set_interval".to_string(),
            timeout_anchor: "set_timeout".to_string(),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Record handles only, without call sites
    pub fn without_call_sites(mut self) -> Self {
        self.track_call_sites = false;
        self
    }

    pub fn with_anchors(
        mut self,
        interval_anchor: impl Into<String>,
        timeout_anchor: impl Into<String>,
    ) -> Self {
        self.interval_anchor = interval_anchor.into();
        self.timeout_anchor = timeout_anchor.into();
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse monitor configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read monitor configuration: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid monitor configuration: {}", path.display()))
    }

    /// Anchors must be non-empty: an empty anchor matches any `.` in a trace
    pub fn validate(&self) -> Result<()> {
        if self.interval_anchor.trim().is_empty() {
            bail!("interval_anchor must not be empty");
        }
        if self.timeout_anchor.trim().is_empty() {
            bail!("timeout_anchor must not be empty");
        }
        Ok(())
    }
}
