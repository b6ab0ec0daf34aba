//! Snapshot of outstanding timers
//!
//! Serializes as `{"intervals": [[handle, site]], "timeouts": [...]}` with
//! `null` for a call site that could not be resolved.

use crate::registry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outstanding intervals and timeouts, each in scheduling order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report<K> {
    pub intervals: Vec<Entry<K>>,
    pub timeouts: Vec<Entry<K>>,
}

impl<K> Default for Report<K> {
    fn default() -> Self {
        Self {
            intervals: Vec::new(),
            timeouts: Vec::new(),
        }
    }
}

impl<K> Report<K> {
    /// True when no interval or timeout is outstanding
    pub fn is_clean(&self) -> bool {
        self.intervals.is_empty() && self.timeouts.is_empty()
    }

    /// Total number of outstanding timers
    pub fn outstanding(&self) -> usize {
        self.intervals.len() + self.timeouts.len()
    }

    pub fn interval_handles(&self) -> impl Iterator<Item = &K> {
        self.intervals.iter().map(|(handle, _)| handle)
    }

    pub fn timeout_handles(&self) -> impl Iterator<Item = &K> {
        self.timeouts.iter().map(|(handle, _)| handle)
    }
}

impl<K: Serialize> Report<K> {
    /// Pretty-printed JSON rendering
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<K: fmt::Debug> fmt::Display for Report<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "No outstanding timers.");
        }

        writeln!(
            f,
            "Outstanding timers: {} interval(s), {} timeout(s)",
            self.intervals.len(),
            self.timeouts.len()
        )?;
        writeln!(f, "{:<10} {:<16} Scheduled at", "Kind", "Handle")?;
        writeln!(f, "{}", "─".repeat(60))?;

        let rows = self
            .intervals
            .iter()
            .map(|entry| ("interval", entry))
            .chain(self.timeouts.iter().map(|entry| ("timeout", entry)));
        for (kind, (handle, site)) in rows {
            let handle = format!("{handle:?}");
            match site {
                Some(site) => writeln!(f, "{kind:<10} {handle:<16} {site}")?,
                None => writeln!(f, "{kind:<10} {handle:<16} <unknown>")?,
            }
        }
        Ok(())
    }
}
