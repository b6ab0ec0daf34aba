//! Stack-trace acquisition for call-site resolution
//!
//! A [`StackSource`] produces a fresh multi-line trace in the host
//! convention `    at <descriptor> (<path>:<line>:<char>)` each time a
//! wrapper registers a timer. The resolver only depends on that textual
//! shape.

use std::fmt::Write as _;
use std::panic::Location;
use std::path::PathBuf;

/// Maximum number of native frames rendered into a trace
const MAX_STACK_DEPTH: usize = 64;

/// Produces a stack trace at the moment a timer is registered
pub trait StackSource {
    /// Capture a trace for a call to `method`, made from `caller`
    fn capture(&self, method: &str, caller: &'static Location<'static>) -> String;
}

impl<S: StackSource + ?Sized> StackSource for Box<S> {
    fn capture(&self, method: &str, caller: &'static Location<'static>) -> String {
        (**self).capture(method, caller)
    }
}

/// Synthesizes a one-frame trace from the `#[track_caller]` location
///
/// The frame is named `Object.<method>` and carries the caller's position,
/// so it is both the anchor frame and the caller frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackedCallerSource;

impl StackSource for TrackedCallerSource {
    fn capture(&self, method: &str, caller: &'static Location<'static>) -> String {
        format!(
            "Error\n    at Object.{method} ({}:{}:{})\n",
            caller.file(),
            caller.line(),
            caller.column()
        )
    }
}

/// Always yields the same trace
///
/// Used to replay traces captured by a host runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticStack(String);

impl StaticStack {
    pub fn new(stack: impl Into<String>) -> Self {
        Self(stack.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl StackSource for StaticStack {
    fn capture(&self, _method: &str, _caller: &'static Location<'static>) -> String {
        self.0.clone()
    }
}

/// A native frame as reported by the unwinder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeFrame {
    /// Demangled symbol name without hash suffix
    pub symbol: Option<String>,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl NativeFrame {
    fn position(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        let line = self.line?;
        Some(format!(
            "{}:{}:{}",
            file.display(),
            line,
            self.column.unwrap_or(1)
        ))
    }
}

/// Captures the native call stack with the `backtrace` crate
///
/// Resolving symbols is slow; prefer [`TrackedCallerSource`] unless the
/// full native stack is wanted. Native symbols use Rust method names, so
/// the monitor's anchors must be configured to match
/// (see [`MonitorConfig::for_native_frames`](crate::MonitorConfig::for_native_frames)).
#[derive(Debug, Clone, Copy)]
pub struct BacktraceSource {
    max_depth: usize,
}

impl Default for BacktraceSource {
    fn default() -> Self {
        Self {
            max_depth: MAX_STACK_DEPTH,
        }
    }
}

impl BacktraceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Unwind the current thread into resolved frames, innermost first
    pub fn frames(&self) -> Vec<NativeFrame> {
        let backtrace = backtrace::Backtrace::new();
        backtrace
            .frames()
            .iter()
            .flat_map(|frame| frame.symbols())
            .take(self.max_depth)
            .map(|symbol| NativeFrame {
                symbol: symbol.name().map(|name| format!("{name:#}")),
                file: symbol.filename().map(PathBuf::from),
                line: symbol.lineno(),
                column: symbol.colno(),
            })
            .collect()
    }
}

impl StackSource for BacktraceSource {
    fn capture(&self, _method: &str, _caller: &'static Location<'static>) -> String {
        render_frames(&self.frames())
    }
}

/// Render native frames, innermost first, in the host trace convention
///
/// Each line names the function that was entered and the position in the
/// calling frame where it was entered. Path separators `::` in symbol names
/// are written as `.` so member anchors such as `.set_interval` match.
pub fn render_frames(frames: &[NativeFrame]) -> String {
    let mut out = String::from("Error\n");
    for (index, frame) in frames.iter().enumerate() {
        let descriptor = frame
            .symbol
            .as_deref()
            .map(|symbol| symbol.replace("::", "."))
            .unwrap_or_else(|| "<unknown>".to_string());
        let position = frames
            .get(index + 1)
            .and_then(NativeFrame::position)
            .unwrap_or_else(|| "<anonymous>".to_string());
        let _ = writeln!(out, "    at {descriptor} ({position})");
    }
    out
}
