//! Call-site resolution from textual stack traces
//!
//! Frame lines follow the host convention
//! `<indent>at <frame-descriptor> (<path>:<line>:<char>)`. The first frame
//! whose descriptor contains `.<method>` is the frame of the intercepted
//! call, and its parenthesized position is the caller's location.
//!
//! Anonymous or native frames (`<anonymous>`, `native`) carry no
//! `:line:char` suffix and never resolve.

use crate::call_site::CallSite;
use crate::stack_trace::StackSource;
use regex::Regex;
use std::env;
use std::panic::Location;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Content between the first `(` and the next `)` on a frame line
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)").expect("parenthesized segment pattern is valid"));

/// Trailing `:<line>:<char>` of a code position
static LINE_AND_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([0-9]+):([0-9]+)$").expect("line/char pattern is valid"));

/// Find the raw `path:line:char` location of the first frame calling `method`
///
/// Returns `None` when no frame line contains `.method`, or when the matching
/// line has no parenthesized segment.
pub fn find_call_location<'a>(method: &str, stack: &'a str) -> Option<&'a str> {
    let anchor = format!(".{method}");
    let line = stack.lines().find(|line| line.contains(&anchor))?;
    PARENTHESIZED
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|segment| segment.as_str())
}

/// Split a `path:line:char` location into a [`CallSite`] relative to `root`
///
/// Line and column must be positive and fit in `u32`.
pub fn split_call_location(location: &str, root: &Path) -> Option<CallSite> {
    let captures = LINE_AND_CHAR.captures(location)?;
    let suffix = captures.get(0)?;

    let line = parse_position(&captures[1])?;
    let column = parse_position(&captures[2])?;
    let path = &location[..suffix.start()];

    Some(CallSite {
        file: relative_path(path, root),
        line,
        column,
    })
}

fn parse_position(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Locate the caller of `method` in `stack` and resolve it against `root`
pub fn find_caller_in_stack(method: &str, stack: &str, root: &Path) -> Option<CallSite> {
    find_call_location(method, stack).and_then(|location| split_call_location(location, root))
}

/// Express `path` relative to `root` with `/` separators
///
/// Relative inputs are taken relative to `root`. Paths outside `root` climb
/// out with `..` segments. The comparison is lexical, nothing touches the
/// filesystem.
pub fn relative_path(path: &str, root: &Path) -> String {
    let path = PathBuf::from(path.replace('\\', "/"));
    let absolute = if path.is_absolute() {
        path
    } else {
        root.join(path)
    };

    let target = lexical_components(&absolute);
    let base = lexical_components(root);
    let shared = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::with_capacity(base.len() - shared + target.len() - shared);
    parts.extend(std::iter::repeat("..").take(base.len() - shared));
    parts.extend(target[shared..].iter().map(String::as_str));
    parts.join("/")
}

fn lexical_components(path: &Path) -> Vec<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().into_owned());
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    parts
}

/// Resolves call sites from freshly captured stack traces
///
/// Without a configured root, paths are made relative to the process's
/// working directory at the time of each resolution.
#[derive(Debug, Clone)]
pub struct CallSiteResolver<S> {
    source: S,
    root: Option<PathBuf>,
}

impl<S: StackSource> CallSiteResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source, root: None }
    }

    /// Resolve paths against a fixed root instead of the working directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The absolute root paths are made relative to, as of now
    pub fn root(&self) -> Option<PathBuf> {
        match &self.root {
            Some(root) if root.is_absolute() => Some(root.clone()),
            Some(root) => env::current_dir().ok().map(|cwd| cwd.join(root)),
            None => env::current_dir().ok(),
        }
    }

    /// Capture a fresh trace and resolve the caller of `method`
    ///
    /// `caller` is the position of the external call that reached the
    /// wrapper. Sources that synthesize their trace from it use it, and the
    /// others ignore it.
    pub fn resolve(&self, method: &str, caller: &'static Location<'static>) -> Option<CallSite> {
        let stack = self.source.capture(method, caller);

        let Some(root) = self.root() else {
            tracing::warn!(method, "Working directory unavailable; call site left unresolved");
            return None;
        };

        let site = find_caller_in_stack(method, &stack, &root);
        if site.is_none() {
            tracing::trace!(method, "No resolvable call site in captured stack");
        }
        site
    }
}
