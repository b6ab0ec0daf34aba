//! Source location of the code that scheduled a timer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved call site of a scheduling call
///
/// `file` is relative to the resolver root and always uses `/` separators.
/// `line` and `column` are 1-based. The column serializes as `char`, which
/// is the name used in host stack traces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
    #[serde(rename = "char")]
    pub column: u32,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
