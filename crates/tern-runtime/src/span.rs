//! Source positions
//!
//! The parser lives outside this crate; spans are whatever byte offsets it
//! hands us. ASTs built by hand use [`Span::dummy`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range in the original source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Placeholder for nodes without a source location
    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dummy() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}..{}", self.start, self.end)
        }
    }
}
