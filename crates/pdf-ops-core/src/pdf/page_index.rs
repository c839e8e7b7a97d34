//! Page index newtype for safe conversion between caller indices and lopdf.
//!
//! Callers address pages with zero-based signed integers (they arrive as
//! JSON numbers), lopdf numbers pages from 1 with `u32`. This module keeps
//! that conversion in one place.

use std::fmt;

use crate::error::Error;

/// A zero-based page index known to be inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(usize);

impl PageIndex {
    /// Resolve a caller-supplied index against a page count.
    ///
    /// Negative and out-of-range values resolve to `None`; callers that
    /// tolerate bad indices simply skip them.
    #[must_use]
    pub fn resolve(raw: i64, total_pages: usize) -> Option<Self> {
        usize::try_from(raw)
            .ok()
            .filter(|&index| index < total_pages)
            .map(Self)
    }

    /// Like [`PageIndex::resolve`] but reports the failure.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self, Error> {
        if page_num >= total_pages {
            return Err(Error::InvalidPage {
                page: page_num,
                total: total_pages,
            });
        }
        Ok(Self(page_num))
    }

    /// Get the index as usize for Rust collections.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
