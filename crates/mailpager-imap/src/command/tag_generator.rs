//! Command tag generation.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::Tag;

/// Produces sequential command tags such as `A0000`, `A0001`.
///
/// One generator lives for the whole session. The counter wraps instead of
/// overflowing; tags only need to be unique among in-flight commands and a
/// session never issues more than a handful at once.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Returns the next tag.
    #[must_use]
    pub fn next(&self) -> Tag {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Tag::new(format!("{}{:04}", self.prefix, n))
    }

    /// Number of tags issued so far.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_sequential_and_padded() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next().as_str(), "A0000");
        assert_eq!(tags.next().as_str(), "A0001");
        assert_eq!(tags.issued(), 2);
    }

    #[test]
    fn custom_prefix() {
        let tags = TagGenerator::new('Q');
        assert_eq!(tags.next().as_str(), "Q0000");
    }

    #[test]
    fn wide_counters_are_not_truncated() {
        let tags = TagGenerator {
            counter: AtomicU32::new(12_345),
            prefix: 'A',
        };
        assert_eq!(tags.next().as_str(), "A12345");
    }
}
