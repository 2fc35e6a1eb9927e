//! Capture groups recorded by `Save`/`Stop` instructions.
//!
//! A group is a pair of indices over the input. Forking a thread copies the
//! boundaries only, never the items they cover.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::Range;

/// Identifies a capture group, either by its position among the unnamed
/// groups of a pattern or by an explicit name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaptureKey {
    Index(usize),
    Name(String),
}

impl Display for CaptureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureKey::Index(idx) => write!(f, "{}", idx),
            CaptureKey::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<usize> for CaptureKey {
    fn from(idx: usize) -> Self {
        CaptureKey::Index(idx)
    }
}

impl From<&str> for CaptureKey {
    fn from(name: &str) -> Self {
        CaptureKey::Name(name.to_string())
    }
}

impl From<String> for CaptureKey {
    fn from(name: String) -> Self {
        CaptureKey::Name(name)
    }
}

/// A `[start, end)` span over the input. The end is unset while the group
/// is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureGroup {
    start: usize,
    end: Option<usize>,
}

impl CaptureGroup {
    pub const fn open(start: usize) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: usize, end: usize) -> Self {
        let mut group = Self::open(start);
        group.close(end);
        group
    }

    /// Closes the group at `end`.
    ///
    /// # Panics
    ///
    /// Panics if `end` precedes the start of the group.
    pub fn close(&mut self, end: usize) {
        assert!(
            end >= self.start,
            "capture group closed at {} before its start at {}",
            end,
            self.start
        );
        self.end = Some(end);
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }

    /// Returns the covered range clamped to an input of `len` items. An open
    /// group extends to the end of the input.
    pub fn span(&self, len: usize) -> Range<usize> {
        let end = self.end.map_or(len, |end| end.min(len));
        self.start.min(end)..end
    }

    /// Returns a read-only view of the items covered by the group.
    ///
    /// # Example
    ///
    /// ```
    /// use seqex_runtime::CaptureGroup;
    ///
    /// let input = ['a', 'b', 'c'];
    ///
    /// assert_eq!(&['b'], CaptureGroup::closed(1, 2).items(&input));
    /// assert_eq!(&['b', 'c'], CaptureGroup::open(1).items(&input));
    /// ```
    pub fn items<'i, T>(&self, input: &'i [T]) -> &'i [T] {
        &input[self.span(input.len())]
    }
}

/// The capture groups held by a single thread, at most one live group per
/// key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureGroups(BTreeMap<CaptureKey, CaptureGroup>);

impl CaptureGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a group at `at`, replacing any previous group under the same
    /// key.
    pub fn open(&mut self, key: &CaptureKey, at: usize) {
        self.0.insert(key.clone(), CaptureGroup::open(at));
    }

    /// Closes the group under `key` at `at`.
    ///
    /// # Panics
    ///
    /// Panics if no group was opened under `key`.
    pub fn close(&mut self, key: &CaptureKey, at: usize) {
        match self.0.get_mut(key) {
            Some(group) => group.close(at),
            None => panic!("capture group {} closed without being opened", key),
        }
    }

    pub fn get(&self, key: &CaptureKey) -> Option<&CaptureGroup> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CaptureKey, &CaptureGroup)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }
}
