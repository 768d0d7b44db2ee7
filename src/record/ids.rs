//! Newtype identifiers for the two record kinds.
//!
//! Entry and observable indices live in independent sequences, so a bare
//! `u64` would make it easy to look an observable up in the entry table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of an [`Entry`](super::Entry).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    /// Creates a new EntryId.
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns this id moved up by `offset`.
    #[inline]
    pub(crate) fn shifted(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        EntryId::new(id)
    }
}

/// Store-assigned identifier of an [`Observable`](super::Observable).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservableId(pub u64);

impl ObservableId {
    /// Creates a new ObservableId.
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn shifted(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Debug for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObservableId({})", self.0)
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObservableId {
    fn from(id: u64) -> Self {
        ObservableId::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_equality() {
        assert_eq!(EntryId(1), EntryId(1));
        assert_ne!(EntryId(1), EntryId(2));
    }

    #[test]
    fn test_id_ordering() {
        assert!(EntryId(1) < EntryId(2));
        assert!(ObservableId(10) > ObservableId(5));
    }

    #[test]
    fn test_shift_preserves_kind() {
        assert_eq!(EntryId(3).shifted(7), EntryId(10));
        assert_eq!(ObservableId(0).shifted(4), ObservableId(4));
    }

    #[test]
    fn test_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ObservableId(1));
        set.insert(ObservableId(2));
        set.insert(ObservableId(1)); // duplicate
        assert_eq!(set.len(), 2);
    }
}
