//! Iteration over `(entry, observables)` pairs.

use std::iter::FusedIterator;
use std::slice;

use super::DatasetStore;
use crate::record::{Entry, Observable};

/// Iterator over a store's entries paired with the observables they own.
///
/// Created by [`DatasetStore::iter`]. Entries come out in ascending idx
/// order; each entry's observables follow its `obs_ids` order. Calling
/// `iter()` again starts a fresh pass.
#[derive(Clone)]
pub struct Iter<'a> {
    store: &'a DatasetStore,
    slots: slice::Iter<'a, Option<Entry>>,
}

impl<'a> Iter<'a> {
    pub(super) fn new(store: &'a DatasetStore, slots: &'a [Option<Entry>]) -> Self {
        Self {
            store,
            slots: slots.iter(),
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Entry, Vec<&'a Observable>);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.slots.by_ref().flatten().next()?;
        Some((entry, self.store.observables_of(entry)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.slots.len()))
    }
}

impl FusedIterator for Iter<'_> {}
