//! The dual-table dataset store.
//!
//! [`DatasetStore`] owns every [`Entry`] and [`Observable`] of a dataset and
//! keeps the links between them consistent:
//!
//! 1. every id in an entry's `obs_ids` names a live observable;
//! 2. every observable's `entry_id` names a live entry whose `obs_ids`
//!    contains it exactly once;
//! 3. `idx` values are unique per kind and never reused, even after removal;
//! 4. observables never outlive their entry. Childless entries are allowed
//!    until [`DatasetStore::remove_entries_without_obs`] prunes them.
//!
//! # Storage
//!
//! Each table is an append-only arena of slots plus an `idx -> position`
//! map. Removal tombstones the slot, so positions of the remaining records
//! never move until [`DatasetStore::compact`] is called. Because ids are
//! handed out by a monotonic counter, arena order is ascending `idx` order.
//!
//! # Insert mappers
//!
//! A store built with [`DatasetStore::with_insert_mappers`] runs its mappers
//! in [`ApplyMode::Force`] on every record it inserts, before the record is
//! checked against the required attributes and stored. Records already in
//! the store, and records copied in by [`merge`], are not touched.

mod filter;
mod iter;
mod merge;

pub use filter::{
    filter_by_observable_names, retain_entries, retain_observables, FilterMode, FilterSummary,
};
pub use iter::Iter;
pub use merge::{merge, merge_all, merge_all_with, merge_with, AttributesMerging};

use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;

use tracing::debug;

use crate::error::DatumError;
use crate::record::{
    Attributes, Entry, EntryId, Observable, ObservableId, RecordKind, RequiredAttributes, Value,
    TYPE,
};
use crate::transform::{ApplyMode, EntryMapper, ObservableMapper};

/// In-memory container for one dataset's entries and observables.
#[derive(Clone, Debug, Default)]
pub struct DatasetStore {
    entries: Vec<Option<Entry>>,
    entry_pos: HashMap<EntryId, usize>,
    observables: Vec<Option<Observable>>,
    obs_pos: HashMap<ObservableId, usize>,
    next_entry: u64,
    next_obs: u64,
    required: RequiredAttributes,
    insert_mappers: Arc<InsertMappers>,
}

/// Mappers run on each record as it is inserted.
#[derive(Debug, Default)]
struct InsertMappers {
    entry: Vec<EntryMapper>,
    observable: Vec<ObservableMapper>,
}

impl InsertMappers {
    fn apply_to_entry(&self, entry: &mut Entry) -> Result<(), DatumError> {
        for mapper in &self.entry {
            let outputs = mapper.evaluate_all(std::iter::once(&*entry), ApplyMode::Force)?;
            for values in outputs.into_iter().flatten() {
                mapper.write(entry, values);
            }
        }
        Ok(())
    }

    fn apply_to_observable(&self, obs: &mut Observable, parent: &Entry) -> Result<(), DatumError> {
        for mapper in &self.observable {
            let outputs =
                mapper.evaluate_all(std::iter::once(&*obs), |_| Some(parent), ApplyMode::Force)?;
            for values in outputs.into_iter().flatten() {
                mapper.write(obs, values);
            }
        }
        Ok(())
    }
}

/// Arena lengths and counters captured before a multi-record insertion.
struct Checkpoint {
    entries: usize,
    observables: usize,
    next_entry: u64,
    next_obs: u64,
}

impl DatasetStore {
    /// Creates an empty store that accepts any attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store enforcing `required` on every insertion.
    pub fn with_required(required: RequiredAttributes) -> Self {
        Self {
            required,
            ..Self::default()
        }
    }

    /// Runs `entry_mappers` on every inserted entry and `observable_mappers`
    /// on every inserted observable, in list order.
    ///
    /// # Example
    /// ```
    /// use datum::attrs;
    /// use datum::store::DatasetStore;
    /// use datum::transform::{EntryMapper, Mapper};
    ///
    /// let area = Mapper::new(["width", "height"], ["area"], |[w, h]| {
    ///     [datum::record::Value::from(w.as_f64().unwrap_or(0.0) * h.as_f64().unwrap_or(0.0))]
    /// })
    /// .unwrap();
    /// let mut store = DatasetStore::new()
    ///     .with_insert_mappers(vec![EntryMapper::new(area).unwrap()], Vec::new());
    /// let e = store.add_entry(attrs! { "width" => 4, "height" => 2 }).unwrap();
    /// assert_eq!(store[e].get("area").and_then(|v| v.as_f64()), Some(8.0));
    /// ```
    pub fn with_insert_mappers(
        mut self,
        entry_mappers: Vec<EntryMapper>,
        observable_mappers: Vec<ObservableMapper>,
    ) -> Self {
        self.insert_mappers = Arc::new(InsertMappers {
            entry: entry_mappers,
            observable: observable_mappers,
        });
        self
    }

    /// The attribute requirements enforced by this store.
    pub fn required_attributes(&self) -> &RequiredAttributes {
        &self.required
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entry_pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_pos.is_empty()
    }

    /// Number of live observables.
    pub fn observable_count(&self) -> usize {
        self.obs_pos.len()
    }

    /// The idx the next [`add_entry`](Self::add_entry) call will assign.
    pub fn next_entry_idx(&self) -> EntryId {
        EntryId(self.next_entry)
    }

    /// The idx the next [`add_observable`](Self::add_observable) call will assign.
    pub fn next_observable_idx(&self) -> ObservableId {
        ObservableId(self.next_obs)
    }

    pub fn contains_entry(&self, idx: EntryId) -> bool {
        self.entry_pos.contains_key(&idx)
    }

    pub fn contains_observable(&self, idx: ObservableId) -> bool {
        self.obs_pos.contains_key(&idx)
    }

    /// Borrows an entry.
    pub fn entry(&self, idx: EntryId) -> Option<&Entry> {
        let pos = *self.entry_pos.get(&idx)?;
        self.entries[pos].as_ref()
    }

    /// Borrows an observable.
    pub fn observable(&self, idx: ObservableId) -> Option<&Observable> {
        let pos = *self.obs_pos.get(&idx)?;
        self.observables[pos].as_ref()
    }

    /// Observables owned by `entry`, in its `obs_ids` order.
    pub fn observables_of<'a>(&'a self, entry: &'a Entry) -> Vec<&'a Observable> {
        entry
            .obs_ids()
            .iter()
            .filter_map(|&id| self.observable(id))
            .collect()
    }

    /// Adds an entry and returns its newly assigned idx.
    ///
    /// # Errors
    /// - [`DatumError::InvalidMutation`] if `attrs` sets `idx` or `obs_ids`.
    /// - [`DatumError::SchemaMismatch`] if an insert mapper fails or a
    ///   required entry attribute is missing.
    pub fn add_entry(&mut self, attrs: Attributes) -> Result<EntryId, DatumError> {
        reject_structural(RecordKind::Entry, &attrs)?;

        let idx = EntryId(self.next_entry);
        let mut entry = Entry::new(idx, attrs);
        self.insert_mappers.apply_to_entry(&mut entry)?;
        self.required.check_entry(entry.attributes())?;

        self.next_entry += 1;
        self.push_entry(entry);
        Ok(idx)
    }

    /// Adds an entry and attaches `observables` to it, in order.
    ///
    /// Either every record is inserted or none is: on failure the store,
    /// including both id counters, is left as it was before the call.
    ///
    /// # Errors
    /// Any error [`add_entry`](Self::add_entry) or
    /// [`add_observable`](Self::add_observable) can return.
    pub fn add_entry_with_observables(
        &mut self,
        attrs: Attributes,
        observables: Vec<Attributes>,
    ) -> Result<(EntryId, Vec<ObservableId>), DatumError> {
        let checkpoint = self.checkpoint();
        match self.insert_family(attrs, observables) {
            Ok(ids) => Ok(ids),
            Err(err) => {
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    fn insert_family(
        &mut self,
        attrs: Attributes,
        observables: Vec<Attributes>,
    ) -> Result<(EntryId, Vec<ObservableId>), DatumError> {
        let entry = self.add_entry(attrs)?;
        let mut obs_ids = Vec::with_capacity(observables.len());
        for obs in observables {
            obs_ids.push(self.add_observable(entry, obs)?);
        }
        Ok((entry, obs_ids))
    }

    /// Returns copies of an entry and of the observables it owns.
    ///
    /// # Errors
    /// Returns [`DatumError::NotFound`] if no live entry has this idx.
    pub fn get_entry(&self, idx: EntryId) -> Result<(Entry, Vec<Observable>), DatumError> {
        let entry = self.entry(idx).ok_or(DatumError::NotFound {
            kind: RecordKind::Entry,
            idx: idx.as_u64(),
        })?;
        let observables = self.observables_of(entry).into_iter().cloned().collect();
        Ok((entry.clone(), observables))
    }

    /// Merges `attrs` into an entry, overwriting on key collision.
    ///
    /// # Errors
    /// - [`DatumError::NotFound`] if the entry does not exist.
    /// - [`DatumError::InvalidMutation`] if `attrs` sets `idx` or `obs_ids`.
    pub fn update_entry_data(&mut self, idx: EntryId, attrs: Attributes) -> Result<(), DatumError> {
        let pos = self.entry_position(idx)?;
        reject_structural(RecordKind::Entry, &attrs)?;

        if let Some(entry) = self.entries[pos].as_mut() {
            entry.attrs_mut().extend(attrs);
        }
        Ok(())
    }

    /// Removes an entry together with every observable it owns.
    ///
    /// # Errors
    /// Returns [`DatumError::NotFound`] if the entry does not exist; the
    /// store is left untouched in that case.
    pub fn remove_entry(&mut self, idx: EntryId) -> Result<(), DatumError> {
        let pos = self.entry_position(idx)?;
        let entry = self.entries[pos].take();
        self.entry_pos.remove(&idx);

        let owned = entry.map(|e| e.obs_ids().to_vec()).unwrap_or_default();
        for obs_id in &owned {
            self.drop_observable_slot(*obs_id);
        }

        debug!(entry = %idx, observables = owned.len(), "Removed entry");
        Ok(())
    }

    /// Attaches a new observable to an existing entry and returns its idx.
    ///
    /// The observable's category is taken from the `type` key of `attrs`,
    /// which must be a string. The new idx is appended to the parent's
    /// `obs_ids`.
    ///
    /// # Errors
    /// - [`DatumError::NotFound`] if `entry_id` names no live entry.
    /// - [`DatumError::InvalidMutation`] if `attrs` sets `idx` or `entry_id`.
    /// - [`DatumError::SchemaMismatch`] if `type` is missing or not a string,
    ///   an insert mapper fails, or a required observable attribute is missing.
    pub fn add_observable(
        &mut self,
        entry_id: EntryId,
        mut attrs: Attributes,
    ) -> Result<ObservableId, DatumError> {
        let entry_slot = self.entry_position(entry_id)?;

        let kind = match attrs.remove(TYPE) {
            Some(Value::Str(kind)) => kind,
            Some(other) => {
                return Err(DatumError::schema(format!(
                    "observable 'type' must be a string, got {}",
                    other.type_name()
                )))
            }
            None => return Err(DatumError::schema("observable is missing its 'type' field")),
        };
        reject_structural(RecordKind::Observable, &attrs)?;

        let idx = ObservableId(self.next_obs);
        let mut obs = Observable::new(idx, entry_id, kind, attrs);
        if let Some(parent) = self.entries[entry_slot].as_ref() {
            self.insert_mappers.apply_to_observable(&mut obs, parent)?;
        }
        self.required.check_observable(obs.kind(), obs.attributes())?;

        self.next_obs += 1;
        self.push_observable(obs);
        if let Some(entry) = self.entries[entry_slot].as_mut() {
            entry.push_obs(idx);
        }
        Ok(idx)
    }

    /// Merges `attrs` into an observable, overwriting on key collision.
    ///
    /// # Errors
    /// - [`DatumError::NotFound`] if the observable does not exist.
    /// - [`DatumError::InvalidMutation`] if `attrs` sets `idx`, `entry_id` or `type`.
    pub fn update_observable_data(
        &mut self,
        idx: ObservableId,
        attrs: Attributes,
    ) -> Result<(), DatumError> {
        let pos = self.observable_position(idx)?;
        reject_structural(RecordKind::Observable, &attrs)?;

        if let Some(obs) = self.observables[pos].as_mut() {
            obs.attrs_mut().extend(attrs);
        }
        Ok(())
    }

    /// Removes one observable and unlinks it from its entry.
    ///
    /// # Errors
    /// Returns [`DatumError::NotFound`] if the observable does not exist.
    pub fn remove_observable(&mut self, idx: ObservableId) -> Result<(), DatumError> {
        self.observable_position(idx)?;
        if let Some(obs) = self.drop_observable_slot(idx) {
            if let Some(&pos) = self.entry_pos.get(&obs.entry_id()) {
                if let Some(entry) = self.entries[pos].as_mut() {
                    entry.remove_obs(idx);
                }
            }
        }
        Ok(())
    }

    /// Removes every entry that owns no observable. Returns how many were removed.
    pub fn remove_entries_without_obs(&mut self) -> usize {
        let mut removed = 0;
        for slot in self.entries.iter_mut() {
            let childless = slot.as_ref().is_some_and(|e| e.obs_ids().is_empty());
            if childless {
                if let Some(entry) = slot.take() {
                    self.entry_pos.remove(&entry.idx());
                    removed += 1;
                }
            }
        }
        debug!(removed, remaining = self.len(), "Pruned entries without observables");
        removed
    }

    /// Ids of entries matching `pred`, in ascending idx order.
    pub fn select_entries<F>(&self, mut pred: F) -> Vec<EntryId>
    where
        F: FnMut(&Entry) -> bool,
    {
        self.entries().filter(|e| pred(e)).map(Entry::idx).collect()
    }

    /// Ids of observables matching `pred`, in ascending idx order.
    pub fn select_observables<F>(&self, mut pred: F) -> Vec<ObservableId>
    where
        F: FnMut(&Observable) -> bool,
    {
        self.observables()
            .filter(|o| pred(o))
            .map(Observable::idx)
            .collect()
    }

    /// Iterates `(entry, owned observables)` pairs in ascending entry idx order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self, &self.entries)
    }

    /// Iterates live entries in ascending idx order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter().flatten()
    }

    /// Iterates live observables in ascending idx order.
    pub fn observables(&self) -> impl Iterator<Item = &Observable> + '_ {
        self.observables.iter().flatten()
    }

    /// Drops tombstoned slots and rebuilds the position maps.
    ///
    /// Record ids and both counters are unchanged.
    pub fn compact(&mut self) {
        let before = self.entries.len() + self.observables.len();

        self.entries.retain(Option::is_some);
        self.entry_pos = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| slot.as_ref().map(|e| (e.idx(), pos)))
            .collect();

        self.observables.retain(Option::is_some);
        self.obs_pos = self
            .observables
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| slot.as_ref().map(|o| (o.idx(), pos)))
            .collect();

        let after = self.entries.len() + self.observables.len();
        debug!(reclaimed = before - after, "Compacted store");
    }

    /// Removes every record. Counters keep running so ids are never reused.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.entry_pos.clear();
        self.observables.clear();
        self.obs_pos.clear();
    }

    // ------------------------------------------------------------------
    // crate-internal plumbing for merge and the transformer
    // ------------------------------------------------------------------

    pub(crate) fn push_entry(&mut self, entry: Entry) {
        self.entry_pos.insert(entry.idx(), self.entries.len());
        self.entries.push(Some(entry));
    }

    pub(crate) fn push_observable(&mut self, obs: Observable) {
        self.obs_pos.insert(obs.idx(), self.observables.len());
        self.observables.push(Some(obs));
    }

    pub(crate) fn set_counters(&mut self, next_entry: u64, next_obs: u64) {
        self.next_entry = next_entry;
        self.next_obs = next_obs;
    }

    /// Live entries in iteration order, mutably.
    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> + '_ {
        self.entries.iter_mut().flatten()
    }

    /// Live observables in iteration order, mutably.
    pub(crate) fn observables_mut(&mut self) -> impl Iterator<Item = &mut Observable> + '_ {
        self.observables.iter_mut().flatten()
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            entries: self.entries.len(),
            observables: self.observables.len(),
            next_entry: self.next_entry,
            next_obs: self.next_obs,
        }
    }

    /// Drops every slot pushed since `checkpoint` and restores the counters.
    ///
    /// Only valid when no record older than the checkpoint was modified.
    fn rollback(&mut self, checkpoint: Checkpoint) {
        for entry in self.entries.drain(checkpoint.entries..).flatten() {
            self.entry_pos.remove(&entry.idx());
        }
        for obs in self.observables.drain(checkpoint.observables..).flatten() {
            self.obs_pos.remove(&obs.idx());
        }
        self.set_counters(checkpoint.next_entry, checkpoint.next_obs);
        debug!(
            next_entry = checkpoint.next_entry,
            next_obs = checkpoint.next_obs,
            "Rolled back partial insertion"
        );
    }

    fn entry_position(&self, idx: EntryId) -> Result<usize, DatumError> {
        self.entry_pos
            .get(&idx)
            .copied()
            .ok_or(DatumError::NotFound {
                kind: RecordKind::Entry,
                idx: idx.as_u64(),
            })
    }

    fn observable_position(&self, idx: ObservableId) -> Result<usize, DatumError> {
        self.obs_pos
            .get(&idx)
            .copied()
            .ok_or(DatumError::NotFound {
                kind: RecordKind::Observable,
                idx: idx.as_u64(),
            })
    }

    fn drop_observable_slot(&mut self, idx: ObservableId) -> Option<Observable> {
        let pos = self.obs_pos.remove(&idx)?;
        self.observables[pos].take()
    }
}

/// Point lookup by entry idx.
///
/// # Panics
/// Panics if no live entry has this idx. Use [`DatasetStore::entry`] or
/// [`DatasetStore::get_entry`] for a fallible lookup.
impl Index<EntryId> for DatasetStore {
    type Output = Entry;

    fn index(&self, idx: EntryId) -> &Entry {
        match self.entry(idx) {
            Some(entry) => entry,
            None => panic!("no entry with idx {idx} in store"),
        }
    }
}

impl<'a> IntoIterator for &'a DatasetStore {
    type Item = (&'a Entry, Vec<&'a Observable>);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn reject_structural(kind: RecordKind, attrs: &Attributes) -> Result<(), DatumError> {
    match kind
        .structural_fields()
        .iter()
        .find(|field| attrs.contains_key(**field))
    {
        Some(field) => Err(DatumError::forbidden(kind, *field)),
        None => Ok(()),
    }
}
