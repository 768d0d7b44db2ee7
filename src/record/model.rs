//! Entry and Observable records.
//!
//! Both kinds carry a few structural fields owned by the
//! [`DatasetStore`](crate::store::DatasetStore) and an open attribute map
//! owned by whoever populates the store. Structural fields are readable by
//! name (so mappers and predicates can use them like any other field) but
//! only the store can write them.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

use super::ids::{EntryId, ObservableId};
use super::value::{Attributes, Value};

/// Name of the identifier field on both record kinds.
pub const IDX: &str = "idx";
/// Name of an entry's ordered list of owned observable ids.
pub const OBS_IDS: &str = "obs_ids";
/// Name of an observable's back-reference to its owning entry.
pub const ENTRY_ID: &str = "entry_id";
/// Name of an observable's category discriminator.
pub const TYPE: &str = "type";

/// The two record kinds held by a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    Entry,
    Observable,
}

impl RecordKind {
    /// Fields of this kind that only the store may write.
    pub fn structural_fields(self) -> &'static [&'static str] {
        match self {
            RecordKind::Entry => &[IDX, OBS_IDS],
            RecordKind::Observable => &[IDX, ENTRY_ID, TYPE],
        }
    }

    /// Returns true if `field` is structural for this kind.
    pub fn is_structural(self, field: &str) -> bool {
        self.structural_fields().contains(&field)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Entry => write!(f, "Entry"),
            RecordKind::Observable => write!(f, "Observable"),
        }
    }
}

/// One whole sample (e.g. an image).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Entry {
    idx: EntryId,
    obs_ids: Vec<ObservableId>,
    #[serde(flatten)]
    attrs: Attributes,
}

impl Entry {
    pub(crate) fn new(idx: EntryId, attrs: Attributes) -> Self {
        Self {
            idx,
            obs_ids: Vec::new(),
            attrs,
        }
    }

    /// Store-assigned identifier.
    pub fn idx(&self) -> EntryId {
        self.idx
    }

    /// Ids of the observables owned by this entry, in insertion order.
    pub fn obs_ids(&self) -> &[ObservableId] {
        &self.obs_ids
    }

    /// Free-form attributes (structural fields excluded).
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Looks up a free-form attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Looks up any field, structural fields included.
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            IDX => Some(Cow::Owned(self.idx.into())),
            OBS_IDS => Some(Cow::Owned(Value::List(
                self.obs_ids.iter().map(|&id| id.into()).collect(),
            ))),
            _ => self.attrs.get(name).map(Cow::Borrowed),
        }
    }

    /// Returns true if the entry has a field called `name`.
    pub fn has_field(&self, name: &str) -> bool {
        matches!(name, IDX | OBS_IDS) || self.attrs.contains_key(name)
    }

    pub(crate) fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub(crate) fn push_obs(&mut self, id: ObservableId) {
        self.obs_ids.push(id);
    }

    pub(crate) fn remove_obs(&mut self, id: ObservableId) {
        self.obs_ids.retain(|&o| o != id);
    }

    pub(crate) fn shifted(&self, entry_offset: u64, obs_offset: u64) -> Self {
        Self {
            idx: self.idx.shifted(entry_offset),
            obs_ids: self
                .obs_ids
                .iter()
                .map(|id| id.shifted(obs_offset))
                .collect(),
            attrs: self.attrs.clone(),
        }
    }
}

/// One sub-sample annotation (e.g. a bounding box or a tag) owned by an entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Observable {
    idx: ObservableId,
    entry_id: EntryId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    attrs: Attributes,
}

impl Observable {
    pub(crate) fn new(
        idx: ObservableId,
        entry_id: EntryId,
        kind: String,
        attrs: Attributes,
    ) -> Self {
        Self {
            idx,
            entry_id,
            kind,
            attrs,
        }
    }

    /// Store-assigned identifier.
    pub fn idx(&self) -> ObservableId {
        self.idx
    }

    /// Id of the owning entry.
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    /// Category discriminator (the `type` field), e.g. `"object"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Free-form attributes (structural fields excluded).
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Looks up a free-form attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Looks up any field, structural fields included.
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            IDX => Some(Cow::Owned(self.idx.into())),
            ENTRY_ID => Some(Cow::Owned(self.entry_id.into())),
            TYPE => Some(Cow::Owned(Value::Str(self.kind.clone()))),
            _ => self.attrs.get(name).map(Cow::Borrowed),
        }
    }

    /// Returns true if the observable has a field called `name`.
    pub fn has_field(&self, name: &str) -> bool {
        matches!(name, IDX | ENTRY_ID | TYPE) || self.attrs.contains_key(name)
    }

    pub(crate) fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub(crate) fn shifted(&self, entry_offset: u64, obs_offset: u64) -> Self {
        Self {
            idx: self.idx.shifted(obs_offset),
            entry_id: self.entry_id.shifted(entry_offset),
            kind: self.kind.clone(),
            attrs: self.attrs.clone(),
        }
    }
}
