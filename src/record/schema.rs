//! Minimal attribute schema a store can enforce on insertion.

use std::collections::{BTreeMap, BTreeSet};

use super::model::{Entry, Observable, RecordKind};
use super::value::Attributes;
use crate::error::DatumError;

/// Attributes every record of a store must carry.
///
/// Empty by default, in which case any attribute map is accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequiredAttributes {
    /// Required on every entry.
    pub entry: BTreeSet<String>,
    /// Required on every observable.
    pub observable: BTreeSet<String>,
    /// Required on observables of a given `type`, in addition to `observable`.
    pub observable_by_type: BTreeMap<String, BTreeSet<String>>,
}

impl RequiredAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds required entry attributes.
    pub fn with_entry<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds attributes required on every observable.
    pub fn with_observable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observable.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds attributes required on observables of type `kind`.
    pub fn with_observable_type<I, S>(mut self, kind: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observable_by_type
            .entry(kind.into())
            .or_default()
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty() && self.observable.is_empty() && self.observable_by_type.is_empty()
    }

    /// Keeps only requirements shared by `self` and `other`.
    ///
    /// A per-type requirement survives only when both sides declare the type.
    pub fn intersection(&self, other: &Self) -> Self {
        let observable_by_type = self
            .observable_by_type
            .iter()
            .filter_map(|(kind, names)| {
                other.observable_by_type.get(kind).map(|theirs| {
                    (
                        kind.clone(),
                        names.intersection(theirs).cloned().collect(),
                    )
                })
            })
            .collect();

        Self {
            entry: self.entry.intersection(&other.entry).cloned().collect(),
            observable: self
                .observable
                .intersection(&other.observable)
                .cloned()
                .collect(),
            observable_by_type,
        }
    }

    /// Keeps every requirement declared by either side.
    pub fn union(&self, other: &Self) -> Self {
        let mut observable_by_type = self.observable_by_type.clone();
        for (kind, names) in &other.observable_by_type {
            observable_by_type
                .entry(kind.clone())
                .or_default()
                .extend(names.iter().cloned());
        }

        Self {
            entry: self.entry.union(&other.entry).cloned().collect(),
            observable: self.observable.union(&other.observable).cloned().collect(),
            observable_by_type,
        }
    }

    /// Required entry attributes absent from `attrs`.
    ///
    /// Structural fields (`idx`, `obs_ids`) are always present on a stored
    /// entry and never count as missing.
    pub fn missing_entry_attributes(&self, attrs: &Attributes) -> Vec<String> {
        missing(RecordKind::Entry, &self.entry, attrs)
    }

    /// Required attributes absent from an observable of type `kind`.
    ///
    /// `idx`, `entry_id` and `type` never count as missing.
    pub fn missing_observable_attributes(&self, kind: &str, attrs: &Attributes) -> Vec<String> {
        let mut out = missing(RecordKind::Observable, &self.observable, attrs);
        if let Some(per_type) = self.observable_by_type.get(kind) {
            out.extend(missing(RecordKind::Observable, per_type, attrs));
        }
        out
    }

    pub(crate) fn check_entry(&self, attrs: &Attributes) -> Result<(), DatumError> {
        let absent = self.missing_entry_attributes(attrs);
        if absent.is_empty() {
            Ok(())
        } else {
            Err(DatumError::schema(format!(
                "entry is missing required attributes {absent:?}"
            )))
        }
    }

    pub(crate) fn check_observable(&self, kind: &str, attrs: &Attributes) -> Result<(), DatumError> {
        let absent = self.missing_observable_attributes(kind, attrs);
        if absent.is_empty() {
            Ok(())
        } else {
            Err(DatumError::schema(format!(
                "observable of type '{kind}' is missing required attributes {absent:?}"
            )))
        }
    }

    /// Convenience for audits over already-stored records.
    pub fn entry_satisfies(&self, entry: &Entry) -> bool {
        self.missing_entry_attributes(entry.attributes()).is_empty()
    }

    pub fn observable_satisfies(&self, obs: &Observable) -> bool {
        self.missing_observable_attributes(obs.kind(), obs.attributes())
            .is_empty()
    }
}

fn missing(kind: RecordKind, required: &BTreeSet<String>, attrs: &Attributes) -> Vec<String> {
    required
        .iter()
        .filter(|name| !kind.is_structural(name.as_str()) && !attrs.contains_key(name.as_str()))
        .cloned()
        .collect()
}
