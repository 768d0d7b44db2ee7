//! Lossless concatenation of stores.
//!
//! Entry and observable ids come from two independent counters, and each
//! counter is offset separately: the right-hand store's entry ids move up by
//! the left store's entry counter, its observable ids by the left store's
//! observable counter. A counter is always `1 + max idx ever assigned`, so
//! the shifted ids cannot collide even with ids the left store has
//! already removed.
//!
//! The merged store's required attributes are combined under an
//! [`AttributesMerging`] policy. [`merge`] and [`merge_all`] intersect them.

use tracing::debug;

use super::DatasetStore;
use crate::error::DatumError;
use crate::record::RequiredAttributes;

/// How the required attributes of merged stores are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttributesMerging {
    /// Keep only requirements every input declares.
    #[default]
    Intersection,
    /// Keep every requirement any input declares. Every copied record must
    /// satisfy the combined set.
    Union,
}

/// Builds a new store holding `a`'s records followed by `b`'s.
///
/// Neither input is modified. `a`'s records keep their ids; every id and
/// reference copied from `b` is shifted as described in the module docs.
/// The result enforces only the attribute requirements shared by both
/// inputs, since every copied record already satisfies its own store's.
pub fn merge(a: &DatasetStore, b: &DatasetStore) -> DatasetStore {
    concat(
        a,
        b,
        a.required_attributes().intersection(b.required_attributes()),
    )
}

/// Like [`merge`], combining required attributes under `policy`.
///
/// # Errors
/// Under [`AttributesMerging::Union`], returns [`DatumError::SchemaMismatch`]
/// if a record of either input lacks an attribute the combined set requires.
/// Nothing is built in that case.
pub fn merge_with(
    a: &DatasetStore,
    b: &DatasetStore,
    policy: AttributesMerging,
) -> Result<DatasetStore, DatumError> {
    match policy {
        AttributesMerging::Intersection => Ok(merge(a, b)),
        AttributesMerging::Union => {
            let required = a.required_attributes().union(b.required_attributes());
            check_records(a, &required)?;
            check_records(b, &required)?;
            Ok(concat(a, b, required))
        }
    }
}

fn check_records(store: &DatasetStore, required: &RequiredAttributes) -> Result<(), DatumError> {
    for entry in store.entries() {
        required.check_entry(entry.attributes()).map_err(|e| {
            DatumError::schema(format!("cannot merge entry {}: {e}", entry.idx()))
        })?;
    }
    for obs in store.observables() {
        required
            .check_observable(obs.kind(), obs.attributes())
            .map_err(|e| DatumError::schema(format!("cannot merge observable {}: {e}", obs.idx())))?;
    }
    Ok(())
}

fn concat(a: &DatasetStore, b: &DatasetStore, required: RequiredAttributes) -> DatasetStore {
    let entry_offset = a.next_entry_idx().as_u64();
    let obs_offset = a.next_observable_idx().as_u64();

    let mut merged = DatasetStore::with_required(required);

    for entry in a.entries() {
        merged.push_entry(entry.clone());
    }
    for obs in a.observables() {
        merged.push_observable(obs.clone());
    }
    for entry in b.entries() {
        merged.push_entry(entry.shifted(entry_offset, obs_offset));
    }
    for obs in b.observables() {
        merged.push_observable(obs.shifted(entry_offset, obs_offset));
    }

    merged.set_counters(
        entry_offset + b.next_entry_idx().as_u64(),
        obs_offset + b.next_observable_idx().as_u64(),
    );

    debug!(
        entries = merged.len(),
        observables = merged.observable_count(),
        entry_offset,
        obs_offset,
        "Merged stores"
    );
    merged
}

/// Merges a list of stores left to right. An empty list yields an empty store.
pub fn merge_all(stores: &[&DatasetStore]) -> DatasetStore {
    match stores.split_first() {
        None => DatasetStore::new(),
        Some((first, rest)) => rest
            .iter()
            .fold(plain_copy(first), |acc, next| merge(&acc, next)),
    }
}

/// Merges a list of stores left to right under `policy`.
///
/// # Errors
/// See [`merge_with`].
pub fn merge_all_with(
    stores: &[&DatasetStore],
    policy: AttributesMerging,
) -> Result<DatasetStore, DatumError> {
    match stores.split_first() {
        None => Ok(DatasetStore::new()),
        Some((first, rest)) => rest
            .iter()
            .try_fold(plain_copy(first), |acc, next| merge_with(&acc, next, policy)),
    }
}

/// A copy of `store` without its insert mappers, like every merge result.
fn plain_copy(store: &DatasetStore) -> DatasetStore {
    concat(store, &DatasetStore::new(), store.required_attributes().clone())
}
