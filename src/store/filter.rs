//! Destructive filtering built on selection plus removal.
//!
//! The store itself only selects ids; these helpers pair a selection with
//! the matching removal calls so every deletion still goes through the
//! cascading, invariant-preserving paths.

use std::collections::HashSet;

use tracing::debug;

use super::DatasetStore;
use crate::error::DatumError;
use crate::record::{Entry, EntryId, Observable, ObservableId, Value};

/// How [`filter_by_observable_names`] treats non-matching observables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    /// Keep whole entries owning at least one matching observable.
    Entries,
    /// Keep only matching observables; drop entries left without any.
    Observables,
}

/// Counts of records removed by a filter call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub entries_removed: usize,
    pub observables_removed: usize,
}

/// Removes every entry (and its observables) for which `keep` returns false.
pub fn retain_entries<F>(store: &mut DatasetStore, mut keep: F) -> Result<FilterSummary, DatumError>
where
    F: FnMut(&Entry, &[&Observable]) -> bool,
{
    let doomed: Vec<EntryId> = store
        .iter()
        .filter(|(entry, obs)| !keep(entry, obs.as_slice()))
        .map(|(entry, _)| entry.idx())
        .collect();

    let before = store.observable_count();
    for idx in &doomed {
        store.remove_entry(*idx)?;
    }

    Ok(FilterSummary {
        entries_removed: doomed.len(),
        observables_removed: before - store.observable_count(),
    })
}

/// Removes every observable for which `keep` returns false.
///
/// Entries are never removed here, even if they end up childless.
pub fn retain_observables<F>(
    store: &mut DatasetStore,
    mut keep: F,
) -> Result<FilterSummary, DatumError>
where
    F: FnMut(&Observable) -> bool,
{
    let doomed: Vec<ObservableId> = store.select_observables(|o| !keep(o));
    for idx in &doomed {
        store.remove_observable(*idx)?;
    }

    Ok(FilterSummary {
        entries_removed: 0,
        observables_removed: doomed.len(),
    })
}

/// Filters a store by the `name` attribute of its observables.
///
/// Blank names are ignored; an empty (or all-blank) `names` list leaves the
/// store untouched.
///
/// # Errors
/// Returns [`DatumError::InvalidFilter`] if none of the requested names
/// occurs in the store.
pub fn filter_by_observable_names(
    store: &mut DatasetStore,
    names: &[String],
    mode: FilterMode,
) -> Result<FilterSummary, DatumError> {
    let requested: HashSet<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();

    if requested.is_empty() {
        return Ok(FilterSummary::default());
    }

    let matches =
        |obs: &Observable| obs.get("name").and_then(Value::as_str).is_some_and(|n| requested.contains(n));

    if !store.observables().any(&matches) {
        return Err(DatumError::InvalidFilter {
            message: "none of the requested names were found in the store".to_string(),
        });
    }

    let summary = match mode {
        FilterMode::Entries => retain_entries(store, |_, obs| obs.iter().any(|o| matches(o)))?,
        FilterMode::Observables => {
            let mut summary = retain_observables(store, matches)?;
            summary.entries_removed = store.remove_entries_without_obs();
            summary
        }
    };

    debug!(
        ?mode,
        entries_removed = summary.entries_removed,
        observables_removed = summary.observables_removed,
        "Filtered store by observable name"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    fn make_store() -> DatasetStore {
        let mut store = DatasetStore::new();
        let a = store.add_entry(attrs! { "filename" => "a.jpg" }).unwrap();
        let b = store.add_entry(attrs! { "filename" => "b.jpg" }).unwrap();
        store.add_entry(attrs! { "filename" => "c.jpg" }).unwrap();
        store
            .add_observable(a, attrs! { "type" => "object", "name" => "person" })
            .unwrap();
        store
            .add_observable(a, attrs! { "type" => "object", "name" => "dog" })
            .unwrap();
        store
            .add_observable(b, attrs! { "type" => "object", "name" => "dog" })
            .unwrap();
        store
    }

    #[test]
    fn entries_mode_keeps_whole_entries() {
        let mut store = make_store();
        let summary =
            filter_by_observable_names(&mut store, &["person".to_string()], FilterMode::Entries)
                .expect("filter ok");

        assert_eq!(summary.entries_removed, 2);
        assert_eq!(summary.observables_removed, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.observable_count(), 2);
    }

    #[test]
    fn observables_mode_prunes_childless_entries() {
        let mut store = make_store();
        let summary =
            filter_by_observable_names(&mut store, &[" dog ".to_string()], FilterMode::Observables)
                .expect("filter ok");

        assert_eq!(store.len(), 2);
        assert_eq!(store.observable_count(), 2);
        assert_eq!(summary.observables_removed, 1);
        assert_eq!(summary.entries_removed, 1);
        assert!(store
            .observables()
            .all(|o| o.get("name") == Some(&Value::from("dog"))));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut store = make_store();
        let err = filter_by_observable_names(&mut store, &["zebra".to_string()], FilterMode::Entries)
            .unwrap_err();
        assert!(matches!(err, DatumError::InvalidFilter { .. }));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn blank_names_are_a_no_op() {
        let mut store = make_store();
        let summary =
            filter_by_observable_names(&mut store, &["  ".to_string()], FilterMode::Entries)
                .expect("filter ok");
        assert_eq!(summary, FilterSummary::default());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn retain_entries_by_attribute() {
        let mut store = make_store();
        let summary = retain_entries(&mut store, |entry, _| {
            entry.get("filename") != Some(&Value::from("a.jpg"))
        })
        .expect("retain ok");
        assert_eq!(summary.entries_removed, 1);
        assert_eq!(summary.observables_removed, 2);
    }
}
