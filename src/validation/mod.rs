//! Store integrity audit.
//!
//! The store keeps its invariants by construction; this module re-checks
//! them from the outside, which is what tests, property checks and callers
//! debugging a reader want. It checks:
//! - Links (every listed observable is live, listed once, and points back)
//! - Ownership (no observable without a live owner)
//! - Counters (no idx at or beyond the store's next idx)
//! - Content (childless entries, missing required attributes) as warnings

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::HashSet;

use crate::record::ObservableId;
use crate::store::DatasetStore;

/// Audits `store` and returns every issue found.
pub fn validate_store(store: &DatasetStore) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_entries(store, &mut report);
    validate_observables(store, &mut report);

    report
}

fn validate_entries(store: &DatasetStore, report: &mut ValidationReport) {
    let next_entry = store.next_entry_idx();
    let required = store.required_attributes();

    for entry in store.entries() {
        let id = entry.idx().as_u64();

        if entry.idx() >= next_entry {
            report.add(ValidationIssue::error(
                IssueCode::IdxBeyondCounter,
                format!("idx {} is not below the entry counter {}", id, next_entry),
                IssueContext::Entry { id },
            ));
        }

        let mut seen: HashSet<ObservableId> = HashSet::new();
        for &obs_id in entry.obs_ids() {
            if !seen.insert(obs_id) {
                report.add(ValidationIssue::error(
                    IssueCode::DuplicateObservableRef,
                    format!("Observable {} is listed more than once", obs_id),
                    IssueContext::Entry { id },
                ));
                continue;
            }

            match store.observable(obs_id) {
                None => report.add(ValidationIssue::error(
                    IssueCode::DanglingObservableRef,
                    format!("Lists observable {} which is not live", obs_id),
                    IssueContext::Entry { id },
                )),
                Some(obs) if obs.entry_id() != entry.idx() => {
                    report.add(ValidationIssue::error(
                        IssueCode::OwnershipMismatch,
                        format!(
                            "Lists observable {} which belongs to entry {}",
                            obs_id,
                            obs.entry_id()
                        ),
                        IssueContext::Entry { id },
                    ))
                }
                Some(_) => {}
            }
        }

        if entry.obs_ids().is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::ChildlessEntry,
                "Entry owns no observable",
                IssueContext::Entry { id },
            ));
        }

        let missing = required.missing_entry_attributes(entry.attributes());
        if !missing.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::MissingRequiredAttribute,
                format!("Missing required attributes {:?}", missing),
                IssueContext::Entry { id },
            ));
        }
    }
}

fn validate_observables(store: &DatasetStore, report: &mut ValidationReport) {
    let next_obs = store.next_observable_idx();
    let required = store.required_attributes();

    for obs in store.observables() {
        let id = obs.idx().as_u64();

        if obs.idx() >= next_obs {
            report.add(ValidationIssue::error(
                IssueCode::IdxBeyondCounter,
                format!("idx {} is not below the observable counter {}", id, next_obs),
                IssueContext::Observable { id },
            ));
        }

        match store.entry(obs.entry_id()) {
            None => report.add(ValidationIssue::error(
                IssueCode::OrphanObservable,
                format!("Owner entry {} is not live", obs.entry_id()),
                IssueContext::Observable { id },
            )),
            Some(owner) if !owner.obs_ids().contains(&obs.idx()) => {
                report.add(ValidationIssue::error(
                    IssueCode::OwnershipMismatch,
                    format!("Owner entry {} does not list it", owner.idx()),
                    IssueContext::Observable { id },
                ))
            }
            Some(_) => {}
        }

        let missing = required.missing_observable_attributes(obs.kind(), obs.attributes());
        if !missing.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::MissingRequiredAttribute,
                format!("Missing required attributes {:?}", missing),
                IssueContext::Observable { id },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::record::{Entry, EntryId, Observable, RequiredAttributes};

    fn valid_store() -> DatasetStore {
        let mut store = DatasetStore::new();
        let e = store.add_entry(attrs! { "filename" => "a.jpg" }).unwrap();
        store
            .add_observable(e, attrs! { "type" => "object", "name" => "cat" })
            .unwrap();
        store
    }

    fn has_code(report: &ValidationReport, code: IssueCode) -> bool {
        report.issues.iter().any(|i| i.code == code)
    }

    #[test]
    fn test_valid_store() {
        let report = validate_store(&valid_store());
        assert!(report.is_ok_strict(), "unexpected issues: {}", report);
    }

    #[test]
    fn test_childless_entry_is_a_warning() {
        let mut store = valid_store();
        store.add_entry(attrs! {}).unwrap();
        let report = validate_store(&store);
        assert!(report.is_ok());
        assert!(has_code(&report, IssueCode::ChildlessEntry));
    }

    #[test]
    fn test_dangling_and_duplicate_refs() {
        let mut store = DatasetStore::new();
        let mut entry = Entry::new(EntryId(0), attrs! {});
        entry.push_obs(ObservableId(5));
        entry.push_obs(ObservableId(5));
        store.push_entry(entry);
        store.set_counters(1, 6);

        let report = validate_store(&store);
        assert!(has_code(&report, IssueCode::DanglingObservableRef));
        assert!(has_code(&report, IssueCode::DuplicateObservableRef));
    }

    #[test]
    fn test_orphan_observable() {
        let mut store = valid_store();
        store.push_observable(Observable::new(
            ObservableId(1),
            EntryId(9),
            "object".into(),
            attrs! {},
        ));
        store.set_counters(1, 2);

        let report = validate_store(&store);
        assert_eq!(report.error_count(), 1);
        assert!(has_code(&report, IssueCode::OrphanObservable));
    }

    #[test]
    fn test_unlisted_observable_is_a_mismatch() {
        let mut store = valid_store();
        store.push_observable(Observable::new(
            ObservableId(1),
            EntryId(0),
            "object".into(),
            attrs! {},
        ));
        store.set_counters(1, 2);

        let report = validate_store(&store);
        assert!(has_code(&report, IssueCode::OwnershipMismatch));
    }

    #[test]
    fn test_idx_beyond_counter() {
        let mut store = valid_store();
        store.set_counters(0, 1);
        let report = validate_store(&store);
        assert!(has_code(&report, IssueCode::IdxBeyondCounter));
    }

    #[test]
    fn test_missing_required_attribute_after_merge_relaxation() {
        let mut store = DatasetStore::with_required(RequiredAttributes::new().with_entry(["width"]));
        store.push_entry(Entry::new(EntryId(0), attrs! {}));
        store.set_counters(1, 0);

        let report = validate_store(&store);
        assert!(has_code(&report, IssueCode::MissingRequiredAttribute));
        assert!(report.is_ok());
    }

    #[test]
    fn test_structural_requirements_raise_no_warning() {
        let required = RequiredAttributes::new()
            .with_entry(["idx", "obs_ids"])
            .with_observable(["type", "entry_id"]);
        let mut store = DatasetStore::with_required(required);
        let e = store.add_entry(attrs! { "filename" => "a.jpg" }).unwrap();
        store.add_observable(e, attrs! { "type" => "object" }).unwrap();

        let report = validate_store(&store);
        assert!(!has_code(&report, IssueCode::MissingRequiredAttribute));
        assert!(report.is_ok_strict(), "unexpected issues: {}", report);
    }
}
