#![allow(dead_code)]

use std::collections::BTreeSet;

use datum::attrs;
use datum::record::{EntryId, ObservableId, Value};
use datum::store::DatasetStore;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// One store mutation. Seeds pick a target among the live records at the
/// time the op is applied, so sequences stay meaningful after removals.
#[derive(Clone, Debug)]
pub enum StoreOp {
    AddEntry { width: u32 },
    AddObservable { entry_seed: usize, object: bool, xmin: u16 },
    RemoveEntry { seed: usize },
    RemoveObservable { seed: usize },
    UpdateEntry { seed: usize, tag: u8 },
    UpdateObservable { seed: usize, score: u8 },
    Prune,
    Compact,
}

pub fn arb_store_op() -> BoxedStrategy<StoreOp> {
    prop_oneof![
        3 => (1u32..=4096).prop_map(|width| StoreOp::AddEntry { width }),
        5 => (any::<usize>(), any::<bool>(), any::<u16>()).prop_map(|(entry_seed, object, xmin)| {
            StoreOp::AddObservable { entry_seed, object, xmin }
        }),
        1 => any::<usize>().prop_map(|seed| StoreOp::RemoveEntry { seed }),
        2 => any::<usize>().prop_map(|seed| StoreOp::RemoveObservable { seed }),
        1 => (any::<usize>(), any::<u8>()).prop_map(|(seed, tag)| StoreOp::UpdateEntry { seed, tag }),
        1 => (any::<usize>(), any::<u8>())
            .prop_map(|(seed, score)| StoreOp::UpdateObservable { seed, score }),
        1 => Just(StoreOp::Prune),
        1 => Just(StoreOp::Compact),
    ]
    .boxed()
}

pub fn arb_store_ops(max_len: usize) -> BoxedStrategy<Vec<StoreOp>> {
    proptest::collection::vec(arb_store_op(), 0..=max_len).boxed()
}

fn pick<T: Copy>(ids: &[T], seed: usize) -> Option<T> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[seed % ids.len()])
    }
}

fn live_entries(store: &DatasetStore) -> Vec<EntryId> {
    store.select_entries(|_| true)
}

fn live_observables(store: &DatasetStore) -> Vec<ObservableId> {
    store.select_observables(|_| true)
}

/// Applies `op` through the public API. Every op targets a live record, so
/// it must succeed; a failure is returned as a message.
pub fn apply_op(store: &mut DatasetStore, op: &StoreOp) -> Result<(), String> {
    match *op {
        StoreOp::AddEntry { width } => {
            store
                .add_entry(attrs! { "width" => width, "height" => width / 2 + 1 })
                .map_err(|e| e.to_string())?;
        }
        StoreOp::AddObservable {
            entry_seed,
            object,
            xmin,
        } => {
            if let Some(entry) = pick(&live_entries(store), entry_seed) {
                let kind = if object { "object" } else { "attribute" };
                store
                    .add_observable(entry, attrs! { "type" => kind, "xmin" => u32::from(xmin) })
                    .map_err(|e| e.to_string())?;
            }
        }
        StoreOp::RemoveEntry { seed } => {
            if let Some(entry) = pick(&live_entries(store), seed) {
                store.remove_entry(entry).map_err(|e| e.to_string())?;
            }
        }
        StoreOp::RemoveObservable { seed } => {
            if let Some(obs) = pick(&live_observables(store), seed) {
                store.remove_observable(obs).map_err(|e| e.to_string())?;
            }
        }
        StoreOp::UpdateEntry { seed, tag } => {
            if let Some(entry) = pick(&live_entries(store), seed) {
                store
                    .update_entry_data(entry, attrs! { "tag" => u32::from(tag) })
                    .map_err(|e| e.to_string())?;
            }
        }
        StoreOp::UpdateObservable { seed, score } => {
            if let Some(obs) = pick(&live_observables(store), seed) {
                store
                    .update_observable_data(obs, attrs! { "score" => f64::from(score) / 255.0 })
                    .map_err(|e| e.to_string())?;
            }
        }
        StoreOp::Prune => {
            store.remove_entries_without_obs();
        }
        StoreOp::Compact => store.compact(),
    }
    Ok(())
}

pub fn build_store(ops: &[StoreOp]) -> Result<DatasetStore, String> {
    let mut store = DatasetStore::new();
    for op in ops {
        apply_op(&mut store, op)?;
    }
    Ok(store)
}

/// Checks the link invariants directly, without going through the audit.
pub fn assert_links_consistent(store: &DatasetStore) -> Result<(), String> {
    let entry_ids: BTreeSet<EntryId> = store.entries().map(|e| e.idx()).collect();

    for entry in store.entries() {
        let mut seen = BTreeSet::new();
        for &obs_id in entry.obs_ids() {
            if !seen.insert(obs_id) {
                return Err(format!("entry {} lists {} twice", entry.idx(), obs_id));
            }
            let obs = store
                .observable(obs_id)
                .ok_or_else(|| format!("entry {} lists dead observable {}", entry.idx(), obs_id))?;
            if obs.entry_id() != entry.idx() {
                return Err(format!(
                    "observable {} points at {} but is listed by {}",
                    obs_id,
                    obs.entry_id(),
                    entry.idx()
                ));
            }
        }
    }

    for obs in store.observables() {
        if !entry_ids.contains(&obs.entry_id()) {
            return Err(format!(
                "observable {} outlives entry {}",
                obs.idx(),
                obs.entry_id()
            ));
        }
    }

    Ok(())
}

pub fn f64_field(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}
