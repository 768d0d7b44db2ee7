//! Fuzz target for JSON attribute maps.
//!
//! Arbitrary JSON objects are turned into attribute maps and inserted into a
//! store, checking for panics.

#![no_main]

use datum::record::attributes_from_json;
use datum::store::DatasetStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(json) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(attrs) = attributes_from_json(json) else {
        return;
    };

    let mut store = DatasetStore::new();
    if let Ok(entry) = store.add_entry(attrs.clone()) {
        let _ = store.add_observable(entry, attrs);
    }
});
