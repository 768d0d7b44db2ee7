//! Fuzz target for datastore catalog parsing.
//!
//! Feeds arbitrary bytes to the catalog reader; any row it accepts must
//! survive a write and re-read unchanged.

#![no_main]

use datum::registry::{from_catalog_slice, to_catalog_string};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(rows) = from_catalog_slice(data) {
        if let Ok(text) = to_catalog_string(&rows) {
            let again = from_catalog_slice(text.as_bytes()).expect("re-read written catalog");
            assert_eq!(rows, again);
        }
    }
});
