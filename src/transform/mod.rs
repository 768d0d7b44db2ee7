//! Bulk attribute transformation.
//!
//! An [`AttributesTransformer`] holds ordered lists of [`EntryMapper`]s and
//! [`ObservableMapper`]s and applies them to a whole store in two phases:
//! every entry mapper over every entry, then every observable mapper over
//! every observable.
//!
//! Within a phase, mappers run one after another, so a mapper sees the
//! fields written by the mappers before it. A single mapper first computes
//! its outputs for every record from the current values, then writes them
//! all; if computing any record fails, nothing is written for that mapper
//! and the pass stops with the error. Mappers that already ran keep their
//! effect.

mod mapper;

pub use mapper::{EntryMapper, Mapper, ObservableMapper};

use tracing::debug;

use crate::error::DatumError;
use crate::store::DatasetStore;

/// What a mapper does with a record missing one of its input fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplyMode {
    /// Fail the mapper pass with [`DatumError::SchemaMismatch`].
    #[default]
    Force,
    /// Leave the record unchanged.
    Optional,
}

/// An ordered batch of mappers applied to a whole store.
#[derive(Debug, Default)]
pub struct AttributesTransformer {
    entry_mappers: Vec<EntryMapper>,
    observable_mappers: Vec<ObservableMapper>,
    mode: ApplyMode,
}

impl AttributesTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry mapper.
    pub fn with_entry_mapper(mut self, mapper: EntryMapper) -> Self {
        self.entry_mappers.push(mapper);
        self
    }

    /// Appends an observable mapper.
    pub fn with_observable_mapper(mut self, mapper: ObservableMapper) -> Self {
        self.observable_mappers.push(mapper);
        self
    }

    /// Sets how records missing an input field are handled.
    pub fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn entry_mappers(&self) -> &[EntryMapper] {
        &self.entry_mappers
    }

    pub fn observable_mappers(&self) -> &[ObservableMapper] {
        &self.observable_mappers
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    /// Applies every mapper to `store` in place.
    ///
    /// # Errors
    /// Returns the first [`DatumError::SchemaMismatch`] raised by a mapper.
    /// Records touched by earlier mappers keep their new values.
    pub fn transform(&self, store: &mut DatasetStore) -> Result<(), DatumError> {
        for mapper in &self.entry_mappers {
            let outputs = mapper.evaluate_all(store.entries(), self.mode)?;
            let mut updated = 0usize;
            for (entry, values) in store.entries_mut().zip(outputs) {
                if let Some(values) = values {
                    mapper.write(entry, values);
                    updated += 1;
                }
            }
            debug!(%mapper, updated, "Applied entry mapper");
        }

        for mapper in &self.observable_mappers {
            let outputs = mapper.evaluate_all(
                store.observables(),
                |obs| store.entry(obs.entry_id()),
                self.mode,
            )?;
            let mut updated = 0usize;
            for (obs, values) in store.observables_mut().zip(outputs) {
                if let Some(values) = values {
                    mapper.write(obs, values);
                    updated += 1;
                }
            }
            debug!(%mapper, updated, "Applied observable mapper");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::record::{EntryId, Value};

    fn store() -> (DatasetStore, EntryId, EntryId) {
        let mut store = DatasetStore::new();
        let a = store
            .add_entry(attrs! { "width" => 400, "height" => 400, "name" => "image1" })
            .unwrap();
        let b = store
            .add_entry(attrs! { "width" => 600, "height" => 600, "name" => "image2" })
            .unwrap();
        store
            .add_observable(a, attrs! { "type" => "box", "xmin" => 10.0, "xmax" => 20.0, "name" => "car" })
            .unwrap();
        store
            .add_observable(b, attrs! { "type" => "object", "xmin" => 20.0, "xmax" => 40.0, "name" => "person" })
            .unwrap();
        (store, a, b)
    }

    fn halve(field: &str) -> Mapper {
        Mapper::unary(field, field, |v| Value::from(v.as_f64().unwrap_or(f64::NAN) / 2.0)).unwrap()
    }

    #[test]
    fn entry_phase_runs_before_observable_phase() {
        let (mut store, a, _) = store();
        let mapper = Mapper::new(["xmin", "width"], ["xmin_rel"], |[x, w]| {
            [Value::from(x.as_f64().unwrap_or(0.0) / w.as_f64().unwrap_or(1.0))]
        })
        .unwrap();

        let transformer = AttributesTransformer::new()
            .with_observable_mapper(
                ObservableMapper::new(mapper)
                    .unwrap()
                    .entry_inputs(["width"])
                    .unwrap(),
            )
            .with_entry_mapper(EntryMapper::new(halve("width")).unwrap());
        transformer.transform(&mut store).unwrap();

        assert_eq!(store[a].get("width"), Some(&Value::Float(200.0)));
        let (_, obs) = store.get_entry(a).unwrap();
        assert_eq!(obs[0].get("xmin_rel"), Some(&Value::Float(0.05)));
    }

    #[test]
    fn forced_mode_fails_without_partial_writes() {
        let (mut store, a, b) = store();
        store.update_entry_data(a, attrs! { "depth" => 4 }).unwrap();

        let transformer =
            AttributesTransformer::new().with_entry_mapper(EntryMapper::new(halve("depth")).unwrap());
        let err = transformer.transform(&mut store).unwrap_err();
        assert!(matches!(err, DatumError::SchemaMismatch { .. }));
        assert_eq!(store[a].get("depth"), Some(&Value::Int(4)));
        assert!(store[b].get("depth").is_none());
    }

    #[test]
    fn optional_mode_skips_records_missing_inputs() {
        let (mut store, a, b) = store();
        store.update_entry_data(a, attrs! { "depth" => 4 }).unwrap();

        AttributesTransformer::new()
            .with_entry_mapper(EntryMapper::new(halve("depth")).unwrap())
            .with_mode(ApplyMode::Optional)
            .transform(&mut store)
            .unwrap();
        assert_eq!(store[a].get("depth"), Some(&Value::Float(2.0)));
        assert!(store[b].get("depth").is_none());
    }

    #[test]
    fn type_filter_restricts_observable_mappers() {
        let (mut store, a, b) = store();
        let shift = |kind: Option<&str>| {
            let m = ObservableMapper::new(
                Mapper::unary("xmin", "xmin", |v| Value::from(v.as_f64().unwrap_or(0.0) - 1.0))
                    .unwrap(),
            )
            .unwrap();
            match kind {
                Some(kind) => m.of_type(kind),
                None => m,
            }
        };

        let xmin = |store: &DatasetStore, e: EntryId| {
            let (_, obs) = store.get_entry(e).unwrap();
            obs[0].get("xmin").and_then(Value::as_f64)
        };

        let all = AttributesTransformer::new().with_observable_mapper(shift(None));
        all.transform(&mut store).unwrap();
        assert_eq!((xmin(&store, a), xmin(&store, b)), (Some(9.0), Some(19.0)));

        let objects = AttributesTransformer::new().with_observable_mapper(shift(Some("object")));
        objects.transform(&mut store).unwrap();
        assert_eq!((xmin(&store, a), xmin(&store, b)), (Some(9.0), Some(18.0)));

        let boxes = AttributesTransformer::new().with_observable_mapper(shift(Some("box")));
        boxes.transform(&mut store).unwrap();
        assert_eq!((xmin(&store, a), xmin(&store, b)), (Some(8.0), Some(18.0)));
    }

    #[test]
    fn structural_fields_are_readable_inputs() {
        let (mut store, a, _) = store();
        AttributesTransformer::new()
            .with_entry_mapper(EntryMapper::new(Mapper::copy_field("idx", "source_idx").unwrap()).unwrap())
            .transform(&mut store)
            .unwrap();
        assert_eq!(store[a].get("source_idx"), Some(&Value::Int(0)));
    }
}
