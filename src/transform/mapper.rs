//! Declarative field mappers.
//!
//! A [`Mapper`] reads a fixed, ordered list of input fields from a record,
//! passes their values to a pure function, and writes the results to a
//! fixed, ordered list of output fields. Arity is part of the function's
//! type (`[Value; N] -> [Value; M]`), so a mapper whose function does not
//! fit its field lists cannot be built.
//!
//! Outputs that reuse an input name overwrite that field in place. Outputs
//! with new names add a field and leave every input field where it was:
//! mappers derive fields, they never delete them.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::ApplyMode;
use crate::error::DatumError;
use crate::record::{Attributes, Entry, Observable, RecordKind, Value};

type BoxedFn = Box<dyn Fn(Vec<Value>) -> Result<Vec<Value>, String>>;

/// A field-transform rule, not yet bound to a record kind.
pub struct Mapper {
    inputs: Vec<String>,
    outputs: Vec<String>,
    func: BoxedFn,
}

impl Mapper {
    /// Builds a mapper from an infallible function.
    ///
    /// # Errors
    /// Returns [`DatumError::SchemaMismatch`] if either field list is empty
    /// or an output name is repeated.
    ///
    /// # Example
    /// ```
    /// use datum::record::Value;
    /// use datum::transform::Mapper;
    ///
    /// let area = Mapper::new(["width", "height"], ["area"], |[w, h]: [Value; 2]| {
    ///     [Value::from(w.as_f64().unwrap_or(0.0) * h.as_f64().unwrap_or(0.0))]
    /// })
    /// .unwrap();
    /// assert_eq!(area.to_string(), "[width, height] -> [area]");
    /// ```
    pub fn new<const N: usize, const M: usize, F>(
        inputs: [&str; N],
        outputs: [&str; M],
        func: F,
    ) -> Result<Self, DatumError>
    where
        F: Fn([Value; N]) -> [Value; M] + 'static,
    {
        Self::try_new(inputs, outputs, move |values| Ok(func(values)))
    }

    /// Builds a mapper from a function that may reject its inputs.
    ///
    /// A rejection surfaces as [`DatumError::SchemaMismatch`] when the
    /// mapper is applied.
    pub fn try_new<const N: usize, const M: usize, F>(
        inputs: [&str; N],
        outputs: [&str; M],
        func: F,
    ) -> Result<Self, DatumError>
    where
        F: Fn([Value; N]) -> Result<[Value; M], String> + 'static,
    {
        if N == 0 || M == 0 {
            return Err(DatumError::schema(
                "a mapper needs at least one input and one output field",
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = outputs.iter().find(|name| !seen.insert(**name)) {
            return Err(DatumError::schema(format!(
                "output field '{dup}' is listed more than once"
            )));
        }

        let func: BoxedFn = Box::new(move |values: Vec<Value>| -> Result<Vec<Value>, String> {
            let args: [Value; N] = values
                .try_into()
                .map_err(|v: Vec<Value>| format!("expected {N} input values, got {}", v.len()))?;
            func(args).map(Vec::from)
        });

        Ok(Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            func,
        })
    }

    /// Builds a one-field-in, one-field-out mapper over scalar values.
    pub fn unary<F>(input: &str, output: &str, func: F) -> Result<Self, DatumError>
    where
        F: Fn(Value) -> Value + 'static,
    {
        Self::new([input], [output], move |[value]| [func(value)])
    }

    /// Copies `from` into `to`. The source field is kept.
    pub fn copy_field(from: &str, to: &str) -> Result<Self, DatumError> {
        Self::unary(from, to, |value| value)
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    fn check_outputs(&self, kind: RecordKind) -> Result<(), DatumError> {
        match self.outputs.iter().find(|name| kind.is_structural(name)) {
            Some(name) => Err(DatumError::forbidden(kind, name.as_str())),
            None => Ok(()),
        }
    }

    /// Reads inputs through `lookup` and runs the function.
    ///
    /// `Ok(None)` means the record was skipped under [`ApplyMode::Optional`].
    fn evaluate<'a, L>(
        &self,
        kind: RecordKind,
        idx: u64,
        mode: ApplyMode,
        lookup: L,
    ) -> Result<Option<Vec<Value>>, DatumError>
    where
        L: Fn(&str) -> Option<Cow<'a, Value>>,
    {
        let mut args = Vec::with_capacity(self.inputs.len());
        for name in &self.inputs {
            match lookup(name) {
                Some(value) => args.push(value.into_owned()),
                None => match mode {
                    ApplyMode::Optional => return Ok(None),
                    ApplyMode::Force => {
                        return Err(DatumError::schema(format!(
                            "{kind} {idx} has no field '{name}' required by mapper {self}"
                        )))
                    }
                },
            }
        }

        (self.func)(args).map(Some).map_err(|reason| {
            DatumError::schema(format!("mapper {self} failed on {kind} {idx}: {reason}"))
        })
    }

    fn write(&self, attrs: &mut Attributes, values: Vec<Value>) {
        for (name, value) in self.outputs.iter().zip(values) {
            attrs.insert(name.clone(), value);
        }
    }
}

impl fmt::Display for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] -> [{}]",
            self.inputs.join(", "),
            self.outputs.join(", ")
        )
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// A mapper applied to every entry of a store.
#[derive(Debug)]
pub struct EntryMapper {
    mapper: Mapper,
}

impl EntryMapper {
    /// Binds `mapper` to entries.
    ///
    /// # Errors
    /// Returns [`DatumError::InvalidMutation`] if an output is `idx` or `obs_ids`.
    pub fn new(mapper: Mapper) -> Result<Self, DatumError> {
        mapper.check_outputs(RecordKind::Entry)?;
        Ok(Self { mapper })
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Computes outputs for every entry, in iteration order.
    pub(crate) fn evaluate_all<'a, I>(
        &self,
        entries: I,
        mode: ApplyMode,
    ) -> Result<Vec<Option<Vec<Value>>>, DatumError>
    where
        I: Iterator<Item = &'a Entry>,
    {
        entries
            .map(|entry| {
                self.mapper.evaluate(
                    RecordKind::Entry,
                    entry.idx().as_u64(),
                    mode,
                    |name| entry.field(name),
                )
            })
            .collect()
    }

    pub(crate) fn write(&self, entry: &mut Entry, values: Vec<Value>) {
        self.mapper.write(entry.attrs_mut(), values);
    }
}

impl fmt::Display for EntryMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {}", self.mapper)
    }
}

/// A mapper applied to observables, optionally restricted to one `type`.
///
/// Some inputs may be read from the observable's owning entry instead of
/// the observable itself, e.g. image dimensions when normalizing boxes.
#[derive(Debug)]
pub struct ObservableMapper {
    mapper: Mapper,
    obs_type: Option<String>,
    entry_inputs: BTreeSet<String>,
}

impl ObservableMapper {
    /// Binds `mapper` to observables of every type.
    ///
    /// # Errors
    /// Returns [`DatumError::InvalidMutation`] if an output is `idx`,
    /// `entry_id` or `type`.
    pub fn new(mapper: Mapper) -> Result<Self, DatumError> {
        mapper.check_outputs(RecordKind::Observable)?;
        Ok(Self {
            mapper,
            obs_type: None,
            entry_inputs: BTreeSet::new(),
        })
    }

    /// Restricts the mapper to observables whose `type` equals `kind`.
    pub fn of_type(mut self, kind: impl Into<String>) -> Self {
        self.obs_type = Some(kind.into());
        self
    }

    /// Resolves the given inputs on the owning entry.
    ///
    /// # Errors
    /// Returns [`DatumError::SchemaMismatch`] if a name is not one of the
    /// mapper's inputs.
    pub fn entry_inputs<I, S>(mut self, names: I) -> Result<Self, DatumError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.mapper.inputs.contains(&name) {
                return Err(DatumError::schema(format!(
                    "entry input '{name}' is not an input of mapper {}",
                    self.mapper
                )));
            }
            self.entry_inputs.insert(name);
        }
        Ok(self)
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// The `type` this mapper is restricted to, if any.
    pub fn obs_type(&self) -> Option<&str> {
        self.obs_type.as_deref()
    }

    fn applies_to(&self, obs: &Observable) -> bool {
        self.obs_type.as_deref().is_none_or(|kind| kind == obs.kind())
    }

    /// Computes outputs for every observable, in iteration order.
    ///
    /// Observables of another type yield `None`. `parent` resolves the
    /// owning entry for entry-side inputs.
    pub(crate) fn evaluate_all<'a, I, P>(
        &self,
        observables: I,
        parent: P,
        mode: ApplyMode,
    ) -> Result<Vec<Option<Vec<Value>>>, DatumError>
    where
        I: Iterator<Item = &'a Observable>,
        P: Fn(&Observable) -> Option<&'a Entry>,
    {
        observables
            .map(|obs| {
                if !self.applies_to(obs) {
                    return Ok(None);
                }
                let owner = parent(obs);
                self.mapper.evaluate(
                    RecordKind::Observable,
                    obs.idx().as_u64(),
                    mode,
                    |name| {
                        if self.entry_inputs.contains(name) {
                            owner.and_then(|entry| entry.field(name))
                        } else {
                            obs.field(name)
                        }
                    },
                )
            })
            .collect()
    }

    pub(crate) fn write(&self, obs: &mut Observable, values: Vec<Value>) {
        self.mapper.write(obs.attrs_mut(), values);
    }
}

impl fmt::Display for ObservableMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.obs_type {
            Some(kind) => write!(f, "observable[{kind}] {}", self.mapper),
            None => write!(f, "observable {}", self.mapper),
        }
    }
}
