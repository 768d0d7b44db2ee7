//! Datastore registry.
//!
//! A registry is a directory of catalog files, one `<datastore>.csv` per
//! datastore, each listing dataset names and the directories their formatted
//! files live in. Datasets are addressed either by name plus datastore or by
//! the `datastore.name` shorthand.

mod catalog;

pub use catalog::{
    from_catalog_slice, read_catalog, to_catalog_string, write_catalog, RegisteredDataset,
    CATALOG_HEADER,
};

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::DatumError;

const CATALOG_EXTENSION: &str = "csv";

/// In-memory view of a registry directory.
#[derive(Clone, Debug)]
pub struct Registry {
    dir: PathBuf,
    datastores: BTreeMap<String, Vec<RegisteredDataset>>,
}

impl Registry {
    /// Opens the registry rooted at `dir`, creating the directory if needed
    /// and loading every catalog in it.
    ///
    /// # Errors
    /// Fails if the directory cannot be created or listed, or if any catalog
    /// is malformed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DatumError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut datastores = BTreeMap::new();
        for dir_entry in fs::read_dir(&dir)? {
            let path = dir_entry?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(CATALOG_EXTENSION)
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let datasets = read_catalog(&path)?;
            datastores.insert(stem.to_string(), datasets);
        }

        debug!(dir = %dir.display(), datastores = datastores.len(), "Opened registry");
        Ok(Self { dir, datastores })
    }

    /// Directory holding the catalogs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of the known datastores, sorted.
    pub fn datastores(&self) -> impl Iterator<Item = &str> {
        self.datastores.keys().map(String::as_str)
    }

    /// Datasets registered in `datastore`, in registration order.
    ///
    /// # Errors
    /// Returns [`DatumError::UnknownDatastore`] if no such datastore exists.
    pub fn datasets(&self, datastore: &str) -> Result<&[RegisteredDataset], DatumError> {
        self.datastores
            .get(datastore)
            .map(Vec::as_slice)
            .ok_or_else(|| DatumError::UnknownDatastore(datastore.to_string()))
    }

    /// Path of the catalog file backing `datastore`.
    pub fn catalog_path(&self, datastore: &str) -> PathBuf {
        self.dir.join(format!("{datastore}.{CATALOG_EXTENSION}"))
    }

    /// Registers a dataset under `name` in `datastore` and saves the catalog.
    ///
    /// The datastore is created on first use. Within a datastore both the
    /// name and the root directory must be unique. The registry is only
    /// updated once the catalog has been written.
    pub fn register(
        &mut self,
        root: impl Into<PathBuf>,
        name: &str,
        datastore: &str,
    ) -> Result<(), DatumError> {
        check_name("dataset", name)?;
        check_name("datastore", datastore)?;
        let root = root.into();

        let mut datasets = self.datastores.get(datastore).cloned().unwrap_or_default();
        if datasets.iter().any(|d| d.name == name) {
            return Err(DatumError::DatasetAlreadyRegistered {
                what: format!("with name '{name}'"),
                datastore: datastore.to_string(),
            });
        }
        if datasets.iter().any(|d| d.root == root) {
            return Err(DatumError::DatasetAlreadyRegistered {
                what: format!("with root dir '{}'", root.display()),
                datastore: datastore.to_string(),
            });
        }

        datasets.push(RegisteredDataset {
            name: name.to_string(),
            root,
        });
        write_catalog(&self.catalog_path(datastore), &datasets)?;
        self.datastores.insert(datastore.to_string(), datasets);
        debug!(datastore, name, "Registered dataset");
        Ok(())
    }

    /// Finds the root directory of a registered dataset.
    ///
    /// Without an explicit `datastore`, a name of the form `store.name` is
    /// split on its first dot; otherwise every datastore is searched in name
    /// order and the first match wins.
    pub fn resolve(&self, name: &str, datastore: Option<&str>) -> Result<&Path, DatumError> {
        let (datastore, name) = match datastore {
            Some(store) => (Some(store), name),
            None => match name.split_once('.') {
                Some((store, rest)) => (Some(store), rest),
                None => (None, name),
            },
        };

        let found = match datastore {
            Some(store) => find(self.datasets(store)?, name),
            None => self.datastores.values().find_map(|d| find(d, name)),
        };

        found.ok_or_else(|| DatumError::UnknownDataset {
            name: name.to_string(),
            datastore: datastore.map(str::to_string),
        })
    }

    /// Writes the catalog of `datastore` back to disk.
    pub fn save(&self, datastore: &str) -> Result<(), DatumError> {
        write_catalog(&self.catalog_path(datastore), self.datasets(datastore)?)
    }
}

fn find<'a>(datasets: &'a [RegisteredDataset], name: &str) -> Option<&'a Path> {
    datasets
        .iter()
        .find(|d| d.name == name)
        .map(|d| d.root.as_path())
}

// Dots are reserved for the `store.name` shorthand; separators would escape
// the registry directory.
fn check_name(what: &'static str, name: &str) -> Result<(), DatumError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed != name
        || name.contains(['/', '\\', '.'])
    {
        return Err(DatumError::InvalidName {
            what,
            name: name.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.datastores.is_empty() {
            return writeln!(f, "No datastores in {}", self.dir.display());
        }
        for (store, datasets) in &self.datastores {
            writeln!(
                f,
                "Datastore {} ({})",
                store,
                self.catalog_path(store).display()
            )?;
            for dataset in datasets {
                writeln!(f, "  {}.{} -> {}", store, dataset.name, dataset.root.display())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register("/data/voc", "voc", "public").unwrap();
        registry.register("/data/coco", "coco", "public").unwrap();

        let reopened = Registry::open(dir.path()).unwrap();
        assert_eq!(reopened.datastores().collect::<Vec<_>>(), vec!["public"]);
        let names: Vec<_> = reopened
            .datasets("public")
            .unwrap()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["voc", "coco"]);
    }

    #[test]
    fn test_failed_write_leaves_registry_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("blocked.csv")).unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();

        assert!(registry.register("/data/a", "alpha", "blocked").is_err());
        assert!(registry.resolve("alpha", Some("blocked")).is_err());
        assert_eq!(registry.datastores().count(), 0);

        registry.register("/data/a", "alpha", "open").unwrap();
        std::fs::remove_file(dir.path().join("open.csv")).unwrap();
        std::fs::create_dir(dir.path().join("open.csv")).unwrap();
        assert!(registry.register("/data/b", "beta", "open").is_err());
        assert_eq!(registry.datasets("open").unwrap().len(), 1);
        assert!(registry.resolve("open.beta", None).is_err());
    }

    #[test]
    fn test_save_rewrites_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register("/data/a", "alpha", "one").unwrap();
        std::fs::remove_file(registry.catalog_path("one")).unwrap();

        registry.save("one").unwrap();
        let reopened = Registry::open(dir.path()).unwrap();
        assert_eq!(reopened.resolve("one.alpha", None).unwrap(), Path::new("/data/a"));
        assert!(matches!(
            registry.save("two"),
            Err(DatumError::UnknownDatastore(_))
        ));
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register("/data/voc", "voc", "public").unwrap();

        let err = registry.register("/data/other", "voc", "public").unwrap_err();
        assert!(matches!(err, DatumError::DatasetAlreadyRegistered { .. }));
        let err = registry.register("/data/voc", "voc2", "public").unwrap_err();
        assert!(matches!(err, DatumError::DatasetAlreadyRegistered { .. }));

        // Same name in another datastore is fine.
        registry.register("/data/voc", "voc", "private").unwrap();
    }

    #[test]
    fn test_resolve_forms() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register("/data/a", "alpha", "one").unwrap();
        registry.register("/data/b", "beta", "two").unwrap();

        assert_eq!(registry.resolve("alpha", Some("one")).unwrap(), Path::new("/data/a"));
        assert_eq!(registry.resolve("two.beta", None).unwrap(), Path::new("/data/b"));
        assert_eq!(registry.resolve("beta", None).unwrap(), Path::new("/data/b"));

        let err = registry.resolve("beta", Some("one")).unwrap_err();
        assert!(matches!(err, DatumError::UnknownDataset { .. }));
        let err = registry.resolve("three.beta", None).unwrap_err();
        assert!(matches!(err, DatumError::UnknownDatastore(_)));
    }

    #[test]
    fn test_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        for (name, store) in [("", "s"), ("a.b", "s"), ("a", "x/y"), ("a", " s")] {
            let err = registry.register("/data", name, store).unwrap_err();
            assert!(matches!(err, DatumError::InvalidName { .. }), "{name}/{store}");
        }
        assert_eq!(registry.datastores().count(), 0);
    }

    #[test]
    fn test_display_lists_qualified_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register("/data/a", "alpha", "one").unwrap();
        let text = registry.to_string();
        assert!(text.starts_with("Datastore one ("));
        assert!(text.contains("  one.alpha -> /data/a"));
    }

    #[test]
    fn test_non_catalog_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        assert_eq!(registry.datastores().count(), 0);
        assert!(registry.to_string().starts_with("No datastores"));
    }
}
