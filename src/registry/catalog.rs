//! Datastore catalog CSV reader and writer.
//!
//! A catalog is a two-column CSV file:
//!
//! ```text
//! dataset_name,dataset_root_dir
//! trainval,/data/voc/trainval
//! ```
//!
//! The header row is always written, so an empty datastore still produces
//! a readable file.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DatumError;

/// Column names of a catalog file, in order.
pub const CATALOG_HEADER: [&str; 2] = ["dataset_name", "dataset_root_dir"];

/// One catalog row: where a formatted dataset lives on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredDataset {
    #[serde(rename = "dataset_name")]
    pub name: String,
    #[serde(rename = "dataset_root_dir")]
    pub root: PathBuf,
}

/// Reads a catalog file.
///
/// # Errors
/// Returns an error if the file cannot be read or a row does not have
/// exactly two columns.
pub fn read_catalog(path: &Path) -> Result<Vec<RegisteredDataset>, DatumError> {
    let file = File::open(path).map_err(DatumError::Io)?;
    read_catalog_from(BufReader::new(file), path)
}

/// Writes a catalog file, replacing any previous content.
pub fn write_catalog(path: &Path, datasets: &[RegisteredDataset]) -> Result<(), DatumError> {
    let file = File::create(path).map_err(DatumError::Io)?;
    let writer = write_catalog_to(BufWriter::new(file), datasets, path)?;
    writer
        .into_inner()
        .map_err(|e| DatumError::Io(e.into_error()))?
        .flush()
        .map_err(DatumError::Io)
}

/// Parses catalog bytes.
///
/// Useful for fuzzing and testing without file I/O.
pub fn from_catalog_slice(bytes: &[u8]) -> Result<Vec<RegisteredDataset>, DatumError> {
    read_catalog_from(bytes, Path::new("<bytes>"))
}

/// Renders a catalog to a string.
pub fn to_catalog_string(datasets: &[RegisteredDataset]) -> Result<String, DatumError> {
    let dummy_path = Path::new("<string>");
    let writer = write_catalog_to(Vec::new(), datasets, dummy_path)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| DatumError::Io(e.into_error()))?;

    String::from_utf8(bytes).map_err(|e| DatumError::MalformedCatalog {
        path: dummy_path.to_path_buf(),
        message: format!("Invalid UTF-8 in output: {}", e),
    })
}

fn read_catalog_from<R: Read>(
    reader: R,
    path: &Path,
) -> Result<Vec<RegisteredDataset>, DatumError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| DatumError::CatalogParse {
            path: path.to_path_buf(),
            source,
        })?;
    if headers.iter().ne(CATALOG_HEADER) {
        return Err(DatumError::MalformedCatalog {
            path: path.to_path_buf(),
            message: format!(
                "expected header {:?}, found {:?}",
                CATALOG_HEADER,
                headers.iter().collect::<Vec<_>>()
            ),
        });
    }

    let mut rows = Vec::new();
    for result in csv_reader.deserialize() {
        let row: RegisteredDataset = result.map_err(|source| DatumError::CatalogParse {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_catalog_to<W: Write>(
    writer: W,
    datasets: &[RegisteredDataset],
    path: &Path,
) -> Result<csv::Writer<W>, DatumError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer
        .write_record(CATALOG_HEADER)
        .map_err(|source| DatumError::CatalogWrite {
            path: path.to_path_buf(),
            source,
        })?;
    for row in datasets {
        csv_writer
            .serialize(row)
            .map_err(|source| DatumError::CatalogWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }
    Ok(csv_writer)
}
