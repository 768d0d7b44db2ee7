//! Record model for datum datasets.
//!
//! A dataset is made of two linked record kinds:
//!
//! - [`Entry`]: one whole sample, such as an image.
//! - [`Observable`]: one annotation attached to exactly one entry, such as a
//!   bounding box or an image-level tag.
//!
//! Each record has a handful of structural fields (`idx`, `obs_ids`,
//! `entry_id`, `type`) that only the store writes, plus an open
//! [`Attributes`] map for everything format-specific.
//!
//! # Example
//!
//! ```
//! use datum::attrs;
//! use datum::store::DatasetStore;
//!
//! let mut store = DatasetStore::new();
//! let image = store.add_entry(attrs! { "filename" => "a.jpg", "width" => 100 }).unwrap();
//! store
//!     .add_observable(image, attrs! { "type" => "object", "name" => "cat" })
//!     .unwrap();
//! assert_eq!(store.len(), 1);
//! ```

mod ids;
mod model;
mod schema;
mod value;

pub use ids::{EntryId, ObservableId};
pub use model::{Entry, Observable, RecordKind, ENTRY_ID, IDX, OBS_IDS, TYPE};
pub use schema::RequiredAttributes;
pub use value::{attributes_from_json, Attributes, Value};
