//! Full-text index over file metadata records.
//!
//! - [`SearchIndexEngine`] owns the inverted index and the metadata map and persists both.
//! - [`SearchableDocument`] is the tokenized projection used for matching.
//! - [`snapshot`] defines the persisted layout and its consistency checks.

pub mod document;
pub mod engine;
pub mod fuzzy;
pub mod inverted;
pub mod scoring;
pub mod snapshot;

mod error;

pub use document::{Field, FieldMask, SearchableDocument};
pub use engine::{IndexStats, Mutation, RecordFilter, SearchHit, SearchIndexEngine};
pub use error::{Error, Result};
