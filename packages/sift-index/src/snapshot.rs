//! On-store layout of the index. Projections and metadata live under separate keys and are
//! written one after the other, so each carries the generation it was written for and a reader
//! only accepts a pair whose generations and id sets agree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, document::SearchableDocument};
use sift_domain::MetadataRecord;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
pub(crate) struct IndexSnapshotRef<'a> {
	pub(crate) version: u32,
	pub(crate) generation: u64,
	pub(crate) complete: bool,
	pub(crate) documents: Vec<&'a SearchableDocument>,
}

#[derive(Serialize)]
pub(crate) struct MetadataSnapshotRef<'a> {
	pub(crate) version: u32,
	pub(crate) generation: u64,
	pub(crate) records: Vec<&'a MetadataRecord>,
}

#[derive(Debug, Deserialize)]
pub struct IndexSnapshot {
	pub version: u32,
	pub generation: u64,
	/// False while a full rebuild is still adding batches.
	pub complete: bool,
	pub documents: Vec<SearchableDocument>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataSnapshot {
	pub version: u32,
	pub generation: u64,
	pub records: Vec<MetadataRecord>,
}

/// Parses and cross-checks a persisted pair.
pub fn decode(index_raw: &str, metadata_raw: &str) -> Result<(IndexSnapshot, MetadataSnapshot)> {
	let index: IndexSnapshot = serde_json::from_str(index_raw)
		.map_err(|err| Error::CorruptSnapshot { label: "index", message: err.to_string() })?;
	let metadata: MetadataSnapshot = serde_json::from_str(metadata_raw)
		.map_err(|err| Error::CorruptSnapshot { label: "metadata", message: err.to_string() })?;

	for (label, version) in [("index", index.version), ("metadata", metadata.version)] {
		if version != SNAPSHOT_VERSION {
			return Err(Error::CorruptSnapshot {
				label,
				message: format!("unsupported version {version}"),
			});
		}
	}

	if index.generation != metadata.generation {
		return Err(Error::CorruptSnapshot {
			label: "index",
			message: format!(
				"generation {} does not match metadata generation {}",
				index.generation, metadata.generation
			),
		});
	}
	if !index.complete {
		return Err(Error::CorruptSnapshot {
			label: "index",
			message: "snapshot was written by an unfinished rebuild".to_string(),
		});
	}

	let doc_ids = unique_ids(index.documents.iter().map(|doc| doc.id.as_str()), "index")?;
	let record_ids = unique_ids(metadata.records.iter().map(|record| record.id.as_str()), "metadata")?;

	if doc_ids != record_ids {
		return Err(Error::CorruptSnapshot {
			label: "index",
			message: "indexed ids do not match metadata ids".to_string(),
		});
	}

	Ok((index, metadata))
}

fn unique_ids<'a>(
	ids: impl Iterator<Item = &'a str>,
	label: &'static str,
) -> Result<HashSet<&'a str>> {
	let mut out = HashSet::new();

	for id in ids {
		if !out.insert(id) {
			return Err(Error::CorruptSnapshot { label, message: format!("duplicate id {id:?}") });
		}
	}

	Ok(out)
}
