use std::collections::{BTreeMap, HashMap};

use crate::{
	document::{FieldMask, SearchableDocument},
	fuzzy,
};

/// How a query token matched an indexed term.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TermMatch {
	Exact,
	Prefix,
	Fuzzy { distance: usize },
}

/// Term postings plus the projections they were built from.
///
/// Terms live in a `BTreeMap` so prefix lookups are a range scan.
#[derive(Debug, Default)]
pub struct InvertedIndex {
	documents: HashMap<String, SearchableDocument>,
	terms: BTreeMap<String, HashMap<String, FieldMask>>,
}
impl InvertedIndex {
	pub fn len(&self) -> usize {
		self.documents.len()
	}

	pub fn is_empty(&self) -> bool {
		self.documents.is_empty()
	}

	pub fn term_count(&self) -> usize {
		self.terms.len()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.documents.contains_key(id)
	}

	pub fn ids(&self) -> impl Iterator<Item = &String> {
		self.documents.keys()
	}

	pub fn documents(&self) -> impl Iterator<Item = &SearchableDocument> {
		self.documents.values()
	}

	/// Number of documents containing `term` in any field.
	pub fn document_frequency(&self, term: &str) -> usize {
		self.terms.get(term).map(HashMap::len).unwrap_or(0)
	}

	pub fn postings(&self, term: &str) -> Option<&HashMap<String, FieldMask>> {
		self.terms.get(term)
	}

	/// Inserts `doc`, replacing any projection already stored under the same id.
	pub fn insert(&mut self, doc: SearchableDocument) {
		self.remove(&doc.id);

		for (term, mask) in doc.terms() {
			self.terms.entry(term.to_string()).or_default().insert(doc.id.clone(), mask);
		}

		self.documents.insert(doc.id.clone(), doc);
	}

	pub fn remove(&mut self, id: &str) -> Option<SearchableDocument> {
		let doc = self.documents.remove(id)?;

		for (term, _) in doc.terms() {
			let emptied = match self.terms.get_mut(term) {
				Some(postings) => {
					postings.remove(id);

					postings.is_empty()
				},
				None => false,
			};

			if emptied {
				self.terms.remove(term);
			}
		}

		Some(doc)
	}

	pub fn clear(&mut self) {
		self.documents.clear();
		self.terms.clear();
	}

	/// Indexed terms matching `token` exactly, by prefix, or within `max_distance` edits.
	///
	/// A term is reported once, with its strongest kind of match.
	pub fn matching_terms(
		&self,
		token: &str,
		prefix: bool,
		max_distance: usize,
	) -> Vec<(&str, TermMatch)> {
		let mut out: Vec<(&str, TermMatch)> = Vec::new();

		if let Some((term, _)) = self.terms.get_key_value(token) {
			out.push((term.as_str(), TermMatch::Exact));
		}
		if prefix {
			for (term, _) in self.terms.range::<str, _>((
				std::ops::Bound::Excluded(token),
				std::ops::Bound::Unbounded,
			)) {
				if !term.starts_with(token) {
					break;
				}

				out.push((term.as_str(), TermMatch::Prefix));
			}
		}
		if max_distance > 0 {
			for term in self.terms.keys() {
				if out.iter().any(|(matched, _)| *matched == term.as_str()) {
					continue;
				}
				if let Some(distance) = fuzzy::bounded_distance(token, term, max_distance)
					&& distance > 0
				{
					out.push((term.as_str(), TermMatch::Fuzzy { distance }));
				}
			}
		}

		out
	}
}
