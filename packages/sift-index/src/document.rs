use serde::{Deserialize, Serialize};

use sift_domain::{MetadataRecord, category, text};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
	Name,
	TypeKeywords,
	PathTokens,
}
impl Field {
	pub const ALL: [Field; 3] = [Field::Name, Field::TypeKeywords, Field::PathTokens];

	fn bit(self) -> u8 {
		match self {
			Self::Name => 0b001,
			Self::TypeKeywords => 0b010,
			Self::PathTokens => 0b100,
		}
	}
}

/// Set of fields a term occurs in for one document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMask(u8);
impl FieldMask {
	pub fn insert(&mut self, field: Field) {
		self.0 |= field.bit();
	}

	pub fn contains(self, field: Field) -> bool {
		self.0 & field.bit() != 0
	}

	pub fn is_empty(self) -> bool {
		self.0 == 0
	}

	pub fn fields(self) -> impl Iterator<Item = Field> {
		Field::ALL.into_iter().filter(move |field| self.contains(*field))
	}
}

/// Tokenized projection of a [`MetadataRecord`], used only for matching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchableDocument {
	pub id: String,
	pub name_tokens: Vec<String>,
	pub path_tokens: Vec<String>,
	pub type_keywords: Vec<String>,
}
impl SearchableDocument {
	pub fn project(record: &MetadataRecord) -> Self {
		Self {
			id: record.id.clone(),
			name_tokens: text::tokenize(&record.name),
			path_tokens: record.path.as_deref().map(text::path_tokens).unwrap_or_default(),
			type_keywords: category::type_keywords(&record.category),
		}
	}

	/// Every distinct term in the document with the fields it occurs in.
	pub fn terms(&self) -> Vec<(&str, FieldMask)> {
		let mut out: Vec<(&str, FieldMask)> = Vec::new();

		for (field, tokens) in [
			(Field::Name, &self.name_tokens),
			(Field::TypeKeywords, &self.type_keywords),
			(Field::PathTokens, &self.path_tokens),
		] {
			for token in tokens {
				match out.iter_mut().find(|(term, _)| *term == token.as_str()) {
					Some((_, mask)) => mask.insert(field),
					None => {
						let mut mask = FieldMask::default();

						mask.insert(field);
						out.push((token.as_str(), mask));
					},
				}
			}
		}

		out
	}
}
