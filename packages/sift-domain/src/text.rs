use std::collections::HashSet;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Folds `text` to lowercase, diacritic-free words split on every non-alphanumeric character.
///
/// Tokens keep first-seen order and are deduplicated, so `"Budget.xlsx"` yields
/// `["budget", "xlsx"]`. Single characters are kept so a one-letter query can prefix-match.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.nfkd() {
		if is_combining_mark(ch) {
			continue;
		}

		if ch.is_alphanumeric() {
			normalized.extend(ch.to_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in normalized.split_whitespace() {
		if seen.insert(token) {
			out.push(token.to_string());
		}
	}

	out
}

/// Tokens of every folder segment in a slash-separated path.
pub fn path_tokens(path: &str) -> Vec<String> {
	let mut out = Vec::new();

	for segment in path.split('/') {
		for token in tokenize(segment) {
			if !out.contains(&token) {
				out.push(token);
			}
		}
	}

	out
}
