use sift_config::Index;

use crate::{
	document::{Field, FieldMask},
	inverted::TermMatch,
};

const PREFIX_WEIGHT: f64 = 0.5;
const FUZZY_WEIGHT: f64 = 0.4;

/// Inverse document frequency, always positive so rare and common terms both contribute.
pub fn idf(total_docs: usize, doc_freq: usize) -> f64 {
	let n = total_docs as f64;
	let df = doc_freq as f64;

	(1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Weight of a term match relative to an exact hit. Longer completions and larger edit distances
/// count for less.
pub fn match_quality(token: &str, term: &str, kind: TermMatch) -> f64 {
	let token_chars = token.chars().count() as f64;
	let term_chars = term.chars().count().max(1) as f64;

	match kind {
		TermMatch::Exact => 1.0,
		TermMatch::Prefix => PREFIX_WEIGHT * (token_chars / term_chars).min(1.0),
		TermMatch::Fuzzy { distance } => FUZZY_WEIGHT * (1.0 - distance as f64 / (token_chars + 1.0)),
	}
}

pub fn field_weight(cfg: &Index, mask: FieldMask) -> f64 {
	mask.fields()
		.map(|field| match field {
			Field::Name => cfg.name_weight,
			Field::TypeKeywords => cfg.type_weight,
			Field::PathTokens => cfg.path_weight,
		})
		.sum()
}

pub fn recency_boost(age_days: f64, tau_days: f64) -> f64 {
	(-age_days.max(0.0) / tau_days).exp()
}

pub fn frequency_boost(open_count: u64) -> f64 {
	(open_count as f64).ln_1p()
}

/// `relevance × (1 + recency_weight·e^(−age/τ) + frequency_weight·ln(1 + opens))`.
pub fn final_score(cfg: &Index, relevance: f64, age_days: f64, open_count: u64) -> f64 {
	let multiplier = 1.0
		+ cfg.recency_weight * recency_boost(age_days, cfg.recency_tau_days)
		+ cfg.frequency_weight * frequency_boost(open_count);

	relevance * multiplier
}
