/// Levenshtein distance between `a` and `b` if it is at most `max`, else `None`.
///
/// Rows are abandoned as soon as every cell exceeds `max`, so mismatched terms cost little.
pub fn bounded_distance(a: &str, b: &str, max: usize) -> Option<usize> {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();

	if a.len().abs_diff(b.len()) > max {
		return None;
	}
	if a.is_empty() || b.is_empty() {
		let distance = a.len().max(b.len());

		return (distance <= max).then_some(distance);
	}

	let mut prev: Vec<usize> = (0..=b.len()).collect();
	let mut curr = vec![0_usize; b.len() + 1];

	for (i, ca) in a.iter().enumerate() {
		curr[0] = i + 1;

		let mut row_min = curr[0];

		for (j, cb) in b.iter().enumerate() {
			let substitution = prev[j] + usize::from(ca != cb);

			curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
			row_min = row_min.min(curr[j + 1]);
		}

		if row_min > max {
			return None;
		}

		std::mem::swap(&mut prev, &mut curr);
	}

	let distance = prev[b.len()];

	(distance <= max).then_some(distance)
}

/// Edit distance tolerated for a query token: `round(ratio × chars)`, capped at `cap`.
pub fn max_distance_for(token: &str, ratio: f64, cap: usize) -> usize {
	let allowed = (token.chars().count() as f64 * ratio).round() as usize;

	allowed.min(cap)
}
