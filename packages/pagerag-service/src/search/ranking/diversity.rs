//! Maximal marginal relevance selection over candidate embeddings.

#[derive(Clone, Copy)]
struct DiversityPick {
	remaining_pos: usize,
	index: usize,
	mmr_score: f32,
}
impl DiversityPick {
	fn better_than(self, other: &Self) -> bool {
		self.mmr_score > other.mmr_score
			|| (self.mmr_score == other.mmr_score && self.index < other.index)
	}
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

/// Greedily picks up to `k` candidate indices, scoring each remaining candidate as
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, s))` over the already selected `s`.
///
/// Indices come back in selection order. Ties go to the lowest candidate index. A similarity that
/// cannot be computed (empty, zero-norm or mismatched vectors) counts as `0.0`.
pub fn select<V>(query_vec: &[f32], candidates: &[V], k: usize, lambda: f32) -> Vec<usize>
where
	V: AsRef<[f32]>,
{
	if k == 0 || candidates.is_empty() {
		return Vec::new();
	}

	let relevance = candidates
		.iter()
		.map(|candidate| cosine_similarity(query_vec, candidate.as_ref()).unwrap_or(0.0))
		.collect::<Vec<_>>();
	let mut remaining = (0..candidates.len()).collect::<Vec<_>>();
	let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

	while selected.len() < k && !remaining.is_empty() {
		let mut best: Option<DiversityPick> = None;

		for (remaining_pos, &index) in remaining.iter().enumerate() {
			let redundancy = selected
				.iter()
				.map(|&chosen| {
					cosine_similarity(candidates[index].as_ref(), candidates[chosen].as_ref())
						.unwrap_or(0.0)
				})
				.fold(None, |acc: Option<f32>, sim| Some(acc.map_or(sim, |max| max.max(sim))))
				.unwrap_or(0.0);
			let pick = DiversityPick {
				remaining_pos,
				index,
				mmr_score: lambda * relevance[index] - (1.0 - lambda) * redundancy,
			};

			if best.map(|current| pick.better_than(&current)).unwrap_or(true) {
				best = Some(pick);
			}
		}

		let Some(pick) = best else { break };

		remaining.remove(pick.remaining_pos);
		selected.push(pick.index);
	}

	selected
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_inputs_select_nothing() {
		let candidates = vec![vec![1.0, 0.0]];

		assert!(select(&[1.0, 0.0], &candidates, 0, 0.5).is_empty());
		assert!(select::<Vec<f32>>(&[1.0, 0.0], &[], 3, 0.5).is_empty());
	}

	#[test]
	fn large_k_returns_every_index_once() {
		let candidates = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0], vec![0.5, 0.5]];
		let mut picked = select(&[1.0, 0.0], &candidates, 10, 0.5);

		assert_eq!(picked.len(), 4);
		assert_eq!(picked[0], 0);

		picked.sort_unstable();

		assert_eq!(picked, vec![0, 1, 2, 3]);
	}

	#[test]
	fn lambda_one_is_pure_similarity_order() {
		let candidates = vec![vec![0.0, 1.0], vec![0.6, 0.8], vec![1.0, 0.0], vec![0.8, 0.6]];

		assert_eq!(select(&[1.0, 0.0], &candidates, 4, 1.0), vec![2, 3, 1, 0]);
	}

	#[test]
	fn penalizes_near_duplicates() {
		// Two copies of the same page and one orthogonal page.
		let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];

		assert_eq!(select(&[0.8, 0.6], &candidates, 2, 0.5), vec![0, 2]);
	}

	#[test]
	fn ties_break_toward_lowest_index() {
		let candidates = vec![vec![0.0, 1.0], vec![0.0, 2.0], vec![1.0, 0.0]];

		assert_eq!(select(&[1.0, 0.0], &candidates, 1, 0.5), vec![2]);
		assert_eq!(select(&[0.0, 1.0], &candidates, 1, 1.0), vec![0]);
	}

	#[test]
	fn is_deterministic() {
		let candidates = vec![vec![0.3, 0.7], vec![0.7, 0.3], vec![0.5, 0.5], vec![0.1, 0.9]];
		let first = select(&[0.6, 0.4], &candidates, 3, 0.5);

		for _ in 0..5 {
			assert_eq!(select(&[0.6, 0.4], &candidates, 3, 0.5), first);
		}
	}

	#[test]
	fn cosine_rejects_degenerate_vectors() {
		assert_eq!(cosine_similarity(&[], &[]), None);
		assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
		assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
	}
}
