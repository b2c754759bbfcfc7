//! Maximal marginal relevance re-ranking.
//!
//! Picks `k` candidates one at a time, each maximizing
//! `λ·sim(query, d) − (1−λ)·max sim(d, already selected)`.
//! With λ = 1.0 this is plain relevance order, with λ = 0.0 pure diversity.


/// Cosine similarity of two vectors, 0.0 when either has no magnitude
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator <= f32::EPSILON {
        0.0
    } else {
        dot / denominator
    }
}

/// Indices of the selected `candidates`, in selection order
#[inline]
pub fn mmr_select(query: &[f32], candidates: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }

    let lambda = lambda.clamp(0.0, 1.0);
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    // Highest similarity of each candidate to anything selected so far
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (position, &index) in remaining.iter().enumerate() {
            let penalty = if selected.is_empty() {
                0.0
            } else {
                redundancy[index]
            };
            let score = lambda.mul_add(relevance[index], -(1.0 - lambda) * penalty);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((position, score));
            }
        }

        let Some((position, _)) = best else {
            break;
        };
        let chosen = remaining.remove(position);
        selected.push(chosen);

        for &index in &remaining {
            let similarity = cosine_similarity(&candidates[index], &candidates[chosen]);
            redundancy[index] = redundancy[index].max(similarity);
        }
    }

    selected
}
