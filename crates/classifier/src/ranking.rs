use genre_domain::{DomainError, Genre, GenreScore};

pub const TOP_K: usize = 3;

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// The `k` most probable genres, best first. Equal probabilities keep
/// enumeration order, so the lower genre index ranks higher.
pub fn rank_top_k(logits: &[f32], k: usize) -> Result<Vec<GenreScore>, DomainError> {
    if logits.len() != Genre::ALL.len() {
        return Err(DomainError::validation(format!(
            "expected {} logits, got {}",
            Genre::ALL.len(),
            logits.len()
        )));
    }
    let probabilities = softmax(logits);
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

    order
        .into_iter()
        .take(k)
        .map(|index| GenreScore::new(Genre::ALL[index], probabilities[index]))
        .collect()
}
