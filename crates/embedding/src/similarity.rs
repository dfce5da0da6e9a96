use crate::EmbeddingError;

/// Cosine similarity computed entirely in `f64`.
///
/// Vectors must have equal length; comparing a truncated prefix would hide
/// dimension bugs. A zero vector has no direction and is rejected.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Err(EmbeddingError::DegenerateVector(
            "cosine similarity of a zero or non-finite vector".into(),
        ));
    }
    Ok(dot / denom)
}
