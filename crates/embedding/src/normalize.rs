use crate::EmbeddingError;

/// L2 norm with `f64` accumulation; 1024 squared `f32` terms lose precision otherwise.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| {
            let x = f64::from(x);
            x * x
        })
        .sum::<f64>()
        .sqrt()
}

/// In-place L2 normalization. Zero or non-finite norms are rejected rather than
/// producing NaN/Infinity.
pub fn l2_normalize_in_place(v: &mut [f32]) -> Result<(), EmbeddingError> {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return Err(EmbeddingError::DegenerateVector(format!(
            "cannot normalize vector of length {} with norm {norm}",
            v.len()
        )));
    }
    for x in v.iter_mut() {
        *x = (f64::from(*x) / norm) as f32;
    }
    Ok(())
}

/// Returns a unit-length copy of `v`.
pub fn l2_normalize(v: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
    let mut out = v.to_vec();
    l2_normalize_in_place(&mut out)?;
    Ok(out)
}
