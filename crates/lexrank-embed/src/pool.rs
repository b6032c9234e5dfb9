/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 1e-12 {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Check that every vector has dimensionality `dim`.
pub fn check_dims(vectors: &[Vec<f32>], dim: usize) -> anyhow::Result<()> {
    match vectors.iter().position(|v| v.len() != dim) {
        Some(i) => Err(anyhow::anyhow!(
            "embedding {} has {} dimensions, expected {}",
            i,
            vectors[i].len(),
            dim
        )),
        None => Ok(()),
    }
}
