//! Distance metrics over fused feature vectors

/// Squared Euclidean distance. Slices must have equal length.
///
/// Accumulates in f64 so large finite components stay finite.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

/// Euclidean distance. Slices must have equal length.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    squared_euclidean(a, b).sqrt()
}
