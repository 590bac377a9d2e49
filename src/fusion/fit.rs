//! Fitting the embedding reducer
//!
//! Whitened PCA over a set of raw embeddings, producing the same
//! [`ReducerArtifact`] the online path loads.

use super::reducer::ReducerArtifact;
use crate::error::{Result, SoundalikeError};
use nalgebra::DMatrix;
use tracing::debug;

/// Components with less variance than this share of the largest are rank
/// deficiency, not signal
const RELATIVE_VARIANCE_FLOOR: f64 = 1e-10;

/// Fit a whitened PCA keeping `output_dim` components
///
/// Explained variance uses `n - 1` degrees of freedom, so whitened training
/// outputs have unit sample variance per component. Each component's sign is
/// fixed so its largest-magnitude loading is positive.
pub fn fit_pca(embeddings: &[Vec<f32>], output_dim: usize) -> Result<ReducerArtifact> {
    let n = embeddings.len();
    let input_dim = embeddings.first().map_or(0, Vec::len);

    if output_dim == 0 || input_dim == 0 {
        return Err(SoundalikeError::ConfigError(
            "reducer fit needs non-empty embeddings and at least one component".to_string(),
        ));
    }
    if let Some((i, e)) = embeddings.iter().enumerate().find(|(_, e)| e.len() != input_dim) {
        return Err(SoundalikeError::length_mismatch(
            format!("embedding {} in reducer fit", i),
            input_dim,
            e.len(),
        ));
    }
    if n < 2 || output_dim > input_dim.min(n - 1) {
        return Err(SoundalikeError::ConfigError(format!(
            "cannot fit {} components from {} embeddings of dimension {}",
            output_dim, n, input_dim
        )));
    }

    let mut mean = vec![0.0f64; input_dim];
    for e in embeddings {
        for (m, v) in mean.iter_mut().zip(e) {
            *m += f64::from(*v);
        }
    }
    mean.iter_mut().for_each(|m| *m /= n as f64);

    let centered = DMatrix::<f64>::from_fn(n, input_dim, |r, c| {
        f64::from(embeddings[r][c]) - mean[c]
    });
    let svd = centered.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| {
        SoundalikeError::ConfigError("SVD did not produce right singular vectors".to_string())
    })?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let variance = |i: usize| svd.singular_values[i].powi(2) / (n - 1) as f64;
    let largest = order.first().map_or(0.0, |&i| variance(i));

    let mut components = Vec::with_capacity(output_dim);
    let mut explained_variance = Vec::with_capacity(output_dim);
    for &i in order.iter().take(output_dim) {
        let var = variance(i);
        if !(var > largest * RELATIVE_VARIANCE_FLOOR && var > 0.0) {
            return Err(SoundalikeError::ConfigError(format!(
                "embeddings span fewer than {} independent directions",
                output_dim
            )));
        }

        let mut row: Vec<f64> = v_t.row(i).iter().copied().collect();
        let pivot = row
            .iter()
            .copied()
            .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            row.iter_mut().for_each(|v| *v = -*v);
        }

        components.push(row.into_iter().map(|v| v as f32).collect());
        explained_variance.push(var as f32);
    }

    debug!(
        "Fitted PCA {} -> {} over {} embeddings, top variance {:.4}",
        input_dim, output_dim, n, largest
    );

    Ok(ReducerArtifact {
        input_dim,
        output_dim,
        mean: mean.into_iter().map(|m| m as f32).collect(),
        components,
        explained_variance,
        whiten: true,
    })
}
