//! Loss and accuracy for binary targets encoded as `0.0` / `1.0`.

use ndarray::ArrayView1;

/// Predictions are clipped to `[BCE_EPSILON, 1 - BCE_EPSILON]` before taking logs.
pub const BCE_EPSILON: f64 = 1e-15;

/// Mean binary cross-entropy. Returns 0.0 for an empty batch.
pub fn binary_cross_entropy(predictions: ArrayView1<f64>, targets: ArrayView1<f64>) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }

    let total: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(&p, &t)| {
            let p = p.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();

    total / predictions.len() as f64
}

/// Fraction of samples where `p > 0.5` agrees with the target.
pub fn binary_accuracy(predictions: ArrayView1<f64>, targets: ArrayView1<f64>) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }

    let correct = predictions
        .iter()
        .zip(targets.iter())
        .filter(|(&p, &t)| (p > 0.5) == (t > 0.5))
        .count();

    correct as f64 / predictions.len() as f64
}
