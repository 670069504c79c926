use std::cmp::Ordering;

use ndarray::{Array1, ArrayView1};

use crate::Float;

/// Floor added before returning to log space so that log(0) never happens.
pub const PROB_FLOOR: Float = 1e-20;

/// σ(x) = 1 / (1 + exp(-x)), no overflow guard
pub fn sigmoid(x: &mut Array1<Float>) {
    x.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
}

pub fn tanh(x: &mut Array1<Float>) {
    x.mapv_inplace(Float::tanh);
}

/// Turns scores into a distribution, shifting by the max first.
pub fn softmax(x: &mut Array1<Float>) {
    debug_assert!(!x.is_empty());
    let max_val = x.iter().fold(Float::NAN, |acc, &v| v.max(acc));
    let mut sum = 0.0;
    for v in x.iter_mut() {
        *v = (*v - max_val).exp();
        sum += *v;
    }
    x.mapv_inplace(|v| v / sum);
}

/// log(PROB_FLOOR + p), elementwise
pub fn floored_log(p: &Array1<Float>) -> Array1<Float> {
    p.mapv(|v| (PROB_FLOOR + v).ln())
}

/// Indices of the `k` largest values, largest first. Equal values keep
/// ascending index order.
pub fn top_k(x: ArrayView1<Float>, k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[b].partial_cmp(&x[a]).unwrap_or(Ordering::Equal));
    order.truncate(k);
    order
}

/// Position of the first non-finite value, if any.
pub fn first_non_finite(x: ArrayView1<Float>) -> Option<(usize, Float)> {
    x.iter()
        .copied()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
}
