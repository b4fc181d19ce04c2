//! Activation and reduction kernels.
//!
//! A hidden layer computes a pre-activation value `z = W x + b` and then applies
//! ReLU element-wise. The final layer's raw outputs (logits) are turned into
//! per-class log-probabilities row by row with [`log_softmax_inplace`], and
//! classification reduces each row with [`argmax`].
//!
//! Every function here is stateless and works on plain slices, so callers can
//! apply them to one row of a batch buffer at a time.

/// Element-wise `max(x, 0)`, in place.
#[inline]
pub fn relu_inplace(xs: &mut [f32]) {
    for x in xs {
        *x = x.max(0.0);
    }
}

/// Element-wise `max(x, 0)` into a new buffer.
pub fn relu(xs: &[f32]) -> Vec<f32> {
    xs.iter().map(|x| x.max(0.0)).collect()
}

/// `exp(row[i]) / sum_j exp(row[j])`, in place.
///
/// Not stabilized: large inputs overflow `exp`. Inference uses
/// [`log_softmax_inplace`]; this is for inspecting probabilities.
pub fn softmax_inplace(row: &mut [f32]) {
    let mut sum = 0.0_f32;
    for x in row.iter_mut() {
        *x = x.exp();
        sum += *x;
    }
    let inv = 1.0 / sum;
    for x in row.iter_mut() {
        *x *= inv;
    }
}

/// Numerically stable log-softmax, in place.
///
/// Computes `row[i] - m - ln(sum_j exp(row[j] - m))` with `m = max(row)`, so no
/// exponent ever sees a positive argument.
pub fn log_softmax_inplace(row: &mut [f32]) {
    if row.is_empty() {
        return;
    }

    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0_f32;
    for &x in row.iter() {
        sum += (x - max).exp();
    }
    let log_sum = sum.ln();
    for x in row.iter_mut() {
        *x = *x - max - log_sum;
    }
}

/// Index of the largest value. Ties go to the lowest index.
///
/// An empty row yields `0`.
#[inline]
pub fn argmax(row: &[f32]) -> usize {
    let Some((&first, rest)) = row.split_first() else {
        return 0;
    };

    let mut best_idx = 0;
    let mut best = first;
    for (i, &v) in rest.iter().enumerate() {
        if v > best {
            best = v;
            best_idx = i + 1;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_clamps_negatives_only() {
        let mut xs = [-2.0_f32, -0.0, 0.0, 0.5, 3.0];
        relu_inplace(&mut xs);
        assert_eq!(xs, [0.0, 0.0, 0.0, 0.5, 3.0]);
        assert_eq!(relu(&[-1.0, 1.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut row = [0.1_f32, -1.3, 2.0, 0.0];
        softmax_inplace(&mut row);
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(row.iter().all(|&p| p > 0.0 && p <= 1.0));
    }

    #[test]
    fn log_softmax_known_values() {
        let mut row = [1.0_f32, 2.0, 3.0];
        log_softmax_inplace(&mut row);
        let expected = [-2.4076_f32, -1.4076, -0.4076];
        for (got, want) in row.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "got {got}, want {want}");
        }
    }

    #[test]
    fn log_softmax_survives_large_logits() {
        let mut row = [1000.0_f32, 1001.0, 999.0];
        log_softmax_inplace(&mut row);
        assert!(row.iter().all(|x| x.is_finite()));
        let total: f32 = row.iter().map(|x| x.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(argmax(&row), 1);
    }

    #[test]
    fn log_softmax_matches_softmax() {
        let logits = [0.3_f32, -2.0, 1.7, 0.0, 0.9];
        let mut probs = logits;
        softmax_inplace(&mut probs);
        let mut log_probs = logits;
        log_softmax_inplace(&mut log_probs);
        for (p, lp) in probs.iter().zip(log_probs) {
            assert!((p - lp.exp()).abs() < 1e-6);
        }
    }

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[3.0, 5.0, 5.0, 2.0]), 1);
        assert_eq!(argmax(&[7.0, 7.0, 7.0]), 0);
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }
}
