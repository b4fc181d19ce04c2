//! Metrics.
//!
//! Evaluation helpers over predicted classes. They never touch the model.

use serde::Serialize;

use crate::{Error, Result};

/// Classification accuracy over one evaluation set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalReport {
    pub samples: usize,
    pub correct: usize,
    pub accuracy: f32,
}

/// Compare predicted classes against ground-truth labels.
///
/// Fails if the lengths differ or a label is outside `[0, num_classes)`.
pub fn evaluate(predicted: &[usize], labels: &[u8], num_classes: usize) -> Result<EvalReport> {
    if predicted.len() != labels.len() {
        return Err(Error::InvalidData(format!(
            "{} predictions but {} labels",
            predicted.len(),
            labels.len()
        )));
    }
    if let Some((idx, &label)) = labels
        .iter()
        .enumerate()
        .find(|(_, l)| usize::from(**l) >= num_classes)
    {
        return Err(Error::InvalidData(format!(
            "label {label} at index {idx} is outside [0, {num_classes})"
        )));
    }

    let correct = predicted
        .iter()
        .zip(labels)
        .filter(|(p, l)| **p == usize::from(**l))
        .count();
    let samples = labels.len();
    let accuracy = if samples == 0 {
        0.0
    } else {
        correct as f32 / samples as f32
    };

    Ok(EvalReport {
        samples,
        correct,
        accuracy,
    })
}
