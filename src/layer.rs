#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{Error, InferConfig, Kernel, Result};

/// One affine transform `y = W x + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    in_features: usize,
    out_features: usize,
    /// Row-major matrix with shape (out_features, in_features).
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Layer {
    /// Zero-initialized layer. Weights are expected to be loaded afterwards.
    pub fn new(in_features: usize, out_features: usize) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_features={in_features} out_features={out_features}"
            )));
        }
        let len = weight_len(in_features, out_features)?;
        Ok(Self {
            in_features,
            out_features,
            weights: vec![0.0; len],
            bias: vec![0.0; out_features],
        })
    }

    /// Build a layer from explicit parameters.
    ///
    /// `weights` is row-major with shape `(out_features, in_features)`.
    pub fn from_parts(
        in_features: usize,
        out_features: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self> {
        let mut layer = Self::new(in_features, out_features)?;
        layer.set_parameters(weights, bias)?;
        Ok(layer)
    }

    #[inline]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    #[inline]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// `(rows, cols)` of the weight matrix, i.e. `(out_features, in_features)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.out_features, self.in_features)
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[inline]
    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Replace weights and bias in bulk.
    ///
    /// Fails without modifying the layer if either length is wrong.
    pub fn set_parameters(&mut self, weights: Vec<f32>, bias: Vec<f32>) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(Error::InvalidData(format!(
                "weights length {} does not match out_features * in_features ({} * {})",
                weights.len(),
                self.out_features,
                self.in_features
            )));
        }
        if bias.len() != self.out_features {
            return Err(Error::InvalidData(format!(
                "bias length {} does not match out_features {}",
                bias.len(),
                self.out_features
            )));
        }
        self.weights = weights;
        self.bias = bias;
        Ok(())
    }

    /// Forward pass for a single sample.
    ///
    /// Equivalent to `forward_batch(1, input, output)`.
    pub fn forward(&self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        self.forward_batch(1, input, output)
    }

    /// Forward pass for `n` samples using the default [`InferConfig`].
    pub fn forward_batch(&self, n: usize, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        self.forward_batch_with(n, input, output, &InferConfig::default())
    }

    /// Forward pass for `n` samples.
    ///
    /// Computes `output[k, i] = bias[i] + sum_j input[k, j] * weights[i, j]`.
    ///
    /// Shape contract:
    /// - `input` holds at least `n * in_features` scalars (row-major); any
    ///   extra trailing values are ignored.
    /// - `output` is resized to exactly `n * out_features`.
    ///
    /// Returns [`Error::ShapeMismatch`] without touching `output` if `input`
    /// is too short.
    pub fn forward_batch_with(
        &self,
        n: usize,
        input: &[f32],
        output: &mut Vec<f32>,
        config: &InferConfig,
    ) -> Result<()> {
        let needed = n.checked_mul(self.in_features).ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "batch of {n} rows x {} features overflows usize",
                self.in_features
            ))
        })?;
        if input.len() < needed {
            return Err(Error::ShapeMismatch(format!(
                "input len {} is smaller than n * in_features ({n} * {})",
                input.len(),
                self.in_features
            )));
        }

        output.clear();
        output.resize(n * self.out_features, 0.0);
        let input = &input[..needed];

        if config.execution.is_parallel() {
            self.fill_parallel(n, input, output, config.kernel);
        } else {
            self.fill_serial(input, output, config.kernel);
        }
        Ok(())
    }

    fn fill_serial(&self, input: &[f32], output: &mut [f32], kernel: Kernel) {
        for (x, out_row) in input
            .chunks_exact(self.in_features)
            .zip(output.chunks_exact_mut(self.out_features))
        {
            self.fill_row(x, out_row, kernel);
        }
    }

    #[cfg(feature = "parallel")]
    fn fill_parallel(&self, n: usize, input: &[f32], output: &mut [f32], kernel: Kernel) {
        if n == 1 {
            // A lone sample still has out_features independent cells.
            output
                .par_iter_mut()
                .zip(self.weights.par_chunks_exact(self.in_features))
                .zip(self.bias.par_iter())
                .for_each(|((o, w), b)| *o = kernel.dot(input, w) + b);
            return;
        }

        output
            .par_chunks_exact_mut(self.out_features)
            .zip(input.par_chunks_exact(self.in_features))
            .for_each(|(out_row, x)| self.fill_row(x, out_row, kernel));
    }

    #[cfg(not(feature = "parallel"))]
    fn fill_parallel(&self, _n: usize, input: &[f32], output: &mut [f32], kernel: Kernel) {
        self.fill_serial(input, output, kernel);
    }

    #[inline]
    fn fill_row(&self, x: &[f32], out_row: &mut [f32], kernel: Kernel) {
        for ((o, w), b) in out_row
            .iter_mut()
            .zip(self.weights.chunks_exact(self.in_features))
            .zip(&self.bias)
        {
            *o = kernel.dot(x, w) + b;
        }
    }
}

fn weight_len(in_features: usize, out_features: usize) -> Result<usize> {
    in_features.checked_mul(out_features).ok_or_else(|| {
        Error::InvalidConfig(format!(
            "layer weight shape ({out_features}, {in_features}) overflows usize"
        ))
    })
}
