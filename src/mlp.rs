#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::activation::{argmax, log_softmax_inplace, relu_inplace};
use crate::{Error, InferConfig, Layer, Result};

/// A chain of affine layers with ReLU between hidden layers and log-softmax on
/// the final output.
///
/// Topology is fixed at construction. Weights start zeroed and are populated by
/// [`Mlp::load`]; after that every inference method takes `&self`, so one model
/// can serve any number of concurrent forward passes.
#[derive(Debug, Clone)]
pub struct Mlp {
    in_features: usize,
    out_features: usize,
    layers: Vec<Layer>,
    config: InferConfig,
}

/// Reusable hidden-activation buffers for [`Mlp::forward_batch_into`].
///
/// Buffers grow to the largest batch seen and are reused afterwards.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    current: Vec<f32>,
    next: Vec<f32>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Mlp {
    /// Build a zero-weight network from `[s0, s1, ..., sk]`, producing `k`
    /// layers where layer `i` maps `s[i]` features to `s[i + 1]`.
    pub fn new(sizes: &[usize]) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "sizes must include input and output dims".to_owned(),
            ));
        }
        if sizes.contains(&0) {
            return Err(Error::InvalidConfig(
                "all layer sizes must be > 0".to_owned(),
            ));
        }

        let mut layers = Vec::with_capacity(sizes.len() - 1);
        for w in sizes.windows(2) {
            layers.push(Layer::new(w[0], w[1])?);
        }
        Self::from_layers(layers)
    }

    /// Assemble a network from pre-built layers.
    ///
    /// Fails if `layers` is empty or adjacent layers do not chain.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        let (Some(first), Some(last)) = (layers.first(), layers.last()) else {
            return Err(Error::InvalidConfig(
                "mlp must have at least one layer".to_owned(),
            ));
        };
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].out_features() != pair[1].in_features() {
                return Err(Error::InvalidConfig(format!(
                    "layer {} in_features {} does not match layer {i} out_features {}",
                    i + 1,
                    pair[1].in_features(),
                    pair[0].out_features()
                )));
            }
        }

        Ok(Self {
            in_features: first.in_features(),
            out_features: last.out_features(),
            layers,
            config: InferConfig::default(),
        })
    }

    /// Replace the inference configuration.
    pub fn with_config(mut self, config: InferConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    #[inline]
    pub fn config(&self) -> &InferConfig {
        &self.config
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.in_features
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.out_features
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable access for bulk parameter replacement (see [`Layer::set_parameters`]).
    #[inline]
    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new()
    }

    /// Forward pass for a single sample. Equivalent to `forward_batch(1, ..)`.
    pub fn forward(&self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        self.forward_batch(1, input, output)
    }

    /// Forward pass for `n` samples stored row-major in `input`.
    ///
    /// `output` is resized to `n * output_dim()` and holds per-class
    /// log-probabilities, one row per sample.
    pub fn forward_batch(&self, n: usize, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        let mut scratch = Scratch::new();
        self.forward_batch_into(n, input, &mut scratch, output)
    }

    /// Like [`Mlp::forward_batch`], reusing `scratch` for hidden activations.
    pub fn forward_batch_into(
        &self,
        n: usize,
        input: &[f32],
        scratch: &mut Scratch,
        output: &mut Vec<f32>,
    ) -> Result<()> {
        let (last, hidden) = self
            .layers
            .split_last()
            .expect("mlp must have at least one layer");

        for (idx, layer) in hidden.iter().enumerate() {
            let src: &[f32] = if idx == 0 { input } else { &scratch.current };
            layer.forward_batch_with(n, src, &mut scratch.next, &self.config)?;
            relu_inplace(&mut scratch.next);
            std::mem::swap(&mut scratch.current, &mut scratch.next);
        }

        let src: &[f32] = if hidden.is_empty() {
            input
        } else {
            &scratch.current
        };
        last.forward_batch_with(n, src, output, &self.config)?;
        self.log_softmax_rows(output);
        Ok(())
    }

    /// Predicted class for one sample.
    pub fn classify(&self, feature: &[f32]) -> Result<usize> {
        let mut output = Vec::with_capacity(self.out_features);
        self.forward(feature, &mut output)?;
        Ok(argmax(&output))
    }

    /// Predicted classes for `n` samples. `classes` is resized to `n`.
    pub fn classify_batch(
        &self,
        n: usize,
        features: &[f32],
        classes: &mut Vec<usize>,
    ) -> Result<()> {
        let mut output = Vec::new();
        self.forward_batch(n, features, &mut output)?;
        self.argmax_rows(&output, classes);
        Ok(())
    }

    fn log_softmax_rows(&self, output: &mut [f32]) {
        #[cfg(feature = "parallel")]
        if self.config.execution.is_parallel() {
            output
                .par_chunks_exact_mut(self.out_features)
                .for_each(log_softmax_inplace);
            return;
        }

        output
            .chunks_exact_mut(self.out_features)
            .for_each(log_softmax_inplace);
    }

    fn argmax_rows(&self, output: &[f32], classes: &mut Vec<usize>) {
        classes.clear();
        classes.resize(output.len() / self.out_features, 0);

        #[cfg(feature = "parallel")]
        if self.config.execution.is_parallel() {
            classes
                .par_iter_mut()
                .zip(output.par_chunks_exact(self.out_features))
                .for_each(|(class, row)| *class = argmax(row));
            return;
        }

        for (class, row) in classes
            .iter_mut()
            .zip(output.chunks_exact(self.out_features))
        {
            *class = argmax(row);
        }
    }
}
