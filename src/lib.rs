//! Batched MLP inference over HBNN weight files.
//!
//! `mlp-infer` runs the forward pass of a fixed-topology multilayer perceptron:
//! a chain of affine layers with ReLU between hidden layers and log-softmax on
//! the output, producing per-class log-probabilities for classification.
//! Weights are trained elsewhere and loaded from the compact HBNN format.
//!
//! # Design goals
//!
//! - The affine transform dominates the cost. Its inner product runs on a
//!   selectable [`Kernel`] (scalar reference, portable lanes, AVX2, NEON).
//! - Shapes are explicit. Topology is fixed at construction and the weight
//!   file must match it exactly; loading is all-or-nothing.
//! - A loaded model is read-only. Every inference method takes `&self`, and
//!   batches fan out over rayon without locks.
//!
//! # Data layout and shapes
//!
//! - Scalars are `f32`.
//! - Layer weights are row-major with shape `(out_features, in_features)`.
//! - Batched inputs/outputs are flat row-major buffers:
//!   - inputs: `(n, input_dim)` as at least `n * input_dim` scalars
//!   - outputs: `(n, output_dim)` as exactly `n * output_dim` scalars
//!
//! # Errors
//!
//! All fallible operations return [`Result`]. A short input buffer is
//! [`Error::ShapeMismatch`]; a model file that does not fit the topology is
//! [`Error::InvalidFormat`]; open failures and truncated files are
//! [`Error::Io`].
//!
//! # Quick start
//!
//! ```rust
//! use mlp_infer::{Layer, Mlp};
//!
//! # fn main() -> mlp_infer::Result<()> {
//! // Weights normally come from `Mlp::load("model.bin")`.
//! let trained = Mlp::from_layers(vec![
//!     Layer::from_parts(2, 2, vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0])?,
//!     Layer::from_parts(2, 2, vec![1.0, -1.0, -1.0, 1.0], vec![0.0, 0.0])?,
//! ])?;
//! let mut bytes = Vec::new();
//! trained.write_to(&mut bytes)?;
//!
//! let mut mlp = Mlp::new(&[2, 2, 2])?;
//! mlp.load_from_reader(bytes.as_slice())?;
//!
//! let mut log_probs = Vec::new();
//! mlp.forward_batch(2, &[0.9, 0.1, 0.2, 0.8], &mut log_probs)?;
//! assert_eq!(log_probs.len(), 4);
//!
//! let mut classes = Vec::new();
//! mlp.classify_batch(2, &[0.9, 0.1, 0.2, 0.8], &mut classes)?;
//! assert_eq!(classes, vec![0, 1]);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod format;
pub mod kernel;
pub mod layer;
pub mod metrics;
pub mod mlp;
pub mod mnist;

pub use config::{Execution, InferConfig};
pub use error::{Error, Result};
pub use kernel::Kernel;
pub use layer::Layer;
pub use metrics::EvalReport;
pub use mlp::{Mlp, Scratch};
pub use mnist::{Mnist, Split};
