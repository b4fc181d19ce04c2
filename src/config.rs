//! Inference configuration.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Kernel, Result};

/// How the per-cell work of a forward pass is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    Serial,
    /// Data-parallel over samples (and over output units for single samples).
    ///
    /// Requires the `parallel` feature; without it this runs serially.
    #[default]
    Parallel,
}

impl Execution {
    pub fn name(self) -> &'static str {
        match self {
            Execution::Serial => "serial",
            Execution::Parallel => "parallel",
        }
    }

    #[inline]
    pub(crate) fn is_parallel(self) -> bool {
        cfg!(feature = "parallel") && self == Execution::Parallel
    }
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Execution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(Execution::Serial),
            "parallel" => Ok(Execution::Parallel),
            other => Err(Error::InvalidConfig(format!(
                "unknown execution mode {other:?}; expected serial or parallel"
            ))),
        }
    }
}

/// Kernel and scheduling choices for forward passes.
///
/// Results do not depend on `execution`: every output cell is evaluated the
/// same way regardless of which thread computes it. Switching `kernel` may
/// change results within float32 rounding tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferConfig {
    pub kernel: Kernel,
    pub execution: Execution,
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::detect(),
            execution: Execution::default(),
        }
    }
}

impl InferConfig {
    /// Single-threaded scalar evaluation. Useful as a correctness reference.
    pub fn reference() -> Self {
        Self {
            kernel: Kernel::Scalar,
            execution: Execution::Serial,
        }
    }

    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Reject kernels the running CPU cannot execute natively.
    pub fn validate(&self) -> Result<()> {
        if !self.kernel.is_available() {
            return Err(Error::InvalidConfig(format!(
                "kernel {} is not supported on this CPU (available: {})",
                self.kernel,
                Kernel::available()
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(())
    }
}
