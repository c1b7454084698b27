//! Execution policy: per-operation choices of algorithms and data structures.

use std::fmt::{Display, Formatter};

/// How nodes of the inputs are accessed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum AccessMode {
    #[default]
    Auto,
    /// Random access to a narrow input. Nodes are only ever streamed, so this runs the
    /// priority-queue strategy.
    RandomAccess,
    PriorityQueue,
}

/// Where auxiliary data structures live.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum MemoryMode {
    /// Internal memory as long as the computed bounds allow it.
    #[default]
    Auto,
    Internal,
    External,
}

/// How multiple variables are quantified.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum QuantifyAlgorithm {
    #[default]
    Auto,
    /// One sweep per variable.
    Singleton,
    /// One sweep for all variables, resolving as much as pairs of nodes allow.
    Partial,
    /// Repeated partial sweeps while they make progress, then singleton sweeps.
    Nested,
}

/// A composable execution policy.
///
/// ```
/// use sweepdd::exec_policy::{ExecPolicy, MemoryMode, QuantifyAlgorithm};
///
/// let ep = ExecPolicy::default()
///     .with_memory_mode(MemoryMode::External)
///     .with_quantify_algorithm(QuantifyAlgorithm::Singleton);
/// assert_eq!(ep.memory_mode(), MemoryMode::External);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ExecPolicy {
    access: AccessMode,
    memory: MemoryMode,
    quantify: QuantifyAlgorithm,
    fast_reduce_epsilon: Option<f32>,
}

impl ExecPolicy {
    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    pub fn memory_mode(&self) -> MemoryMode {
        self.memory
    }

    pub fn quantify_algorithm(&self) -> QuantifyAlgorithm {
        self.quantify
    }

    pub fn fast_reduce_epsilon(&self) -> Option<f32> {
        self.fast_reduce_epsilon
    }

    pub fn with_access_mode(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    pub fn with_memory_mode(mut self, memory: MemoryMode) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_quantify_algorithm(mut self, quantify: QuantifyAlgorithm) -> Self {
        self.quantify = quantify;
        self
    }

    /// Sets the fast-reduce epsilon.
    ///
    /// Under [`QuantifyAlgorithm::Auto`], another partial sweep only runs while the previous
    /// one grew the diagram by at most a factor of `1 + epsilon`. Unset, partial sweeps repeat
    /// as long as they resolve any variable.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not within `[0, 1]`.
    pub fn with_fast_reduce_epsilon(mut self, epsilon: Option<f32>) -> Self {
        if let Some(eps) = epsilon {
            assert!((0.0..=1.0).contains(&eps), "Fast-reduce epsilon {} must be within [0, 1]", eps);
        }
        self.fast_reduce_epsilon = epsilon;
        self
    }
}

impl Display for ExecPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "access={:?}, memory={:?}, quantify={:?}", self.access, self.memory, self.quantify)?;
        if let Some(eps) = self.fast_reduce_epsilon {
            write!(f, ", epsilon={}", eps)?;
        }
        Ok(())
    }
}
