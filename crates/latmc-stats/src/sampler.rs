use latmc_core::{ErrorInfo, McError};
use serde::{Deserialize, Serialize};

/// Append-only observation matrix for one sampled quantity.
///
/// Rows are individual samples; columns are the components of the sampled
/// quantity. The logical `shape` describes how the components were unrolled:
/// scalar `[]`, vector `[n]`, matrix `[m, n]` (column-major unrolling).
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    shape: Vec<usize>,
    component_names: Vec<String>,
    n_components: usize,
    n_samples: usize,
    values: Vec<f64>,
}

impl Sampler {
    /// Creates an empty sampler with default component names for `shape`.
    pub fn new(shape: Vec<usize>) -> Self {
        let component_names = default_component_names(&shape);
        let n_components = component_names.len();
        Self {
            shape,
            component_names,
            n_components,
            n_samples: 0,
            values: Vec::new(),
        }
    }

    /// Creates an empty sampler with custom component names.
    ///
    /// The number of names must match the number of components implied by
    /// `shape`.
    pub fn with_component_names(
        shape: Vec<usize>,
        component_names: Vec<String>,
    ) -> Result<Self, McError> {
        let n_components: usize = shape.iter().product();
        if component_names.len() != n_components {
            return Err(McError::Sampling(
                ErrorInfo::new("component-names", "component name count does not match shape")
                    .with_context("expected", n_components.to_string())
                    .with_context("found", component_names.len().to_string()),
            ));
        }
        Ok(Self {
            shape,
            component_names,
            n_components,
            n_samples: 0,
            values: Vec::new(),
        })
    }

    /// Appends one observation row.
    pub fn push_back(&mut self, observation: &[f64]) -> Result<(), McError> {
        if observation.len() != self.n_components {
            return Err(McError::Sampling(
                ErrorInfo::new("component-width", "observation width does not match sampler")
                    .with_context("expected", self.n_components.to_string())
                    .with_context("found", observation.len().to_string()),
            ));
        }
        self.values.extend_from_slice(observation);
        self.n_samples += 1;
        Ok(())
    }

    /// Drops all observation rows.
    pub fn clear(&mut self) {
        self.values.clear();
        self.n_samples = 0;
    }

    /// Number of samples taken so far.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of components per observation.
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Logical shape of the sampled quantity.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Component names, in unrolled order.
    pub fn component_names(&self) -> &[String] {
        &self.component_names
    }

    /// Index of a component by name, if present.
    pub fn component_index(&self, component_name: &str) -> Option<usize> {
        self.component_names
            .iter()
            .position(|name| name == component_name)
    }

    /// Extracts the observation series of one component.
    pub fn component(&self, component_index: usize) -> Result<Vec<f64>, McError> {
        if component_index >= self.n_components {
            return Err(McError::Sampling(
                ErrorInfo::new("component-range", "component index out of range")
                    .with_context("component_index", component_index.to_string())
                    .with_context("n_components", self.n_components.to_string()),
            ));
        }
        Ok(self
            .values
            .iter()
            .skip(component_index)
            .step_by(self.n_components.max(1))
            .copied()
            .collect())
    }

    /// One observation row.
    pub fn row(&self, sample_index: usize) -> &[f64] {
        let begin = sample_index * self.n_components;
        &self.values[begin..begin + self.n_components]
    }

    /// Raw row-major storage.
    pub fn data(&self) -> &[f64] {
        &self.values
    }

    /// Copies the matrix out as one `Vec` per row, for serialization.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values
            .chunks(self.n_components.max(1))
            .take(self.n_samples)
            .map(|row| row.to_vec())
            .collect()
    }
}

/// Default component names for a logical shape.
///
/// Scalars get `["0"]`, vectors `["0", "1", ...]`, matrices column-major
/// `["0,0", "1,0", ..., "0,1", ...]`.
pub fn default_component_names(shape: &[usize]) -> Vec<String> {
    match shape {
        [] => vec!["0".to_string()],
        [n] => (0..*n).map(|i| i.to_string()).collect(),
        [m, n] => {
            let mut names = Vec::with_capacity(m * n);
            for col in 0..*n {
                for row in 0..*m {
                    names.push(format!("{row},{col}"));
                }
            }
            names
        }
        _ => {
            let total: usize = shape.iter().product();
            (0..total).map(|i| i.to_string()).collect()
        }
    }
}

/// Unrolls a row-major matrix (one `Vec` per row) into a column-major vector.
///
/// Sampling functions that produce matrices must use this ordering so that
/// component names and stored columns line up.
pub fn unroll_column_major(matrix: &[Vec<f64>]) -> Vec<f64> {
    let rows = matrix.len();
    let cols = matrix.first().map_or(0, |row| row.len());
    let mut out = Vec::with_capacity(rows * cols);
    for col in 0..cols {
        for row in matrix {
            out.push(row[col]);
        }
    }
    out
}

/// Address of one component of one named sampler.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SamplerComponent {
    /// Name of the sampled quantity.
    pub sampler_name: String,
    /// Index of the component within the unrolled observation vector.
    pub component_index: usize,
    /// Name of the component.
    pub component_name: String,
}

impl SamplerComponent {
    /// Creates a component address.
    pub fn new(
        sampler_name: impl Into<String>,
        component_index: usize,
        component_name: impl Into<String>,
    ) -> Self {
        Self {
            sampler_name: sampler_name.into(),
            component_index,
            component_name: component_name.into(),
        }
    }
}

/// Requested half-width of the confidence interval of the mean.
///
/// Absolute and relative requirements may be enabled independently; the
/// relative requirement is scaled by `|mean|` when checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestedPrecision {
    /// Whether the absolute precision requirement is enabled.
    pub abs_convergence_is_required: bool,
    /// Requested absolute precision.
    pub abs_precision: f64,
    /// Whether the relative precision requirement is enabled.
    pub rel_convergence_is_required: bool,
    /// Requested relative precision (scaled by `|mean|`).
    pub rel_precision: f64,
}

impl Default for RequestedPrecision {
    fn default() -> Self {
        Self {
            abs_convergence_is_required: false,
            abs_precision: f64::INFINITY,
            rel_convergence_is_required: false,
            rel_precision: f64::INFINITY,
        }
    }
}

impl RequestedPrecision {
    /// Absolute precision requirement only.
    pub fn abs(value: f64) -> Self {
        Self {
            abs_convergence_is_required: true,
            abs_precision: value,
            ..Self::default()
        }
    }

    /// Relative precision requirement only.
    pub fn rel(value: f64) -> Self {
        Self {
            rel_convergence_is_required: true,
            rel_precision: value,
            ..Self::default()
        }
    }

    /// Absolute and relative precision requirements together.
    pub fn abs_and_rel(abs_value: f64, rel_value: f64) -> Self {
        Self {
            abs_convergence_is_required: true,
            abs_precision: abs_value,
            rel_convergence_is_required: true,
            rel_precision: rel_value,
        }
    }
}
