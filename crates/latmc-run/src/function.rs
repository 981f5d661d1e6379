use std::sync::Arc;

use indexmap::IndexMap;
use latmc_core::{ErrorInfo, McError};
use latmc_stats::default_component_names;

/// A named function evaluated when taking a sample of a Monte Carlo state.
///
/// Each function returns a fixed-width observation vector; the extra
/// information (name, description, shape, component names) enables convergence
/// criteria, input validation and reporting. Matrix-valued quantities must be
/// unrolled in column-major order at the call site.
pub struct StateSamplingFunction<C> {
    /// Function name, and the name of the quantity to be sampled.
    pub name: String,
    /// Description of the function.
    pub description: String,
    /// Logical shape of the quantity: scalar `[]`, vector `[n]`, matrix `[m, n]`.
    pub shape: Vec<usize>,
    /// A name for each component of the resulting observation vector.
    pub component_names: Vec<String>,
    /// The function to be evaluated against the current configuration.
    pub function: Arc<dyn Fn(&C) -> Vec<f64>>,
}

impl<C> std::fmt::Debug for StateSamplingFunction<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSamplingFunction")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("shape", &self.shape)
            .field("component_names", &self.component_names)
            .finish()
    }
}

impl<C> Clone for StateSamplingFunction<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            shape: self.shape.clone(),
            component_names: self.component_names.clone(),
            function: Arc::clone(&self.function),
        }
    }
}

impl<C> StateSamplingFunction<C> {
    /// Creates a sampling function with default component names.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        shape: Vec<usize>,
        function: Arc<dyn Fn(&C) -> Vec<f64>>,
    ) -> Self {
        let component_names = default_component_names(&shape);
        Self {
            name: name.into(),
            description: description.into(),
            shape,
            component_names,
            function,
        }
    }

    /// Creates a sampling function with custom component names.
    pub fn with_component_names(
        name: impl Into<String>,
        description: impl Into<String>,
        shape: Vec<usize>,
        component_names: Vec<String>,
        function: Arc<dyn Fn(&C) -> Vec<f64>>,
    ) -> Result<Self, McError> {
        let name = name.into();
        let expected: usize = shape.iter().product();
        if component_names.len() != expected {
            return Err(McError::Config(
                ErrorInfo::new("component-names", "component name count does not match shape")
                    .with_context("function", name)
                    .with_context("expected", expected.to_string())
                    .with_context("found", component_names.len().to_string()),
            ));
        }
        Ok(Self {
            name,
            description: description.into(),
            shape,
            component_names,
            function,
        })
    }

    /// Evaluates the function.
    pub fn eval(&self, state: &C) -> Vec<f64> {
        (self.function)(state)
    }
}

/// Registry of sampling functions by name, in registration order.
pub type StateSamplingFunctionMap<C> = IndexMap<String, StateSamplingFunction<C>>;
