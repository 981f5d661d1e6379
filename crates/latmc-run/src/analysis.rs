use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use latmc_core::McError;
use latmc_stats::default_component_names;

use crate::results::SampledData;

/// A named function of the sampled data, evaluated at the end of a run
/// (ex. covariances, transport coefficients).
pub struct ResultsAnalysisFunction {
    /// Function name.
    pub name: String,
    /// Description of the function.
    pub description: String,
    /// Logical shape of the result, with column-major unrolling.
    pub shape: Vec<usize>,
    /// A name for each component of the result.
    pub component_names: Vec<String>,
    /// The function to be evaluated.
    pub function: Arc<dyn Fn(&SampledData) -> Result<Vec<f64>, McError>>,
}

impl Clone for ResultsAnalysisFunction {
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

impl ResultsAnalysisFunction {
    /// Creates an analysis function with default component names.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        shape: Vec<usize>,
        function: Arc<dyn Fn(&SampledData) -> Result<Vec<f64>, McError>>,
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
}

/// Registry of analysis functions by name, in registration order.
pub type ResultsAnalysisFunctionMap = IndexMap<String, ResultsAnalysisFunction>;

/// Evaluates all analysis functions.
///
/// A failing analysis (error or wrong output width) yields a NaN vector of
/// the declared width; the other analyses proceed and the run still
/// completes.
pub fn make_analysis(
    data: &SampledData,
    analysis_functions: &ResultsAnalysisFunctionMap,
) -> BTreeMap<String, Vec<f64>> {
    let mut analysis = BTreeMap::new();
    for (name, function) in analysis_functions {
        let width = function.component_names.len();
        let value = match (function.function)(data) {
            Ok(value) if value.len() == width => value,
            _ => vec![f64::NAN; width],
        };
        analysis.insert(name.clone(), value);
    }
    analysis
}
