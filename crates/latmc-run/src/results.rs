use std::collections::BTreeMap;

use serde::Serialize;

use crate::state_sampler::StateSampler;

/// Sampled data in a self-describing layout: named observation matrices as
/// arrays of rows, positionally aligned with `sample_count` and the optional
/// side channels.
///
/// Trajectory snapshots are the driver's configuration type and stay on the
/// [`StateSampler`]; they are not part of this layout.
#[derive(Debug, Clone, Serialize)]
pub struct SampledData {
    /// Count at which each sample was taken.
    pub sample_count: Vec<u64>,
    /// Simulated time of each sample, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_time: Option<Vec<f64>>,
    /// Wall-clock seconds at each sample.
    pub sample_clocktime: Vec<f64>,
    /// Per-sample weights, when the method weights observations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_weight: Option<Vec<f64>>,
    /// Observation rows per sampled quantity.
    pub samplers: BTreeMap<String, Vec<Vec<f64>>>,
}

/// Extracts the sampled data of a state sampler.
pub fn sampled_data<C: Clone>(state_sampler: &StateSampler<C>) -> SampledData {
    let sample_time = state_sampler
        .do_sample_time
        .then(|| state_sampler.sample_time.clone());
    let sample_weight = (state_sampler.sample_weight().n_samples() > 0).then(|| {
        state_sampler
            .sample_weight()
            .component(0)
            .unwrap_or_default()
    });
    let samplers = state_sampler
        .samplers()
        .iter()
        .map(|(name, sampler)| (name.clone(), sampler.to_rows()))
        .collect();
    SampledData {
        sample_count: state_sampler.sample_count.clone(),
        sample_time,
        sample_clocktime: state_sampler.sample_clocktime.clone(),
        sample_weight,
        samplers,
    }
}
