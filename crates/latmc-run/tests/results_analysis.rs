use std::sync::Arc;

use latmc_core::{ErrorInfo, McError, RngHandle};
use latmc_run::{
    make_analysis, sampled_data, MethodLog, ResultsAnalysisFunction, ResultsAnalysisFunctionMap,
    SamplingParams, StateSampler, StateSamplingFunction, StateSamplingFunctionMap,
};
use serde_json::json;

fn driven_sampler() -> StateSampler<i32> {
    let mut functions: StateSamplingFunctionMap<i32> = StateSamplingFunctionMap::new();
    let energy = StateSamplingFunction::new(
        "energy",
        "The state value itself",
        vec![],
        Arc::new(|state: &i32| vec![*state as f64]),
    );
    functions.insert(energy.name.clone(), energy);

    let params = SamplingParams {
        period: 1.0,
        sampler_names: vec!["energy".to_string()],
        ..SamplingParams::default()
    };
    let mut sampler = StateSampler::new(&params, &functions, RngHandle::from_seed(3)).unwrap();
    sampler.reset(1).unwrap();
    for state in 0..10 {
        while !sampler.sample_is_due_by_count() {
            sampler.increment_step();
        }
        sampler.sample_data(&state, 0.01 * state as f64).unwrap();
        sampler.increment_step();
    }
    sampler
}

#[test]
fn sampled_data_is_positionally_aligned() {
    let sampler = driven_sampler();
    let data = sampled_data(&sampler);

    assert_eq!(data.sample_count.len(), 10);
    assert_eq!(data.sample_clocktime.len(), 10);
    assert!(data.sample_time.is_none());
    assert!(data.sample_weight.is_none());

    let rows = data.samplers.get("energy").unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[4], vec![4.0]);
    assert_eq!(data.sample_count[4], 4);

    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["samplers"]["energy"][9][0], 9.0);
    assert_eq!(json["sample_count"][9], 9);
}

#[test]
fn analysis_functions_run_and_failures_become_nan() {
    let sampler = driven_sampler();
    let data = sampled_data(&sampler);

    let mut functions = ResultsAnalysisFunctionMap::new();
    let mean = ResultsAnalysisFunction::new(
        "mean_energy",
        "Mean of the sampled energies",
        vec![],
        Arc::new(|data| {
            let rows = data.samplers.get("energy").ok_or_else(|| {
                McError::Stats(ErrorInfo::new("missing-sampler", "energy was not sampled"))
            })?;
            let sum: f64 = rows.iter().map(|row| row[0]).sum();
            Ok(vec![sum / rows.len() as f64])
        }),
    );
    let failing = ResultsAnalysisFunction::new(
        "failing",
        "Always fails",
        vec![2],
        Arc::new(|_| Err(McError::Stats(ErrorInfo::new("boom", "analysis failed")))),
    );
    let wrong_width = ResultsAnalysisFunction::new(
        "wrong_width",
        "Returns the wrong number of components",
        vec![3],
        Arc::new(|_| Ok(vec![1.0])),
    );
    functions.insert(mean.name.clone(), mean);
    functions.insert(failing.name.clone(), failing);
    functions.insert(wrong_width.name.clone(), wrong_width);

    let analysis = make_analysis(&data, &functions);

    assert_eq!(analysis.get("mean_energy").unwrap(), &vec![4.5]);

    let failed = analysis.get("failing").unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|value| value.is_nan()));

    let mismatched = analysis.get("wrong_width").unwrap();
    assert_eq!(mismatched.len(), 3);
    assert!(mismatched.iter().all(|value| value.is_nan()));
}

#[test]
fn method_log_throttles_status_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.json");
    let mut method_log = MethodLog::new(Some(path.clone()), 10.0);

    let status = json!({"count": 1});
    assert!(method_log.write_status_if_due(0.0, &status).unwrap());
    // Too soon for another write.
    assert!(!method_log.write_status_if_due(5.0, &status).unwrap());
    assert!(method_log.write_status_if_due(15.0, &json!({"count": 2})).unwrap());

    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["count"], 2);
}

#[test]
fn method_log_without_a_path_is_disabled() {
    let mut method_log = MethodLog::new(None, 0.0);
    assert!(!method_log.write_status_if_due(0.0, &json!({})).unwrap());
}
