use latmc_stats::{default_equilibration_check, RequestedPrecision};

#[test]
fn transient_head_is_detected() {
    // 50 samples stuck at 5.0, then a stationary tail at 0.0.
    let mut observations = vec![5.0; 50];
    observations.extend(vec![0.0; 150]);

    let result =
        default_equilibration_check(&observations, &[], RequestedPrecision::abs(0.01));
    assert!(result.is_equilibrated);
    assert_eq!(result.n_samples_for_equilibration, 50);
}

#[test]
fn stationary_series_equilibrates_immediately() {
    let observations: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let result =
        default_equilibration_check(&observations, &[], RequestedPrecision::abs(0.5));
    assert!(result.is_equilibrated);
    assert_eq!(result.n_samples_for_equilibration, 0);
}

#[test]
fn drifting_series_never_equilibrates() {
    let observations: Vec<f64> = (0..200).map(|i| i as f64).collect();
    let result =
        default_equilibration_check(&observations, &[], RequestedPrecision::abs(1.0));
    assert!(!result.is_equilibrated);
    assert_eq!(result.n_samples_for_equilibration, observations.len());
}

#[test]
fn relative_precision_scales_with_the_tail_mean() {
    // Half-mean difference of 0.2 around a mean of 100: within 1% relative,
    // far outside 0.01% relative.
    let mut observations = vec![99.9; 50];
    observations.extend(vec![100.1; 50]);

    let loose = default_equilibration_check(&observations, &[], RequestedPrecision::rel(1e-2));
    assert!(loose.is_equilibrated);
    assert_eq!(loose.n_samples_for_equilibration, 0);

    let tight = default_equilibration_check(&observations, &[], RequestedPrecision::rel(1e-4));
    assert!(tight.n_samples_for_equilibration > 0);
}

#[test]
fn weights_shift_the_half_means() {
    // Unweighted halves agree; weighting the early spike keeps them apart
    // until the spike leaves the window.
    let mut observations = vec![10.0; 4];
    observations.extend(vec![0.0; 96]);
    let mut weights = vec![50.0; 4];
    weights.extend(vec![1.0; 96]);

    let unweighted =
        default_equilibration_check(&observations, &[], RequestedPrecision::abs(1.0));
    let weighted =
        default_equilibration_check(&observations, &weights, RequestedPrecision::abs(1.0));
    assert!(unweighted.is_equilibrated);
    assert!(weighted.is_equilibrated);
    assert!(
        weighted.n_samples_for_equilibration >= unweighted.n_samples_for_equilibration,
        "heavily weighted transients should not equilibrate earlier"
    );
}

#[test]
fn too_short_series_is_not_equilibrated() {
    let result = default_equilibration_check(&[1.0], &[], RequestedPrecision::abs(1.0));
    assert!(!result.is_equilibrated);
}
