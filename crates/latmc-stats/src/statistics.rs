use std::sync::Arc;

use latmc_core::{ErrorInfo, McError};
use serde::{Deserialize, Serialize};

/// Autocorrelation cutoff: lags with normalized autocorrelation below this are
/// treated as noise and end the integration window.
const RHO_CUTOFF: f64 = 0.05;

/// Mean and precision of an observation series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicStatistics {
    /// (Weighted) mean of the observations.
    pub mean: f64,
    /// Estimated half-width of the confidence interval of the mean,
    /// incorporating autocorrelation.
    pub calculated_precision: f64,
}

/// Strategy for estimating precision when observations carry weights
/// (N-fold way residence-time weighting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightedObservationsMethod {
    /// Sample variance directly from the weighted series; only the
    /// autocorrelation factor comes from the resampled trajectory.
    DirectVariance,
    /// All statistics from the resampled trajectory.
    FromResampled,
}

impl WeightedObservationsMethod {
    /// Maps the numeric configuration value (1 or 2) to a method.
    pub fn from_config(value: u8) -> Result<Self, McError> {
        match value {
            1 => Ok(WeightedObservationsMethod::DirectVariance),
            2 => Ok(WeightedObservationsMethod::FromResampled),
            other => Err(McError::Config(
                ErrorInfo::new(
                    "weighted-observations-method",
                    "weighted_observations_method must be 1 or 2",
                )
                .with_context("found", other.to_string()),
            )),
        }
    }
}

/// Signature of a pluggable statistics calculator.
pub type CalcStatisticsFn = Arc<dyn Fn(&[f64], &[f64]) -> Result<BasicStatistics, McError>>;

/// Calculates [`BasicStatistics`] for weighted or unweighted series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicStatisticsCalculator {
    /// Confidence level for the precision of the mean, in `(0, 1)`.
    pub confidence: f64,
    /// Strategy used when observations are weighted.
    pub method: WeightedObservationsMethod,
    /// Number of equi-weight pseudo-observations used for autocovariance
    /// estimation when observations are weighted.
    pub n_resamples: usize,
}

impl Default for BasicStatisticsCalculator {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            method: WeightedObservationsMethod::DirectVariance,
            n_resamples: 10_000,
        }
    }
}

impl BasicStatisticsCalculator {
    /// Creates a calculator with explicit parameters.
    pub fn new(confidence: f64, method: WeightedObservationsMethod, n_resamples: usize) -> Self {
        Self {
            confidence,
            method,
            n_resamples,
        }
    }

    /// Computes statistics for `observations`.
    ///
    /// An empty `sample_weight` means the series is unweighted; otherwise the
    /// weight vector must have the same length as the observations.
    pub fn calc(&self, observations: &[f64], sample_weight: &[f64]) -> Result<BasicStatistics, McError> {
        let n = observations.len();
        if n < 2 {
            return Err(McError::Stats(
                ErrorInfo::new("too-few-samples", "need at least two observations")
                    .with_context("n_samples", n.to_string()),
            ));
        }
        if !(0.0..1.0).contains(&self.confidence) || self.confidence <= 0.0 {
            return Err(McError::Stats(
                ErrorInfo::new("confidence-range", "confidence must be in (0, 1)")
                    .with_context("confidence", self.confidence.to_string()),
            ));
        }
        if sample_weight.is_empty() {
            return Ok(self.calc_unweighted(observations));
        }
        if sample_weight.len() != n {
            return Err(McError::Stats(
                ErrorInfo::new("weight-length", "sample weights do not match observations")
                    .with_context("n_samples", n.to_string())
                    .with_context("n_weights", sample_weight.len().to_string()),
            ));
        }
        if self.n_resamples < 2 {
            return Err(McError::Stats(
                ErrorInfo::new("n-resamples", "need at least two resampled observations")
                    .with_context("n_resamples", self.n_resamples.to_string()),
            ));
        }
        self.calc_weighted(observations, sample_weight)
    }

    /// Wraps the calculator into the pluggable function-object form.
    pub fn shared(self) -> CalcStatisticsFn {
        Arc::new(move |observations, sample_weight| self.calc(observations, sample_weight))
    }

    fn calc_unweighted(&self, observations: &[f64]) -> BasicStatistics {
        let n = observations.len();
        let mean = observations.iter().sum::<f64>() / n as f64;
        let var = sample_variance(observations, mean);
        if var <= 0.0 {
            return BasicStatistics {
                mean,
                calculated_precision: 0.0,
            };
        }
        let tau = integrated_autocorr_time(observations, mean, var);
        let n_eff = n as f64 / (1.0 + 2.0 * tau);
        let z = two_sided_z(self.confidence);
        BasicStatistics {
            mean,
            calculated_precision: z * (var / n_eff).sqrt(),
        }
    }

    fn calc_weighted(
        &self,
        observations: &[f64],
        sample_weight: &[f64],
    ) -> Result<BasicStatistics, McError> {
        let n = observations.len();
        let w_sum: f64 = sample_weight.iter().sum();
        if w_sum <= 0.0 || sample_weight.iter().any(|&w| w < 0.0) {
            return Err(McError::Stats(
                ErrorInfo::new("weight-range", "sample weights must be non-negative with positive sum")
                    .with_context("weight_sum", w_sum.to_string()),
            ));
        }
        let weighted_mean = observations
            .iter()
            .zip(sample_weight)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            / w_sum;

        let resampled = resample(observations, sample_weight, self.n_resamples);
        let r = resampled.len();
        let resampled_mean = resampled.iter().sum::<f64>() / r as f64;
        let resampled_var = sample_variance(&resampled, resampled_mean);

        // The resampled trajectory repeats each observation ~(R/n) times in
        // order; the repetition itself contributes (m - 1) / 2 to the measured
        // integrated autocorrelation time and must be discounted before
        // rescaling to original-sample units.
        let m = r as f64 / n as f64;
        let tau = if resampled_var > 0.0 {
            let tau_resampled = integrated_autocorr_time(&resampled, resampled_mean, resampled_var);
            ((tau_resampled - (m - 1.0) / 2.0) / m).max(0.0)
        } else {
            0.0
        };
        let n_eff = n as f64 / (1.0 + 2.0 * tau);
        let z = two_sided_z(self.confidence);

        match self.method {
            WeightedObservationsMethod::DirectVariance => {
                let var = weighted_sample_variance(observations, sample_weight, weighted_mean, w_sum);
                Ok(BasicStatistics {
                    mean: weighted_mean,
                    calculated_precision: z * (var.max(0.0) / n_eff).sqrt(),
                })
            }
            WeightedObservationsMethod::FromResampled => Ok(BasicStatistics {
                mean: resampled_mean,
                calculated_precision: z * (resampled_var.max(0.0) / n_eff).sqrt(),
            }),
        }
    }
}

fn sample_variance(observations: &[f64], mean: f64) -> f64 {
    let n = observations.len();
    observations
        .iter()
        .map(|x| (x - mean) * (x - mean))
        .sum::<f64>()
        / (n - 1) as f64
}

fn weighted_sample_variance(observations: &[f64], weights: &[f64], mean: f64, w_sum: f64) -> f64 {
    let w2_sum: f64 = weights.iter().map(|w| w * w).sum();
    let denom = w_sum - w2_sum / w_sum;
    if denom <= 0.0 {
        return 0.0;
    }
    observations
        .iter()
        .zip(weights)
        .map(|(x, w)| w * (x - mean) * (x - mean))
        .sum::<f64>()
        / denom
}

/// Integrated autocorrelation time `tau = sum_k (1 - k/n) rho(k)`, summed
/// until the normalized autocorrelation drops below [`RHO_CUTOFF`] or the lag
/// reaches `n / 2`.
fn integrated_autocorr_time(observations: &[f64], mean: f64, var: f64) -> f64 {
    let n = observations.len();
    let max_lag = n / 2;
    let norm = var * (n - 1) as f64 / n as f64;
    let mut tau = 0.0;
    for lag in 1..=max_lag {
        let pairs = n - lag;
        let mut cov = 0.0;
        for i in 0..pairs {
            cov += (observations[i] - mean) * (observations[i + lag] - mean);
        }
        let rho = cov / pairs as f64 / norm;
        if rho < RHO_CUTOFF {
            break;
        }
        tau += (1.0 - lag as f64 / n as f64) * rho;
    }
    tau
}

/// Systematic resampling into `n_resamples` equi-weight pseudo-observations.
///
/// Pseudo-observation `k` takes the original sample whose cumulative-weight
/// interval contains `(k + 0.5) * total / n_resamples`, so each original
/// sample contributes floor-proportional to its weight fraction.
fn resample(observations: &[f64], weights: &[f64], n_resamples: usize) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    let n = observations.len();
    let mut out = Vec::with_capacity(n_resamples);
    let mut index = 0;
    let mut cumulative = weights[0];
    for k in 0..n_resamples {
        let target = (k as f64 + 0.5) * total / n_resamples as f64;
        while cumulative < target && index + 1 < n {
            index += 1;
            cumulative += weights[index];
        }
        out.push(observations[index]);
    }
    out
}

/// Two-sided normal quantile for the given confidence level.
pub fn two_sided_z(confidence: f64) -> f64 {
    normal_cdf_inverse(1.0 - (1.0 - confidence) / 2.0)
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.15e-9 over the open unit interval).
fn normal_cdf_inverse(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
