/// Mean of `x`, summed in slice order
pub fn arithmetic_mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Deviation of an observed Ct from its control baseline
///
/// Positive when the observation has a lower Ct (more template) than the baseline.
pub fn delta_ct(baseline: f64, observed: f64) -> f64 {
    baseline - observed
}

/// Amplification factor `2^delta`
pub fn expression_factor(delta: f64) -> f64 {
    delta.exp2()
}
