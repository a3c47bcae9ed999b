//! Statistical A/B comparison of the two finalists.
//!
//! Each finalist's present per-metric scores form its sample array. Those
//! dimensions are independently computed quality measures, not repeated
//! task trials, so the test is an observational comparison rather than a
//! controlled experiment; downstream consumers depend on this exact
//! construction. The Monte Carlo P(B > A) step draws from normals
//! parameterized by the empirical mean and SD, a heuristic approximation
//! rather than a full posterior update.

use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use tracing::debug;

use crate::config::StatsConfig;
use crate::error::StatsError;
use crate::types::{AbTestResult, ScoreVector};

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance; 0.0 when fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Welch's two-sample t statistic and two-tailed p-value.
///
/// Degrees of freedom follow Welch–Satterthwaite. When both samples have
/// zero variance the standard error collapses: equal means give p = 1,
/// unequal means give p = 0.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> (f64, f64) {
    let (mean_a, mean_b) = (mean(a), mean(b));
    let (var_a, var_b) = (variance(a), variance(b));
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);

    let se_sq = var_a / n_a + var_b / n_b;
    if se_sq <= 0.0 {
        return if (mean_a - mean_b).abs() < f64::EPSILON {
            (0.0, 1.0)
        } else {
            (f64::INFINITY, 0.0)
        };
    }

    let t = (mean_b - mean_a) / se_sq.sqrt();

    // Welch–Satterthwaite degrees of freedom.
    let df_num = se_sq.powi(2);
    let df_den = (var_a / n_a).powi(2) / (n_a - 1.0) + (var_b / n_b).powi(2) / (n_b - 1.0);
    if df_den <= 0.0 {
        return (t, if t.abs() < f64::EPSILON { 1.0 } else { 0.0 });
    }
    let df = df_num / df_den;

    let p = match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    };
    (t, p)
}

/// 95% confidence interval for the mean via the Student-t critical value
/// with n − 1 degrees of freedom. Degenerates to (mean, mean) when n < 2
/// or the sample has no spread.
pub fn confidence_interval_95(values: &[f64]) -> (f64, f64) {
    let m = mean(values);
    if values.len() < 2 {
        return (m, m);
    }
    let sd = variance(values).sqrt();
    if sd <= 0.0 {
        return (m, m);
    }
    let n = values.len() as f64;
    let critical = match StudentsT::new(0.0, 1.0, n - 1.0) {
        Ok(dist) => dist.inverse_cdf(0.975),
        Err(_) => return (m, m),
    };
    let margin = critical * sd / n.sqrt();
    (m - margin, m + margin)
}

/// Cohen's d: (mean_b − mean_a) over the pooled unbiased SD. Zero when the
/// pooled SD is zero or either sample is too small to pool.
pub fn cohens_d(a: &[f64], b: &[f64]) -> f64 {
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let df = n_a + n_b - 2.0;
    if df <= 0.0 {
        return 0.0;
    }
    let pooled_var = ((n_a - 1.0) * variance(a) + (n_b - 1.0) * variance(b)) / df;
    let pooled_sd = pooled_var.sqrt();
    if pooled_sd <= 0.0 {
        return 0.0;
    }
    (mean(b) - mean(a)) / pooled_sd
}

/// Cliff's delta over all cross-pairs, in [-1, 1]. +1 means every B sample
/// exceeds every A sample.
pub fn cliffs_delta(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut greater = 0i64;
    let mut lesser = 0i64;
    for x in b {
        for y in a {
            if x > y {
                greater += 1;
            } else if x < y {
                lesser += 1;
            }
        }
    }
    (greater - lesser) as f64 / (a.len() * b.len()) as f64
}

/// Monte Carlo estimate of P(B > A): draw from Normal(mean, sd) for each
/// side using the empirical moments as point estimates and report the
/// fraction of draws where B exceeds A. A zero-spread side contributes its
/// mean on every draw.
pub fn prob_b_beats_a(a: &[f64], b: &[f64], draws: usize, rng: &mut StdRng) -> f64 {
    if draws == 0 {
        return 0.5;
    }
    let (mean_a, mean_b) = (mean(a), mean(b));
    let (sd_a, sd_b) = (variance(a).sqrt(), variance(b).sqrt());

    let dist_a = Normal::new(mean_a, sd_a).ok();
    let dist_b = Normal::new(mean_b, sd_b).ok();

    let mut b_wins = 0usize;
    for _ in 0..draws {
        let draw_a = dist_a.as_ref().map_or(mean_a, |d| d.sample(rng));
        let draw_b = dist_b.as_ref().map_or(mean_b, |d| d.sample(rng));
        if draw_b > draw_a {
            b_wins += 1;
        }
    }
    b_wins as f64 / draws as f64
}

/// Compare two finalists' score vectors.
///
/// Fails with `InsufficientSamples` when either side has fewer metric
/// dimensions present than `config.min_samples`. The winner is the side
/// with the higher mean, declared only when the Welch p-value clears the
/// configured significance level.
pub fn compare(
    a: &ScoreVector,
    b: &ScoreVector,
    config: &StatsConfig,
) -> Result<AbTestResult, StatsError> {
    let scores_a = a.sample_values();
    let scores_b = b.sample_values();

    for (provider, samples) in [(&a.provider_id, &scores_a), (&b.provider_id, &scores_b)] {
        if samples.len() < config.min_samples {
            return Err(StatsError::InsufficientSamples {
                provider: provider.clone(),
                got: samples.len(),
                need: config.min_samples,
            });
        }
    }

    let mean_a = mean(&scores_a);
    let mean_b = mean(&scores_b);
    let (_t, p_value) = welch_t_test(&scores_a, &scores_b);
    let ci_a = confidence_interval_95(&scores_a);
    let ci_b = confidence_interval_95(&scores_b);
    let d = cohens_d(&scores_a, &scores_b);
    let delta = cliffs_delta(&scores_a, &scores_b);

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let bayesian = prob_b_beats_a(&scores_a, &scores_b, config.monte_carlo_draws, &mut rng);

    let is_significant = p_value < config.significance_level;
    let winner = if is_significant {
        if mean_b > mean_a {
            Some(b.provider_id.clone())
        } else {
            Some(a.provider_id.clone())
        }
    } else {
        None
    };

    debug!(
        provider_a = %a.provider_id,
        provider_b = %b.provider_id,
        p_value,
        cohens_d = d,
        cliffs_delta = delta,
        significant = is_significant,
        "a/b comparison complete"
    );

    Ok(AbTestResult {
        provider_a: a.provider_id.clone(),
        provider_b: b.provider_id.clone(),
        scores_a,
        scores_b,
        mean_a,
        mean_b,
        p_value,
        ci_a,
        ci_b,
        cohens_d: d,
        cliffs_delta: delta,
        bayesian_prob_b_beats_a: bayesian,
        winner,
        is_significant,
    })
}
