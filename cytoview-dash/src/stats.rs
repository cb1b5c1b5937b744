//! Rank statistics for responder comparisons
//!
//! Two-sided Mann-Whitney U test via the normal approximation with tie
//! correction and continuity correction. No crate in our stack provides rank
//! tests, so the test is implemented here with its own unit coverage.

use crate::db::ResponderRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Result of a two-sided Mann-Whitney U test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannWhitneyResult {
    /// U statistic of the first group
    pub u: f64,
    /// Two-sided p-value
    pub p: f64,
}

/// Per-population significance of the responder / non-responder difference
#[derive(Debug, Clone, Serialize)]
pub struct SignificanceRow {
    pub population: String,
    pub u_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// Two-sided Mann-Whitney U test (normal approximation)
///
/// Returns None when either group is empty or the rank variance is zero
/// (all values tied).
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Option<MannWhitneyResult> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let n = n1 + n2;

    // Rank the pooled values, averaging ranks within ties
    let mut pooled: Vec<(f64, usize)> = a
        .iter()
        .map(|&v| (v, 0usize))
        .chain(b.iter().map(|&v| (v, 1usize)))
        .collect();
    pooled.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut rank_sum_a = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < pooled.len() {
        let mut j = i;
        while j < pooled.len() && pooled[j].0 == pooled[i].0 {
            j += 1;
        }
        // Ranks are 1-based; tied values share the average rank of the run
        let avg_rank = ((i + 1 + j) as f64) / 2.0;
        let run = (j - i) as f64;
        if run > 1.0 {
            tie_term += run * run * run - run;
        }
        for entry in &pooled[i..j] {
            if entry.1 == 0 {
                rank_sum_a += avg_rank;
            }
        }
        i = j;
    }

    let u1 = rank_sum_a - n1 * (n1 + 1.0) / 2.0;

    let mean = n1 * n2 / 2.0;
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        return None;
    }

    // Continuity correction pulls the numerator half a rank toward zero
    let diff = u1 - mean;
    let corrected = if diff > 0.0 {
        (diff - 0.5).max(0.0)
    } else if diff < 0.0 {
        (diff + 0.5).min(0.0)
    } else {
        0.0
    };

    let z = corrected / variance.sqrt();
    let p = (2.0 * (1.0 - standard_normal_cdf(z.abs()))).min(1.0);

    Some(MannWhitneyResult { u: u1, p })
}

/// Compare responders vs non-responders per population
///
/// Groups the cohort's relative frequencies by population and tests
/// `response = "yes"` against `response = "no"`. Populations where either
/// group is empty are omitted. Blank responses are excluded.
pub fn significance_tests(rows: &[ResponderRow]) -> Vec<SignificanceRow> {
    let mut groups: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(row.population.as_str()).or_default();
        match row.response.as_deref() {
            Some("yes") => entry.0.push(row.percentage),
            Some("no") => entry.1.push(row.percentage),
            _ => {}
        }
    }

    groups
        .into_iter()
        .filter_map(|(population, (responders, non_responders))| {
            mann_whitney_u(&responders, &non_responders).map(|result| SignificanceRow {
                population: population.to_string(),
                u_statistic: round_to(result.u, 2),
                p_value: round_to(result.p, 4),
                significant: result.p < 0.05,
            })
        })
        .collect()
}

/// Standard normal CDF via the Abramowitz & Stegun 7.1.26 erf approximation
fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
