//! Correlation, dispersion, trend and lead/lag kernels shared by every module.
//!
//! All functions are total: degenerate input (too short, zero variance, zero
//! denominator) yields `None` or a documented default, never NaN.

/// Variance below which a series is treated as constant.
const VARIANCE_EPSILON: f64 = 1e-12;

/// Pearson correlation coefficient of two equal-length series.
/// Returns value from -1.0 to +1.0, or `None` when undefined.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }

    let mean_a = mean(a)?;
    let mean_b = mean(b)?;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in a.iter().zip(b) {
        let diff_a = x - mean_a;
        let diff_b = y - mean_b;
        cov += diff_a * diff_b;
        var_a += diff_a * diff_a;
        var_b += diff_b * diff_b;
    }

    if var_a < VARIANCE_EPSILON || var_b < VARIANCE_EPSILON {
        return None;
    }

    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Bar-to-bar fractional returns. N prices produce N-1 returns.
/// A non-positive previous price yields a 0.0 return.
pub fn pct_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// `(last - first) / |first|`, `None` when `first` is zero. The sign always follows the
/// direction of the move, including for negative series.
pub fn relative_change(first: f64, last: f64) -> Option<f64> {
    if first == 0.0 {
        return None;
    }
    let change = (last - first) / first.abs();
    change.is_finite().then_some(change)
}

/// Slope of a degree-1 least-squares fit of `values` against indices `0..n`.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(values)?;

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });

    // den > 0 for n >= 2
    Some(num / den)
}

/// Find which series leads by testing correlation at shifted alignments.
///
/// Returns `(lag, correlation)` where a positive lag means `leader_candidate` moves
/// first, so its returns correlate with `follower` returns `lag` steps later.
/// `None` when no alignment leaves at least 5 overlapping points with defined correlation.
pub fn lead_lag(leader_candidate: &[f64], follower: &[f64], max_lag: usize) -> Option<(i32, f64)> {
    let mut best: Option<(i32, f64)> = None;
    let len = leader_candidate.len().min(follower.len());
    let max_lag = max_lag as i32;

    for lag in -max_lag..=max_lag {
        let abs_lag = lag.unsigned_abs() as usize;
        if abs_lag >= len {
            continue;
        }
        let remaining = len - abs_lag;
        if remaining < 5 {
            continue;
        }

        let corr = if lag > 0 {
            // candidate leads: compare candidate[t] with follower[t + lag]
            pearson(
                &leader_candidate[..remaining],
                &follower[abs_lag..abs_lag + remaining],
            )
        } else if lag < 0 {
            pearson(
                &leader_candidate[abs_lag..abs_lag + remaining],
                &follower[..remaining],
            )
        } else {
            pearson(&leader_candidate[..len], &follower[..len])
        };

        if let Some(c) = corr {
            if best.is_none_or(|(_, best_corr)| c.abs() > best_corr.abs()) {
                best = Some((lag, c));
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect_positive() {
        let a = vec![0.01, 0.02, -0.01, 0.03, -0.02];
        let b = vec![0.01, 0.02, -0.01, 0.03, -0.02];
        let corr = pearson(&a, &b).unwrap();
        assert!((corr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_perfect_negative() {
        let a = vec![0.01, 0.02, -0.01, 0.03, -0.02];
        let b = vec![-0.01, -0.02, 0.01, -0.03, 0.02];
        let corr = pearson(&a, &b).unwrap();
        assert!((corr + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_degenerate() {
        struct TestCase {
            a: Vec<f64>,
            b: Vec<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: constant series has zero variance
                a: vec![1.0; 10],
                b: (0..10).map(f64::from).collect(),
            },
            TestCase {
                // TC1: length mismatch
                a: vec![1.0, 2.0, 3.0],
                b: vec![1.0, 2.0],
            },
            TestCase {
                // TC2: too short
                a: vec![1.0],
                b: vec![2.0],
            },
            TestCase {
                // TC3: empty
                a: vec![],
                b: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(pearson(&test.a, &test.b), None, "TC{} failed", index);
        }
    }

    #[test]
    fn test_pct_returns() {
        let returns = pct_returns(&[100.0, 101.0, 0.0, 5.0]);
        assert_eq!(returns.len(), 3);
        assert!((returns[0] - 0.01).abs() < 1e-12);
        assert!((returns[1] + 1.0).abs() < 1e-12);
        // previous price of zero short-circuits to 0.0
        assert_eq!(returns[2], 0.0);
    }

    #[test]
    fn test_std_dev_is_population() {
        let std = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.0).abs() < 1e-12);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_linear_slope() {
        let values: Vec<f64> = (0..10).map(|i| 0.5 + 0.02 * i as f64).collect();
        let slope = linear_slope(&values).unwrap();
        assert!((slope - 0.02).abs() < 1e-12);
        assert_eq!(linear_slope(&[1.0]), None);
    }

    #[test]
    fn test_relative_change() {
        assert_eq!(relative_change(0.0, 5.0), None);
        let change = relative_change(100.0, 105.0).unwrap();
        assert!((change - 0.05).abs() < 1e-12);

        // Rising from -0.5 to -0.4 is a +20% move, not a fall
        let change = relative_change(-0.5, -0.4).unwrap();
        assert!((change - 0.2).abs() < 1e-12);
        let change = relative_change(-0.5, -0.6).unwrap();
        assert!((change + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_lead_lag_detects_leader() {
        // follower repeats the leader's returns two steps later
        let leader: Vec<f64> = (0..40)
            .map(|i| ((i * 7 % 11) as f64 - 5.0) / 100.0)
            .collect();
        let mut follower = vec![0.0, 0.0];
        follower.extend_from_slice(&leader[..38]);

        let (lag, corr) = lead_lag(&leader, &follower, 5).unwrap();
        assert_eq!(lag, 2);
        assert!((corr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lead_lag_insufficient_overlap() {
        assert_eq!(lead_lag(&[0.01, 0.02], &[0.01, 0.02], 3), None);
    }
}
