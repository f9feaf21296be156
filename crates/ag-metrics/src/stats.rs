//! Small statistics kernel shared by the fit metrics.

pub(crate) fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance (ddof = 1).
pub(crate) fn sample_variance(xs: &[f64]) -> f64 {
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Sample covariance (ddof = 1).
pub(crate) fn sample_covariance(a: &[f64], p: &[f64]) -> f64 {
    let ma = mean(a);
    let mp = mean(p);
    a.iter()
        .zip(p)
        .map(|(x, y)| (x - ma) * (y - mp))
        .sum::<f64>()
        / (a.len() - 1) as f64
}

/// Pearson correlation coefficient.
pub(crate) fn pearson(a: &[f64], p: &[f64]) -> f64 {
    sample_covariance(a, p) / (sample_variance(a).sqrt() * sample_variance(p).sqrt())
}

/// Ordinary least squares of `p` on `a`: returns (slope, intercept).
pub(crate) fn ols(a: &[f64], p: &[f64]) -> (f64, f64) {
    let slope = sample_covariance(a, p) / sample_variance(a);
    let intercept = mean(p) - slope * mean(a);
    (slope, intercept)
}

/// Inverse CDF of the standard normal distribution (Acklam's rational
/// approximation, absolute error < 1.15e-9 over the open unit interval).
pub(crate) fn norm_ppf(q: f64) -> f64 {
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
    const Q_LOW: f64 = 0.02425;

    if !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    if q == 0.0 {
        return f64::NEG_INFINITY;
    }
    if q == 1.0 {
        return f64::INFINITY;
    }

    if q < Q_LOW {
        let u = (-2.0 * q.ln()).sqrt();
        (((((C[0] * u + C[1]) * u + C[2]) * u + C[3]) * u + C[4]) * u + C[5])
            / ((((D[0] * u + D[1]) * u + D[2]) * u + D[3]) * u + 1.0)
    } else if q <= 1.0 - Q_LOW {
        let u = q - 0.5;
        let t = u * u;
        (((((A[0] * t + A[1]) * t + A[2]) * t + A[3]) * t + A[4]) * t + A[5]) * u
            / (((((B[0] * t + B[1]) * t + B[2]) * t + B[3]) * t + B[4]) * t + 1.0)
    } else {
        let u = (-2.0 * (1.0 - q).ln()).sqrt();
        -((((((C[0] * u + C[1]) * u + C[2]) * u + C[3]) * u + C[4]) * u + C[5])
            / ((((D[0] * u + D[1]) * u + D[2]) * u + D[3]) * u + 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_variance() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&xs) - 2.5).abs() < 1e-12);
        // Sample variance of 1..4 is 5/3
        assert!((sample_variance(&xs) - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_of_linear_data_is_one() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let p = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&a, &p) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ols_recovers_line() {
        let a = [0.0, 1.0, 2.0, 3.0];
        let p = [1.0, 3.0, 5.0, 7.0]; // p = 2a + 1
        let (slope, intercept) = ols(&a, &p);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn norm_ppf_known_quantiles() {
        assert!((norm_ppf(0.5)).abs() < 1e-9);
        assert!((norm_ppf(0.975) - 1.959964).abs() < 1e-5);
        assert!((norm_ppf(0.025) + 1.959964).abs() < 1e-5);
    }
}
