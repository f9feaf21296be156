//! Goodness-of-fit metrics comparing a reference series `a` (observed)
//! against a predicted series `p`.
//!
//! Metric definitions follow Archontoulis & Miguez (2015), *Nonlinear
//! regression models and applications in agricultural research*, Agronomy
//! Journal 107(2).

use serde::{Deserialize, Serialize};

use ag_types::MetricError;

use crate::stats;

/// Which raw metric value counts as a better fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Better {
    Smaller,
    CloserToZero,
    CloserToOne,
}

/// The supported goodness-of-fit metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Rmse,
    Mae,
    Mse,
    Rrmse,
    Bias,
    /// Modelling efficiency (Nash–Sutcliffe).
    Me,
    /// Willmott's index of agreement.
    Wia,
    R2,
    Slope,
    /// Lin's concordance correlation coefficient.
    Ccc,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::Rmse,
        Metric::Mae,
        Metric::Mse,
        Metric::Rrmse,
        Metric::Bias,
        Metric::Me,
        Metric::Wia,
        Metric::R2,
        Metric::Slope,
        Metric::Ccc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rmse => "rmse",
            Self::Mae => "mae",
            Self::Mse => "mse",
            Self::Rrmse => "rrmse",
            Self::Bias => "bias",
            Self::Me => "me",
            Self::Wia => "wia",
            Self::R2 => "r2",
            Self::Slope => "slope",
            Self::Ccc => "ccc",
        }
    }

    pub fn direction(&self) -> Better {
        match self {
            Self::Rmse | Self::Mae | Self::Mse | Self::Rrmse => Better::Smaller,
            Self::Bias => Better::CloserToZero,
            Self::Me | Self::Wia | Self::R2 | Self::Slope | Self::Ccc => Better::CloserToOne,
        }
    }

    /// The raw metric value, per its textbook definition.
    pub fn evaluate(&self, a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
        match self {
            Self::Rmse => rmse(a, p),
            Self::Mae => mae(a, p),
            Self::Mse => mse(a, p),
            Self::Rrmse => rrmse(a, p),
            Self::Bias => bias(a, p),
            Self::Me => modelling_efficiency(a, p),
            Self::Wia => wia(a, p),
            Self::R2 => r2(a, p),
            Self::Slope => slope(a, p),
            Self::Ccc => ccc(a, p),
        }
    }

    /// The metric oriented as a loss: lower is always better.
    ///
    /// Smaller-is-better metrics pass through, closer-to-zero metrics
    /// contribute their magnitude, closer-to-one metrics their distance
    /// from one. This is the only sign convention used for objective
    /// wiring; callers never negate metric values themselves.
    pub fn loss(&self, a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
        let value = self.evaluate(a, p)?;
        Ok(match self.direction() {
            Better::Smaller => value,
            Better::CloserToZero => value.abs(),
            Better::CloserToOne => (1.0 - value).abs(),
        })
    }
}

impl std::str::FromStr for Metric {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rmse" => Ok(Self::Rmse),
            "mae" => Ok(Self::Mae),
            "mse" => Ok(Self::Mse),
            "rrmse" => Ok(Self::Rrmse),
            "bias" => Ok(Self::Bias),
            "me" | "nse" => Ok(Self::Me),
            "wia" => Ok(Self::Wia),
            "r2" => Ok(Self::R2),
            "slope" => Ok(Self::Slope),
            "ccc" => Ok(Self::Ccc),
            other => Err(MetricError::UnknownMetric {
                name: other.to_string(),
            }),
        }
    }
}

fn check(metric: &str, needed: usize, a: &[f64], p: &[f64]) -> Result<(), MetricError> {
    if a.len() != p.len() {
        return Err(MetricError::LengthMismatch {
            expected: a.len(),
            actual: p.len(),
        });
    }
    if a.len() < needed {
        return Err(MetricError::InsufficientData {
            metric: metric.to_string(),
            needed,
            got: a.len(),
        });
    }
    Ok(())
}

/// Mean square error.
pub fn mse(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("mse", 1, a, p)?;
    Ok(a.iter().zip(p).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64)
}

/// Root mean square error.
pub fn rmse(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    Ok(mse(a, p)?.sqrt())
}

/// Mean absolute error.
pub fn mae(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("mae", 1, a, p)?;
    Ok(a.iter().zip(p).map(|(x, y)| (x - y).abs()).sum::<f64>() / a.len() as f64)
}

/// Relative RMSE, normalized by the mean of the reference series.
pub fn rrmse(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    Ok(rmse(a, p)? / stats::mean(a))
}

/// Mean bias, `mean(a - p)`: positive when the model underestimates.
pub fn bias(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("bias", 1, a, p)?;
    Ok(a.iter().zip(p).map(|(x, y)| x - y).sum::<f64>() / a.len() as f64)
}

/// Modelling efficiency (Nash–Sutcliffe): 1 − mse / var(a).
pub fn modelling_efficiency(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("me", 2, a, p)?;
    let m = stats::mean(a);
    let mse_model = a.iter().zip(p).map(|(x, y)| (y - x).powi(2)).sum::<f64>();
    let mse_obs = a.iter().map(|x| (x - m).powi(2)).sum::<f64>();
    Ok(1.0 - mse_model / mse_obs)
}

/// Willmott's index of agreement.
pub fn wia(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("wia", 1, a, p)?;
    let m = stats::mean(a);
    let numerator = a.iter().zip(p).map(|(x, y)| (y - x).powi(2)).sum::<f64>();
    let denominator = a
        .iter()
        .zip(p)
        .map(|(x, y)| ((y - m).abs() + (x - m).abs()).powi(2))
        .sum::<f64>();
    Ok(1.0 - numerator / denominator)
}

/// Coefficient of determination of the OLS regression of `p` on `a`.
pub fn r2(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("r2", 2, a, p)?;
    let r = stats::pearson(a, p);
    Ok(r * r)
}

/// Slope of the OLS regression of `p` on `a`.
pub fn slope(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("slope", 2, a, p)?;
    Ok(stats::ols(a, p).0)
}

/// Lin's concordance correlation coefficient.
pub fn ccc(a: &[f64], p: &[f64]) -> Result<f64, MetricError> {
    check("ccc", 3, a, p)?;
    let va = stats::sample_variance(a);
    let vp = stats::sample_variance(p);
    let cov = stats::sample_covariance(a, p);
    let shift = stats::mean(a) - stats::mean(p);
    Ok(2.0 * cov / (va + vp + shift * shift))
}

/// CCC point estimate with a Fisher z-transform confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CccEstimate {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub conf_level: f64,
}

/// CCC with its `conf_level` (e.g. 0.95) confidence interval.
pub fn ccc_with_ci(a: &[f64], p: &[f64], conf_level: f64) -> Result<CccEstimate, MetricError> {
    let estimate = ccc(a, p)?;
    let k = a.len() as f64;
    let r = stats::pearson(a, p);
    let va = stats::sample_variance(a);
    let vp = stats::sample_variance(p);
    let u = (stats::mean(p) - stats::mean(a)) / (va * vp).powf(0.25);
    let zv = stats::norm_ppf(1.0 - (1.0 - conf_level) / 2.0);

    let e2 = estimate * estimate;
    let sep = (((1.0 - r * r) * e2 * (1.0 - e2) / (r * r)
        + 2.0 * e2 * estimate * (1.0 - estimate) * u * u / r
        - 0.5 * e2 * e2 * u.powi(4) / (r * r))
        / (k - 2.0))
        .sqrt();

    // Fisher z-transform of the estimate, CI back-transformed with tanh.
    let t = ((1.0 + estimate) / (1.0 - estimate)).ln() / 2.0;
    let se_t = sep / (1.0 - e2);
    let lower = (t - zv * se_t).tanh();
    let upper = (t + zv * se_t).tanh();

    Ok(CccEstimate {
        estimate,
        lower,
        upper,
        conf_level,
    })
}
