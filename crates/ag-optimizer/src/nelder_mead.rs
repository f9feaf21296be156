//! Bounded Nelder–Mead simplex search: the deterministic, derivative-free
//! local backend.

use serde::{Deserialize, Serialize};

use ag_types::AgResult;

use crate::result::SolverOutcome;

const ALPHA: f64 = 1.0; // reflection
const GAMMA: f64 = 2.0; // expansion
const RHO: f64 = 0.5; // contraction
const SIGMA: f64 = 0.5; // shrink

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NelderMeadOptions {
    /// Maximum simplex iterations; defaults to 200 per dimension.
    pub max_iter: Option<u64>,
    /// Convergence tolerance on the simplex spread in parameter space.
    pub xatol: f64,
    /// Convergence tolerance on the spread of objective values.
    pub fatol: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iter: None,
            xatol: 1e-4,
            fatol: 1e-4,
        }
    }
}

fn clamp_point(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (v, &(lo, hi)) in x.iter_mut().zip(bounds) {
        *v = v.clamp(lo, hi);
    }
}

/// Initial simplex around the start point: one vertex per dimension, offset
/// by 5% of that dimension's range, flipped inward when the offset would
/// leave the bounds.
fn initial_simplex(x0: &[f64], bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    let mut p0 = x0.to_vec();
    clamp_point(&mut p0, bounds);
    simplex.push(p0.clone());
    for (i, &(lo, hi)) in bounds.iter().enumerate() {
        let delta = 0.05 * (hi - lo);
        let mut p = p0.clone();
        p[i] = if p0[i] + delta <= hi {
            p0[i] + delta
        } else {
            p0[i] - delta
        };
        simplex.push(p);
    }
    simplex
}

fn order_by_score(simplex: &mut [Vec<f64>], scores: &mut [f64]) {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));
    let reordered_x: Vec<Vec<f64>> = indices.iter().map(|&i| simplex[i].clone()).collect();
    let reordered_f: Vec<f64> = indices.iter().map(|&i| scores[i]).collect();
    simplex.clone_from_slice(&reordered_x);
    scores.copy_from_slice(&reordered_f);
}

/// Minimize `f` over the box `bounds`, starting from `x0`.
///
/// Terminates when both the objective spread and the parameter spread of the
/// simplex fall below the configured tolerances, or when the iteration cap is
/// reached. Every candidate is clamped into the bounds before evaluation, so
/// `f` is never called outside the box.
pub fn minimize<F>(
    mut f: F,
    x0: &[f64],
    bounds: &[(f64, f64)],
    options: &NelderMeadOptions,
) -> AgResult<SolverOutcome>
where
    F: FnMut(&[f64]) -> AgResult<f64>,
{
    let n = x0.len();
    debug_assert!(n > 0 && bounds.len() == n);
    let max_iter = options.max_iter.unwrap_or(200 * n as u64);

    let mut simplex = initial_simplex(x0, bounds);
    let mut scores = Vec::with_capacity(n + 1);
    for point in &simplex {
        scores.push(f(point)?);
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        iterations += 1;
        order_by_score(&mut simplex, &mut scores);

        let f_spread = scores
            .iter()
            .skip(1)
            .map(|s| (s - scores[0]).abs())
            .fold(0.0_f64, f64::max);
        let x_spread = simplex
            .iter()
            .skip(1)
            .flat_map(|p| p.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        if f_spread <= options.fatol && x_spread <= options.xatol {
            converged = true;
            break;
        }

        // Centroid of all vertices but the worst.
        let mut centroid = vec![0.0; n];
        for point in simplex.iter().take(n) {
            for (c, v) in centroid.iter_mut().zip(point) {
                *c += v / n as f64;
            }
        }
        let worst = simplex[n].clone();
        let f_worst = scores[n];
        let f_best = scores[0];
        let f_second_worst = scores[n - 1];

        let mut reflected: Vec<f64> = centroid
            .iter()
            .zip(&worst)
            .map(|(c, w)| c + ALPHA * (c - w))
            .collect();
        clamp_point(&mut reflected, bounds);
        let f_reflected = f(&reflected)?;

        if f_reflected < f_best {
            let mut expanded: Vec<f64> = centroid
                .iter()
                .zip(&worst)
                .map(|(c, w)| c + GAMMA * (c - w))
                .collect();
            clamp_point(&mut expanded, bounds);
            let f_expanded = f(&expanded)?;
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                scores[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                scores[n] = f_reflected;
            }
        } else if f_reflected < f_second_worst {
            simplex[n] = reflected;
            scores[n] = f_reflected;
        } else {
            // Contract: outside toward the reflection if it improved on the
            // worst vertex, inside toward the worst otherwise.
            let (mut contracted, threshold): (Vec<f64>, f64) = if f_reflected < f_worst {
                (
                    centroid
                        .iter()
                        .zip(&reflected)
                        .map(|(c, r)| c + RHO * (r - c))
                        .collect(),
                    f_reflected,
                )
            } else {
                (
                    centroid
                        .iter()
                        .zip(&worst)
                        .map(|(c, w)| c - RHO * (c - w))
                        .collect(),
                    f_worst,
                )
            };
            clamp_point(&mut contracted, bounds);
            let f_contracted = f(&contracted)?;
            if f_contracted <= threshold {
                simplex[n] = contracted;
                scores[n] = f_contracted;
            } else {
                // Shrink every vertex toward the best.
                let best = simplex[0].clone();
                for (point, score) in simplex.iter_mut().zip(scores.iter_mut()).skip(1) {
                    for (v, b) in point.iter_mut().zip(&best) {
                        *v = b + SIGMA * (*v - b);
                    }
                    clamp_point(point, bounds);
                    *score = f(point)?;
                }
            }
        }
    }

    order_by_score(&mut simplex, &mut scores);
    Ok(SolverOutcome {
        x: simplex[0].clone(),
        fx: scores[0],
        iterations,
        converged,
    })
}
