//! Differential evolution (best1bin): the stochastic global backend.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ag_types::AgResult;

use crate::result::SolverOutcome;

/// How the initial population is spread over the search box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitStrategy {
    /// Stratified Latin-hypercube sampling: every dimension is covered evenly.
    LatinHypercube,
    /// Independent uniform sampling.
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeOptions {
    /// Generation cap.
    pub max_generations: u64,
    /// Population multiplier: the population holds `popsize * dimensions`
    /// members (at least 5).
    pub popsize: usize,
    /// Mutation factor range; dithered uniformly per generation.
    pub mutation: (f64, f64),
    /// Crossover probability.
    pub recombination: f64,
    /// Relative convergence tolerance on the population's energy spread.
    pub tol: f64,
    /// Absolute convergence tolerance.
    pub atol: f64,
    pub seed: Option<u64>,
    pub init: InitStrategy,
    /// Re-run the local solver from the best candidate afterwards.
    pub polish: bool,
    /// Worker-pool width for fanned-out evaluation; each worker needs its
    /// own model handle.
    pub workers: usize,
}

impl Default for DeOptions {
    fn default() -> Self {
        Self {
            max_generations: 1000,
            popsize: 15,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            seed: None,
            init: InitStrategy::LatinHypercube,
            polish: true,
            workers: 1,
        }
    }
}

fn latin_hypercube(np: usize, bounds: &[(f64, f64)], rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = bounds.len();
    let mut population = vec![vec![0.0; n]; np];
    for (j, &(lo, hi)) in bounds.iter().enumerate() {
        let mut column: Vec<f64> = (0..np)
            .map(|i| {
                let u: f64 = rng.random::<f64>();
                lo + (i as f64 + u) / np as f64 * (hi - lo)
            })
            .collect();
        column.shuffle(rng);
        for (member, value) in population.iter_mut().zip(column) {
            member[j] = value;
        }
    }
    population
}

fn random_init(np: usize, bounds: &[(f64, f64)], rng: &mut StdRng) -> Vec<Vec<f64>> {
    (0..np)
        .map(|_| {
            bounds
                .iter()
                .map(|&(lo, hi)| rng.random_range(lo..=hi))
                .collect()
        })
        .collect()
}

fn argmin(energies: &[f64]) -> usize {
    let mut best = 0;
    for (i, &e) in energies.iter().enumerate() {
        if e < energies[best] {
            best = i;
        }
    }
    best
}

/// Minimize over the box `bounds` with best1bin differential evolution.
///
/// `evaluate` scores a whole candidate batch at once (deferred updating), so
/// the caller may fan the batch out across a worker pool. `x0`, when given,
/// replaces the first population member so the registered start values take
/// part in generation zero.
pub fn minimize<F>(
    mut evaluate: F,
    x0: Option<&[f64]>,
    bounds: &[(f64, f64)],
    options: &DeOptions,
) -> AgResult<SolverOutcome>
where
    F: FnMut(&[Vec<f64>]) -> AgResult<Vec<f64>>,
{
    let n = bounds.len();
    debug_assert!(n > 0);
    let np = (options.popsize * n).max(5);
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut population = match options.init {
        InitStrategy::LatinHypercube => latin_hypercube(np, bounds, &mut rng),
        InitStrategy::Random => random_init(np, bounds, &mut rng),
    };
    if let Some(start) = x0 {
        let clamped: Vec<f64> = start
            .iter()
            .zip(bounds)
            .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
            .collect();
        population[0] = clamped;
    }
    let mut energies = evaluate(&population)?;
    let mut best = argmin(&energies);

    let mut generations = 0;
    let mut converged = false;

    for generation in 1..=options.max_generations {
        generations = generation;

        // Dithered mutation factor, fixed when the range is degenerate.
        let (m_lo, m_hi) = options.mutation;
        let f = if m_lo < m_hi {
            rng.random_range(m_lo..m_hi)
        } else {
            m_lo
        };

        let mut trials = Vec::with_capacity(np);
        for i in 0..np {
            let r1 = loop {
                let r = rng.random_range(0..np);
                if r != i {
                    break r;
                }
            };
            let r2 = loop {
                let r = rng.random_range(0..np);
                if r != i && r != r1 {
                    break r;
                }
            };

            let j_rand = rng.random_range(0..n);
            let mut trial = population[i].clone();
            for j in 0..n {
                if j == j_rand || rng.random::<f64>() < options.recombination {
                    let v = population[best][j] + f * (population[r1][j] - population[r2][j]);
                    trial[j] = v.clamp(bounds[j].0, bounds[j].1);
                }
            }
            trials.push(trial);
        }

        // Deferred updating: the whole trial batch is scored before selection.
        let trial_energies = evaluate(&trials)?;
        for (i, trial) in trials.into_iter().enumerate() {
            if trial_energies[i] <= energies[i] {
                population[i] = trial;
                energies[i] = trial_energies[i];
            }
        }
        best = argmin(&energies);

        let mean = energies.iter().sum::<f64>() / np as f64;
        let std = (energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / np as f64).sqrt();
        debug!(
            generation,
            best_energy = energies[best],
            spread = std,
            "de generation complete"
        );
        if std <= options.atol + options.tol * mean.abs() {
            converged = true;
            break;
        }
    }

    Ok(SolverOutcome {
        x: population[best].clone(),
        fx: energies[best],
        iterations: generations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> DeOptions {
        DeOptions {
            seed: Some(seed),
            ..Default::default()
        }
    }

    fn batch<F: Fn(&[f64]) -> f64>(
        f: F,
    ) -> impl FnMut(&[Vec<f64>]) -> AgResult<Vec<f64>> {
        move |xs| Ok(xs.iter().map(|x| f(x)).collect())
    }

    #[test]
    fn converges_on_a_shifted_parabola() {
        let options = DeOptions {
            max_generations: 300,
            ..seeded(42)
        };
        let outcome = minimize(
            batch(|x| (x[0] - 7.0).powi(2)),
            Some(&[5.0]),
            &[(0.0, 10.0)],
            &options,
        )
        .unwrap();
        assert!(outcome.converged);
        assert!((outcome.x[0] - 7.0).abs() < 1e-2, "x = {}", outcome.x[0]);
    }

    #[test]
    fn converges_on_a_2d_sphere_with_random_init() {
        let options = DeOptions {
            max_generations: 500,
            init: InitStrategy::Random,
            ..seeded(7)
        };
        let outcome = minimize(
            batch(|x| x.iter().map(|v| v * v).sum()),
            None,
            &[(-5.0, 5.0), (-5.0, 5.0)],
            &options,
        )
        .unwrap();
        assert!(outcome.fx < 1e-2, "fx = {}", outcome.fx);
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let options = seeded(1234);
        let run = || {
            minimize(
                batch(|x| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2)),
                None,
                &[(-10.0, 10.0), (-10.0, 10.0)],
                &options,
            )
            .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.x, b.x);
        assert_eq!(a.fx, b.fx);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn candidates_stay_inside_the_bounds() {
        let bounds = [(0.0, 1.0), (10.0, 20.0)];
        let options = DeOptions {
            max_generations: 30,
            ..seeded(9)
        };
        minimize(
            |xs: &[Vec<f64>]| {
                for x in xs {
                    assert!((0.0..=1.0).contains(&x[0]), "escaped: {}", x[0]);
                    assert!((10.0..=20.0).contains(&x[1]), "escaped: {}", x[1]);
                }
                Ok(xs.iter().map(|x| x[0] + x[1]).collect())
            },
            None,
            &bounds,
            &options,
        )
        .unwrap();
    }

    #[test]
    fn zero_tolerance_exhausts_the_generation_budget() {
        let options = DeOptions {
            max_generations: 10,
            tol: 0.0,
            atol: 0.0,
            ..seeded(5)
        };
        // Noisy-free but never collapsing to zero spread within 10 generations.
        let outcome = minimize(
            batch(|x| (x[0] - 0.3).powi(2)),
            None,
            &[(-100.0, 100.0)],
            &options,
        )
        .unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 10);
    }

    #[test]
    fn start_values_join_the_initial_population() {
        let mut first_batch_seen = None;
        let options = DeOptions {
            max_generations: 1,
            ..seeded(3)
        };
        minimize(
            |xs: &[Vec<f64>]| {
                if first_batch_seen.is_none() {
                    first_batch_seen = Some(xs[0].clone());
                }
                Ok(xs.iter().map(|x| x[0]).collect())
            },
            Some(&[0.25]),
            &[(0.0, 1.0)],
            &options,
        )
        .unwrap();
        assert_eq!(first_batch_seen, Some(vec![0.25]));
    }

    #[test]
    fn latin_hypercube_strata_cover_every_dimension() {
        let mut rng = StdRng::seed_from_u64(11);
        let np = 8;
        let bounds = [(0.0, 8.0), (-4.0, 4.0)];
        let population = latin_hypercube(np, &bounds, &mut rng);
        for (j, &(lo, hi)) in bounds.iter().enumerate() {
            let width = (hi - lo) / np as f64;
            let mut strata: Vec<usize> = population
                .iter()
                .map(|m| (((m[j] - lo) / width) as usize).min(np - 1))
                .collect();
            strata.sort_unstable();
            // One member per stratum.
            assert_eq!(strata, (0..np).collect::<Vec<_>>());
        }
    }
}
