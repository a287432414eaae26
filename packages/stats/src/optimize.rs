//! Derivative-free minimization with the Nelder-Mead simplex method.

/// Settings for [`nelder_mead`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadConfig {
    /// Maximum number of simplex iterations across all restarts.
    pub max_iterations: usize,
    /// Relative tolerance on the spread of function values.
    pub ftol: f64,
    /// Initial step as a fraction of each nonzero coordinate.
    pub relative_step: f64,
    /// Initial step for coordinates that start at zero.
    pub zero_step: f64,
    /// Number of times to rebuild the simplex around the best point after
    /// it first converges.
    pub restarts: usize,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            ftol: 1e-10,
            relative_step: 0.05,
            zero_step: 0.1,
            restarts: 1,
        }
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadResult {
    /// Best point found.
    pub point: Vec<f64>,
    /// Objective value at `point`.
    pub value: f64,
    /// Iterations used.
    pub iterations: usize,
    /// Whether the tolerance was met before the iteration cap.
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimizes `f` starting from `start`.
///
/// Non-finite objective values are treated as `+inf`, so the objective may
/// signal an infeasible point by returning `NaN`.
pub fn nelder_mead<F>(f: F, start: &[f64], config: &NelderMeadConfig) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    if start.is_empty() {
        return NelderMeadResult {
            point: Vec::new(),
            value: eval(start),
            iterations: 0,
            converged: true,
        };
    }

    let mut best = start.to_vec();
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..=config.restarts {
        let (point, used, ok) = run_simplex(&eval, &best, config, config.max_iterations - iterations);
        iterations += used;
        best = point;
        converged = ok;
        if !ok || iterations >= config.max_iterations {
            break;
        }
    }

    let value = eval(&best);
    NelderMeadResult {
        point: best,
        value,
        iterations,
        converged: converged && value.is_finite(),
    }
}

fn run_simplex<F>(
    eval: &F,
    start: &[f64],
    config: &NelderMeadConfig,
    budget: usize,
) -> (Vec<f64>, usize, bool)
where
    F: Fn(&[f64]) -> f64,
{
    let n = start.len();
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.to_vec());
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] = if vertex[i] == 0.0 {
            config.zero_step
        } else {
            vertex[i] * (1.0 + config.relative_step)
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    loop {
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let lo = values[0];
        let hi = values[n];
        let spread_ok = if hi.is_finite() {
            (hi - lo).abs() <= config.ftol * (hi.abs() + lo.abs()) + 1e-12
        } else {
            false
        };
        if spread_ok {
            return (simplex.swap_remove(0), iterations, true);
        }
        if iterations >= budget {
            return (simplex.swap_remove(0), iterations, false);
        }
        iterations += 1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / crate::linalg::usize_to_f64(n))
            .collect();
        let along = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| coef.mul_add(c - w, *c))
                .collect()
        };

        let reflected = along(REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = along(EXPAND);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let c = along(CONTRACT);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = along(-CONTRACT);
            let fc = eval(&c);
            (c, fc)
        };

        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        let best = simplex[0].clone();
        for i in 1..=n {
            simplex[i] = best
                .iter()
                .zip(&simplex[i])
                .map(|(b, v)| SHRINK.mul_add(v - b, *b))
                .collect();
            values[i] = eval(&simplex[i]);
        }
    }
}
