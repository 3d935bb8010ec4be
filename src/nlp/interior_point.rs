//! Bundled interior-point NLP engine.
//!
//! A log-barrier method driven entirely through the [`NlpProblem`] callback
//! contract: inequality structure (variable bounds and one-sided constraint
//! rows, the latter via slack variables) is kept strictly feasible by
//! logarithmic barriers, equality rows enter a dense Newton KKT system, and
//! the barrier parameter is annealed toward zero.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ndarray::{Array1, Array2};

use crate::mrf::error::MrfError;
use crate::nlp::dense;
use crate::nlp::problem::{NlpInfo, NlpProblem, SolveStatus, SparseTarget};

// Sense of the optimization. For `Maximize` the solver descends on -f and
// hands -1 to the Hessian callback as `obj_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct SolverOptions {
    max_iterations: usize,
    time_max: Duration,
    eps: f64,
    mu_init: f64,
    mu_shrink: f64,
    goal: Goal,
    num_threads: usize,
}

impl SolverOptions {
    pub fn default() -> Self {
        SolverOptions {
            max_iterations: 1000,
            time_max: Duration::new(60, 0),
            eps: 1e-8,
            mu_init: 0.1,
            mu_shrink: 0.2,
            goal: Goal::Minimize,
            num_threads: 1,
        }
    }

    pub fn set_max_iterations(&mut self, value: usize) -> &mut Self {
        self.max_iterations = value;
        self
    }

    pub fn set_time_max(&mut self, value: Duration) -> &mut Self {
        self.time_max = value;
        self
    }

    pub fn set_eps(&mut self, value: f64) -> &mut Self {
        self.eps = value;
        self
    }

    pub fn set_mu_init(&mut self, value: f64) -> &mut Self {
        self.mu_init = value;
        self
    }

    pub fn set_mu_shrink(&mut self, value: f64) -> &mut Self {
        self.mu_shrink = value;
        self
    }

    pub fn set_goal(&mut self, value: Goal) -> &mut Self {
        self.goal = value;
        self
    }

    // Advisory only: the bundled engine is single-threaded, the value is
    // recorded for solvers that parallelize their linear algebra
    pub fn set_num_threads(&mut self, value: usize) -> &mut Self {
        self.num_threads = value;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn time_max(&self) -> Duration {
        self.time_max
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn mu_init(&self) -> f64 {
        self.mu_init
    }

    pub fn mu_shrink(&self) -> f64 {
        self.mu_shrink
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

// One-sided bound on an augmented variable, kept strictly feasible by a
// logarithmic barrier
#[derive(Debug, Clone, Copy)]
enum Face {
    Lower(usize, f64),
    Upper(usize, f64),
}

impl Face {
    fn index(&self) -> usize {
        match *self {
            Face::Lower(index, _) | Face::Upper(index, _) => index,
        }
    }

    // Distance from the bound, positive inside the feasible side
    fn slack(&self, z: &[f64]) -> f64 {
        match *self {
            Face::Lower(index, bound) => z[index] - bound,
            Face::Upper(index, bound) => bound - z[index],
        }
    }

    // Derivative of the slack with respect to the variable
    fn direction(&self) -> f64 {
        match *self {
            Face::Lower(..) => 1.0,
            Face::Upper(..) => -1.0,
        }
    }
}

// A constraint row that participates in the KKT system. Equality rows keep
// their right-hand side; one-sided or interval rows are rewritten as
// g_j(x) - s = 0 with a bounded slack variable s.
#[derive(Debug, Clone, Copy)]
struct UsedRow {
    row: usize,
    slack: Option<usize>,
    target: f64,
}

fn interior_clamp(value: f64, lower: f64, upper: f64) -> f64 {
    let margin = if lower.is_finite() && upper.is_finite() {
        1e-3_f64.min(0.25 * (upper - lower))
    } else {
        1e-3
    };
    let mut clamped = value;
    if lower.is_finite() && clamped < lower + margin {
        clamped = lower + margin;
    }
    if upper.is_finite() && clamped > upper - margin {
        clamped = upper - margin;
    }
    clamped
}

pub struct InteriorPoint<'a> {
    problem: &'a mut dyn NlpProblem,
    info: NlpInfo,
    jac_rows: Vec<usize>,
    jac_cols: Vec<usize>,
    hess_rows: Vec<usize>,
    hess_cols: Vec<usize>,
    used_rows: Vec<UsedRow>,
    faces: Vec<Face>,
    num_augmented: usize,
    z: Vec<f64>, // current iterate: problem variables, then slacks
}

impl<'a> InteriorPoint<'a> {
    // Performs the size, bounds, starting-point, and structure queries and
    // sets up the augmented variable space.
    pub fn init(problem: &'a mut dyn NlpProblem) -> Result<Self, MrfError> {
        let info = problem.nlp_info()?;
        let n = info.num_variables;
        let m = info.num_constraints;
        debug!("Initializing interior-point solver for {:?}", info);

        let mut x_lower = vec![f64::NEG_INFINITY; n];
        let mut x_upper = vec![f64::INFINITY; n];
        let mut g_lower = vec![f64::NEG_INFINITY; m];
        let mut g_upper = vec![f64::INFINITY; m];
        problem.bounds_info(&mut x_lower, &mut x_upper, &mut g_lower, &mut g_upper)?;

        let mut x = vec![0.0; n];
        problem.starting_point(&mut x)?;

        // Sparsity structure is queried once; values are queried per iteration
        let mut jac_rows = vec![0; info.nonzeros_jacobian];
        let mut jac_cols = vec![0; info.nonzeros_jacobian];
        problem.eval_jac_g(
            &x,
            true,
            SparseTarget::Structure {
                rows: &mut jac_rows,
                cols: &mut jac_cols,
            },
        )?;
        let mut hess_rows = vec![0; info.nonzeros_hessian];
        let mut hess_cols = vec![0; info.nonzeros_hessian];
        problem.eval_h(
            &x,
            false,
            1.0,
            &vec![0.0; m],
            false,
            SparseTarget::Structure {
                rows: &mut hess_rows,
                cols: &mut hess_cols,
            },
        )?;

        // Classify constraint rows
        let mut used_rows = Vec::new();
        let mut slack_bounds = Vec::new();
        let mut num_augmented = n;
        for row in 0..m {
            let (lower, upper) = (g_lower[row], g_upper[row]);
            if lower.is_finite() && lower == upper {
                used_rows.push(UsedRow {
                    row,
                    slack: None,
                    target: lower,
                });
            } else if lower.is_finite() || upper.is_finite() {
                used_rows.push(UsedRow {
                    row,
                    slack: Some(num_augmented),
                    target: 0.0,
                });
                slack_bounds.push((lower, upper));
                num_augmented += 1;
            }
            // Rows unbounded on both sides impose nothing
        }

        // Strictly interior start for the variables, then for the slacks
        let mut z = Vec::with_capacity(num_augmented);
        for i in 0..n {
            z.push(interior_clamp(x[i], x_lower[i], x_upper[i]));
        }
        let mut g0 = vec![0.0; m];
        problem.eval_g(&z[..n], true, &mut g0)?;
        for (used, &(lower, upper)) in used_rows
            .iter()
            .filter(|used| used.slack.is_some())
            .zip(slack_bounds.iter())
        {
            z.push(interior_clamp(g0[used.row], lower, upper));
        }

        // Barrier faces for every finite bound side
        let mut faces = Vec::new();
        for i in 0..n {
            if x_lower[i].is_finite() {
                faces.push(Face::Lower(i, x_lower[i]));
            }
            if x_upper[i].is_finite() {
                faces.push(Face::Upper(i, x_upper[i]));
            }
        }
        for (offset, &(lower, upper)) in slack_bounds.iter().enumerate() {
            if lower.is_finite() {
                faces.push(Face::Lower(n + offset, lower));
            }
            if upper.is_finite() {
                faces.push(Face::Upper(n + offset, upper));
            }
        }

        Ok(InteriorPoint {
            problem,
            info,
            jac_rows,
            jac_cols,
            hess_rows,
            hess_cols,
            used_rows,
            faces,
            num_augmented,
            z,
        })
    }

    // Runs the optimization to completion. `finalize_solution` is invoked on
    // every exit path, including callback failures.
    pub fn run(mut self, options: &SolverOptions) -> Result<SolveStatus, MrfError> {
        if options.num_threads() > 1 {
            info!(
                "num_threads = {} is advisory; the bundled solver runs single-threaded.",
                options.num_threads()
            );
        }

        let outcome = self.run_inner(options);
        let status = match &outcome {
            Ok(status) => *status,
            Err(_) => SolveStatus::NumericalFailure,
        };

        let n = self.info.num_variables;
        let obj_value = self
            .problem
            .eval_f(&self.z[..n], true)
            .unwrap_or(f64::NAN);
        self.problem
            .finalize_solution(status, &self.z[..n], obj_value);
        outcome
    }

    fn run_inner(&mut self, options: &SolverOptions) -> Result<SolveStatus, MrfError> {
        let n = self.info.num_variables;
        let m = self.info.num_constraints;
        let nt = self.num_augmented;
        let p = self.used_rows.len();
        if nt == 0 {
            return Ok(SolveStatus::Succeeded);
        }
        let sigma = match options.goal() {
            Goal::Minimize => 1.0,
            Goal::Maximize => -1.0,
        };

        let time_start = Instant::now();
        let mu_min = (0.1 * options.eps()).min(1e-9);
        let mut mu = options.mu_init().max(mu_min);
        let mut lambda = vec![0.0; m];
        let mut iteration = 0;

        let mut grad = vec![0.0; n];
        let mut g = vec![0.0; m];
        let mut jac_vals = vec![0.0; self.info.nonzeros_jacobian];
        let mut hess_vals = vec![0.0; self.info.nonzeros_hessian];
        let mut z_trial = vec![0.0; nt];
        let mut g_trial = vec![0.0; m];

        self.problem.eval_g(&self.z[..n], false, &mut g)?;

        loop {
            // Newton iterations for the current barrier parameter
            let converged = loop {
                if iteration >= options.max_iterations() {
                    info!("Maximum number of iterations reached. Interrupting.");
                    return Ok(SolveStatus::MaxIterationsExceeded);
                }
                if time_start.elapsed() >= options.time_max() {
                    info!("Time limit reached. Interrupting.");
                    return Ok(SolveStatus::TimeLimitExceeded);
                }
                iteration += 1;

                self.problem.eval_grad_f(&self.z[..n], false, &mut grad)?;
                self.problem
                    .eval_jac_g(&self.z[..n], false, SparseTarget::Values(&mut jac_vals))?;
                self.problem.eval_h(
                    &self.z[..n],
                    false,
                    sigma,
                    &lambda,
                    true,
                    SparseTarget::Values(&mut hess_vals),
                )?;

                // Assemble the KKT system over variables, slacks, multipliers
                let dim = nt + p;
                let mut kkt = Array2::<f64>::zeros((dim, dim));
                let mut rhs = Array1::<f64>::zeros(dim);

                for (k, (&row, &col)) in
                    self.hess_rows.iter().zip(self.hess_cols.iter()).enumerate()
                {
                    kkt[[row, col]] += hess_vals[k];
                    if row != col {
                        kkt[[col, row]] += hess_vals[k];
                    }
                }
                for i in 0..n {
                    rhs[i] = -sigma * grad[i];
                }

                for face in &self.faces {
                    let slack = face.slack(&self.z).max(1e-300);
                    let index = face.index();
                    rhs[index] += face.direction() * mu / slack;
                    kkt[[index, index]] += mu / (slack * slack);
                }

                let mut res_inf: f64 = 0.0;
                for (e, used) in self.used_rows.iter().enumerate() {
                    let multiplier_col = nt + e;
                    for (k, (&row, &col)) in
                        self.jac_rows.iter().zip(self.jac_cols.iter()).enumerate()
                    {
                        if row == used.row {
                            kkt[[multiplier_col, col]] += jac_vals[k];
                            kkt[[col, multiplier_col]] += jac_vals[k];
                        }
                    }
                    let residual = match used.slack {
                        Some(slack_index) => {
                            kkt[[multiplier_col, slack_index]] = -1.0;
                            kkt[[slack_index, multiplier_col]] = -1.0;
                            g[used.row] - self.z[slack_index]
                        }
                        None => g[used.row] - used.target,
                    };
                    rhs[multiplier_col] = -residual;
                    res_inf = res_inf.max(residual.abs());
                }

                // Solve, regularizing the diagonal on degeneracy
                let mut step = None;
                let mut reg = 0.0;
                for _ in 0..6 {
                    let mut system = kkt.clone();
                    if reg > 0.0 {
                        for i in 0..nt {
                            system[[i, i]] += reg;
                        }
                        for e in 0..p {
                            system[[nt + e, nt + e]] -= reg;
                        }
                    }
                    if let Some(solution) = dense::solve(system, rhs.clone()) {
                        step = Some(solution);
                        break;
                    }
                    reg = if reg == 0.0 { 1e-10 } else { reg * 100.0 };
                }
                let step = match step {
                    Some(step) => step,
                    None => {
                        warn!("KKT system is singular beyond regularization. Interrupting.");
                        return Ok(SolveStatus::NumericalFailure);
                    }
                };

                // Multiplier estimates, handed back through the Hessian callback
                for (e, used) in self.used_rows.iter().enumerate() {
                    lambda[used.row] = step[nt + e];
                }

                let step_norm = (0..nt).map(|i| step[i].abs()).fold(0.0f64, f64::max);
                debug!(
                    "Iteration {}. Elapsed time {:?}. mu {:.3e}. Step norm {:.3e}. Residual {:.3e}.",
                    iteration,
                    time_start.elapsed(),
                    mu,
                    step_norm,
                    res_inf
                );

                let tol_inner = options.eps().max(0.1 * mu);
                if step_norm < tol_inner && res_inf < tol_inner {
                    break step_norm < options.eps() && res_inf < options.eps();
                }

                // Fraction-to-boundary rule keeps every face strictly feasible
                let mut alpha_max = f64::INFINITY;
                for face in &self.faces {
                    let derivative = face.direction() * step[face.index()];
                    if derivative < 0.0 {
                        alpha_max = alpha_max.min(-face.slack(&self.z) / derivative);
                    }
                }
                let mut alpha = (0.995 * alpha_max).min(1.0);

                // Backtracking on a barrier + residual merit function
                let nu = 10.0 * (lambda.iter().fold(0.0f64, |acc, l| acc.max(l.abs())) + 1.0);
                let f_old = self.problem.eval_f(&self.z[..n], false)?;
                let merit_old = self.merit_value(sigma * f_old, mu, nu, &self.z, &g);

                let mut accepted = false;
                for _ in 0..40 {
                    for i in 0..nt {
                        z_trial[i] = self.z[i] + alpha * step[i];
                    }
                    let f_trial = self.problem.eval_f(&z_trial[..n], true)?;
                    self.problem.eval_g(&z_trial[..n], false, &mut g_trial)?;
                    let merit_new = self.merit_value(sigma * f_trial, mu, nu, &z_trial, &g_trial);
                    if merit_new < merit_old {
                        accepted = true;
                        break;
                    }
                    alpha *= 0.5;
                }
                if !accepted {
                    debug!("Line search stalled at alpha {:.3e}; accepting the step.", alpha);
                }
                self.z.copy_from_slice(&z_trial);
                g.copy_from_slice(&g_trial);
            };

            if converged && mu <= mu_min {
                info!(
                    "Converged after {} iterations at barrier parameter {:.3e}.",
                    iteration, mu
                );
                return Ok(SolveStatus::Succeeded);
            }
            mu = (mu * options.mu_shrink()).max(mu_min);
        }
    }

    // Barrier objective plus an l1 penalty on the KKT row residuals
    fn merit_value(&self, scaled_obj: f64, mu: f64, nu: f64, z: &[f64], g: &[f64]) -> f64 {
        let mut value = scaled_obj;
        for face in &self.faces {
            let slack = face.slack(z);
            if slack <= 0.0 {
                return f64::INFINITY;
            }
            value -= mu * slack.ln();
        }
        for used in &self.used_rows {
            let residual = match used.slack {
                Some(slack_index) => g[used.row] - z[slack_index],
                None => g[used.row] - used.target,
            };
            value += nu * residual.abs();
        }
        value
    }
}
