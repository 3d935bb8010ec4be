//! The callback contract between a problem encoding and a generic NLP
//! solver. Any interior-point or SQP engine that drives the optimization
//! talks to the problem exclusively through [`NlpProblem`].

use crate::mrf::error::MrfError;

// Problem dimensions reported by the size query. The nonzero counts are a
// contract: structure and value queries must later produce exactly as many
// entries as declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlpInfo {
    pub num_variables: usize,
    pub num_constraints: usize,
    pub nonzeros_jacobian: usize,
    pub nonzeros_hessian: usize,
}

// Outcome of an optimization run, handed to `finalize_solution` on every
// exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Succeeded,
    MaxIterationsExceeded,
    TimeLimitExceeded,
    NumericalFailure,
}

impl SolveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Succeeded)
    }
}

// Two-phase sparse matrix query: the solver first asks for the (row, col)
// pattern, then for the matching values. Both phases must enumerate entries
// in the same order. This renders the null/non-null values-pointer
// convention of C solver interfaces.
pub enum SparseTarget<'a> {
    Structure {
        rows: &'a mut [usize],
        cols: &'a mut [usize],
    },
    Values(&'a mut [f64]),
}

// The nine operations a generic NLP solver issues over one run. All buffers
// are allocated and sized by the solver; an implementation must fill each one
// exactly and must not retain references past the call. Indices are 0-based.
//
// The `new_x` flag is true when `x` changed since the previous evaluation
// callback; implementations may use it to cache intermediate results.
pub trait NlpProblem {
    // Size query
    fn nlp_info(&self) -> Result<NlpInfo, MrfError>;

    // Variable and constraint bounds; infinities mark unbounded sides
    fn bounds_info(
        &self,
        x_lower: &mut [f64],
        x_upper: &mut [f64],
        g_lower: &mut [f64],
        g_upper: &mut [f64],
    ) -> Result<(), MrfError>;

    // Initial point, strictly inside the variable bounds
    fn starting_point(&self, x: &mut [f64]) -> Result<(), MrfError>;

    // Objective value
    fn eval_f(&self, x: &[f64], new_x: bool) -> Result<f64, MrfError>;

    // Objective gradient
    fn eval_grad_f(&self, x: &[f64], new_x: bool, grad_f: &mut [f64]) -> Result<(), MrfError>;

    // Constraint values, one entry per row in declaration order
    fn eval_g(&self, x: &[f64], new_x: bool, g: &mut [f64]) -> Result<(), MrfError>;

    // Constraint Jacobian, structure or values depending on the target
    fn eval_jac_g(&self, x: &[f64], new_x: bool, target: SparseTarget) -> Result<(), MrfError>;

    // Hessian of the Lagrangian, lower triangle, structure or values
    #[allow(clippy::too_many_arguments)]
    fn eval_h(
        &self,
        x: &[f64],
        new_x: bool,
        obj_factor: f64,
        lambda: &[f64],
        new_lambda: bool,
        target: SparseTarget,
    ) -> Result<(), MrfError>;

    // Receives the final point and status, regardless of success
    fn finalize_solution(&mut self, status: SolveStatus, x: &[f64], obj_value: f64);
}
