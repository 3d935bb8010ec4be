//! NLP encoding of the entropy-regularized marginal relaxation.
//!
//! Each binary variable is relaxed to x_i in [0, 1], read as P(variable = 1).
//! The objective maximizes the single-site score plus the binary entropy of
//! the relaxed marginal:
//!
//!   f(x) = sum_i [ theta_i x_i - x_i ln x_i - (1 - x_i) ln(1 - x_i) ]
//!
//! The entropy term pulls solutions away from the 0/1 boundary toward
//! calibrated probabilities; the linear term breaks the tie in the sign
//! direction of theta. Linear constraints pass through unchanged.

use log::{debug, info};

use crate::mrf::constraint::LinearConstraint;
use crate::mrf::error::MrfError;
use crate::mrf::marginals::Marginals;
use crate::nlp::problem::{NlpInfo, NlpProblem, SolveStatus, SparseTarget};

// The logs in the objective are undefined at the bounds; evaluations clamp
// strictly inside (0, 1).
const INTERIOR_EPS: f64 = 1e-12;

fn interior(x: f64) -> f64 {
    x.clamp(INTERIOR_EPS, 1.0 - INTERIOR_EPS)
}

fn check_len(expected: usize, actual: usize) -> Result<(), MrfError> {
    if expected != actual {
        return Err(MrfError::BufferSizeMismatch { expected, actual });
    }
    Ok(())
}

pub struct EntropyRelaxation<'a> {
    theta: &'a [f64],
    constraints: &'a [LinearConstraint],
    declared_constraints: usize,
    status: Option<SolveStatus>,
    marginals: Option<Marginals>,
}

impl<'a> EntropyRelaxation<'a> {
    pub fn new(
        theta: &'a [f64],
        constraints: &'a [LinearConstraint],
        declared_constraints: usize,
    ) -> Self {
        EntropyRelaxation {
            theta,
            constraints,
            declared_constraints,
            status: None,
            marginals: None,
        }
    }

    fn num_variables(&self) -> usize {
        self.theta.len()
    }

    fn nonzeros_jacobian(&self) -> usize {
        self.constraints.iter().map(|row| row.len()).sum()
    }

    // Single enumeration of Jacobian entries as (row, col, coefficient)
    // triples. Both the structure and the value phase walk this iterator, so
    // the two orders agree by construction.
    fn jacobian_entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.constraints
            .iter()
            .enumerate()
            .flat_map(|(row, constraint)| {
                constraint.terms().map(move |(col, coef)| (row, col, coef))
            })
    }

    // Consumes the adapter after a run and yields the recorded status and,
    // on success, the marginals.
    pub fn into_result(self) -> (Option<SolveStatus>, Option<Marginals>) {
        (self.status, self.marginals)
    }
}

impl NlpProblem for EntropyRelaxation<'_> {
    fn nlp_info(&self) -> Result<NlpInfo, MrfError> {
        if self.constraints.len() != self.declared_constraints {
            return Err(MrfError::ConstraintCountMismatch {
                declared: self.declared_constraints,
                added: self.constraints.len(),
            });
        }
        let info = NlpInfo {
            num_variables: self.num_variables(),
            num_constraints: self.declared_constraints,
            nonzeros_jacobian: self.nonzeros_jacobian(),
            // The objective separates per variable and the constraints are
            // linear, so the Hessian is diagonal.
            nonzeros_hessian: self.num_variables(),
        };
        debug!("Size query: {:?}", info);
        Ok(info)
    }

    fn bounds_info(
        &self,
        x_lower: &mut [f64],
        x_upper: &mut [f64],
        g_lower: &mut [f64],
        g_upper: &mut [f64],
    ) -> Result<(), MrfError> {
        check_len(self.num_variables(), x_lower.len())?;
        check_len(self.num_variables(), x_upper.len())?;
        check_len(self.constraints.len(), g_lower.len())?;
        check_len(self.constraints.len(), g_upper.len())?;

        // The variables are marginal probabilities
        x_lower.fill(0.0);
        x_upper.fill(1.0);

        for (row, constraint) in self.constraints.iter().enumerate() {
            let (lower, upper) = constraint.relation().bounds(constraint.bound());
            g_lower[row] = lower;
            g_upper[row] = upper;
        }
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64]) -> Result<(), MrfError> {
        check_len(self.num_variables(), x.len())?;
        // Maximum-entropy point, strictly interior as the log terms require
        x.fill(0.5);
        Ok(())
    }

    fn eval_f(&self, x: &[f64], _new_x: bool) -> Result<f64, MrfError> {
        check_len(self.num_variables(), x.len())?;
        let value = self
            .theta
            .iter()
            .zip(x.iter())
            .map(|(&theta_i, &x_i)| {
                let x_i = interior(x_i);
                theta_i * x_i - x_i * x_i.ln() - (1.0 - x_i) * (1.0 - x_i).ln()
            })
            .sum();
        Ok(value)
    }

    fn eval_grad_f(&self, x: &[f64], _new_x: bool, grad_f: &mut [f64]) -> Result<(), MrfError> {
        check_len(self.num_variables(), x.len())?;
        check_len(self.num_variables(), grad_f.len())?;
        for (i, slot) in grad_f.iter_mut().enumerate() {
            let x_i = interior(x[i]);
            *slot = self.theta[i] - x_i.ln() + (1.0 - x_i).ln();
        }
        Ok(())
    }

    fn eval_g(&self, x: &[f64], _new_x: bool, g: &mut [f64]) -> Result<(), MrfError> {
        check_len(self.constraints.len(), g.len())?;
        for (row, constraint) in self.constraints.iter().enumerate() {
            g[row] = constraint.value(x);
        }
        Ok(())
    }

    fn eval_jac_g(&self, _x: &[f64], _new_x: bool, target: SparseTarget) -> Result<(), MrfError> {
        let nonzeros = self.nonzeros_jacobian();
        match target {
            SparseTarget::Structure { rows, cols } => {
                check_len(nonzeros, rows.len())?;
                check_len(nonzeros, cols.len())?;
                for (k, (row, col, _)) in self.jacobian_entries().enumerate() {
                    rows[k] = row;
                    cols[k] = col;
                }
            }
            SparseTarget::Values(values) => {
                check_len(nonzeros, values.len())?;
                for (k, (_, _, coef)) in self.jacobian_entries().enumerate() {
                    values[k] = coef;
                }
            }
        }
        Ok(())
    }

    fn eval_h(
        &self,
        x: &[f64],
        _new_x: bool,
        obj_factor: f64,
        _lambda: &[f64],
        _new_lambda: bool,
        target: SparseTarget,
    ) -> Result<(), MrfError> {
        let n = self.num_variables();
        match target {
            SparseTarget::Structure { rows, cols } => {
                check_len(n, rows.len())?;
                check_len(n, cols.len())?;
                for i in 0..n {
                    rows[i] = i;
                    cols[i] = i;
                }
            }
            SparseTarget::Values(values) => {
                check_len(n, values.len())?;
                check_len(n, x.len())?;
                // Second derivative of the entropy term only: the linear
                // objective part and the linear constraints contribute zero,
                // so the multipliers never enter this diagonal.
                for (i, slot) in values.iter_mut().enumerate() {
                    let x_i = interior(x[i]);
                    *slot = obj_factor * (-1.0 / x_i - 1.0 / (1.0 - x_i));
                }
            }
        }
        Ok(())
    }

    fn finalize_solution(&mut self, status: SolveStatus, x: &[f64], obj_value: f64) {
        info!(
            "Finalizing solution with status {:?}, objective {}",
            status, obj_value
        );
        self.status = Some(status);
        if status.is_success() {
            self.marginals = Some(Marginals::from_relaxed(x));
        }
    }
}
