//! Host-facing model of a binary Markov random field with single-site
//! potentials and sparse linear constraints over the relaxed marginals.
//!
//! Potentials are stored in a canonical form: each variable keeps one
//! coefficient theta_i, the score difference between its two states, plus an
//! additive offset that is independent of the assignment. Inference maximizes
//! the entropy-regularized relaxation of the resulting score through the
//! bundled interior-point solver.

use log::{debug, info};

use crate::mrf::constraint::{LinearConstraint, Relation};
use crate::mrf::error::MrfError;
use crate::mrf::marginals::Marginals;
use crate::nlp::entropy_relaxation::EntropyRelaxation;
use crate::nlp::interior_point::{Goal, InteriorPoint, SolverOptions};
use crate::nlp::problem::SolveStatus;

pub struct MarkovRandomField {
    num_variables: usize,
    declared_constraints: usize,
    theta: Vec<f64>,
    offsets: Vec<f64>,
    constraints: Vec<LinearConstraint>,
    marginals: Option<Marginals>,
    last_status: Option<SolveStatus>,
}

impl MarkovRandomField {
    // Creates an empty field over `num_variables` binary variables that
    // commits to exactly `num_constraints` linear constraint rows. The count
    // is verified when inference starts.
    pub fn new(num_variables: usize, num_constraints: usize) -> Self {
        MarkovRandomField {
            num_variables,
            declared_constraints: num_constraints,
            theta: vec![0.0; num_variables],
            offsets: vec![0.0; num_variables],
            constraints: Vec::with_capacity(num_constraints),
            marginals: None,
            last_status: None,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    // Score contribution that no assignment can change, accumulated from the
    // state-independent part of each single-site potential
    pub fn constant_term(&self) -> f64 {
        self.offsets.iter().sum()
    }

    pub fn last_status(&self) -> Option<SolveStatus> {
        self.last_status
    }

    fn check_node(&self, node: usize) -> Result<(), MrfError> {
        if node >= self.num_variables {
            return Err(MrfError::IndexOutOfRange {
                index: node,
                limit: self.num_variables,
            });
        }
        Ok(())
    }

    // Sets the potential of a single variable, replacing any previously set
    // values for that variable. Only the difference of the two state values
    // influences the marginals; the common part moves to the constant term.
    pub fn set_single_site_potential(
        &mut self,
        node: usize,
        value_state0: f64,
        value_state1: f64,
    ) -> Result<(), MrfError> {
        self.check_node(node)?;
        self.theta[node] = value_state1 - value_state0;
        self.offsets[node] = value_state0.min(value_state1);
        Ok(())
    }

    // The entropy relaxation factorizes over variables; potentials coupling
    // two variables have no encoding in it.
    pub fn set_pairwise_potential(
        &mut self,
        first: usize,
        second: usize,
        _values: &[f64; 4],
    ) -> Result<(), MrfError> {
        self.check_node(first)?;
        self.check_node(second)?;
        Err(MrfError::UnsupportedFactorDegree(2))
    }

    pub fn set_higher_order_factor(
        &mut self,
        nodes: &[usize],
        _values: &[f64],
    ) -> Result<(), MrfError> {
        for &node in nodes {
            self.check_node(node)?;
        }
        Err(MrfError::UnsupportedFactorDegree(nodes.len()))
    }

    // Convenience layer over single-site potentials: each coefficient c_i is
    // the score of variable i taking state 1, with state 0 scoring zero.
    pub fn set_objective(
        &mut self,
        variables: &[usize],
        coefficients: &[f64],
    ) -> Result<(), MrfError> {
        if variables.len() != coefficients.len() {
            return Err(MrfError::ConstraintShapeMismatch {
                variables: variables.len(),
                coefficients: coefficients.len(),
            });
        }
        for (&node, &coef) in variables.iter().zip(coefficients.iter()) {
            self.set_single_site_potential(node, 0.0, coef)?;
        }
        Ok(())
    }

    // Adds one sparse linear row over the relaxed marginals. Rows keep their
    // declaration order; the count against the declared total is checked at
    // inference time, not here.
    pub fn add_linear_constraint(
        &mut self,
        variables: Vec<usize>,
        coefficients: Vec<f64>,
        relation: Relation,
        bound: f64,
    ) -> Result<(), MrfError> {
        if variables.len() != coefficients.len() {
            return Err(MrfError::ConstraintShapeMismatch {
                variables: variables.len(),
                coefficients: coefficients.len(),
            });
        }
        for &node in &variables {
            self.check_node(node)?;
        }
        self.constraints
            .push(LinearConstraint::new(variables, coefficients, relation, bound));
        Ok(())
    }

    pub fn infer_marginals(&mut self, num_threads: usize) -> Result<(), MrfError> {
        let mut options = SolverOptions::default();
        options.set_num_threads(num_threads);
        self.infer_marginals_with_options(&options)
    }

    // Runs the entropy-regularized relaxation to convergence. On success the
    // marginals are stored for the accessors below; on failure any marginals
    // from an earlier successful run are kept.
    pub fn infer_marginals_with_options(
        &mut self,
        options: &SolverOptions,
    ) -> Result<(), MrfError> {
        // The relaxed objective is a concave score and is always maximized,
        // whatever sense the caller left in the options
        let mut options = options.clone();
        options.set_goal(Goal::Maximize);

        info!(
            "Starting marginal inference over {} variables and {} constraints",
            self.num_variables,
            self.constraints.len()
        );
        let mut relaxation =
            EntropyRelaxation::new(&self.theta, &self.constraints, self.declared_constraints);
        let solver = InteriorPoint::init(&mut relaxation)?;
        let status = solver.run(&options)?;
        let (_, marginals) = relaxation.into_result();

        self.last_status = Some(status);
        debug!("Inference finished with status {:?}", status);
        match marginals {
            Some(marginals) => {
                self.marginals = Some(marginals);
                Ok(())
            }
            None => Err(MrfError::SolverDidNotConverge(status)),
        }
    }

    fn solved_marginals(&self) -> Result<&Marginals, MrfError> {
        self.marginals.as_ref().ok_or(MrfError::NotYetSolved)
    }

    // Probability of `node` taking `state` in the last successful run
    pub fn get_marginal(&self, node: usize, state: usize) -> Result<f64, MrfError> {
        self.solved_marginals()?.get(node, state)
    }

    // More probable state of `node`; an exact tie resolves to state 1
    pub fn get_state(&self, node: usize) -> Result<usize, MrfError> {
        self.solved_marginals()?.state(node)
    }

    pub fn marginals(&self) -> Result<&Marginals, MrfError> {
        self.solved_marginals()
    }
}
