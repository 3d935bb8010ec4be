//! Approximate marginal inference for binary Markov Random Fields via an
//! entropy-regularized continuous relaxation, solved through a generic
//! nonlinear-programming callback contract.

pub mod mrf {
    pub mod constraint;
    pub mod error;
    pub mod marginals;
    pub mod markov_random_field;
}

pub mod nlp {
    pub mod dense;
    pub mod entropy_relaxation;
    pub mod interior_point;
    pub mod problem;
}

pub use mrf::constraint::{LinearConstraint, Relation};
pub use mrf::error::MrfError;
pub use mrf::marginals::Marginals;
pub use mrf::markov_random_field::MarkovRandomField;
pub use nlp::entropy_relaxation::EntropyRelaxation;
pub use nlp::interior_point::{Goal, InteriorPoint, SolverOptions};
pub use nlp::problem::{NlpInfo, NlpProblem, SolveStatus, SparseTarget};
