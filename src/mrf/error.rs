//! Error taxonomy for problem construction, the solver callback contract,
//! and result accessors.

use thiserror::Error;

use crate::nlp::problem::SolveStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MrfError {
    #[error("factors of degree {0} are not supported by the entropy relaxation")]
    UnsupportedFactorDegree(usize),

    #[error("{declared} constraints were declared but {added} were added")]
    ConstraintCountMismatch { declared: usize, added: usize },

    #[error("{variables} variable indices were given with {coefficients} coefficients")]
    ConstraintShapeMismatch {
        variables: usize,
        coefficients: usize,
    },

    #[error("index {index} is out of range 0..{limit}")]
    IndexOutOfRange { index: usize, limit: usize },

    #[error("marginals were requested before a successful inference run")]
    NotYetSolved,

    #[error("solver initialization failed: {0}")]
    SolverInitializationFailed(String),

    #[error("solver finished with status {0:?}, no marginals available")]
    SolverDidNotConverge(SolveStatus),

    #[error("callback buffer holds {actual} entries but {expected} were declared")]
    BufferSizeMismatch { expected: usize, actual: usize },
}
