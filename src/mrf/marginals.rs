use std::fmt::Display;

use crate::mrf::error::MrfError;

// Per-variable marginal pairs (P(state = 0), P(state = 1)), created once at
// solution finalization and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Marginals {
    pairs: Vec<[f64; 2]>,
}

impl Marginals {
    // Builds marginal pairs from the relaxed solution vector: each entry x_i
    // is interpreted as P(variable i = 1).
    pub fn from_relaxed(x: &[f64]) -> Self {
        Marginals {
            pairs: x.iter().map(|&x_i| [1.0 - x_i, x_i]).collect(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.pairs.len()
    }

    // Returns the stored probability of a variable taking a given state
    pub fn get(&self, node: usize, state: usize) -> Result<f64, MrfError> {
        if node >= self.pairs.len() {
            return Err(MrfError::IndexOutOfRange {
                index: node,
                limit: self.pairs.len(),
            });
        }
        if state >= 2 {
            return Err(MrfError::IndexOutOfRange {
                index: state,
                limit: 2,
            });
        }
        Ok(self.pairs[node][state])
    }

    // Returns the more probable state of a variable. The comparison is
    // strict, so an exact tie resolves to state 1.
    pub fn state(&self, node: usize) -> Result<usize, MrfError> {
        if node >= self.pairs.len() {
            return Err(MrfError::IndexOutOfRange {
                index: node,
                limit: self.pairs.len(),
            });
        }
        if self.pairs[node][0] > self.pairs[node][1] {
            Ok(0)
        } else {
            Ok(1)
        }
    }
}

impl Display for Marginals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}",
            self.pairs
                .iter()
                .map(|pair| format!("({:.4}, {:.4})", pair[0], pair[1]))
                .collect::<Vec<_>>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_sum_to_one_by_construction() {
        let marginals = Marginals::from_relaxed(&[0.1, 0.73, 0.5]);
        for node in 0..3 {
            let sum = marginals.get(node, 0).unwrap() + marginals.get(node, 1).unwrap();
            assert!((sum - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn state_is_argmax() {
        let marginals = Marginals::from_relaxed(&[0.2, 0.8]);
        assert_eq!(marginals.state(0).unwrap(), 0);
        assert_eq!(marginals.state(1).unwrap(), 1);
    }

    #[test]
    fn exact_tie_resolves_to_state_one() {
        let marginals = Marginals::from_relaxed(&[0.5]);
        assert_eq!(marginals.state(0).unwrap(), 1);
    }

    #[test]
    fn invalid_indices_are_rejected() {
        let marginals = Marginals::from_relaxed(&[0.5]);
        assert_eq!(
            marginals.get(1, 0),
            Err(MrfError::IndexOutOfRange { index: 1, limit: 1 })
        );
        assert_eq!(
            marginals.get(0, 2),
            Err(MrfError::IndexOutOfRange { index: 2, limit: 2 })
        );
        assert!(marginals.state(3).is_err());
    }
}
