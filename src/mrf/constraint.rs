//! Sparse linear constraint rows and their relation to constraint bounds.

// Relation between a constraint row and its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    LessEqual,
    GreaterEqual,
}

impl Relation {
    // Translates the relation and its right-hand side into the (lower, upper)
    // bound pair expected by an NLP solver.
    pub fn bounds(&self, bound: f64) -> (f64, f64) {
        match self {
            Relation::Equal => (bound, bound),
            Relation::LessEqual => (f64::NEG_INFINITY, bound),
            Relation::GreaterEqual => (bound, f64::INFINITY),
        }
    }
}

// A sparse linear row over a subset of variables. The order of terms is the
// order in which they were declared; the Jacobian enumeration relies on it.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    variables: Vec<usize>,
    coefficients: Vec<f64>,
    relation: Relation,
    bound: f64,
}

impl LinearConstraint {
    pub fn new(
        variables: Vec<usize>,
        coefficients: Vec<f64>,
        relation: Relation,
        bound: f64,
    ) -> Self {
        debug_assert_eq!(variables.len(), coefficients.len());
        LinearConstraint {
            variables,
            coefficients,
            relation,
            bound,
        }
    }

    pub fn variables(&self) -> &[usize] {
        &self.variables
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    // Number of nonzero entries this row contributes to the Jacobian
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    // Iterates over (variable index, coefficient) pairs in declaration order
    pub fn terms(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.variables
            .iter()
            .copied()
            .zip(self.coefficients.iter().copied())
    }

    // Evaluates the row at a given point
    pub fn value(&self, x: &[f64]) -> f64 {
        self.terms().map(|(variable, coef)| coef * x[variable]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Relation::Equal, 2.5, 2.5, 2.5)]
    #[case(Relation::LessEqual, 2.5, f64::NEG_INFINITY, 2.5)]
    #[case(Relation::GreaterEqual, 2.5, 2.5, f64::INFINITY)]
    fn relation_bounds(
        #[case] relation: Relation,
        #[case] bound: f64,
        #[case] expected_lower: f64,
        #[case] expected_upper: f64,
    ) {
        let (lower, upper) = relation.bounds(bound);
        assert_eq!(lower, expected_lower);
        assert_eq!(upper, expected_upper);
    }

    #[test]
    fn value_is_sparse_dot_product() {
        let row = LinearConstraint::new(vec![0, 2], vec![2.0, -1.0], Relation::Equal, 0.0);
        let x = [0.5, 100.0, 0.25];
        assert_eq!(row.value(&x), 2.0 * 0.5 - 1.0 * 0.25);
    }

    #[test]
    fn terms_preserve_declaration_order() {
        let row = LinearConstraint::new(vec![3, 1, 2], vec![0.1, 0.2, 0.3], Relation::LessEqual, 1.0);
        let terms: Vec<_> = row.terms().collect();
        assert_eq!(terms, vec![(3, 0.1), (1, 0.2), (2, 0.3)]);
    }
}
