//! End-to-end inference runs through the public crate surface.

use mrf_marginals::{MarkovRandomField, MrfError, Relation, SolveStatus, SolverOptions};

fn sigmoid(t: f64) -> f64 {
    1.0 / (1.0 + (-t).exp())
}

#[test]
fn unconstrained_marginals_follow_the_potential_sign() {
    let mut mrf = MarkovRandomField::new(2, 0);
    mrf.set_single_site_potential(0, 0.0, 1.0).unwrap();
    mrf.set_single_site_potential(1, 0.0, -1.0).unwrap();
    mrf.infer_marginals(1).unwrap();

    assert_eq!(mrf.last_status(), Some(SolveStatus::Succeeded));
    assert!(mrf.get_marginal(0, 1).unwrap() > 0.5);
    assert!(mrf.get_marginal(1, 1).unwrap() < 0.5);
    assert_eq!(mrf.get_state(0).unwrap(), 1);
    assert_eq!(mrf.get_state(1).unwrap(), 0);

    // Without constraints the optimum is the logistic transform of theta
    assert!((mrf.get_marginal(0, 1).unwrap() - sigmoid(1.0)).abs() < 1e-6);
    assert!((mrf.get_marginal(1, 1).unwrap() - sigmoid(-1.0)).abs() < 1e-6);
}

#[test]
fn marginal_pairs_sum_to_one() {
    let mut mrf = MarkovRandomField::new(3, 0);
    mrf.set_single_site_potential(0, 0.3, 0.9).unwrap();
    mrf.set_single_site_potential(2, 2.0, -1.0).unwrap();
    mrf.infer_marginals(1).unwrap();

    for node in 0..3 {
        let sum = mrf.get_marginal(node, 0).unwrap() + mrf.get_marginal(node, 1).unwrap();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}

#[test]
fn equality_constraint_holds_at_the_solution() {
    let mut mrf = MarkovRandomField::new(3, 1);
    mrf.set_single_site_potential(0, 0.0, 0.5).unwrap();
    mrf.set_single_site_potential(2, 0.0, -0.5).unwrap();
    mrf.add_linear_constraint(vec![0, 1, 2], vec![1.0, 1.0, 1.0], Relation::Equal, 1.5)
        .unwrap();
    mrf.infer_marginals(1).unwrap();

    let active: f64 = (0..3).map(|node| mrf.get_marginal(node, 1).unwrap()).sum();
    assert!((active - 1.5).abs() < 1e-6);

    // Stronger potentials keep larger marginals under the shared budget
    assert!(mrf.get_marginal(0, 1).unwrap() > mrf.get_marginal(1, 1).unwrap());
    assert!(mrf.get_marginal(1, 1).unwrap() > mrf.get_marginal(2, 1).unwrap());
}

#[test]
fn binding_inequality_caps_the_activity() {
    let mut mrf = MarkovRandomField::new(2, 1);
    mrf.set_single_site_potential(0, 0.0, 2.0).unwrap();
    mrf.set_single_site_potential(1, 0.0, 2.0).unwrap();
    mrf.add_linear_constraint(vec![0, 1], vec![1.0, 1.0], Relation::LessEqual, 0.8)
        .unwrap();
    mrf.infer_marginals(1).unwrap();

    let active = mrf.get_marginal(0, 1).unwrap() + mrf.get_marginal(1, 1).unwrap();
    assert!(active <= 0.8 + 1e-6);
    // Identical potentials split the budget evenly
    assert!((mrf.get_marginal(0, 1).unwrap() - 0.4).abs() < 1e-4);
    assert!((mrf.get_marginal(1, 1).unwrap() - 0.4).abs() < 1e-4);
}

#[test]
fn infeasible_constraints_leave_the_field_unsolved() {
    let mut mrf = MarkovRandomField::new(1, 1);
    // A relaxed marginal can never reach 2
    mrf.add_linear_constraint(vec![0], vec![1.0], Relation::Equal, 2.0)
        .unwrap();

    let mut options = SolverOptions::default();
    options.set_max_iterations(300);
    let outcome = mrf.infer_marginals_with_options(&options);
    assert!(matches!(outcome, Err(MrfError::SolverDidNotConverge(_))));
    assert_ne!(mrf.last_status(), Some(SolveStatus::Succeeded));
    assert_eq!(mrf.get_marginal(0, 1), Err(MrfError::NotYetSolved));
}

#[test]
fn constraint_count_is_checked_at_inference_time() {
    let mut mrf = MarkovRandomField::new(2, 2);
    mrf.add_linear_constraint(vec![0], vec![1.0], Relation::LessEqual, 1.0)
        .unwrap();

    assert_eq!(
        mrf.infer_marginals(1),
        Err(MrfError::ConstraintCountMismatch {
            declared: 2,
            added: 1
        })
    );
    assert_eq!(mrf.get_state(0), Err(MrfError::NotYetSolved));
}

#[test]
fn a_failed_run_keeps_earlier_marginals() {
    let mut mrf = MarkovRandomField::new(1, 0);
    mrf.set_single_site_potential(0, 0.0, 1.0).unwrap();
    mrf.infer_marginals(1).unwrap();
    let before = mrf.get_marginal(0, 1).unwrap();

    // Starve the second run of iterations
    let mut options = SolverOptions::default();
    options.set_max_iterations(0);
    let outcome = mrf.infer_marginals_with_options(&options);
    assert!(matches!(outcome, Err(MrfError::SolverDidNotConverge(_))));
    assert_eq!(mrf.get_marginal(0, 1).unwrap(), before);
}
