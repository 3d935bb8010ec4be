use std::time::Instant;

use log::info;
use mrf_marginals::{MarkovRandomField, Relation};

fn main() {
    std::env::set_var("RUST_LOG", "info"); // change "info" to "debug" for debug-level logging, etc.
    env_logger::init();

    // Three binary variables with single-site potentials, under a budget
    // constraint: at most two of them may be active in expectation.
    let mut mrf = MarkovRandomField::new(3, 1);
    mrf.set_single_site_potential(0, 0.0, 1.5).unwrap();
    mrf.set_single_site_potential(1, 0.5, 0.5).unwrap();
    mrf.set_single_site_potential(2, 1.0, -0.5).unwrap();
    mrf.add_linear_constraint(vec![0, 1, 2], vec![1.0, 1.0, 1.0], Relation::LessEqual, 2.0)
        .unwrap();

    let time_start = Instant::now();
    mrf.infer_marginals(1).unwrap();
    info!("Inference complete. Elapsed time {:?}.", time_start.elapsed());

    for node in 0..mrf.num_variables() {
        info!(
            "Variable {}: P(0) = {:.4}, P(1) = {:.4}, state = {}",
            node,
            mrf.get_marginal(node, 0).unwrap(),
            mrf.get_marginal(node, 1).unwrap(),
            mrf.get_state(node).unwrap()
        );
    }
    info!("Constant score term: {}.", mrf.constant_term());
}
