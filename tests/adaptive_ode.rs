//! hp-adaptive solution of the first-order equation y' = -y² with y(0) = 1 over (0, 10).
//! The exact solution is 1 / (x + 1).

use fem_1d::*;

// weak forms for y' = f(y, x) with f = -y²:
//   residual: ∫ (y' - f(y, x)) v
//   jacobian: ∫ (u' - ∂f/∂y(y, x) u) v
fn riccati_assembler() -> Assembler {
    let mut assembler = Assembler::new();
    assembler.add_matrix_form(0, 0, |args: &FormArgs, trial: &TrialFn| {
        args.integrate(|m| {
            (trial.dudx[m] + 2.0 * args.prev_vals[0][0][m] * trial.u[m]) * args.v[m]
        })
    });
    assembler.add_vector_form(0, |args: &FormArgs| {
        args.integrate(|m| (args.prev_ders[0][0][m] + args.prev_vals[0][0][m].powi(2)) * args.v[m])
    });
    assembler
}

fn initial_domain() -> Domain {
    let mut mesh = Mesh::uniform(0.0, 10.0, 5, 1, 1);
    mesh.set_solution_constant(0, &[1.0]);
    mesh.set_dirichlet_left(0, 1.0);
    Domain::from_mesh(mesh)
}

fn exact(x: f64) -> (Vec<f64>, Vec<f64>) {
    (vec![1.0 / (x + 1.0)], vec![-1.0 / ((x + 1.0) * (x + 1.0))])
}

#[test]
fn hp_adaptivity_meets_the_global_tolerance() {
    let mut domain = initial_domain();
    let assembler = riccati_assembler();

    let driver = AdaptiveDriver {
        global_tolerance: 1e-2,
        ..Default::default()
    };

    let outcome = driver
        .run(
            &mut domain,
            &assembler,
            &DenseLu,
            Some(&exact),
            &mut NullReporter,
        )
        .unwrap();

    assert!(outcome.converged);
    assert!(outcome.max_ftr_error < 1e-2);

    // every refinement adds DOFs: the count grows strictly until termination
    assert!(outcome.history.len() >= 2);
    for window in outcome.history.windows(2) {
        assert!(window[1].0 > window[0].0);
    }

    // the converged solution tracks the exact one
    for x in [0.5, 2.0, 5.0, 9.5] {
        let (u, _) = domain.mesh.solution_value_and_deriv(0, 0, x);
        assert!((u - 1.0 / (x + 1.0)).abs() < 2e-2);
    }
}

#[test]
fn h_only_adaptivity_also_converges() {
    let mut domain = initial_domain();
    let assembler = riccati_assembler();

    let driver = AdaptiveDriver {
        controller: AdaptivityController {
            mode: AdaptMode::H,
            norm: ErrorNorm::L2,
            threshold: 0.7,
        },
        global_tolerance: 5e-2,
        ..Default::default()
    };

    let outcome = driver
        .run(&mut domain, &assembler, &DenseLu, None, &mut NullReporter)
        .unwrap();

    assert!(outcome.converged);
    // h-adaptivity never raises orders
    for elem in domain.elems() {
        assert_eq!(elem.poly_order, 1);
    }
}

#[test]
fn parallel_estimation_matches_the_sequential_result() {
    let assembler = riccati_assembler();

    let mut sequential = initial_domain();
    let mut parallel = initial_domain();

    let driver = AdaptiveDriver {
        global_tolerance: 1e-2,
        ..Default::default()
    };
    let par_driver = AdaptiveDriver {
        global_tolerance: 1e-2,
        parallel_estimation: true,
        ..Default::default()
    };

    let seq_outcome = driver
        .run(&mut sequential, &assembler, &DenseLu, None, &mut NullReporter)
        .unwrap();
    let par_outcome = par_driver
        .run(&mut parallel, &assembler, &DenseLu, None, &mut NullReporter)
        .unwrap();

    assert_eq!(seq_outcome.steps, par_outcome.steps);
    assert_eq!(seq_outcome.history, par_outcome.history);
    assert_eq!(sequential.num_dofs(), parallel.num_dofs());
}
