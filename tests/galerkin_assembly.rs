//! End-to-end check of the Galerkin assembly primitives: quadrature rules,
//! the interval metric, and batched basis tables, validated against closed
//! forms that the spline transforms also rely on.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use deboor::{
    BSplineBasis, Basis, QuadratureMetric, Spline, evaluate_active, quadrature_for_product_degree,
};
use ndarray::{Array1, Array2, array};
use std::sync::Arc;

fn cubic_clamped() -> BSplineBasis {
    BSplineBasis::new(4, array![0.0, 1.0, 2.0, 3.0], true).unwrap()
}

/// Assembles inner products of basis-function pairs over every nonempty knot
/// interval, exactly the loop a Galerkin solver runs.
fn assemble(basis: &BSplineBasis, deriv_order: usize, product_degree: usize) -> Array2<f64> {
    let order = basis.order();
    let dim = basis.dimension();
    let t = basis.knots().to_owned();

    let rule = quadrature_for_product_degree(product_degree);
    let mut matrix = Array2::<f64>::zeros((dim, dim));

    for n in (order - 1)..dim {
        let (a, b) = (t[n], t[n + 1]);
        if a == b {
            continue;
        }

        let metric = QuadratureMetric::new(a, b);
        let first = n + 1 - order;
        let is: Vec<usize> = (first..first + order).collect();
        let xs: Vec<f64> = rule.nodes.iter().map(|&z| metric.apply(z)).collect();
        let table = evaluate_active(basis, &is, &xs, deriv_order);

        for row_a in 0..order {
            for row_b in 0..order {
                let mut acc = 0.0;
                for (q, &w) in rule.weights.iter().enumerate() {
                    acc += w * metric.scale() * table[[row_a, q]] * table[[row_b, q]];
                }
                matrix[[is[row_a], is[row_b]]] += acc;
            }
        }
    }

    matrix
}

#[test]
fn mass_matrix_is_symmetric_with_exact_row_sums() {
    let basis = cubic_clamped();
    let order = basis.order();
    let dim = basis.dimension();
    let t = basis.knots().to_owned();

    // Products of two cubics have degree 6 on each interval.
    let mass = assemble(&basis, 0, 2 * order - 2);

    for i in 0..dim {
        for j in 0..dim {
            assert_relative_eq!(mass[[i, j]], mass[[j, i]], epsilon = 1e-12);
        }
    }

    // By partition of unity, sum_j of <B_i, B_j> equals the plain integral of
    // B_i, which has the closed form (t[i+k] - t[i]) / k.
    for i in 0..dim {
        let row_sum: f64 = (0..dim).map(|j| mass[[i, j]]).sum();
        let expected = (t[i + order] - t[i]) / order as f64;
        assert_relative_eq!(row_sum, expected, epsilon = 1e-10);
    }

    // And the grand total is the domain length.
    assert_relative_eq!(mass.sum(), 3.0, epsilon = 1e-10);
}

#[test]
fn stiffness_row_sums_vanish() {
    // sum_j <B_i', B_j'> = <B_i', (sum_j B_j)'> = 0, since the basis sums to
    // one everywhere inside the domain.
    let basis = cubic_clamped();
    let dim = basis.dimension();

    let stiffness = assemble(&basis, 1, 2 * basis.order() - 4);

    for i in 0..dim {
        let row_sum: f64 = (0..dim).map(|j| stiffness[[i, j]]).sum();
        assert_abs_diff_eq!(row_sum, 0.0, epsilon = 1e-10);
    }
}

#[test]
fn quadrature_agrees_with_antiderivative_integrals() {
    // The integral of each basis function computed two independent ways:
    // Gauss-Legendre quadrature over knot intervals, and the antiderivative
    // spline of the unit-coefficient representation evaluated at the right
    // domain boundary.
    let basis = Arc::new(cubic_clamped());
    let order = basis.order();
    let dim = basis.dimension();
    let t = basis.knots().to_owned();
    let rule = quadrature_for_product_degree(2 * order - 2);

    for i in 0..dim {
        let mut coefs = Array1::<f64>::zeros(dim);
        coefs[i] = 1.0;
        let spline = Spline::new(Arc::clone(&basis), coefs).unwrap();

        let via_antiderivative = spline.antiderivative().unwrap().evaluate(3.0);

        let mut via_quadrature = 0.0;
        for n in (order - 1)..dim {
            let (a, b) = (t[n], t[n + 1]);
            if a == b {
                continue;
            }
            let metric = QuadratureMetric::new(a, b);
            for (q, &w) in rule.weights.iter().enumerate() {
                via_quadrature += w * metric.scale() * spline.evaluate(metric.apply(rule.nodes[q]));
            }
        }

        let closed_form = (t[i + order] - t[i]) / order as f64;
        assert_relative_eq!(via_antiderivative, closed_form, epsilon = 1e-10);
        assert_relative_eq!(via_quadrature, closed_form, epsilon = 1e-10);
    }
}
