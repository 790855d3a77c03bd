//! Batched evaluation of basis functions for Galerkin-style assembly.
//!
//! An assembly loop works one knot interval at a time: it fixes the set of
//! basis indices active on that interval and needs their values (or
//! derivatives) at every quadrature point mapped into the interval. The
//! result is laid out one basis index per row, contiguous across points, the
//! shape the inner-product accumulation consumes.
//!
//! Near domain boundaries the index set a basis reports for a point can be
//! shifted by one against the requested ordering (a point that lands exactly
//! on a knot belongs to the next interval). Rather than demanding that
//! callers align every point, the evaluator realigns each point's values by a
//! cyclic rotation so row 0 always corresponds to the first requested index.

use ndarray::Array2;

use crate::basis::Basis;

/// Evaluates the requested basis functions at every point of a batch.
///
/// * `is` — active basis indices, at most `basis.order()` of them; when fewer
///   are given (a boundary interval of a derived basis), the table is padded
///   by repeating the first index, and the padded rows carry no meaning.
/// * `xs` — evaluation points.
/// * `deriv_order` — 0 for values, `m` for `m`-th derivatives.
///
/// Returns an `order x xs.len()` table whose row `r` holds the values of the
/// function requested at position `r`, for every point.
pub fn evaluate_active<B: Basis>(
    basis: &B,
    is: &[usize],
    xs: &[f64],
    deriv_order: usize,
) -> Array2<f64> {
    let k = basis.order();
    let mut table = Array2::<f64>::zeros((k, xs.len()));
    if is.is_empty() {
        return table;
    }

    if deriv_order == 0 {
        for (col, &x) in xs.iter().enumerate() {
            let (start, values) = basis.evaluate_all(x);

            // Cyclic realignment: rotate so the value of function is[0]
            // lands in row 0 whenever it is active at this point.
            let shift = if is[0] >= start && is[0] < start + k {
                is[0] - start
            } else {
                0
            };

            for row in 0..k {
                table[[row, col]] = values[(row + shift) % k];
            }
        }
    } else {
        // Derivative tables are placed by global index directly; a requested
        // function that is not active at the point contributes zero.
        for (col, &x) in xs.iter().enumerate() {
            let (start, values) = basis.evaluate_all_derivative(x, deriv_order);
            for row in 0..k {
                let index = if row < is.len() { is[row] } else { is[0] };
                table[[row, col]] = if index >= start && index < start + values.len() {
                    values[index - start]
                } else {
                    0.0
                };
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::BSplineBasis;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn cubic_clamped() -> BSplineBasis {
        BSplineBasis::new(4, array![0.0, 1.0, 2.0, 3.0], true).unwrap()
    }

    #[test]
    fn test_table_shape_and_layout() {
        let basis = cubic_clamped();
        let xs = [0.1, 0.5, 0.9];
        let table = evaluate_active(&basis, &[0, 1, 2, 3], &xs, 0);
        assert_eq!(table.shape(), &[4, 3]);

        // Rows are per basis index: row r column c is B_{is[r]}(xs[c]).
        for (col, &x) in xs.iter().enumerate() {
            let (start, values) = basis.evaluate_all(x);
            assert_eq!(start, 0);
            for row in 0..4 {
                assert_abs_diff_eq!(table[[row, col]], values[row], epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_realignment_across_interval_boundary() {
        let basis = cubic_clamped();

        // Active indices for the middle interval [1, 2), but a batch that
        // straddles the knot at x = 1: the first two points report the
        // previous interval's index set.
        let is = [1, 2, 3, 4];
        let xs = [0.7, 0.95, 1.0, 1.3, 1.8];
        let table = evaluate_active(&basis, &is, &xs, 0);

        // Row 0 corresponds to B_1 at every point of the batch.
        for (col, &x) in xs.iter().enumerate() {
            let (start, values) = basis.evaluate_all(x);
            let expected = values[1 - start];
            assert_abs_diff_eq!(table[[0, col]], expected, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_short_index_set_is_padded() {
        let basis = cubic_clamped();
        let table = evaluate_active(&basis, &[0, 1], &[0.2, 0.4], 0);
        // Shape is stable regardless of how many indices were requested.
        assert_eq!(table.shape(), &[4, 2]);
    }

    #[test]
    fn test_empty_index_set_yields_zero_table() {
        let basis = cubic_clamped();
        let table = evaluate_active(&basis, &[], &[0.5], 0);
        assert!(table.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_derivative_table_matches_basis_derivatives() {
        let basis = cubic_clamped();
        let is = [1, 2, 3, 4];
        let xs = [1.2, 1.5, 1.9];
        let table = evaluate_active(&basis, &is, &xs, 1);

        for (col, &x) in xs.iter().enumerate() {
            let (start, derivs) = basis.evaluate_all_derivative(x, 1);
            for (row, &index) in is.iter().enumerate() {
                let expected = if index >= start && index < start + 4 {
                    derivs[index - start]
                } else {
                    0.0
                };
                assert_abs_diff_eq!(table[[row, col]], expected, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_derivative_table_zero_for_inactive_index() {
        let basis = cubic_clamped();
        // B_5 is supported on [2, 3]; at x = 0.5 its derivative row is zero.
        let table = evaluate_active(&basis, &[5, 0, 1, 2], &[0.5], 1);
        assert_eq!(table[[0, 0]], 0.0);
    }
}
