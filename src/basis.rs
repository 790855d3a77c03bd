//! B-spline basis over a non-decreasing knot vector.
//!
//! The basis is defined by an order `k` (degree `k - 1`) and a knot sequence
//! `t` of length `dimension + k`. Basis function `B_i` is supported on
//! `[t[i], t[i+k]]`, and at any point inside the domain `[t[k-1], t[dim]]`
//! exactly `k` consecutive basis functions are nonzero.
//!
//! Active values are computed with the iterative Cox-de Boor triangle
//! (Algorithm A2.2 in "The NURBS Book" by Piegl and Tiller), which evaluates
//! all `k` nonzero functions at once without recursion. Derivatives apply the
//! knot-span recursion
//!
//! `B'_{i,k}(x) = (k-1) * ( B_{i,k-1}(x)/(t[i+k-1]-t[i]) - B_{i+1,k-1}(x)/(t[i+k]-t[i+1]) )`
//!
//! repeatedly over lower-order value arrays.

use ndarray::{Array1, ArrayView1, s};
use thiserror::Error;

use crate::spline::Spline;

/// Errors arising while constructing a B-spline basis.
#[derive(Error, Debug)]
pub enum BasisError {
    #[error("Spline order must be at least 1, but was {0}.")]
    InvalidOrder(usize),

    #[error(
        "Insufficient knots for an order-{order} basis: need at least {required} knots but only {provided} were provided."
    )]
    InsufficientKnots {
        order: usize,
        required: usize,
        provided: usize,
    },

    #[error(
        "The provided knot vector is invalid: {0}. It must be non-decreasing and contain only finite values."
    )]
    InvalidKnotVector(String),
}

/// Position of a coordinate relative to the knot domain `[t[k-1], t[dim]]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zone {
    /// Below the first domain knot.
    Below,
    /// Inside the domain; the paired interval index identifies the containing
    /// knot interval.
    Inside,
    /// Above the last domain knot.
    Above,
}

impl Zone {
    #[inline]
    pub fn is_inside(self) -> bool {
        matches!(self, Zone::Inside)
    }
}

/// Capability interface a spline needs from its basis.
///
/// Splines only consume the basis through this trait: interval location,
/// active-function evaluation, and reconstruction at an adjusted order (used
/// by differentiation and integration). A derived basis (e.g. one recombined
/// for boundary conditions) can override [`Basis::parent_spline`] to expose an
/// equivalent spline over its parent; spline operations check that capability
/// once and delegate uniformly.
pub trait Basis: Sized {
    /// Spline order `k` (polynomial degree plus one).
    fn order(&self) -> usize;

    /// The full knot sequence, of length `dimension() + order()`.
    fn knots(&self) -> ArrayView1<'_, f64>;

    /// Number of basis functions.
    fn dimension(&self) -> usize {
        self.knots().len() - self.order()
    }

    /// Locates `x` within the knot sequence.
    ///
    /// For [`Zone::Inside`] the returned index `n` satisfies
    /// `t[n] <= x < t[n+1]` (the last nonempty interval when `x` equals the
    /// right domain boundary), with `n` in `order-1 ..= dimension-1` so a full
    /// window of `order` coefficients exists. Outside the domain the index is
    /// clamped to the nearest valid interval.
    fn find_interval(&self, x: f64) -> (usize, Zone);

    /// Evaluates all basis functions active at `x`.
    ///
    /// Returns the index of the first active function and the `order()`
    /// values `B_start(x) .. B_{start+k-1}(x)`.
    fn evaluate_all(&self, x: f64) -> (usize, Array1<f64>);

    /// Evaluates the `m`-th derivative of all basis functions active at `x`.
    ///
    /// `m = 0` is plain evaluation; `m >= order()` yields all zeros.
    fn evaluate_all_derivative(&self, x: f64, m: usize) -> (usize, Array1<f64>);

    /// Builds a basis of the given order over the given knot sequence.
    ///
    /// `augment` requests clamped boundary knots (each end repeated to
    /// multiplicity `order`); the differentiation/integration transforms pass
    /// `false` because their knot sequences are already complete.
    fn from_knots(order: usize, knots: Array1<f64>, augment: bool) -> Result<Self, BasisError>;

    /// Hook for derived bases: an equivalent spline over the parent basis.
    ///
    /// The default (no parent) returns `None`.
    fn parent_spline(&self, _spline: &Spline<Self>) -> Option<Spline<Self>> {
        None
    }
}

/// A plain B-spline basis: an order and an owned knot vector, no parent.
#[derive(Clone, Debug, PartialEq)]
pub struct BSplineBasis {
    order: usize,
    knots: Array1<f64>,
}

impl BSplineBasis {
    /// Creates a basis of the given order over `knots`.
    ///
    /// With `augment = true` the first and last knot are repeated until each
    /// boundary has multiplicity `order` (a clamped basis), so `knots` can be
    /// a plain breakpoint sequence. With `augment = false` the sequence is
    /// consumed as given.
    pub fn new(order: usize, knots: Array1<f64>, augment: bool) -> Result<Self, BasisError> {
        if order < 1 {
            return Err(BasisError::InvalidOrder(order));
        }

        let knots = if augment {
            augment_knots(order, knots)?
        } else {
            knots
        };

        // An order-k basis needs dimension >= k, i.e. at least 2k knots.
        let required = 2 * order;
        if knots.len() < required {
            return Err(BasisError::InsufficientKnots {
                order,
                required,
                provided: knots.len(),
            });
        }

        validate_knot_vector(knots.view())?;

        Ok(Self { order, knots })
    }

    /// Greville abscissae: the knot averages `(t[i+1] + .. + t[i+k-1])/(k-1)`,
    /// one per basis function. These are the collocation sites used by
    /// variation-diminishing approximation.
    pub fn greville(&self) -> Array1<f64> {
        let k = self.order;
        let dim = self.dimension();
        if k == 1 {
            // Degree 0 has no interior knots to average; use interval midpoints.
            return Array1::from_iter((0..dim).map(|i| 0.5 * (self.knots[i] + self.knots[i + 1])));
        }
        Array1::from_iter(
            (0..dim).map(|i| self.knots.slice(s![i + 1..i + k]).sum() / (k - 1) as f64),
        )
    }

    /// Cox-de Boor triangle for the `degree + 1` functions of the given
    /// degree that are nonzero on the interval containing `x`. The span is
    /// degree-independent, so the derivative ladder can reuse it across
    /// degrees.
    fn active_values_for_degree(&self, x: f64, span: usize, degree: usize) -> Vec<f64> {
        let t = &self.knots;
        let mut values = vec![0.0; degree + 1];
        let mut left = vec![0.0; degree + 1];
        let mut right = vec![0.0; degree + 1];

        values[0] = 1.0;
        for d in 1..=degree {
            left[d] = x - t[span + 1 - d];
            right[d] = t[span + d] - x;

            let mut saved = 0.0;
            for r in 0..d {
                let den = right[r + 1] + left[d - r];
                let temp = if den.abs() > 1e-12 { values[r] / den } else { 0.0 };

                values[r] = saved + right[r + 1] * temp;
                saved = left[d - r] * temp;
            }
            values[d] = saved;
        }

        values
    }
}

impl Basis for BSplineBasis {
    fn order(&self) -> usize {
        self.order
    }

    fn knots(&self) -> ArrayView1<'_, f64> {
        self.knots.view()
    }

    fn find_interval(&self, x: f64) -> (usize, Zone) {
        let k = self.order;
        let dim = self.dimension();
        let t = &self.knots;

        if x < t[k - 1] {
            return (k - 1, Zone::Below);
        }
        if x > t[dim] {
            return (dim - 1, Zone::Above);
        }

        // Linear scan from the leftmost valid span; zero-width intervals are
        // skipped because the loop keeps advancing while x >= t[span + 1].
        let mut span = k - 1;
        while span < dim - 1 && x >= t[span + 1] {
            span += 1;
        }
        (span, Zone::Inside)
    }

    fn evaluate_all(&self, x: f64) -> (usize, Array1<f64>) {
        let k = self.order;
        let (span, _) = self.find_interval(x);
        let values = self.active_values_for_degree(x, span, k - 1);
        (span + 1 - k, Array1::from_vec(values))
    }

    fn evaluate_all_derivative(&self, x: f64, m: usize) -> (usize, Array1<f64>) {
        let k = self.order;
        let p = k - 1;
        let (span, _) = self.find_interval(x);

        if m == 0 {
            return self.evaluate_all(x);
        }
        if m > p {
            // Differentiating past the polynomial degree annihilates every
            // piece of the basis.
            return (span + 1 - k, Array1::zeros(k));
        }

        let t = &self.knots;
        let q = p - m;
        let mut values = self.active_values_for_degree(x, span, q);
        let mut start = span - q;

        // Raise the degree back up one level at a time; each level applies the
        // derivative recursion once, so after m levels `values` holds the m-th
        // derivatives of the degree-p functions.
        for level in q..p {
            let next = level + 1;
            let next_start = span - next;
            let mut raised = vec![0.0; next + 1];

            for (j, slot) in raised.iter_mut().enumerate() {
                let i = next_start + j;

                let lower = if i >= start && i <= start + level {
                    values[i - start]
                } else {
                    0.0
                };
                let upper = if i + 1 >= start && i + 1 <= start + level {
                    values[i + 1 - start]
                } else {
                    0.0
                };

                let den_left = t[i + next] - t[i];
                let den_right = t[i + next + 1] - t[i + 1];
                let left_term = if den_left.abs() > 1e-12 {
                    lower / den_left
                } else {
                    0.0
                };
                let right_term = if den_right.abs() > 1e-12 {
                    upper / den_right
                } else {
                    0.0
                };

                *slot = next as f64 * (left_term - right_term);
            }

            values = raised;
            start = next_start;
        }

        (start, Array1::from_vec(values))
    }

    fn from_knots(order: usize, knots: Array1<f64>, augment: bool) -> Result<Self, BasisError> {
        Self::new(order, knots, augment)
    }
}

/// Repeats the first and last knot so each boundary reaches multiplicity
/// `order`, the standard clamped construction. Full boundary multiplicity
/// keeps every basis function well-supported inside the data domain.
fn augment_knots(order: usize, knots: Array1<f64>) -> Result<Array1<f64>, BasisError> {
    if knots.len() < 2 {
        return Err(BasisError::InvalidKnotVector(
            "at least two knots are required to define a domain".to_string(),
        ));
    }

    let first = knots[0];
    let last = knots[knots.len() - 1];
    let mut augmented = Vec::with_capacity(knots.len() + 2 * (order - 1));

    for _ in 0..order - 1 {
        augmented.push(first);
    }
    augmented.extend(knots.iter().copied());
    for _ in 0..order - 1 {
        augmented.push(last);
    }

    Ok(Array1::from_vec(augmented))
}

fn validate_knot_vector(knots: ArrayView1<'_, f64>) -> Result<(), BasisError> {
    if knots.iter().any(|&k| !k.is_finite()) {
        return Err(BasisError::InvalidKnotVector(
            "knot vector contains non-finite (NaN or Infinity) values".to_string(),
        ));
    }

    for i in 0..knots.len() - 1 {
        if knots[i] > knots[i + 1] {
            return Err(BasisError::InvalidKnotVector(
                "knot vector is not non-decreasing".to_string(),
            ));
        }
    }

    if knots[0] == knots[knots.len() - 1] {
        return Err(BasisError::InvalidKnotVector(
            "knot vector spans an empty domain".to_string(),
        ));
    }

    Ok(())
}
