//! Splines in B-spline representation: a basis paired with a coefficient
//! sequence, evaluated with the generalized de Boor recursion.
//!
//! Differentiation and integration are exact coefficient transformations, not
//! numerical approximations: the derivative of an order-`k` spline is an
//! order-`k-1` spline whose coefficients are scaled first differences over
//! knot spans, and the antiderivative is an order-`k+1` spline whose
//! coefficients accumulate knot-span-weighted prefix sums (de Boor, "A
//! Practical Guide to Splines", ch. X). Both produce brand-new splines over
//! brand-new bases and never mutate their input.

use ndarray::{Array1, ArrayView1, ArrayViewMut1, s};
use std::sync::Arc;
use thiserror::Error;

use crate::basis::{BSplineBasis, Basis, BasisError};

/// Errors arising from spline construction or transformation.
#[derive(Error, Debug)]
pub enum SplineError {
    #[error("Coefficient count ({found}) does not match the basis dimension ({expected}).")]
    CoefficientCountMismatch { expected: usize, found: usize },

    #[error(
        "Cannot differentiate an order-{order} spline {requested} times; the derivative order must be smaller than the spline order."
    )]
    DerivativeOrderTooHigh { order: usize, requested: usize },

    #[error(transparent)]
    Basis(#[from] BasisError),
}

/// A spline: a shared, read-only basis and an exclusively owned coefficient
/// sequence of length `basis.dimension()`.
#[derive(Debug)]
pub struct Spline<B = BSplineBasis> {
    basis: Arc<B>,
    coefficients: Array1<f64>,
}

impl<B> Clone for Spline<B> {
    fn clone(&self) -> Self {
        Self {
            basis: Arc::clone(&self.basis),
            coefficients: self.coefficients.clone(),
        }
    }
}

impl<B: PartialEq> PartialEq for Spline<B> {
    fn eq(&self, other: &Self) -> bool {
        self.basis == other.basis && self.coefficients == other.coefficients
    }
}

impl<B: Basis> Spline<B> {
    /// Couples a basis with a coefficient sequence.
    ///
    /// The coefficient count must equal the basis dimension; a mismatch is a
    /// construction error, never silently adjusted.
    pub fn new(basis: Arc<B>, coefficients: Array1<f64>) -> Result<Self, SplineError> {
        if coefficients.len() != basis.dimension() {
            return Err(SplineError::CoefficientCountMismatch {
                expected: basis.dimension(),
                found: coefficients.len(),
            });
        }
        Ok(Self {
            basis,
            coefficients,
        })
    }

    pub fn basis(&self) -> &Arc<B> {
        &self.basis
    }

    pub fn order(&self) -> usize {
        self.basis.order()
    }

    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.view()
    }

    /// Mutable access for owners that fill coefficients in place, such as a
    /// variation-diminishing approximation driver writing sampled values.
    pub fn coefficients_mut(&mut self) -> ArrayViewMut1<'_, f64> {
        self.coefficients.view_mut()
    }

    /// Evaluates the spline at `x`.
    ///
    /// Outside the knot domain the result is exactly `0.0` (domain exclusion,
    /// not extrapolation and not an error).
    pub fn evaluate(&self, x: f64) -> f64 {
        if let Some(parent) = self.basis.parent_spline(self) {
            return parent.evaluate(x);
        }

        let (n, zone) = self.basis.find_interval(x);
        if !zone.is_inside() {
            return 0.0;
        }

        internal::spline_kernel(
            x,
            self.basis.knots(),
            n,
            self.coefficients.view(),
            self.basis.order(),
        )
    }

    /// The exact `ndiff`-th derivative, an order `k - ndiff` spline.
    ///
    /// `ndiff = 0` returns an equal-valued spline. `ndiff >= k` is rejected
    /// before any work is done.
    pub fn derivative(&self, ndiff: usize) -> Result<Self, SplineError> {
        if let Some(parent) = self.basis.parent_spline(self) {
            return parent.derivative(ndiff);
        }

        let k = self.basis.order();
        if ndiff == 0 {
            return Ok(self.clone());
        }
        if ndiff >= k {
            return Err(SplineError::DerivativeOrderTooHigh {
                order: k,
                requested: ndiff,
            });
        }

        let mut current = self.derivative_once()?;
        for _ in 1..ndiff {
            current = current.derivative_once()?;
        }
        Ok(current)
    }

    /// One differentiation pass: order drops by one, one knot is trimmed from
    /// each end, and the leading coefficient (always zeroed by the recurrence)
    /// is dropped.
    fn derivative_once(&self) -> Result<Self, SplineError> {
        let k = self.basis.order();
        let t = self.basis.knots();
        let n = self.coefficients.len();

        let mut u = self.coefficients.clone();
        // The update at index i reads the not-yet-updated u[i-1], so the
        // traversal must run from the last index down to the first.
        for i in (0..n).rev() {
            let dt = t[i + k - 1] - t[i];
            if i == 0 || dt == 0.0 {
                // A basis function with zero-width support contributes
                // nothing to the derivative.
                u[i] = 0.0;
            } else {
                u[i] = (k - 1) as f64 * (u[i] - u[i - 1]) / dt;
            }
        }

        let trimmed = t.slice(s![1..t.len() - 1]).to_owned();
        let basis = B::from_knots(k - 1, trimmed, false)?;
        Spline::new(Arc::new(basis), u.slice(s![1..]).to_owned())
    }

    /// An antiderivative, an order `k + 1` spline over a knot sequence with
    /// the first and last knot duplicated. The constant of integration is
    /// fixed so the first coefficient is zero.
    pub fn antiderivative(&self) -> Result<Self, SplineError> {
        if let Some(parent) = self.basis.parent_spline(self) {
            return parent.antiderivative();
        }

        let k = self.basis.order();
        let t = self.basis.knots();
        let n = self.coefficients.len();

        let mut knots = Array1::<f64>::zeros(t.len() + 2);
        knots[0] = t[0];
        knots.slice_mut(s![1..=t.len()]).assign(&t);
        knots[t.len() + 1] = t[t.len() - 1];

        // beta[i+1] = sum_{j<=i} u[j] * (t[j+k] - t[j]) / k. The coefficient
        // count is small, so the direct double loop is fine.
        let mut beta = Array1::<f64>::zeros(n + 1);
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..=i {
                acc += self.coefficients[j] * (t[j + k] - t[j]) / k as f64;
            }
            beta[i + 1] = acc;
        }

        let basis = B::from_knots(k + 1, knots, false)?;
        Spline::new(Arc::new(basis), beta)
    }

    /// Tolerance comparison: same basis value, coefficients equal within
    /// `epsilon` relative to their magnitude (absolute below magnitude one).
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool
    where
        B: PartialEq,
    {
        if self.basis != other.basis || self.coefficients.len() != other.coefficients.len() {
            return false;
        }
        self.coefficients
            .iter()
            .zip(other.coefficients.iter())
            .all(|(&a, &b)| (a - b).abs() <= epsilon * a.abs().max(b.abs()).max(1.0))
    }
}

pub(crate) mod internal {
    use ndarray::ArrayView1;

    /// Evaluates the de Boor recursion at `x` for an order-`k` spline.
    ///
    /// `n` is the knot interval index (`t[n] <= x < t[n+1]`, inside the
    /// domain) and `c` the full coefficient sequence; only the window
    /// `c[n-k+1 ..= n]` participates. Common orders dispatch to const-generic
    /// specializations whose scratch state is a stack array, so the hot path
    /// never allocates; all paths share one generic body and therefore
    /// produce bit-identical results.
    #[inline]
    pub(crate) fn spline_kernel(
        x: f64,
        t: ArrayView1<'_, f64>,
        n: usize,
        c: ArrayView1<'_, f64>,
        k: usize,
    ) -> f64 {
        match k {
            1 => spline_kernel_fixed::<1>(x, t, n, c),
            2 => spline_kernel_fixed::<2>(x, t, n, c),
            3 => spline_kernel_fixed::<3>(x, t, n, c),
            4 => spline_kernel_fixed::<4>(x, t, n, c),
            5 => spline_kernel_fixed::<5>(x, t, n, c),
            6 => spline_kernel_fixed::<6>(x, t, n, c),
            7 => spline_kernel_fixed::<7>(x, t, n, c),
            8 => spline_kernel_fixed::<8>(x, t, n, c),
            _ => spline_kernel_dynamic(x, t, n, c, k),
        }
    }

    #[inline]
    fn spline_kernel_fixed<const K: usize>(
        x: f64,
        t: ArrayView1<'_, f64>,
        n: usize,
        c: ArrayView1<'_, f64>,
    ) -> f64 {
        let mut d = [0.0f64; K];
        for (j, slot) in d.iter_mut().enumerate() {
            *slot = c[n + 1 - K + j];
        }
        de_boor_triangle(x, t, n, &mut d);
        d[K - 1]
    }

    /// Fallback for unusually high orders; the scratch buffer is heap
    /// allocated, which is acceptable off the hot path.
    fn spline_kernel_dynamic(
        x: f64,
        t: ArrayView1<'_, f64>,
        n: usize,
        c: ArrayView1<'_, f64>,
        k: usize,
    ) -> f64 {
        let mut d = vec![0.0f64; k];
        for (j, slot) in d.iter_mut().enumerate() {
            *slot = c[n + 1 - k + j];
        }
        de_boor_triangle(x, t, n, &mut d);
        d[k - 1]
    }

    /// The recursion itself. Each pass blends neighbouring working values;
    /// `j` must run in descending order so that `d[j - 1]` still holds the
    /// previous pass's value when it is read.
    #[inline]
    fn de_boor_triangle(x: f64, t: ArrayView1<'_, f64>, n: usize, d: &mut [f64]) {
        let k = d.len();
        for r in 1..k {
            for j in (r..k).rev() {
                let left = t[j + n + 1 - k];
                let right = t[j + n + 1 - r];
                let alpha = (x - left) / (right - left);
                d[j] = (1.0 - alpha) * d[j - 1] + alpha * d[j];
            }
        }
    }
}
