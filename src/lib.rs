//! De Boor spline core: evaluation, exact differentiation and integration of
//! functions in B-spline representation, plus the Gauss-Legendre quadrature
//! machinery needed to integrate products of basis functions.
//!
//! The crate is a pure library layer: all operations are synchronous,
//! bounded, closed-form computations with cost linear in the spline order.
//! Splines own their coefficients exclusively; bases are shared read-only
//! (`Arc`), and the per-node-count quadrature rules are computed once per
//! process and shared.

pub mod basis;
pub mod evaluator;
pub mod quadrature;
pub mod spline;

pub use basis::{BSplineBasis, Basis, BasisError, Zone};
pub use evaluator::evaluate_active;
pub use quadrature::{
    GaussLegendreRule, QuadratureMetric, gauss_legendre, quadrature_for_product_degree,
};
pub use spline::{Spline, SplineError};
