//! Gauss-Legendre quadrature for integrating products of basis functions.
//!
//! An n-point Gauss-Legendre rule integrates polynomials of degree up to
//! `2n - 1` exactly over [-1, 1]. The product of two order-`k` B-spline basis
//! functions restricted to one knot interval is a polynomial of degree
//! `2k - 2`, so Galerkin inner products are exact with `ceil((2k - 1) / 2)`
//! nodes per interval.
//!
//! Nodes are the roots of the Legendre polynomial `P_n`, found by Newton
//! iteration on the three-term recurrence
//!
//! `(m + 1) P_{m+1}(x) = (2m + 1) x P_m(x) - m P_{m-1}(x)`
//!
//! with weights `w_i = 2 / ((1 - x_i^2) P_n'(x_i)^2)`. Rules depend only on
//! the node count, so each is computed once per process and shared behind a
//! cache; repeated requests are lookups.

use ndarray::Array1;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Gauss-Legendre nodes and weights on the reference interval [-1, 1].
#[derive(Clone, Debug)]
pub struct GaussLegendreRule {
    /// Quadrature nodes, in ascending order.
    pub nodes: Array1<f64>,
    /// Quadrature weights; they sum to 2, the length of [-1, 1].
    pub weights: Array1<f64>,
}

fn rule_cache() -> &'static Mutex<HashMap<usize, Arc<GaussLegendreRule>>> {
    static CACHE: OnceLock<Mutex<HashMap<usize, Arc<GaussLegendreRule>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the n-point Gauss-Legendre rule on [-1, 1].
///
/// Rules are memoized per node count: the first request computes the rule,
/// later requests (from any thread) share the cached copy.
pub fn gauss_legendre(n: usize) -> Arc<GaussLegendreRule> {
    let mut cache = rule_cache()
        .lock()
        .expect("quadrature cache lock should not be poisoned");

    if let Some(rule) = cache.get(&n) {
        return Arc::clone(rule);
    }

    log::debug!("computing {n}-point Gauss-Legendre rule");
    let rule = Arc::new(compute_gauss_legendre(n));
    cache.insert(n, Arc::clone(&rule));
    rule
}

/// Returns the smallest Gauss-Legendre rule that integrates degree-`p`
/// polynomials exactly: `n = ceil((p + 1) / 2)` nodes.
///
/// For products of two order-`k` basis functions, `p = 2k - 2`.
pub fn quadrature_for_product_degree(p: usize) -> Arc<GaussLegendreRule> {
    gauss_legendre((p + 2) / 2)
}

fn compute_gauss_legendre(n: usize) -> GaussLegendreRule {
    let mut nodes = Array1::<f64>::zeros(n);
    let mut weights = Array1::<f64>::zeros(n);

    // Roots come in +/- pairs; solve for the nonnegative half and mirror.
    let pairs = (n + 1) / 2;
    for i in 0..pairs {
        // Tricomi's approximation to the i-th largest root, a good enough
        // Newton starting point for every n.
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();

        let mut converged = false;
        for _ in 0..100 {
            let (p, dp) = legendre_and_derivative(n, z);
            let dz = p / dp;
            z -= dz;
            if dz.abs() <= 1e-15 {
                converged = true;
                break;
            }
        }
        if !converged {
            log::warn!("Newton iteration for {n}-point Gauss-Legendre node {i} did not reach tolerance; keeping last iterate");
        }

        let (_, dp) = legendre_and_derivative(n, z);
        let w = 2.0 / ((1.0 - z * z) * dp * dp);

        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }

    GaussLegendreRule { nodes, weights }
}

/// Evaluates `P_n(x)` and `P_n'(x)` in one pass of the three-term recurrence.
fn legendre_and_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    if n == 1 {
        return (x, 1.0);
    }

    let mut p_prev = 1.0; // P_0
    let mut p_curr = x; // P_1
    for m in 1..n {
        let p_next = ((2 * m + 1) as f64 * x * p_curr - m as f64 * p_prev) / (m + 1) as f64;
        p_prev = p_curr;
        p_curr = p_next;
    }

    // P_n'(x) = n (x P_n(x) - P_{n-1}(x)) / (x^2 - 1), with the boundary
    // limits P_n'(+/-1) = (+/-1)^{n+1} n(n+1)/2.
    let dp = if (x - 1.0).abs() < 1e-14 {
        (n * (n + 1)) as f64 / 2.0
    } else if (x + 1.0).abs() < 1e-14 {
        let sign = if n % 2 == 0 { -1.0 } else { 1.0 };
        sign * (n * (n + 1)) as f64 / 2.0
    } else {
        n as f64 * (x * p_curr - p_prev) / (x * x - 1.0)
    };

    (p_curr, dp)
}

/// Affine map from the reference interval [-1, 1] onto [a, b].
///
/// Stores `alpha = (b - a) / 2` and `beta = (a + b) / 2`; a reference
/// coordinate `x` maps to `alpha * x + beta`, and integrals pick up the
/// Jacobian factor [`QuadratureMetric::scale`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadratureMetric {
    alpha: f64,
    beta: f64,
}

impl QuadratureMetric {
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            alpha: (b - a) / 2.0,
            beta: (a + b) / 2.0,
        }
    }

    /// Maps a reference-interval coordinate into [a, b].
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        self.alpha * x + self.beta
    }

    /// The Jacobian of the map, `(b - a) / 2`.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.alpha
    }
}
