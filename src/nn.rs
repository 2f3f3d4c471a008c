//! Backend-agnostic losses built purely from dispatched operations.
//!
//! Nothing here touches a backend directly, so every function runs on
//! whichever backend the [`Dispatch`] resolves for its arguments.

use crate::error::Result;
use crate::ops::dispatch::Dispatch;
use crate::tensors::Array;

/// Clipping margin keeping `log` away from 0 and 1.
pub const DEFAULT_EPSILON: f64 = 1e-7;

/// Elementwise binary cross-entropy of predictions `x` against targets `y`.
///
/// `x` is clipped to `[epsilon, 1 - epsilon]`, then
/// `-(y * ln(x) + (1 - y) * ln(1 - x))` is evaluated elementwise.
///
/// # Errors
/// Whatever the routed operations report (mixed backends, shapes that do
/// not broadcast, missing capabilities).
///
/// # Example
/// ```rust
/// use polytensor::{nested, nn};
///
/// let d = polytensor::auto();
/// let x = d.array(&nested!([[0.5]]), None, None).unwrap();
/// let y = d.array(&nested!([[1.0]]), None, None).unwrap();
/// let loss = nn::binary_cross_entropy(&d, &x, &y, nn::DEFAULT_EPSILON).unwrap();
/// let v = d.to_numpy(&loss).unwrap();
/// assert!((v[[0, 0]] - 2f64.ln()).abs() < 1e-9);
/// ```
pub fn binary_cross_entropy(d: &Dispatch<'_>, x: &Array, y: &Array, epsilon: f64) -> Result<Array> {
    let x = d.clip(x, epsilon, 1.0 - epsilon)?;
    let one = d.ones_like(&x, None, None)?;
    let log_x = d.log(&x)?;
    let log_not_x = d.log(&d.subtract(&one, &x)?)?;
    // (y - 1) * ln(1 - x) - y * ln(x)
    let negatives = d.multiply(&d.subtract(y, &one)?, &log_not_x)?;
    let positives = d.multiply(y, &log_x)?;
    d.subtract(&negatives, &positives)
}
