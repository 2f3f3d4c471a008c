//! Element types understood by every backend.

use crate::backend::BackendId;
use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;

/// The fixed set of element types.
///
/// A backend lists the subset it holds natively; asking it for anything
/// else fails with [`Error::InvalidDtype`] instead of substituting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    /// Booleans.
    Bool,
    /// 8-bit signed integers.
    Int8,
    /// 16-bit signed integers.
    Int16,
    /// 32-bit signed integers.
    Int32,
    /// 64-bit signed integers.
    Int64,
    /// IEEE half precision.
    Float16,
    /// IEEE single precision.
    Float32,
    /// IEEE double precision.
    Float64,
}

impl DType {
    /// All dtypes, narrowest first within each family.
    pub const ALL: [Self; 8] = [
        Self::Bool,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Float16,
        Self::Float32,
        Self::Float64,
    ];

    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// `true` for the float family.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// `true` for the signed integer family.
    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Result type of combining `self` with `other` elementwise.
    ///
    /// Follows the usual array-library lattice: `bool` yields to anything,
    /// same-family pairs widen, and an int meeting a float picks a float
    /// wide enough for the int (`int8 → float16`, `int16 → float32`,
    /// wider → `float64`).
    #[must_use]
    pub fn promote(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Bool, x) | (x, Self::Bool) => x,
            (a, b) if a.is_float() == b.is_float() => a.max(b),
            (i, f) | (f, i) if i.is_int() && f.is_float() => {
                let needed = match i {
                    Self::Int8 => Self::Float16,
                    Self::Int16 => Self::Float32,
                    _ => Self::Float64,
                };
                f.max(needed)
            }
            (a, b) => a.max(b),
        }
    }

    /// Coerces `v` onto the value grid of this dtype.
    ///
    /// Floats are rounded to their precision, ints truncate toward zero and
    /// wrap to their width, bools collapse to `0.0`/`1.0`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn quantize(self, v: f64) -> f64 {
        match self {
            Self::Bool => f64::from(u8::from(v != 0.0)),
            Self::Int8 => f64::from(v as i64 as i8),
            Self::Int16 => f64::from(v as i64 as i16),
            Self::Int32 => f64::from(v as i64 as i32),
            Self::Int64 => (v as i64) as f64,
            Self::Float16 => to_half_precision(v),
            Self::Float32 => f64::from(v as f32),
            Self::Float64 => v,
        }
    }

    /// Checks that `backend` lists this dtype among `supported`.
    ///
    /// # Errors
    /// [`Error::InvalidDtype`] naming the backend otherwise.
    pub fn require(self, backend: BackendId, supported: &[Self]) -> Result<Self> {
        if supported.contains(&self) {
            Ok(self)
        } else {
            Err(Error::InvalidDtype {
                dtype: self.as_str().to_owned(),
                backend: Some(backend),
            })
        }
    }
}

/// Rounds to the nearest IEEE half-precision value (ties to even).
fn to_half_precision(v: f64) -> f64 {
    const MAX_HALF: f64 = 65504.0;
    if !v.is_finite() || v == 0.0 {
        return v;
    }
    // anything at or above the midpoint to the next power of two overflows
    if v.abs() >= MAX_HALF + 16.0 {
        return f64::INFINITY.copysign(v);
    }
    // subnormals share the exponent of the smallest normal
    let exp = v.abs().log2().floor().max(-14.0);
    let quantum = (exp - 10.0).exp2();
    ((v / quantum).round_ties_even() * quantum).clamp(-MAX_HALF, MAX_HALF)
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| Error::InvalidDtype {
                dtype: s.to_owned(),
                backend: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips() {
        for d in DType::ALL {
            assert_eq!(d.as_str().parse::<DType>().unwrap(), d);
        }
        assert!(matches!(
            "complex64".parse::<DType>(),
            Err(Error::InvalidDtype { backend: None, .. })
        ));
    }

    #[test]
    fn promotion_lattice() {
        assert_eq!(DType::Bool.promote(DType::Int8), DType::Int8);
        assert_eq!(DType::Int32.promote(DType::Int64), DType::Int64);
        assert_eq!(DType::Int8.promote(DType::Float16), DType::Float16);
        assert_eq!(DType::Int32.promote(DType::Float32), DType::Float64);
        assert_eq!(DType::Float32.promote(DType::Float64), DType::Float64);
    }

    #[test]
    fn quantize_per_family() {
        assert_eq!(DType::Bool.quantize(-3.0), 1.0);
        assert_eq!(DType::Int8.quantize(130.0), -126.0);
        assert_eq!(DType::Int32.quantize(-2.7), -2.0);
        assert_eq!(DType::Float32.quantize(0.1), f64::from(0.1f32));
        assert_eq!(DType::Float16.quantize(1.0 + 1.0 / 4096.0), 1.0);
        assert_eq!(DType::Float16.quantize(70000.0), f64::INFINITY);
        assert_eq!(DType::Float16.quantize(0.5), 0.5);
    }
}
