//! Values that cross the dispatch boundary.
//!
//! # Backend-native arrays
//!
//! [`Array`] is what every backend returns. It carries an explicit backend
//! tag next to an opaque, shared payload: the dispatch core reads the tag to
//! infer a backend and never looks inside the payload. Only the adapter that
//! produced a value downcasts it (see [`Array::native`]).
//!
//! # Nested literal data
//!
//! [`Nested`] is the host-side, backend-neutral form of array data: the
//! input of `array` and the output of `to_list`. The [`nested!`] macro
//! builds one from literal arrays, mixing ints, floats and bools freely.
//!
//! ## Example
//!
//! ```rust
//! use polytensor::nested;
//! use polytensor::tensors::Nested;
//! let n = nested!([[1, 2.5], [-3, 4]]);
//! assert_eq!(n.shape().unwrap(), vec![2, 2]);
//! assert_eq!(n, Nested::from([[1.0, 2.5], [-3.0, 4.0]]));
//! ```

use crate::backend::BackendId;
use crate::capability::Op;
use crate::dtype::DType;
use crate::error::{Error, Result};
use core::any::Any;
use core::fmt;
use std::sync::Arc;

/// A value produced by one backend, tagged with that backend's identifier.
///
/// Cloning shares the payload; arrays are never mutated after creation.
#[derive(Clone)]
pub struct Array {
    backend: BackendId,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Array {
    /// Wraps a backend's native value.
    pub fn new<T: Any + Send + Sync>(backend: BackendId, payload: T) -> Self {
        Self {
            backend,
            payload: Arc::new(payload),
        }
    }

    /// The backend that produced this value.
    #[must_use]
    pub const fn backend(&self) -> BackendId {
        self.backend
    }

    /// Borrows the payload as `T` if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    /// Borrows the payload for the adapter of `backend` running `op`.
    ///
    /// # Errors
    /// - [`Error::ForeignValue`] if the value was made by another backend.
    /// - [`Error::InvalidArgument`] if the tag matches but the payload type
    ///   does not (two adapters disagreeing about one identifier).
    pub fn native<T: Any>(&self, backend: BackendId, op: Op) -> Result<&T> {
        if self.backend != backend {
            return Err(Error::ForeignValue {
                backend,
                found: self.backend,
                op,
            });
        }
        self.downcast_ref().ok_or_else(|| {
            Error::invalid(
                op,
                format!("payload is not a native {backend} value"),
            )
        })
    }

    /// `true` if both arrays share one payload.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Nested list data, the host-side form of an array.
///
/// Equality is numeric: `Int(1) == Float(1.0)` and `Bool(true) == Int(1)`,
/// so values survive a trip through a float or bool array unchanged.
#[derive(Debug, Clone)]
pub enum Nested {
    /// A boolean leaf.
    Bool(bool),
    /// An integer leaf.
    Int(i64),
    /// A floating point leaf.
    Float(f64),
    /// One level of nesting.
    List(Vec<Nested>),
}

impl Nested {
    /// Shape of the data, outermost dimension first.
    ///
    /// # Errors
    /// Returns a description of the first ragged level.
    pub fn shape(&self) -> core::result::Result<Vec<usize>, String> {
        match self {
            Self::List(items) => {
                let mut shape = vec![items.len()];
                if let Some((first, rest)) = items.split_first() {
                    let inner = first.shape()?;
                    for item in rest {
                        if item.shape()? != inner {
                            return Err(format!(
                                "ragged nested data (rows have mismatched shapes at depth {})",
                                shape.len()
                            ));
                        }
                    }
                    shape.extend(inner);
                }
                Ok(shape)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Flattened leaves in row-major order, as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn flatten(&self) -> Vec<f64> {
        fn walk(n: &Nested, out: &mut Vec<f64>) {
            match n {
                Nested::Bool(b) => out.push(f64::from(u8::from(*b))),
                Nested::Int(i) => out.push(*i as f64),
                Nested::Float(x) => out.push(*x),
                Nested::List(items) => items.iter().for_each(|i| walk(i, out)),
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Narrowest dtype family holding every leaf, given the backend's
    /// preferred int and float widths.
    ///
    /// Empty data counts as float.
    #[must_use]
    pub fn infer_dtype(&self, int: DType, float: DType) -> DType {
        #[derive(PartialEq, PartialOrd)]
        enum Family {
            Empty,
            Bool,
            Int,
            Float,
        }
        fn walk(n: &Nested) -> Family {
            match n {
                Nested::Bool(_) => Family::Bool,
                Nested::Int(_) => Family::Int,
                Nested::Float(_) => Family::Float,
                Nested::List(items) => items
                    .iter()
                    .map(walk)
                    .fold(Family::Empty, |a, b| if b > a { b } else { a }),
            }
        }
        match walk(self) {
            Family::Bool => DType::Bool,
            Family::Int => int,
            Family::Float | Family::Empty => float,
        }
    }

    /// Leaf as `f64`, `None` for lists.
    #[allow(clippy::cast_precision_loss)]
    fn scalar(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Int(i) => Some(*i as f64),
            Self::Float(x) => Some(*x),
            Self::List(_) => None,
        }
    }
}

impl PartialEq for Nested {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (a, b) => match (a.scalar(), b.scalar()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl From<bool> for Nested {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Nested {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Nested {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Nested {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Nested {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Nested {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>, const N: usize> From<[T; N]> for Nested {
    fn from(v: [T; N]) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Builds [`Nested`] data from nested literal arrays.
///
/// Leaves may be any mix of integer, float and bool literals (negative
/// numbers included). Sub-lists must be uniform in shape for the data to be
/// accepted by `array`, but the macro itself does not check.
///
/// # Example
/// ```
/// use polytensor::nested;
/// let n = nested!([[1, -2], [3, 4]]);
/// assert_eq!(n.shape().unwrap(), vec![2, 2]);
/// let scalar = nested!(2.5);
/// assert!(scalar.shape().unwrap().is_empty());
/// ```
#[macro_export]
macro_rules! nested {
    (@list [ $($done:expr),* ]) => {
        $crate::tensors::Nested::List(vec![ $($done),* ])
    };
    (@list [ $($done:expr),* ] [ $($inner:tt)* ] $(, $($rest:tt)*)?) => {
        $crate::nested!(@list [ $($done,)* $crate::nested!([ $($inner)* ]) ] $($($rest)*)?)
    };
    (@list [ $($done:expr),* ] $lit:literal $(, $($rest:tt)*)?) => {
        $crate::nested!(@list [ $($done,)* $crate::tensors::Nested::from($lit) ] $($($rest)*)?)
    };

    ([ $($body:tt)* ]) => {
        $crate::nested!(@list [] $($body)*)
    };
    ($lit:literal) => {
        $crate::tensors::Nested::from($lit)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_builds_mixed_lists() {
        let n = nested!([[1, 2.5, true], [-3, -4.0, false],]);
        assert_eq!(n.shape().unwrap(), vec![2, 3]);
        assert_eq!(n.flatten(), vec![1.0, 2.5, 1.0, -3.0, -4.0, 0.0]);
        assert_eq!(n.infer_dtype(DType::Int64, DType::Float64), DType::Float64);
    }

    #[test]
    fn ragged_data_is_reported() {
        let n = nested!([[1, 2], [3]]);
        assert!(n.shape().is_err());
    }

    #[test]
    fn equality_is_numeric() {
        assert_eq!(nested!([1, 0]), nested!([1.0, 0.0]));
        assert_eq!(nested!([true, false]), nested!([1, 0]));
        assert_ne!(nested!([1, 2]), nested!([[1, 2]]));
    }

    #[test]
    fn infers_narrowest_family() {
        assert_eq!(nested!([true]).infer_dtype(DType::Int32, DType::Float32), DType::Bool);
        assert_eq!(nested!([1, 2]).infer_dtype(DType::Int32, DType::Float32), DType::Int32);
        assert_eq!(nested!([]).infer_dtype(DType::Int32, DType::Float32), DType::Float32);
    }

    #[test]
    fn foreign_payloads_are_rejected() {
        let a = Array::new(BackendId::Jax, 5_u8);
        assert!(matches!(
            a.native::<u8>(BackendId::Numpy, Op::Abs),
            Err(Error::ForeignValue { found: BackendId::Jax, .. })
        ));
        assert_eq!(a.native::<u8>(BackendId::Jax, Op::Abs).unwrap(), &5);
        assert!(a.native::<u16>(BackendId::Jax, Op::Abs).is_err());
    }
}
