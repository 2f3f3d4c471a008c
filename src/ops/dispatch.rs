//! Operation Dispatch Layer
//!
//! [`Dispatch`] is the unified function surface. For every operation it
//!
//! 1. collects the [`Array`] arguments as example values,
//! 2. resolves a backend (explicit, then scope, then examples, then the
//!    process default, see [`infer`](crate::infer)),
//! 3. fetches the backend's binding from the [`Registry`], loading it on
//!    first use,
//! 4. checks the binding's capability set for the operation,
//! 5. forwards the arguments and returns the adapter's result unmodified.
//!
//! The facade only parses string arguments (devices, dtypes, reductions)
//! and fills documented defaults. It never converts values between
//! backends; shape and dtype checking is the adapter's business.
//!
//! # Example
//! ```rust
//! use polytensor::nested;
//!
//! let d = polytensor::auto();
//! let a = d.array(&nested!([[1.0, 2.0], [3.0, 4.0]]), None, None).unwrap();
//! let b = d.transpose(&a, None).unwrap();
//! let c = d.matmul(&a, &b).unwrap();
//! assert_eq!(d.to_list(&c).unwrap(), nested!([[5.0, 11.0], [11.0, 25.0]]));
//! ```

use crate::adapter::{Adapter, CompiledFn, Reduction};
use crate::backend::BackendId;
use crate::capability::Op;
use crate::device::{parse_device, Device};
use crate::dtype::DType;
use crate::error::Result;
use crate::infer;
use crate::registry::Registry;
use crate::tensors::{Array, Nested};
use ndarray::ArrayD;
use std::sync::Arc;

/// Parses an optional dtype argument.
fn parse_dtype(dtype: Option<&str>) -> Result<Option<DType>> {
    dtype.map(str::parse).transpose()
}

/// Routes unified operations to backends.
///
/// Cheap to copy; holds a registry reference and an optional explicit
/// backend.
#[derive(Debug, Clone, Copy)]
pub struct Dispatch<'r> {
    registry: &'r Registry,
    explicit: Option<BackendId>,
}

impl Dispatch<'static> {
    /// Infers the backend per call, against the global registry.
    #[must_use]
    pub fn auto() -> Self {
        Self::new(Registry::global(), None)
    }

    /// Always uses `backend`, against the global registry.
    #[must_use]
    pub fn on(backend: BackendId) -> Self {
        Self::new(Registry::global(), Some(backend))
    }
}

impl<'r> Dispatch<'r> {
    /// A facade over `registry`; `explicit` overrides inference when set.
    #[must_use]
    pub const fn new(registry: &'r Registry, explicit: Option<BackendId>) -> Self {
        Self { registry, explicit }
    }

    /// The explicit backend, if any.
    #[must_use]
    pub const fn explicit(&self) -> Option<BackendId> {
        self.explicit
    }

    /// Backend a call with these example values would go to.
    ///
    /// # Errors
    /// [`Error::AmbiguousBackend`](crate::Error::AmbiguousBackend) for mixed examples.
    pub fn backend_for(&self, examples: &[&Array]) -> Result<BackendId> {
        infer::resolve(self.explicit, examples)
    }

    fn call<T>(
        &self,
        op: Op,
        examples: &[&Array],
        f: impl FnOnce(&dyn Adapter) -> Result<T>,
    ) -> Result<T> {
        let backend = infer::resolve(self.explicit, examples)?;
        let binding = self.registry.get_binding(backend)?;
        let adapter = binding.require(op)?;
        tracing::trace!(op = op.name(), backend = backend.as_str(), "dispatch");
        f(adapter)
    }

    // ---- creation ----

    /// Array from nested data; dtype inferred from the data when `None`.
    ///
    /// # Errors
    /// `InvalidDtype`, `InvalidDevice`, routing errors, or the adapter's.
    pub fn array(&self, data: &Nested, dtype: Option<&str>, device: Option<&str>) -> Result<Array> {
        let dtype = parse_dtype(dtype)?;
        let device = parse_device(device)?;
        self.call(Op::Array, &[], |a| a.array(data, dtype, device))
    }

    /// `[start, stop)` in steps of `step` (defaults `0` and `1`).
    ///
    /// # Errors
    /// `InvalidDtype`, `InvalidDevice`, routing errors, or the adapter's.
    pub fn arange(
        &self,
        stop: f64,
        start: Option<f64>,
        step: Option<f64>,
        dtype: Option<&str>,
        device: Option<&str>,
    ) -> Result<Array> {
        let dtype = parse_dtype(dtype)?;
        let device = parse_device(device)?;
        self.call(Op::Arange, &[], |a| {
            a.arange(stop, start.unwrap_or(0.0), step.unwrap_or(1.0), dtype, device)
        })
    }

    /// `num` evenly spaced values over `[start, stop]`.
    ///
    /// # Errors
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn linspace(
        &self,
        start: f64,
        stop: f64,
        num: usize,
        axis: Option<isize>,
        device: Option<&str>,
    ) -> Result<Array> {
        let device = parse_device(device)?;
        self.call(Op::Linspace, &[], |a| a.linspace(start, stop, num, axis, device))
    }

    /// Zeros of `shape`, `float32` unless `dtype` is given.
    ///
    /// # Errors
    /// `InvalidDtype`, `InvalidDevice`, routing errors, or the adapter's.
    pub fn zeros(&self, shape: &[usize], dtype: Option<&str>, device: Option<&str>) -> Result<Array> {
        let dtype = parse_dtype(dtype)?.unwrap_or(DType::Float32);
        let device = parse_device(device)?;
        self.call(Op::Zeros, &[], |a| a.zeros(shape, dtype, device))
    }

    /// Ones of `shape`, `float32` unless `dtype` is given.
    ///
    /// # Errors
    /// `InvalidDtype`, `InvalidDevice`, routing errors, or the adapter's.
    pub fn ones(&self, shape: &[usize], dtype: Option<&str>, device: Option<&str>) -> Result<Array> {
        let dtype = parse_dtype(dtype)?.unwrap_or(DType::Float32);
        let device = parse_device(device)?;
        self.call(Op::Ones, &[], |a| a.ones(shape, dtype, device))
    }

    /// Zeros shaped like `x`.
    ///
    /// # Errors
    /// `InvalidDtype`, `InvalidDevice`, routing errors, or the adapter's.
    pub fn zeros_like(&self, x: &Array, dtype: Option<&str>, device: Option<&str>) -> Result<Array> {
        let dtype = parse_dtype(dtype)?;
        let device = parse_device(device)?;
        self.call(Op::ZerosLike, &[x], |a| a.zeros_like(x, dtype, device))
    }

    /// Ones shaped like `x`.
    ///
    /// # Errors
    /// `InvalidDtype`, `InvalidDevice`, routing errors, or the adapter's.
    pub fn ones_like(&self, x: &Array, dtype: Option<&str>, device: Option<&str>) -> Result<Array> {
        let dtype = parse_dtype(dtype)?;
        let device = parse_device(device)?;
        self.call(Op::OnesLike, &[x], |a| a.ones_like(x, dtype, device))
    }

    /// `n × n` identity (`float32` by default), tiled over `batch_shape`.
    ///
    /// # Errors
    /// `InvalidDtype`, `InvalidDevice`, routing errors, or the adapter's.
    pub fn identity(
        &self,
        n: usize,
        dtype: Option<&str>,
        batch_shape: Option<&[usize]>,
        device: Option<&str>,
    ) -> Result<Array> {
        let dtype = parse_dtype(dtype)?.unwrap_or(DType::Float32);
        let device = parse_device(device)?;
        self.call(Op::Identity, &[], |a| a.identity(n, dtype, batch_shape, device))
    }

    /// One-hot encoding of `indices` with `depth` classes.
    ///
    /// # Errors
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn one_hot(&self, indices: &Array, depth: usize, device: Option<&str>) -> Result<Array> {
        let device = parse_device(device)?;
        self.call(Op::OneHot, &[indices], |a| a.one_hot(indices, depth, device))
    }

    // ---- shape ----

    /// New shape over the same elements; one entry may be `-1`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn reshape(&self, x: &Array, shape: &[isize]) -> Result<Array> {
        self.call(Op::Reshape, &[x], |a| a.reshape(x, shape))
    }

    /// Drops size-1 axes.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn squeeze(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        self.call(Op::Squeeze, &[x], |a| a.squeeze(x, axis))
    }

    /// Inserts a size-1 axis.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn expand_dims(&self, x: &Array, axis: isize) -> Result<Array> {
        self.call(Op::ExpandDims, &[x], |a| a.expand_dims(x, axis))
    }

    /// Permutes axes; `None` reverses them.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn transpose(&self, x: &Array, axes: Option<&[usize]>) -> Result<Array> {
        self.call(Op::Transpose, &[x], |a| a.transpose(x, axes))
    }

    /// Exchanges two axes.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn swapaxes(&self, x: &Array, axis0: isize, axis1: isize) -> Result<Array> {
        self.call(Op::Swapaxes, &[x], |a| a.swapaxes(x, axis0, axis1))
    }

    /// Joins along `axis`; `None` flattens every input and joins on axis 0.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn concatenate(&self, xs: &[&Array], axis: Option<isize>) -> Result<Array> {
        self.call(Op::Concatenate, xs, |a| a.concatenate(xs, axis))
    }

    /// Joins along a new axis.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn stack(&self, xs: &[&Array], axis: isize) -> Result<Array> {
        self.call(Op::Stack, xs, |a| a.stack(xs, axis))
    }

    /// Splits along `axis`, dropping it.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn unstack(&self, x: &Array, axis: isize) -> Result<Vec<Array>> {
        self.call(Op::Unstack, &[x], |a| a.unstack(x, axis))
    }

    /// Equal sections along `axis`, one per element by default.
    ///
    /// # Errors
    /// Routing errors or the adapter's (uneven splits among them).
    pub fn split(&self, x: &Array, num_sections: Option<usize>, axis: isize) -> Result<Vec<Array>> {
        self.call(Op::Split, &[x], |a| a.split(x, num_sections, axis))
    }

    /// Repeats `x` `reps[i]` times along axis `i`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn tile(&self, x: &Array, reps: &[usize]) -> Result<Array> {
        self.call(Op::Tile, &[x], |a| a.tile(x, reps))
    }

    /// Reverses one axis, or all of them for `None`.
    ///
    /// # Errors
    /// Routing errors or the adapter's (several axes among them).
    pub fn flip(&self, x: &Array, axis: Option<&[isize]>) -> Result<Array> {
        self.call(Op::Flip, &[x], |a| a.flip(x, axis))
    }

    /// Pads with `value`, one `(before, after)` pair per axis.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn constant_pad(&self, x: &Array, pad_width: &[(usize, usize)], value: f64) -> Result<Array> {
        self.call(Op::ConstantPad, &[x], |a| a.constant_pad(x, pad_width, value))
    }

    /// Pads with zeros.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn zero_pad(&self, x: &Array, pad_width: &[(usize, usize)]) -> Result<Array> {
        self.call(Op::ZeroPad, &[x], |a| a.zero_pad(x, pad_width))
    }

    /// `x1` where `condition` holds, `x2` elsewhere.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn where_(&self, condition: &Array, x1: &Array, x2: &Array) -> Result<Array> {
        self.call(Op::Where, &[condition, x1, x2], |a| a.where_(condition, x1, x2))
    }

    // ---- indexing ----

    /// Takes rows of `params` along axis 0.
    ///
    /// # Errors
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn gather_flat(&self, params: &Array, indices: &Array, device: Option<&str>) -> Result<Array> {
        let device = parse_device(device)?;
        self.call(Op::GatherFlat, &[params, indices], |a| {
            a.gather_flat(params, indices, device)
        })
    }

    /// Gathers slices addressed by the last axis of `indices`.
    ///
    /// # Errors
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn gather_nd(&self, params: &Array, indices: &Array, device: Option<&str>) -> Result<Array> {
        let device = parse_device(device)?;
        self.call(Op::GatherNd, &[params, indices], |a| {
            a.gather_nd(params, indices, device)
        })
    }

    /// Scatters `updates` into a zeroed 1-D target of length `size`.
    ///
    /// # Errors
    /// `InvalidReduction` unless `reduction` is `sum`, `min` or `max`;
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn scatter_flat(
        &self,
        indices: &Array,
        updates: &Array,
        size: usize,
        reduction: &str,
        device: Option<&str>,
    ) -> Result<Array> {
        let reduction: Reduction = reduction.parse()?;
        let device = parse_device(device)?;
        self.call(Op::ScatterFlat, &[indices, updates], |a| {
            a.scatter_flat(indices, updates, size, reduction, device)
        })
    }

    /// Scatters `updates` into a zeroed target of `shape`.
    ///
    /// # Errors
    /// `InvalidReduction` unless `reduction` is `sum`, `min` or `max`;
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn scatter_nd(
        &self,
        indices: &Array,
        updates: &Array,
        shape: &[usize],
        reduction: &str,
        device: Option<&str>,
    ) -> Result<Array> {
        let reduction: Reduction = reduction.parse()?;
        let device = parse_device(device)?;
        self.call(Op::ScatterNd, &[indices, updates], |a| {
            a.scatter_nd(indices, updates, shape, reduction, device)
        })
    }

    /// Coordinates of non-zero elements.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn indices_where(&self, x: &Array) -> Result<Array> {
        self.call(Op::IndicesWhere, &[x], |a| a.indices_where(x))
    }

    // ---- math ----

    /// Elementwise minimum.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn minimum(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::Minimum, &[x, y], |a| a.minimum(x, y))
    }

    /// Elementwise maximum.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn maximum(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::Maximum, &[x, y], |a| a.maximum(x, y))
    }

    /// Limits values to `[min, max]`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn clip(&self, x: &Array, min: f64, max: f64) -> Result<Array> {
        self.call(Op::Clip, &[x], |a| a.clip(x, min, max))
    }

    /// Rounds half to even.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn round(&self, x: &Array) -> Result<Array> {
        self.call(Op::Round, &[x], |a| a.round(x))
    }

    /// Elementwise floor.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn floor(&self, x: &Array) -> Result<Array> {
        self.call(Op::Floor, &[x], |a| a.floor(x))
    }

    /// Elementwise ceiling.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn ceil(&self, x: &Array) -> Result<Array> {
        self.call(Op::Ceil, &[x], |a| a.ceil(x))
    }

    /// Elementwise absolute value.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn abs(&self, x: &Array) -> Result<Array> {
        self.call(Op::Abs, &[x], |a| a.abs(x))
    }

    /// Remainder with the sign of the divisor.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn floormod(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::Floormod, &[x, y], |a| a.floormod(x, y))
    }

    /// Index of the largest value along `axis` (default 0).
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn argmax(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        self.call(Op::Argmax, &[x], |a| a.argmax(x, axis.unwrap_or(0)))
    }

    /// Index of the smallest value along `axis` (default 0).
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn argmin(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        self.call(Op::Argmin, &[x], |a| a.argmin(x, axis.unwrap_or(0)))
    }

    /// Cross product over the last axis.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn cross(&self, x1: &Array, x2: &Array) -> Result<Array> {
        self.call(Op::Cross, &[x1, x2], |a| a.cross(x1, x2))
    }

    /// Matrix product.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn matmul(&self, x1: &Array, x2: &Array) -> Result<Array> {
        self.call(Op::Matmul, &[x1, x2], |a| a.matmul(x1, x2))
    }

    /// Running sum along `axis`, or over the flattened array.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn cumsum(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        self.call(Op::Cumsum, &[x], |a| a.cumsum(x, axis))
    }

    /// Elementwise logical and.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn logical_and(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::LogicalAnd, &[x, y], |a| a.logical_and(x, y))
    }

    /// Elementwise logical or.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn logical_or(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::LogicalOr, &[x, y], |a| a.logical_or(x, y))
    }

    /// Elementwise logical not.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn logical_not(&self, x: &Array) -> Result<Array> {
        self.call(Op::LogicalNot, &[x], |a| a.logical_not(x))
    }

    /// Elementwise sum.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn add(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::Add, &[x, y], |a| a.add(x, y))
    }

    /// Elementwise difference.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn subtract(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::Subtract, &[x, y], |a| a.subtract(x, y))
    }

    /// Elementwise product.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn multiply(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::Multiply, &[x, y], |a| a.multiply(x, y))
    }

    /// Elementwise true division.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn divide(&self, x: &Array, y: &Array) -> Result<Array> {
        self.call(Op::Divide, &[x, y], |a| a.divide(x, y))
    }

    /// Elementwise natural logarithm.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn log(&self, x: &Array) -> Result<Array> {
        self.call(Op::Log, &[x], |a| a.log(x))
    }

    // ---- introspection ----

    /// Dimensions of `x`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn shape(&self, x: &Array) -> Result<Vec<usize>> {
        self.call(Op::Shape, &[x], |a| a.shape(x))
    }

    /// Dimensions of `x` as an `int32` array.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn shape_as_tensor(&self, x: &Array) -> Result<Array> {
        self.call(Op::Shape, &[x], |a| a.shape_as_tensor(x))
    }

    /// Number of dimensions of `x`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn get_num_dims(&self, x: &Array) -> Result<usize> {
        self.call(Op::GetNumDims, &[x], |a| a.get_num_dims(x))
    }

    /// Number of dimensions of `x` as a 0-d `int32` array.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn get_num_dims_as_tensor(&self, x: &Array) -> Result<Array> {
        self.call(Op::GetNumDims, &[x], |a| a.get_num_dims_as_tensor(x))
    }

    /// Element type of `x`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn dtype(&self, x: &Array) -> Result<DType> {
        self.call(Op::Dtype, &[x], |a| a.dtype(x))
    }

    /// String form of `dtype` on the resolved backend.
    ///
    /// # Errors
    /// `InvalidDtype` when the backend cannot hold `dtype`, or routing errors.
    pub fn dtype_to_str(&self, dtype: DType) -> Result<&'static str> {
        self.call(Op::DtypeToStr, &[], |a| a.dtype_to_str(dtype))
    }

    /// String form of the element type of `x`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn dtype_str(&self, x: &Array) -> Result<&'static str> {
        self.call(Op::DtypeStr, &[x], |a| a.dtype_str(x))
    }

    /// Device holding `x`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn dev(&self, x: &Array) -> Result<Device> {
        self.call(Op::Dev, &[x], |a| a.dev(x))
    }

    /// Canonical string form of a device.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn dev_to_str(&self, device: Device) -> Result<String> {
        self.call(Op::DevToStr, &[], |a| a.dev_to_str(device))
    }

    /// Canonical device string of `x`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn dev_str(&self, x: &Array) -> Result<String> {
        self.call(Op::DevStr, &[x], |a| a.dev_str(x))
    }

    /// Converts `x` to the dtype named by `dtype`.
    ///
    /// # Errors
    /// `InvalidDtype`, routing errors, or the adapter's.
    pub fn cast(&self, x: &Array, dtype: &str) -> Result<Array> {
        let dtype: DType = dtype.parse()?;
        self.call(Op::Cast, &[x], |a| a.cast(x, dtype))
    }

    /// Whether the resolved backend can reach a GPU.
    ///
    /// # Errors
    /// Routing errors.
    pub fn gpu_is_available(&self) -> Result<bool> {
        self.call(Op::GpuIsAvailable, &[], |a| a.gpu_is_available())
    }

    /// Whether the resolved backend can reach a TPU.
    ///
    /// # Errors
    /// Routing errors.
    pub fn tpu_is_available(&self) -> Result<bool> {
        self.call(Op::TpuIsAvailable, &[], |a| a.tpu_is_available())
    }

    // ---- random ----

    /// Uniform samples from `[low, high)`, placed on `device` (default `cpu`).
    ///
    /// # Errors
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn random_uniform(
        &self,
        low: f64,
        high: f64,
        shape: &[usize],
        device: Option<&str>,
    ) -> Result<Array> {
        let device = parse_device(device)?.unwrap_or_default();
        self.call(Op::RandomUniform, &[], |a| a.random_uniform(low, high, shape, device))
    }

    /// Integers drawn uniformly from `[low, high)`.
    ///
    /// # Errors
    /// `InvalidDevice`, routing errors, or the adapter's.
    pub fn randint(&self, low: i64, high: i64, shape: &[usize], device: Option<&str>) -> Result<Array> {
        let device = parse_device(device)?.unwrap_or_default();
        self.call(Op::Randint, &[], |a| a.randint(low, high, shape, device))
    }

    /// Reseeds the resolved backend's generator.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn seed(&self, value: u64) -> Result<()> {
        self.call(Op::Seed, &[], |a| a.seed(value))
    }

    /// Shuffles `x` along axis 0.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn shuffle(&self, x: &Array) -> Result<Array> {
        self.call(Op::Shuffle, &[x], |a| a.shuffle(x))
    }

    // ---- conversion ----

    /// Copies `x` to a host `ndarray`.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn to_numpy(&self, x: &Array) -> Result<ArrayD<f64>> {
        self.call(Op::ToNumpy, &[x], |a| a.to_numpy(x))
    }

    /// Copies `x` to nested list data.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn to_list(&self, x: &Array) -> Result<Nested> {
        self.call(Op::ToList, &[x], |a| a.to_list(x))
    }

    // ---- compilation ----

    /// Prepares `f` for repeated calls on the resolved backend.
    ///
    /// `example_inputs`, when given, take part in backend inference.
    ///
    /// # Errors
    /// Routing errors or the adapter's.
    pub fn compile_fn<F>(
        &self,
        f: F,
        dynamic: bool,
        example_inputs: Option<&[Array]>,
    ) -> Result<CompiledFn>
    where
        F: Fn(&[Array]) -> Result<Vec<Array>> + Send + Sync + 'static,
    {
        let examples: Vec<&Array> = example_inputs.unwrap_or_default().iter().collect();
        self.call(Op::CompileFn, &examples, |a| {
            a.compile_fn(Arc::new(f), dynamic, example_inputs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn string_arguments_are_checked_before_routing() {
        // an empty registry would fail with BackendLoad if routing ran first
        let registry = Registry::new();
        let d = Dispatch::new(&registry, Some(BackendId::Numpy));
        assert!(matches!(
            d.zeros(&[1], Some("complex64"), None),
            Err(Error::InvalidDtype { backend: None, .. })
        ));
        assert!(matches!(
            d.zeros(&[1], None, Some("cuda:0")),
            Err(Error::InvalidDevice { .. })
        ));
        assert!(matches!(
            d.zeros(&[1], None, None),
            Err(Error::BackendLoad { backend: BackendId::Numpy, .. })
        ));
    }
}
