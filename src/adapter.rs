//! The fixed interface every backend implements.
//!
//! An [`Adapter`] exposes one method per [`Op`]. Every operation method has a
//! default body that reports [`Error::UnsupportedOperation`], so a partial
//! backend only implements what it lists in [`Adapter::capabilities`]. The
//! facade checks the capability set before calling, the defaults are a
//! backstop for adapters whose list and methods disagree.
//!
//! Arguments reach an adapter already parsed (devices, dtypes, reductions)
//! and otherwise untouched. Shape and dtype checking is the adapter's job.
//!
//! ## Adding a backend
//!
//! 1. Pick its [`BackendId`] and implement `Adapter` for a new type.
//! 2. Tag every returned value with that id ([`Array::new`]) and read
//!    incoming values back with [`Array::native`].
//! 3. Install a loader on a [`Registry`](crate::registry::Registry).

use crate::backend::BackendId;
use crate::capability::{Capabilities, Op};
use crate::device::{Device, DeviceKind};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::tensors::{Array, Nested};
use core::fmt;
use core::str::FromStr;
use ndarray::ArrayD;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A function over arrays, as accepted by `compile_fn`.
pub type ArrayFn = Arc<dyn Fn(&[Array]) -> Result<Vec<Array>> + Send + Sync>;

/// Conflict policy when scatter writes several updates to one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    /// Add all updates.
    Sum,
    /// Keep the smallest update.
    Min,
    /// Keep the largest update.
    Max,
}

impl Reduction {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Folds `update` into a cell that already holds a value.
    #[must_use]
    pub fn combine(self, current: f64, update: f64) -> f64 {
        match self {
            Self::Sum => current + update,
            Self::Min => current.min(update),
            Self::Max => current.max(update),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reduction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            _ => Err(Error::InvalidReduction {
                reduction: s.to_owned(),
            }),
        }
    }
}

/// A function prepared by a backend's compilation hook.
///
/// Produces the same values as the function it wraps. Backends with a
/// tracer count how often they had to trace; eager backends never do.
#[derive(Clone)]
pub struct CompiledFn {
    backend: BackendId,
    inner: ArrayFn,
    traces: Arc<AtomicUsize>,
}

impl CompiledFn {
    /// Wraps `inner` without any tracing.
    #[must_use]
    pub fn new(backend: BackendId, inner: ArrayFn) -> Self {
        Self::traced(backend, inner, Arc::new(AtomicUsize::new(0)))
    }

    /// Wraps `inner`, sharing a trace counter the backend bumps.
    #[must_use]
    pub const fn traced(backend: BackendId, inner: ArrayFn, traces: Arc<AtomicUsize>) -> Self {
        Self {
            backend,
            inner,
            traces,
        }
    }

    /// Runs the function.
    ///
    /// # Errors
    /// Whatever the wrapped function or the backend's tracer reports.
    pub fn call(&self, inputs: &[Array]) -> Result<Vec<Array>> {
        (self.inner)(inputs)
    }

    /// Backend that compiled the function.
    #[must_use]
    pub const fn backend(&self) -> BackendId {
        self.backend
    }

    /// Number of traces performed so far.
    #[must_use]
    pub fn traces(&self) -> usize {
        self.traces.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for CompiledFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFn")
            .field("backend", &self.backend)
            .field("traces", &self.traces())
            .finish_non_exhaustive()
    }
}

/// The error every default operation body returns.
fn unsupported<T>(backend: BackendId, op: Op) -> Result<T> {
    Err(Error::UnsupportedOperation { backend, op })
}

/// One backend's implementation of the unified operation set.
#[allow(unused_variables)]
pub trait Adapter: Send + Sync {
    /// The identifier every value this adapter returns is tagged with.
    fn id(&self) -> BackendId;

    /// Operations this adapter implements.
    fn capabilities(&self) -> Capabilities;

    /// Dtypes held natively.
    fn dtypes(&self) -> &'static [DType];

    /// Device families values can be placed on.
    fn device_kinds(&self) -> &'static [DeviceKind];

    // ---- creation ----

    /// Array from nested data; dtype inferred from the leaves when `None`.
    fn array(&self, data: &Nested, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::Array)
    }

    /// Evenly spaced values in `[start, stop)`.
    fn arange(
        &self,
        stop: f64,
        start: f64,
        step: f64,
        dtype: Option<DType>,
        device: Option<Device>,
    ) -> Result<Array> {
        unsupported(self.id(), Op::Arange)
    }

    /// `num` evenly spaced values over `[start, stop]`.
    fn linspace(
        &self,
        start: f64,
        stop: f64,
        num: usize,
        axis: Option<isize>,
        device: Option<Device>,
    ) -> Result<Array> {
        unsupported(self.id(), Op::Linspace)
    }

    /// Array of zeros.
    fn zeros(&self, shape: &[usize], dtype: DType, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::Zeros)
    }

    /// Array of ones.
    fn ones(&self, shape: &[usize], dtype: DType, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::Ones)
    }

    /// Zeros shaped like `x`, keeping its dtype and device unless given.
    fn zeros_like(&self, x: &Array, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::ZerosLike)
    }

    /// Ones shaped like `x`, keeping its dtype and device unless given.
    fn ones_like(&self, x: &Array, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::OnesLike)
    }

    /// `n × n` identity, optionally tiled over `batch_shape`.
    fn identity(
        &self,
        n: usize,
        dtype: DType,
        batch_shape: Option<&[usize]>,
        device: Option<Device>,
    ) -> Result<Array> {
        unsupported(self.id(), Op::Identity)
    }

    /// One-hot encoding along a new trailing axis of size `depth`.
    fn one_hot(&self, indices: &Array, depth: usize, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::OneHot)
    }

    // ---- shape ----

    /// New shape over the same elements; one entry may be `-1`.
    fn reshape(&self, x: &Array, shape: &[isize]) -> Result<Array> {
        unsupported(self.id(), Op::Reshape)
    }

    /// Drops size-1 axes (all of them, or the one given).
    fn squeeze(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        unsupported(self.id(), Op::Squeeze)
    }

    /// Inserts a size-1 axis.
    fn expand_dims(&self, x: &Array, axis: isize) -> Result<Array> {
        unsupported(self.id(), Op::ExpandDims)
    }

    /// Permutes axes; `None` reverses them.
    fn transpose(&self, x: &Array, axes: Option<&[usize]>) -> Result<Array> {
        unsupported(self.id(), Op::Transpose)
    }

    /// Exchanges two axes.
    fn swapaxes(&self, x: &Array, axis0: isize, axis1: isize) -> Result<Array> {
        unsupported(self.id(), Op::Swapaxes)
    }

    /// Joins arrays along `axis`; `None` flattens each input first.
    fn concatenate(&self, xs: &[&Array], axis: Option<isize>) -> Result<Array> {
        unsupported(self.id(), Op::Concatenate)
    }

    /// Joins arrays along a new axis.
    fn stack(&self, xs: &[&Array], axis: isize) -> Result<Array> {
        unsupported(self.id(), Op::Stack)
    }

    /// Splits along `axis` into arrays with that axis removed.
    fn unstack(&self, x: &Array, axis: isize) -> Result<Vec<Array>> {
        unsupported(self.id(), Op::Unstack)
    }

    /// Splits along `axis` into equal sections (default: size of the axis).
    fn split(&self, x: &Array, num_sections: Option<usize>, axis: isize) -> Result<Vec<Array>> {
        unsupported(self.id(), Op::Split)
    }

    /// Repeats `x` `reps[i]` times along axis `i`.
    fn tile(&self, x: &Array, reps: &[usize]) -> Result<Array> {
        unsupported(self.id(), Op::Tile)
    }

    /// Reverses one axis, or all of them for `None`.
    fn flip(&self, x: &Array, axis: Option<&[isize]>) -> Result<Array> {
        unsupported(self.id(), Op::Flip)
    }

    /// Pads every axis with `value`; `pad_width[i] = (before, after)`.
    fn constant_pad(&self, x: &Array, pad_width: &[(usize, usize)], value: f64) -> Result<Array> {
        unsupported(self.id(), Op::ConstantPad)
    }

    /// Pads every axis with zeros.
    fn zero_pad(&self, x: &Array, pad_width: &[(usize, usize)]) -> Result<Array> {
        unsupported(self.id(), Op::ZeroPad)
    }

    /// Picks from `x1` where `condition` holds, else from `x2`.
    fn where_(&self, condition: &Array, x1: &Array, x2: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Where)
    }

    // ---- indexing ----

    /// Takes rows of `params` along axis 0.
    fn gather_flat(&self, params: &Array, indices: &Array, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::GatherFlat)
    }

    /// Gathers slices of `params` addressed by the last axis of `indices`.
    fn gather_nd(&self, params: &Array, indices: &Array, device: Option<Device>) -> Result<Array> {
        unsupported(self.id(), Op::GatherNd)
    }

    /// Scatters `updates` into a zeroed 1-D target of length `size`.
    fn scatter_flat(
        &self,
        indices: &Array,
        updates: &Array,
        size: usize,
        reduction: Reduction,
        device: Option<Device>,
    ) -> Result<Array> {
        unsupported(self.id(), Op::ScatterFlat)
    }

    /// Scatters `updates` into a zeroed target of `shape`.
    fn scatter_nd(
        &self,
        indices: &Array,
        updates: &Array,
        shape: &[usize],
        reduction: Reduction,
        device: Option<Device>,
    ) -> Result<Array> {
        unsupported(self.id(), Op::ScatterNd)
    }

    /// Coordinates of the non-zero elements, one row per element.
    fn indices_where(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::IndicesWhere)
    }

    // ---- math ----

    /// Elementwise minimum.
    fn minimum(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Minimum)
    }

    /// Elementwise maximum.
    fn maximum(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Maximum)
    }

    /// Limits values to `[min, max]`.
    fn clip(&self, x: &Array, min: f64, max: f64) -> Result<Array> {
        unsupported(self.id(), Op::Clip)
    }

    /// Rounds half to even.
    fn round(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Round)
    }

    /// Elementwise floor.
    fn floor(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Floor)
    }

    /// Elementwise ceiling.
    fn ceil(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Ceil)
    }

    /// Elementwise absolute value.
    fn abs(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Abs)
    }

    /// Remainder with the sign of the divisor.
    fn floormod(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Floormod)
    }

    /// Index of the largest value along `axis`.
    fn argmax(&self, x: &Array, axis: isize) -> Result<Array> {
        unsupported(self.id(), Op::Argmax)
    }

    /// Index of the smallest value along `axis`.
    fn argmin(&self, x: &Array, axis: isize) -> Result<Array> {
        unsupported(self.id(), Op::Argmin)
    }

    /// Cross product over the last axis (size 3).
    fn cross(&self, x1: &Array, x2: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Cross)
    }

    /// Matrix product with batch broadcasting.
    fn matmul(&self, x1: &Array, x2: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Matmul)
    }

    /// Running sum along `axis`; `None` runs over the flattened array.
    fn cumsum(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        unsupported(self.id(), Op::Cumsum)
    }

    /// Elementwise logical and.
    fn logical_and(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::LogicalAnd)
    }

    /// Elementwise logical or.
    fn logical_or(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::LogicalOr)
    }

    /// Elementwise logical not.
    fn logical_not(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::LogicalNot)
    }

    /// Elementwise sum.
    fn add(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Add)
    }

    /// Elementwise difference.
    fn subtract(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Subtract)
    }

    /// Elementwise product.
    fn multiply(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Multiply)
    }

    /// Elementwise true division.
    fn divide(&self, x: &Array, y: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Divide)
    }

    /// Elementwise natural logarithm.
    fn log(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Log)
    }

    // ---- introspection ----

    /// Dimensions of `x`.
    fn shape(&self, x: &Array) -> Result<Vec<usize>> {
        unsupported(self.id(), Op::Shape)
    }

    /// Dimensions of `x` as an `int32` array of this backend.
    #[allow(clippy::cast_possible_wrap)]
    fn shape_as_tensor(&self, x: &Array) -> Result<Array> {
        let dims = self.shape(x)?;
        let data = Nested::List(dims.into_iter().map(|d| Nested::Int(d as i64)).collect());
        self.array(&data, Some(DType::Int32), Some(self.dev(x)?))
    }

    /// Number of dimensions of `x`.
    fn get_num_dims(&self, x: &Array) -> Result<usize> {
        Ok(self.shape(x)?.len())
    }

    /// Number of dimensions of `x` as a 0-d `int32` array.
    #[allow(clippy::cast_possible_wrap)]
    fn get_num_dims_as_tensor(&self, x: &Array) -> Result<Array> {
        let n = self.get_num_dims(x)?;
        self.array(&Nested::Int(n as i64), Some(DType::Int32), Some(self.dev(x)?))
    }

    /// Element type of `x`.
    fn dtype(&self, x: &Array) -> Result<DType> {
        unsupported(self.id(), Op::Dtype)
    }

    /// String form of a dtype this backend supports.
    fn dtype_to_str(&self, dtype: DType) -> Result<&'static str> {
        Ok(dtype.require(self.id(), self.dtypes())?.as_str())
    }

    /// String form of the element type of `x`.
    fn dtype_str(&self, x: &Array) -> Result<&'static str> {
        self.dtype_to_str(self.dtype(x)?)
    }

    /// Device holding `x`.
    fn dev(&self, x: &Array) -> Result<Device> {
        unsupported(self.id(), Op::Dev)
    }

    /// Canonical `"<kind>:<index>"` form of a device.
    fn dev_to_str(&self, device: Device) -> Result<String> {
        Ok(device.to_string())
    }

    /// Canonical device string of `x`.
    fn dev_str(&self, x: &Array) -> Result<String> {
        self.dev_to_str(self.dev(x)?)
    }

    /// Converts `x` to another dtype.
    fn cast(&self, x: &Array, dtype: DType) -> Result<Array> {
        unsupported(self.id(), Op::Cast)
    }

    /// Whether this backend can reach a GPU.
    fn gpu_is_available(&self) -> Result<bool> {
        unsupported(self.id(), Op::GpuIsAvailable)
    }

    /// Whether this backend can reach a TPU.
    fn tpu_is_available(&self) -> Result<bool> {
        unsupported(self.id(), Op::TpuIsAvailable)
    }

    // ---- random ----

    /// Samples from `[low, high)` uniformly.
    fn random_uniform(&self, low: f64, high: f64, shape: &[usize], device: Device) -> Result<Array> {
        unsupported(self.id(), Op::RandomUniform)
    }

    /// Integers drawn uniformly from `[low, high)`.
    fn randint(&self, low: i64, high: i64, shape: &[usize], device: Device) -> Result<Array> {
        unsupported(self.id(), Op::Randint)
    }

    /// Reseeds this backend's generator.
    fn seed(&self, value: u64) -> Result<()> {
        unsupported(self.id(), Op::Seed)
    }

    /// Shuffles `x` along axis 0.
    fn shuffle(&self, x: &Array) -> Result<Array> {
        unsupported(self.id(), Op::Shuffle)
    }

    // ---- conversion ----

    /// Copies `x` to a host `ndarray`.
    fn to_numpy(&self, x: &Array) -> Result<ArrayD<f64>> {
        unsupported(self.id(), Op::ToNumpy)
    }

    /// Copies `x` to nested list data.
    fn to_list(&self, x: &Array) -> Result<Nested> {
        unsupported(self.id(), Op::ToList)
    }

    // ---- compilation ----

    /// Prepares `f` for repeated calls on this backend.
    fn compile_fn(
        &self,
        f: ArrayFn,
        dynamic: bool,
        example_inputs: Option<&[Array]>,
    ) -> Result<CompiledFn> {
        unsupported(self.id(), Op::CompileFn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_parse_and_combine() {
        assert_eq!("max".parse::<Reduction>().unwrap(), Reduction::Max);
        assert_eq!(Reduction::Min.combine(5.0, 3.0), 3.0);
        assert_eq!(Reduction::Sum.combine(1.0, 2.0), 3.0);
        match "mean".parse::<Reduction>() {
            Err(Error::InvalidReduction { reduction }) => assert_eq!(reduction, "mean"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
