//! Parallel CPU backends
//!
//! # Host Backends
//!
//! The `numpy` and `jax` backends both run on the host through the same
//! kernels; they differ only in their [`HostPolicy`]: the dtypes they hold,
//! the widths they pick when a dtype has to be inferred, and what
//! `compile_fn` does.
//!
//! | backend | dtypes                                  | int / float defaults | `compile_fn`         |
//! |---------|-----------------------------------------|----------------------|----------------------|
//! | numpy   | all eight                               | `int64` / `float64`  | identity wrapper     |
//! | jax     | bool, int32, int64, float32, float64    | `int32` / `float32`  | signature tracer     |
//!
//! ## Storage
//!
//! A [`HostTensor`] keeps its elements in an `ndarray::ArrayD<f64>` next
//! to its dtype. Every result is quantized onto its dtype's value grid on
//! construction, so an `int32` tensor only ever holds integral values in the
//! `i32` range. `int64` values beyond 2^53 lose precision.
//!
//! ## Parallelism
//!
//! Elementwise kernels run through `ndarray`'s rayon integration
//! (`par_map_collect`, `par_mapv_inplace`), batched `matmul` splits its
//! batch over the rayon pool.

mod creation;
mod index;
mod math;
mod shape;
#[cfg(feature = "jax")]
mod trace;

#[cfg(feature = "jax")]
pub use trace::Traced;

use crate::adapter::{Adapter, ArrayFn, CompiledFn, Reduction};
use crate::backend::BackendId;
use crate::capability::{Capabilities, Op};
use crate::config;
use crate::device::{Device, DeviceKind};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::tensors::{Array, Nested};
use core::fmt;
use core::marker::PhantomData;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn invalid(op: Op, message: impl fmt::Display) -> Error {
    Error::invalid(op, message.to_string())
}

/// Resolves a possibly negative axis against `ndim` dimensions.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn norm_axis(op: Op, axis: isize, ndim: usize) -> Result<usize> {
    let n = ndim as isize;
    let a = if axis < 0 { axis + n } else { axis };
    if (0..n).contains(&a) {
        Ok(a as usize)
    } else {
        Err(invalid(
            op,
            format!("axis {axis} is out of bounds for array of dimension {ndim}"),
        ))
    }
}

/// Shape two operands broadcast to, aligning trailing dimensions.
pub(crate) fn broadcast_shape(op: Op, a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let n = a.len().max(b.len());
    let dim = |s: &[usize], i: usize| i.checked_sub(n - s.len()).map_or(1, |j| s[j]);
    (0..n)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (x, y) if x == y => Ok(x),
            (1, y) => Ok(y),
            (x, 1) => Ok(x),
            _ => Err(invalid(
                op,
                format!("operands could not be broadcast together with shapes {a:?} {b:?}"),
            )),
        })
        .collect()
}

fn broadcast_to<'a>(op: Op, a: &'a ArrayD<f64>, shape: &[usize]) -> Result<ArrayViewD<'a, f64>> {
    a.broadcast(IxDyn(shape)).ok_or_else(|| {
        invalid(
            op,
            format!("cannot broadcast shape {:?} to {shape:?}", a.shape()),
        )
    })
}

fn standard(a: ArrayD<f64>) -> ArrayD<f64> {
    if a.is_standard_layout() {
        a
    } else {
        a.as_standard_layout().into_owned()
    }
}

/// Reads a stored value as an index below `bound`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn to_index(op: Op, v: f64, bound: usize, wrap_negative: bool) -> Result<usize> {
    let i = if wrap_negative && v < 0.0 { v + bound as f64 } else { v };
    if i.fract() != 0.0 || i < 0.0 || i >= bound as f64 {
        return Err(invalid(
            op,
            format!("index {v} is out of bounds for size {bound}"),
        ));
    }
    Ok(i as usize)
}

/// A host-resident array: dense `f64` storage tagged with its dtype.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    dtype: DType,
    device: Device,
    data: ArrayD<f64>,
}

impl HostTensor {
    /// Builds a tensor, quantizing `data` onto `dtype`.
    #[must_use]
    pub fn new(dtype: DType, device: Device, data: ArrayD<f64>) -> Self {
        let mut data = standard(data);
        data.par_mapv_inplace(|v| dtype.quantize(v));
        Self {
            dtype,
            device,
            data,
        }
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        self.dtype
    }

    /// Device holding the tensor.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// Elements in row-major order.
    #[must_use]
    pub const fn data(&self) -> &ArrayD<f64> {
        &self.data
    }
}

/// What distinguishes one host backend from another.
pub trait HostPolicy: Send + Sync + 'static {
    /// Backend the adapter answers for.
    const ID: BackendId;
    /// Dtypes held natively.
    const DTYPES: &'static [DType];
    /// Dtype inferred for integer data.
    const INT: DType;
    /// Dtype inferred for float data and float-valued results.
    const FLOAT: DType;

    /// Prepares `f` for repeated calls.
    ///
    /// # Errors
    /// When `example_inputs` are not values of this backend.
    fn compile(f: ArrayFn, dynamic: bool, example_inputs: Option<&[Array]>) -> Result<CompiledFn>;
}

/// Eager evaluation with numpy's dtype rules.
#[derive(Debug, Clone, Copy)]
pub struct Eager;

impl HostPolicy for Eager {
    const ID: BackendId = BackendId::Numpy;
    const DTYPES: &'static [DType] = &DType::ALL;
    const INT: DType = DType::Int64;
    const FLOAT: DType = DType::Float64;

    fn compile(f: ArrayFn, _dynamic: bool, _example_inputs: Option<&[Array]>) -> Result<CompiledFn> {
        Ok(CompiledFn::new(Self::ID, f))
    }
}

/// A host backend. See the [module docs](self).
pub struct HostAdapter<P> {
    rng: Mutex<StdRng>,
    policy: PhantomData<fn() -> P>,
}

/// The `numpy` backend.
pub type NumpyAdapter = HostAdapter<Eager>;

/// The `jax` backend.
#[cfg(feature = "jax")]
pub type JaxAdapter = HostAdapter<Traced>;

impl<P: HostPolicy> HostAdapter<P> {
    /// Creates the adapter, seeding its RNG from `POLYTENSOR_SEED` when set.
    #[must_use]
    pub fn new() -> Self {
        let rng = match config::env_seed() {
            Some(seed) => {
                tracing::debug!("seeding '{}' RNG with {}", P::ID, seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
            policy: PhantomData,
        }
    }

    fn tensor<'a>(&self, x: &'a Array, op: Op) -> Result<&'a HostTensor> {
        x.native(P::ID, op)
    }

    fn tensors<'a>(&self, xs: &[&'a Array], op: Op) -> Result<Vec<&'a HostTensor>> {
        xs.iter().map(|&x| self.tensor(x, op)).collect()
    }

    fn native_dtype(&self, dtype: DType) -> Result<DType> {
        dtype.require(P::ID, P::DTYPES)
    }

    /// Resolves a requested device, host processors only.
    fn place(&self, device: Option<Device>) -> Result<Device> {
        let device = device.unwrap_or_default();
        if device.kind == DeviceKind::Cpu {
            Ok(device)
        } else {
            Err(Error::DeviceUnavailable {
                backend: P::ID,
                device: device.to_string(),
            })
        }
    }

    fn wrap(&self, dtype: DType, device: Device, data: ArrayD<f64>) -> Array {
        Array::new(P::ID, HostTensor::new(dtype, device, data))
    }

    /// Same dtype and device as `t`, new data.
    fn like(&self, t: &HostTensor, data: ArrayD<f64>) -> Array {
        self.wrap(t.dtype, t.device, data)
    }

    fn map<F>(&self, op: Op, x: &Array, dtype: impl FnOnce(DType) -> DType, f: F) -> Result<Array>
    where
        F: Fn(f64) -> f64 + Send + Sync,
    {
        let t = self.tensor(x, op)?;
        Ok(self.wrap(dtype(t.dtype), t.device, math::unary(&t.data, f)))
    }

    fn zip<F>(
        &self,
        op: Op,
        x: &Array,
        y: &Array,
        dtype: impl FnOnce(DType) -> DType,
        f: F,
    ) -> Result<Array>
    where
        F: Fn(f64, f64) -> f64 + Send + Sync,
    {
        let (a, b) = (self.tensor(x, op)?, self.tensor(y, op)?);
        let data = math::binary(op, &a.data, &b.data, f)?;
        Ok(self.wrap(dtype(a.dtype.promote(b.dtype)), a.device, data))
    }

    fn float_of(dtype: DType) -> DType {
        if dtype.is_float() { dtype } else { P::FLOAT }
    }

    fn filled(&self, shape: &[usize], value: f64, dtype: DType, device: Option<Device>) -> Result<Array> {
        let dtype = self.native_dtype(dtype)?;
        let device = self.place(device)?;
        Ok(self.wrap(dtype, device, ArrayD::from_elem(IxDyn(shape), value)))
    }

    fn filled_like(
        &self,
        op: Op,
        x: &Array,
        value: f64,
        dtype: Option<DType>,
        device: Option<Device>,
    ) -> Result<Array> {
        let t = self.tensor(x, op)?;
        let dtype = self.native_dtype(dtype.unwrap_or(t.dtype))?;
        let device = match device {
            Some(d) => self.place(Some(d))?,
            None => t.device,
        };
        Ok(self.wrap(dtype, device, ArrayD::from_elem(t.data.raw_dim(), value)))
    }
}

impl<P: HostPolicy> Default for HostAdapter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: HostPolicy> fmt::Debug for HostAdapter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostAdapter").field("backend", &P::ID).finish_non_exhaustive()
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn to_nested(view: ArrayViewD<'_, f64>, dtype: DType) -> Nested {
    if view.ndim() == 0 {
        let v = view.iter().next().copied().unwrap_or_default();
        return match dtype {
            DType::Bool => Nested::Bool(v != 0.0),
            d if d.is_int() => Nested::Int(v as i64),
            _ => Nested::Float(v),
        };
    }
    Nested::List(view.outer_iter().map(|sub| to_nested(sub, dtype)).collect())
}

fn is_integral(v: f64) -> bool {
    v.fract() == 0.0
}

impl<P: HostPolicy> Adapter for HostAdapter<P> {
    fn id(&self) -> BackendId {
        P::ID
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn dtypes(&self) -> &'static [DType] {
        P::DTYPES
    }

    fn device_kinds(&self) -> &'static [DeviceKind] {
        &[DeviceKind::Cpu]
    }

    // ---- creation ----

    fn array(&self, data: &Nested, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        let dtype = self.native_dtype(dtype.unwrap_or_else(|| data.infer_dtype(P::INT, P::FLOAT)))?;
        let device = self.place(device)?;
        Ok(self.wrap(dtype, device, creation::from_nested(data)?))
    }

    fn arange(
        &self,
        stop: f64,
        start: f64,
        step: f64,
        dtype: Option<DType>,
        device: Option<Device>,
    ) -> Result<Array> {
        let inferred = if [stop, start, step].into_iter().all(is_integral) {
            P::INT
        } else {
            P::FLOAT
        };
        let dtype = self.native_dtype(dtype.unwrap_or(inferred))?;
        let device = self.place(device)?;
        Ok(self.wrap(dtype, device, creation::arange(stop, start, step)?))
    }

    fn linspace(
        &self,
        start: f64,
        stop: f64,
        num: usize,
        axis: Option<isize>,
        device: Option<Device>,
    ) -> Result<Array> {
        let device = self.place(device)?;
        Ok(self.wrap(P::FLOAT, device, creation::linspace(start, stop, num, axis)?))
    }

    fn zeros(&self, shape: &[usize], dtype: DType, device: Option<Device>) -> Result<Array> {
        self.filled(shape, 0.0, dtype, device)
    }

    fn ones(&self, shape: &[usize], dtype: DType, device: Option<Device>) -> Result<Array> {
        self.filled(shape, 1.0, dtype, device)
    }

    fn zeros_like(&self, x: &Array, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        self.filled_like(Op::ZerosLike, x, 0.0, dtype, device)
    }

    fn ones_like(&self, x: &Array, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        self.filled_like(Op::OnesLike, x, 1.0, dtype, device)
    }

    fn identity(
        &self,
        n: usize,
        dtype: DType,
        batch_shape: Option<&[usize]>,
        device: Option<Device>,
    ) -> Result<Array> {
        let dtype = self.native_dtype(dtype)?;
        let device = self.place(device)?;
        Ok(self.wrap(dtype, device, creation::identity(n, batch_shape)?))
    }

    fn one_hot(&self, indices: &Array, depth: usize, device: Option<Device>) -> Result<Array> {
        let t = self.tensor(indices, Op::OneHot)?;
        let device = match device {
            Some(d) => self.place(Some(d))?,
            None => t.device,
        };
        Ok(self.wrap(P::FLOAT, device, creation::one_hot(&t.data, depth)?))
    }

    // ---- shape ----

    fn reshape(&self, x: &Array, shape: &[isize]) -> Result<Array> {
        let t = self.tensor(x, Op::Reshape)?;
        Ok(self.like(t, shape::reshape(&t.data, shape)?))
    }

    fn squeeze(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        let t = self.tensor(x, Op::Squeeze)?;
        Ok(self.like(t, shape::squeeze(&t.data, axis)?))
    }

    fn expand_dims(&self, x: &Array, axis: isize) -> Result<Array> {
        let t = self.tensor(x, Op::ExpandDims)?;
        Ok(self.like(t, shape::expand_dims(&t.data, axis)?))
    }

    fn transpose(&self, x: &Array, axes: Option<&[usize]>) -> Result<Array> {
        let t = self.tensor(x, Op::Transpose)?;
        Ok(self.like(t, shape::transpose(&t.data, axes)?))
    }

    fn swapaxes(&self, x: &Array, axis0: isize, axis1: isize) -> Result<Array> {
        let t = self.tensor(x, Op::Swapaxes)?;
        Ok(self.like(t, shape::swapaxes(&t.data, axis0, axis1)?))
    }

    fn concatenate(&self, xs: &[&Array], axis: Option<isize>) -> Result<Array> {
        let ts = self.tensors(xs, Op::Concatenate)?;
        let data: Vec<&ArrayD<f64>> = ts.iter().map(|t| &t.data).collect();
        let out = shape::concatenate(&data, axis)?;
        let dtype = ts.iter().map(|t| t.dtype).reduce(DType::promote).unwrap_or(P::FLOAT);
        let device = ts.first().map_or(Device::CPU, |t| t.device);
        Ok(self.wrap(dtype, device, out))
    }

    fn stack(&self, xs: &[&Array], axis: isize) -> Result<Array> {
        let ts = self.tensors(xs, Op::Stack)?;
        let data: Vec<&ArrayD<f64>> = ts.iter().map(|t| &t.data).collect();
        let out = shape::stack(&data, axis)?;
        let dtype = ts.iter().map(|t| t.dtype).reduce(DType::promote).unwrap_or(P::FLOAT);
        let device = ts.first().map_or(Device::CPU, |t| t.device);
        Ok(self.wrap(dtype, device, out))
    }

    fn unstack(&self, x: &Array, axis: isize) -> Result<Vec<Array>> {
        let t = self.tensor(x, Op::Unstack)?;
        Ok(shape::unstack(&t.data, axis)?
            .into_iter()
            .map(|part| self.like(t, part))
            .collect())
    }

    fn split(&self, x: &Array, num_sections: Option<usize>, axis: isize) -> Result<Vec<Array>> {
        let t = self.tensor(x, Op::Split)?;
        Ok(shape::split(&t.data, num_sections, axis)?
            .into_iter()
            .map(|part| self.like(t, part))
            .collect())
    }

    fn tile(&self, x: &Array, reps: &[usize]) -> Result<Array> {
        let t = self.tensor(x, Op::Tile)?;
        Ok(self.like(t, shape::tile(&t.data, reps)?))
    }

    fn flip(&self, x: &Array, axis: Option<&[isize]>) -> Result<Array> {
        let t = self.tensor(x, Op::Flip)?;
        Ok(self.like(t, shape::flip(&t.data, axis)?))
    }

    fn constant_pad(&self, x: &Array, pad_width: &[(usize, usize)], value: f64) -> Result<Array> {
        let t = self.tensor(x, Op::ConstantPad)?;
        Ok(self.like(t, shape::constant_pad(&t.data, pad_width, value)?))
    }

    fn zero_pad(&self, x: &Array, pad_width: &[(usize, usize)]) -> Result<Array> {
        let t = self.tensor(x, Op::ZeroPad)?;
        Ok(self.like(t, shape::constant_pad(&t.data, pad_width, 0.0)?))
    }

    fn where_(&self, condition: &Array, x1: &Array, x2: &Array) -> Result<Array> {
        let c = self.tensor(condition, Op::Where)?;
        let (a, b) = (self.tensor(x1, Op::Where)?, self.tensor(x2, Op::Where)?);
        let out = shape::select(&c.data, &a.data, &b.data)?;
        Ok(self.wrap(a.dtype.promote(b.dtype), a.device, out))
    }

    // ---- indexing ----

    fn gather_flat(&self, params: &Array, indices: &Array, device: Option<Device>) -> Result<Array> {
        let p = self.tensor(params, Op::GatherFlat)?;
        let i = self.tensor(indices, Op::GatherFlat)?;
        let device = device.map_or(Ok(p.device), |d| self.place(Some(d)))?;
        Ok(self.wrap(p.dtype, device, index::gather_flat(&p.data, &i.data)?))
    }

    fn gather_nd(&self, params: &Array, indices: &Array, device: Option<Device>) -> Result<Array> {
        let p = self.tensor(params, Op::GatherNd)?;
        let i = self.tensor(indices, Op::GatherNd)?;
        let device = device.map_or(Ok(p.device), |d| self.place(Some(d)))?;
        Ok(self.wrap(p.dtype, device, index::gather_nd(&p.data, &i.data)?))
    }

    fn scatter_flat(
        &self,
        indices: &Array,
        updates: &Array,
        size: usize,
        reduction: Reduction,
        device: Option<Device>,
    ) -> Result<Array> {
        let i = self.tensor(indices, Op::ScatterFlat)?;
        let u = self.tensor(updates, Op::ScatterFlat)?;
        let device = device.map_or(Ok(u.device), |d| self.place(Some(d)))?;
        let out = index::scatter_flat(&i.data, &u.data, size, reduction)?;
        Ok(self.wrap(u.dtype, device, out))
    }

    fn scatter_nd(
        &self,
        indices: &Array,
        updates: &Array,
        shape: &[usize],
        reduction: Reduction,
        device: Option<Device>,
    ) -> Result<Array> {
        let i = self.tensor(indices, Op::ScatterNd)?;
        let u = self.tensor(updates, Op::ScatterNd)?;
        let device = device.map_or(Ok(u.device), |d| self.place(Some(d)))?;
        let out = index::scatter_nd(&i.data, &u.data, shape, reduction)?;
        Ok(self.wrap(u.dtype, device, out))
    }

    fn indices_where(&self, x: &Array) -> Result<Array> {
        let t = self.tensor(x, Op::IndicesWhere)?;
        Ok(self.wrap(P::INT, t.device, index::indices_where(&t.data)?))
    }

    // ---- math ----

    fn minimum(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Minimum, x, y, |d| d, f64::min)
    }

    fn maximum(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Maximum, x, y, |d| d, f64::max)
    }

    fn clip(&self, x: &Array, min: f64, max: f64) -> Result<Array> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(invalid(Op::Clip, format!("invalid bounds [{min}, {max}]")));
        }
        self.map(Op::Clip, x, |d| d, move |v| v.clamp(min, max))
    }

    fn round(&self, x: &Array) -> Result<Array> {
        self.map(Op::Round, x, |d| d, f64::round_ties_even)
    }

    fn floor(&self, x: &Array) -> Result<Array> {
        self.map(Op::Floor, x, |d| d, f64::floor)
    }

    fn ceil(&self, x: &Array) -> Result<Array> {
        self.map(Op::Ceil, x, |d| d, f64::ceil)
    }

    fn abs(&self, x: &Array) -> Result<Array> {
        self.map(Op::Abs, x, |d| d, f64::abs)
    }

    fn floormod(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Floormod, x, y, |d| d, math::floormod)
    }

    fn argmax(&self, x: &Array, axis: isize) -> Result<Array> {
        let t = self.tensor(x, Op::Argmax)?;
        Ok(self.wrap(P::INT, t.device, math::argmax(&t.data, axis)?))
    }

    fn argmin(&self, x: &Array, axis: isize) -> Result<Array> {
        let t = self.tensor(x, Op::Argmin)?;
        Ok(self.wrap(P::INT, t.device, math::argmin(&t.data, axis)?))
    }

    fn cross(&self, x1: &Array, x2: &Array) -> Result<Array> {
        let (a, b) = (self.tensor(x1, Op::Cross)?, self.tensor(x2, Op::Cross)?);
        Ok(self.wrap(a.dtype.promote(b.dtype), a.device, math::cross(&a.data, &b.data)?))
    }

    fn matmul(&self, x1: &Array, x2: &Array) -> Result<Array> {
        let (a, b) = (self.tensor(x1, Op::Matmul)?, self.tensor(x2, Op::Matmul)?);
        Ok(self.wrap(a.dtype.promote(b.dtype), a.device, math::matmul(&a.data, &b.data)?))
    }

    fn cumsum(&self, x: &Array, axis: Option<isize>) -> Result<Array> {
        let t = self.tensor(x, Op::Cumsum)?;
        let dtype = if t.dtype == DType::Bool { P::INT } else { t.dtype };
        Ok(self.wrap(dtype, t.device, math::cumsum(&t.data, axis)?))
    }

    fn logical_and(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::LogicalAnd, x, y, |_| DType::Bool, |a, b| {
            math::truth(a != 0.0 && b != 0.0)
        })
    }

    fn logical_or(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::LogicalOr, x, y, |_| DType::Bool, |a, b| {
            math::truth(a != 0.0 || b != 0.0)
        })
    }

    fn logical_not(&self, x: &Array) -> Result<Array> {
        self.map(Op::LogicalNot, x, |_| DType::Bool, |v| math::truth(v == 0.0))
    }

    fn add(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Add, x, y, |d| d, |a, b| a + b)
    }

    fn subtract(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Subtract, x, y, |d| d, |a, b| a - b)
    }

    fn multiply(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Multiply, x, y, |d| d, |a, b| a * b)
    }

    fn divide(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Divide, x, y, Self::float_of, |a, b| a / b)
    }

    fn log(&self, x: &Array) -> Result<Array> {
        self.map(Op::Log, x, Self::float_of, f64::ln)
    }

    // ---- introspection ----

    fn shape(&self, x: &Array) -> Result<Vec<usize>> {
        Ok(self.tensor(x, Op::Shape)?.data.shape().to_vec())
    }

    fn dtype(&self, x: &Array) -> Result<DType> {
        Ok(self.tensor(x, Op::Dtype)?.dtype)
    }

    fn dev(&self, x: &Array) -> Result<Device> {
        Ok(self.tensor(x, Op::Dev)?.device)
    }

    fn cast(&self, x: &Array, dtype: DType) -> Result<Array> {
        let t = self.tensor(x, Op::Cast)?;
        let dtype = self.native_dtype(dtype)?;
        Ok(self.wrap(dtype, t.device, t.data.clone()))
    }

    fn gpu_is_available(&self) -> Result<bool> {
        Ok(false)
    }

    fn tpu_is_available(&self) -> Result<bool> {
        Ok(false)
    }

    // ---- random ----

    fn random_uniform(&self, low: f64, high: f64, shape: &[usize], device: Device) -> Result<Array> {
        let device = self.place(Some(device))?;
        if !(low.is_finite() && high.is_finite() && low <= high) {
            return Err(invalid(
                Op::RandomUniform,
                format!("invalid range [{low}, {high})"),
            ));
        }
        let data = if low < high {
            let mut rng = self.rng.lock();
            ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.random_range(low..high))
        } else {
            ArrayD::from_elem(IxDyn(shape), low)
        };
        Ok(self.wrap(P::FLOAT, device, data))
    }

    #[allow(clippy::cast_precision_loss)]
    fn randint(&self, low: i64, high: i64, shape: &[usize], device: Device) -> Result<Array> {
        let device = self.place(Some(device))?;
        if low >= high {
            return Err(invalid(Op::Randint, format!("low {low} >= high {high}")));
        }
        let mut rng = self.rng.lock();
        let data = ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.random_range(low..high) as f64);
        Ok(self.wrap(P::INT, device, data))
    }

    fn seed(&self, value: u64) -> Result<()> {
        *self.rng.lock() = StdRng::seed_from_u64(value);
        tracing::debug!("reseeded '{}' RNG with {}", P::ID, value);
        Ok(())
    }

    fn shuffle(&self, x: &Array) -> Result<Array> {
        let t = self.tensor(x, Op::Shuffle)?;
        if t.data.ndim() == 0 {
            return Err(invalid(Op::Shuffle, "cannot shuffle a 0-d array"));
        }
        let mut order: Vec<usize> = (0..t.data.len_of(Axis(0))).collect();
        order.shuffle(&mut *self.rng.lock());
        let rows: Vec<f64> = order
            .iter()
            .flat_map(|&i| t.data.index_axis(Axis(0), i).into_iter().copied())
            .collect();
        let data = ArrayD::from_shape_vec(t.data.raw_dim(), rows).map_err(|e| invalid(Op::Shuffle, e))?;
        Ok(self.like(t, data))
    }

    // ---- conversion ----

    fn to_numpy(&self, x: &Array) -> Result<ArrayD<f64>> {
        Ok(self.tensor(x, Op::ToNumpy)?.data.clone())
    }

    fn to_list(&self, x: &Array) -> Result<Nested> {
        let t = self.tensor(x, Op::ToList)?;
        Ok(to_nested(t.data.view(), t.dtype))
    }

    // ---- compilation ----

    fn compile_fn(
        &self,
        f: ArrayFn,
        dynamic: bool,
        example_inputs: Option<&[Array]>,
    ) -> Result<CompiledFn> {
        P::compile(f, dynamic, example_inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nested;

    #[test]
    fn values_are_quantized_to_their_dtype() {
        let np = NumpyAdapter::new();
        let x = np.array(&nested!([1.7, -2.2]), Some(DType::Int32), None).unwrap();
        assert_eq!(np.to_list(&x).unwrap(), nested!([1, -2]));
        let b = np.cast(&x, DType::Bool).unwrap();
        assert_eq!(np.to_list(&b).unwrap(), nested!([true, true]));
    }

    #[test]
    fn integer_data_infers_the_policy_width() {
        let np = NumpyAdapter::new();
        let x = np.array(&nested!([[1, 2], [3, 4]]), None, None).unwrap();
        assert_eq!(np.dtype(&x).unwrap(), DType::Int64);
        assert_eq!(np.shape(&x).unwrap(), vec![2, 2]);
        let r = np.arange(3.0, 0.0, 0.5, None, None).unwrap();
        assert_eq!(np.dtype(&r).unwrap(), DType::Float64);
    }

    #[test]
    fn divide_promotes_ints_to_float() {
        let np = NumpyAdapter::new();
        let x = np.array(&nested!([1, 3]), None, None).unwrap();
        let y = np.array(&nested!([2, 2]), None, None).unwrap();
        let q = np.divide(&x, &y).unwrap();
        assert_eq!(np.dtype(&q).unwrap(), DType::Float64);
        assert_eq!(np.to_list(&q).unwrap(), nested!([0.5, 1.5]));
    }

    #[test]
    fn gpu_placement_is_unavailable() {
        let np = NumpyAdapter::new();
        let gpu = Device::new(DeviceKind::Gpu, 0);
        assert!(matches!(
            np.zeros(&[2], DType::Float32, Some(gpu)),
            Err(Error::DeviceUnavailable { backend: BackendId::Numpy, .. })
        ));
    }

    #[test]
    fn seeded_draws_repeat() {
        let np = NumpyAdapter::new();
        np.seed(7).unwrap();
        let a = np.random_uniform(0.0, 1.0, &[4], Device::CPU).unwrap();
        np.seed(7).unwrap();
        let b = np.random_uniform(0.0, 1.0, &[4], Device::CPU).unwrap();
        assert_eq!(np.to_numpy(&a).unwrap(), np.to_numpy(&b).unwrap());
        let r = np.randint(-3, 3, &[50], Device::CPU).unwrap();
        assert!(np.to_numpy(&r).unwrap().iter().all(|&v| (-3.0..3.0).contains(&v)));
    }

    #[test]
    fn shuffle_permutes_rows() {
        let np = NumpyAdapter::new();
        let x = np.array(&nested!([[0, 0], [1, 1], [2, 2], [3, 3]]), None, None).unwrap();
        let s = np.to_numpy(&np.shuffle(&x).unwrap()).unwrap();
        let mut firsts: Vec<f64> = s.index_axis(Axis(1), 0).iter().copied().collect();
        firsts.sort_by(f64::total_cmp);
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(s.index_axis(Axis(1), 0), s.index_axis(Axis(1), 1));
    }
}
