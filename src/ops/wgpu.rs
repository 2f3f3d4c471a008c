//! GPU-backed `torch` adapter using WGPU.
//!
//! This module runs the `torch` backend's arithmetic as WGSL compute
//! kernels. It owns the GPU context (device + queue), compiles the kernels
//! once when the adapter loads, and dispatches:
//!
//! - `matmul` — 2-D matrix multiplication
//! - unary elementwise ops (`abs`, `floor`, `ceil`, `round`, `log`, `clip`, `logical_not`)
//! - binary elementwise ops (`add`, `subtract`, `multiply`, `divide`,
//!   `minimum`, `maximum`, `floormod`, `logical_and`, `logical_or`)
//!
//! Values are `float32` only and live in host memory between kernels: each
//! kernel uploads its operands, runs, and reads the result back through a
//! staging buffer. Tensors placed on `cpu` skip the GPU and run the same
//! operation on the host.
//!
//! The backend is partial. Anything outside [`TorchAdapter::capabilities`]
//! is refused by the facade with `UnsupportedOperation`.

use crate::adapter::Adapter;
use crate::backend::BackendId;
use crate::capability::{Capabilities, Op};
use crate::device::{Device, DeviceKind};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::ops::cpu::{broadcast_shape, to_nested};
use crate::tensors::{Array, Nested};
use briny::BrinyError;
use briny::raw::{slice_from_bytes, slice_to_bytes, to_bytes};
use core::fmt;
use ndarray::{ArrayD, Ix2, IxDyn, Zip};
use std::sync::mpsc;
use wgpu::util::DeviceExt;

const MATMUL: &str = include_str!("shaders/matmul.wgsl");
const UNARY: &str = include_str!("shaders/unary.wgsl");
const BINARY: &str = include_str!("shaders/binary.wgsl");

/// Threads per workgroup in the elementwise kernels.
const WORKGROUP: u32 = 64;
/// Per-dimension workgroup limit guaranteed by WebGPU.
const MAX_GROUPS: u32 = 65_535;

const DTYPES: &[DType] = &[DType::Float32];
const DEVICE_KINDS: &[DeviceKind] = &[DeviceKind::Cpu, DeviceKind::Gpu];
const GPU0: Device = Device::new(DeviceKind::Gpu, 0);

/// Failures of the GPU runtime.
#[derive(Debug, thiserror::Error)]
pub enum GpuFailure {
    /// No usable adapter.
    #[error("adapter error: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    /// The adapter refused to hand out a device.
    #[error("device error: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// Waiting on the queue failed.
    #[error("poll error: {0}")]
    Poll(#[from] wgpu::PollError),
    /// Mapping the staging buffer failed.
    #[error("buffer map error: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    /// The mapping callback was dropped before it ran.
    #[error("staging buffer was never mapped")]
    Unmapped,
    /// Mapped bytes could not be viewed as `f32`.
    #[error("staging buffer is not a valid f32 slice")]
    Cast,
    /// A size does not fit the kernels' `u32` parameters.
    #[error("size {0} exceeds the kernel limit")]
    TooLarge(usize),
}

impl From<BrinyError> for GpuFailure {
    fn from(_: BrinyError) -> Self {
        Self::Cast
    }
}

impl From<GpuFailure> for Error {
    fn from(e: GpuFailure) -> Self {
        Self::Gpu(e.to_string())
    }
}

fn to_u32(n: usize) -> core::result::Result<u32, GpuFailure> {
    u32::try_from(n).map_err(|_| GpuFailure::TooLarge(n))
}

/// Holds the WGPU device and queue used for executing compute pipelines.
pub struct GpuContext {
    /// The actual GPU device.
    pub device: wgpu::Device,
    /// Submission queue of the device.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Selects the default adapter and creates a device + queue.
    ///
    /// Uses `pollster::block_on` to wait for the async WGPU calls.
    ///
    /// # Errors
    /// [`GpuFailure::Adapter`] or [`GpuFailure::Device`] when no GPU is usable.
    pub fn new() -> core::result::Result<Self, GpuFailure> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("polytensor"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))?;
        Ok(Self { device, queue })
    }
}

/// A compiled compute pipeline and its bind group layout.
///
/// Binding 0 is a uniform parameter block, the last binding is the output,
/// everything in between is a read-only input.
struct Kernel {
    label: &'static str,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl Kernel {
    fn new(device: &wgpu::Device, label: &'static str, source: &str, inputs: u32) -> Self {
        let buffer = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let mut entries = vec![buffer(0, wgpu::BufferBindingType::Uniform)];
        entries.extend(
            (1..=inputs).map(|b| buffer(b, wgpu::BufferBindingType::Storage { read_only: true })),
        );
        entries.push(buffer(
            inputs + 1,
            wgpu::BufferBindingType::Storage { read_only: false },
        ));

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });
        Self {
            label,
            layout,
            pipeline,
        }
    }

    /// Uploads `inputs`, runs `groups` workgroups and reads back `len` floats.
    fn run(
        &self,
        ctx: &GpuContext,
        params: &[u32; 4],
        inputs: &[&[f32]],
        len: usize,
        groups: (u32, u32),
    ) -> core::result::Result<Vec<f32>, GpuFailure> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let device = &ctx.device;
        let size = (len * size_of::<f32>()) as u64;

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: to_bytes(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let input_buffers: Vec<wgpu::Buffer> = inputs
            .iter()
            .map(|&data| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("input"),
                    contents: slice_to_bytes(data),
                    usage: wgpu::BufferUsages::STORAGE,
                })
            })
            .collect();
        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: params_buffer.as_entire_binding(),
        }];
        for (binding, buffer) in (1..).zip(&input_buffers) {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: to_u32(inputs.len() + 1)?,
            resource: output_buffer.as_entire_binding(),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(self.label),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(self.label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.0, groups.1, 1);
        }

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &staging, 0, size);
        ctx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::PollType::Wait)?;
        rx.recv().map_err(|_| GpuFailure::Unmapped)??;

        let data = slice.get_mapped_range();
        let out = slice_from_bytes::<f32>(&data)?.to_vec();
        drop(data);
        staging.unmap();
        Ok(out)
    }
}

/// Workgroup grid covering `len` elements, folded into two dimensions.
fn elementwise_groups(len: usize) -> core::result::Result<(u32, u32), GpuFailure> {
    let groups = to_u32(len.div_ceil(WORKGROUP as usize))?;
    Ok((groups.min(MAX_GROUPS), groups.div_ceil(MAX_GROUPS)))
}

#[derive(Debug, Clone, Copy)]
enum Unary {
    Abs,
    Floor,
    Ceil,
    Round,
    Log,
    Clip(f32, f32),
    Not,
}

impl Unary {
    const fn code(self) -> u32 {
        match self {
            Self::Abs => 0,
            Self::Floor => 1,
            Self::Ceil => 2,
            Self::Round => 3,
            Self::Log => 4,
            Self::Clip(..) => 5,
            Self::Not => 6,
        }
    }

    fn apply(self, v: f32) -> f32 {
        match self {
            Self::Abs => v.abs(),
            Self::Floor => v.floor(),
            Self::Ceil => v.ceil(),
            Self::Round => v.round_ties_even(),
            Self::Log => v.ln(),
            Self::Clip(lo, hi) => v.clamp(lo, hi),
            Self::Not => f32::from(u8::from(v == 0.0)),
        }
    }

    fn params(self, len: u32) -> [u32; 4] {
        let (lo, hi) = match self {
            Self::Clip(lo, hi) => (lo, hi),
            _ => (0.0, 0.0),
        };
        [self.code(), len, lo.to_bits(), hi.to_bits()]
    }
}

#[derive(Debug, Clone, Copy)]
enum Binary {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Floormod,
    And,
    Or,
}

impl Binary {
    const fn code(self) -> u32 {
        self as u32
    }

    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Floormod => a - b * (a / b).floor(),
            Self::And => f32::from(u8::from(a != 0.0 && b != 0.0)),
            Self::Or => f32::from(u8::from(a != 0.0 || b != 0.0)),
        }
    }
}

/// Native value of the `torch` backend.
#[derive(Debug, Clone)]
pub struct GpuTensor {
    device: Device,
    data: ArrayD<f32>,
}

impl GpuTensor {
    /// Where the tensor is placed.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// Elements in logical order.
    #[must_use]
    pub const fn data(&self) -> &ArrayD<f32> {
        &self.data
    }
}

/// The `torch` backend: `float32` tensors computed with WGSL kernels.
pub struct TorchAdapter {
    ctx: GpuContext,
    matmul: Kernel,
    unary: Kernel,
    binary: Kernel,
}

impl fmt::Debug for TorchAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TorchAdapter").finish_non_exhaustive()
    }
}

impl TorchAdapter {
    /// Acquires a GPU and compiles the kernels.
    ///
    /// # Errors
    /// Any [`GpuFailure`] from context creation.
    pub fn new() -> core::result::Result<Self, GpuFailure> {
        let ctx = GpuContext::new()?;
        let matmul = Kernel::new(&ctx.device, "matmul", MATMUL, 2);
        let unary = Kernel::new(&ctx.device, "unary", UNARY, 1);
        let binary = Kernel::new(&ctx.device, "binary", BINARY, 2);
        tracing::debug!("compiled torch kernels");
        Ok(Self {
            ctx,
            matmul,
            unary,
            binary,
        })
    }

    fn tensor<'a>(&self, x: &'a Array, op: Op) -> Result<&'a GpuTensor> {
        x.native(BackendId::Torch, op)
    }

    fn wrap(device: Device, data: ArrayD<f32>) -> Array {
        Array::new(BackendId::Torch, GpuTensor { device, data })
    }

    fn float32(dtype: Option<DType>) -> Result<DType> {
        dtype
            .unwrap_or(DType::Float32)
            .require(BackendId::Torch, DTYPES)
    }

    /// Resolves a requested device; `gpu:0` unless told otherwise.
    fn place(device: Option<Device>) -> Result<Device> {
        match device {
            None => Ok(GPU0),
            Some(d) if d == Device::CPU || d == GPU0 => Ok(d),
            Some(d) => Err(Error::DeviceUnavailable {
                backend: BackendId::Torch,
                device: d.to_string(),
            }),
        }
    }

    fn filled(shape: &[usize], value: f32, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        Self::float32(dtype)?;
        let device = Self::place(device)?;
        Ok(Self::wrap(device, ArrayD::from_elem(IxDyn(shape), value)))
    }

    fn filled_like(
        &self,
        op: Op,
        x: &Array,
        value: f32,
        dtype: Option<DType>,
        device: Option<Device>,
    ) -> Result<Array> {
        let t = self.tensor(x, op)?;
        Self::filled(t.data.shape(), value, dtype, Some(device.unwrap_or(t.device)))
    }

    fn same_device(op: Op, a: &GpuTensor, b: &GpuTensor) -> Result<Device> {
        if a.device == b.device {
            Ok(a.device)
        } else {
            Err(Error::invalid(
                op,
                format!(
                    "expected all tensors on the same device, found {} and {}",
                    a.device, b.device
                ),
            ))
        }
    }

    fn map(&self, op: Op, x: &Array, f: Unary) -> Result<Array> {
        let t = self.tensor(x, op)?;
        let data = if t.device.kind == DeviceKind::Gpu {
            let input: Vec<f32> = t.data.iter().copied().collect();
            let len = input.len();
            let out = self.unary.run(
                &self.ctx,
                &f.params(to_u32(len)?),
                &[&input],
                len,
                elementwise_groups(len)?,
            )?;
            ArrayD::from_shape_vec(t.data.raw_dim(), out).map_err(|e| Error::invalid(op, e.to_string()))?
        } else {
            t.data.mapv(|v| f.apply(v))
        };
        Ok(Self::wrap(t.device, data))
    }

    fn zip(&self, op: Op, x: &Array, y: &Array, f: Binary) -> Result<Array> {
        let (a, b) = (self.tensor(x, op)?, self.tensor(y, op)?);
        let device = Self::same_device(op, a, b)?;
        let shape = broadcast_shape(op, a.data.shape(), b.data.shape())?;
        let dim = IxDyn(&shape);
        let not_broadcastable = || Error::invalid(op, "operands could not be broadcast together");
        let av = a.data.broadcast(dim.clone()).ok_or_else(not_broadcastable)?;
        let bv = b.data.broadcast(dim.clone()).ok_or_else(not_broadcastable)?;

        let data = if device.kind == DeviceKind::Gpu {
            let lhs: Vec<f32> = av.iter().copied().collect();
            let rhs: Vec<f32> = bv.iter().copied().collect();
            let len = lhs.len();
            let out = self.binary.run(
                &self.ctx,
                &[f.code(), to_u32(len)?, 0, 0],
                &[&lhs, &rhs],
                len,
                elementwise_groups(len)?,
            )?;
            ArrayD::from_shape_vec(dim, out).map_err(|e| Error::invalid(op, e.to_string()))?
        } else {
            Zip::from(&av).and(&bv).map_collect(|&p, &q| f.apply(p, q))
        };
        Ok(Self::wrap(device, data))
    }
}

impl Adapter for TorchAdapter {
    fn id(&self) -> BackendId {
        BackendId::Torch
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::from_ops(&[
            Op::Array,
            Op::Arange,
            Op::Zeros,
            Op::Ones,
            Op::ZerosLike,
            Op::OnesLike,
            Op::Minimum,
            Op::Maximum,
            Op::Clip,
            Op::Round,
            Op::Floor,
            Op::Ceil,
            Op::Abs,
            Op::Floormod,
            Op::Matmul,
            Op::LogicalAnd,
            Op::LogicalOr,
            Op::LogicalNot,
            Op::Add,
            Op::Subtract,
            Op::Multiply,
            Op::Divide,
            Op::Log,
            Op::Shape,
            Op::GetNumDims,
            Op::Dtype,
            Op::DtypeToStr,
            Op::DtypeStr,
            Op::Dev,
            Op::DevToStr,
            Op::DevStr,
            Op::Cast,
            Op::GpuIsAvailable,
            Op::TpuIsAvailable,
            Op::ToNumpy,
            Op::ToList,
        ])
    }

    fn dtypes(&self) -> &'static [DType] {
        DTYPES
    }

    fn device_kinds(&self) -> &'static [DeviceKind] {
        DEVICE_KINDS
    }

    // ---- creation ----

    #[allow(clippy::cast_possible_truncation)]
    fn array(&self, data: &Nested, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        Self::float32(dtype)?;
        let device = Self::place(device)?;
        let shape = data.shape().map_err(|e| Error::invalid(Op::Array, e))?;
        let values: Vec<f32> = data.flatten().into_iter().map(|v| v as f32).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| Error::invalid(Op::Array, e.to_string()))?;
        Ok(Self::wrap(device, data))
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn arange(
        &self,
        stop: f64,
        start: f64,
        step: f64,
        dtype: Option<DType>,
        device: Option<Device>,
    ) -> Result<Array> {
        Self::float32(dtype)?;
        let device = Self::place(device)?;
        if step == 0.0 || !step.is_finite() {
            return Err(Error::invalid(Op::Arange, "step must be finite and non-zero"));
        }
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        let data = ArrayD::from_shape_fn(IxDyn(&[count]), |i| (start + i[0] as f64 * step) as f32);
        Ok(Self::wrap(device, data))
    }

    fn zeros(&self, shape: &[usize], dtype: DType, device: Option<Device>) -> Result<Array> {
        Self::filled(shape, 0.0, Some(dtype), device)
    }

    fn ones(&self, shape: &[usize], dtype: DType, device: Option<Device>) -> Result<Array> {
        Self::filled(shape, 1.0, Some(dtype), device)
    }

    fn zeros_like(&self, x: &Array, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        self.filled_like(Op::ZerosLike, x, 0.0, dtype, device)
    }

    fn ones_like(&self, x: &Array, dtype: Option<DType>, device: Option<Device>) -> Result<Array> {
        self.filled_like(Op::OnesLike, x, 1.0, dtype, device)
    }

    // ---- math ----

    fn minimum(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Minimum, x, y, Binary::Min)
    }

    fn maximum(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Maximum, x, y, Binary::Max)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn clip(&self, x: &Array, min: f64, max: f64) -> Result<Array> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(Error::invalid(
                Op::Clip,
                format!("invalid bounds [{min}, {max}]"),
            ));
        }
        self.map(Op::Clip, x, Unary::Clip(min as f32, max as f32))
    }

    fn round(&self, x: &Array) -> Result<Array> {
        self.map(Op::Round, x, Unary::Round)
    }

    fn floor(&self, x: &Array) -> Result<Array> {
        self.map(Op::Floor, x, Unary::Floor)
    }

    fn ceil(&self, x: &Array) -> Result<Array> {
        self.map(Op::Ceil, x, Unary::Ceil)
    }

    fn abs(&self, x: &Array) -> Result<Array> {
        self.map(Op::Abs, x, Unary::Abs)
    }

    fn floormod(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Floormod, x, y, Binary::Floormod)
    }

    fn matmul(&self, x1: &Array, x2: &Array) -> Result<Array> {
        let (a, b) = (self.tensor(x1, Op::Matmul)?, self.tensor(x2, Op::Matmul)?);
        let device = Self::same_device(Op::Matmul, a, b)?;
        let lhs = a.data.view().into_dimensionality::<Ix2>();
        let rhs = b.data.view().into_dimensionality::<Ix2>();
        let (Ok(lhs), Ok(rhs)) = (lhs, rhs) else {
            return Err(Error::invalid(
                Op::Matmul,
                format!(
                    "expected 2-D operands, got {:?} and {:?}",
                    a.data.shape(),
                    b.data.shape()
                ),
            ));
        };
        let ((m, k), (k2, n)) = (lhs.dim(), rhs.dim());
        if k != k2 {
            return Err(Error::invalid(
                Op::Matmul,
                format!("core dimension mismatch, {k} (left) vs {k2} (right)"),
            ));
        }

        let data = if device.kind == DeviceKind::Gpu {
            let a_data: Vec<f32> = lhs.iter().copied().collect();
            let b_data: Vec<f32> = rhs.iter().copied().collect();
            let dims = [to_u32(m)?, to_u32(k)?, to_u32(n)?, 0];
            let out = self.matmul.run(
                &self.ctx,
                &dims,
                &[&a_data, &b_data],
                m * n,
                (dims[2].div_ceil(16), dims[0].div_ceil(16)),
            )?;
            ArrayD::from_shape_vec(IxDyn(&[m, n]), out)
                .map_err(|e| Error::invalid(Op::Matmul, e.to_string()))?
        } else {
            lhs.dot(&rhs).into_dyn()
        };
        Ok(Self::wrap(device, data))
    }

    fn logical_and(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::LogicalAnd, x, y, Binary::And)
    }

    fn logical_or(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::LogicalOr, x, y, Binary::Or)
    }

    fn logical_not(&self, x: &Array) -> Result<Array> {
        self.map(Op::LogicalNot, x, Unary::Not)
    }

    fn add(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Add, x, y, Binary::Add)
    }

    fn subtract(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Subtract, x, y, Binary::Sub)
    }

    fn multiply(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Multiply, x, y, Binary::Mul)
    }

    fn divide(&self, x: &Array, y: &Array) -> Result<Array> {
        self.zip(Op::Divide, x, y, Binary::Div)
    }

    fn log(&self, x: &Array) -> Result<Array> {
        self.map(Op::Log, x, Unary::Log)
    }

    // ---- introspection ----

    fn shape(&self, x: &Array) -> Result<Vec<usize>> {
        Ok(self.tensor(x, Op::Shape)?.data.shape().to_vec())
    }

    /// Dimensions as `float32`, the only dtype this backend stores.
    #[allow(clippy::cast_precision_loss)]
    fn shape_as_tensor(&self, x: &Array) -> Result<Array> {
        let t = self.tensor(x, Op::Shape)?;
        let dims: Vec<f32> = t.data.shape().iter().map(|&d| d as f32).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&[dims.len()]), dims)
            .map_err(|e| Error::invalid(Op::Shape, e.to_string()))?;
        Ok(Self::wrap(t.device, data))
    }

    #[allow(clippy::cast_precision_loss)]
    fn get_num_dims_as_tensor(&self, x: &Array) -> Result<Array> {
        let t = self.tensor(x, Op::GetNumDims)?;
        let n = ArrayD::from_elem(IxDyn(&[]), t.data.ndim() as f32);
        Ok(Self::wrap(t.device, n))
    }

    fn dtype(&self, x: &Array) -> Result<DType> {
        self.tensor(x, Op::Dtype)?;
        Ok(DType::Float32)
    }

    fn dev(&self, x: &Array) -> Result<Device> {
        Ok(self.tensor(x, Op::Dev)?.device)
    }

    fn cast(&self, x: &Array, dtype: DType) -> Result<Array> {
        let t = self.tensor(x, Op::Cast)?;
        Self::float32(Some(dtype))?;
        Ok(Self::wrap(t.device, t.data.clone()))
    }

    fn gpu_is_available(&self) -> Result<bool> {
        Ok(true)
    }

    fn tpu_is_available(&self) -> Result<bool> {
        Ok(false)
    }

    // ---- conversion ----

    fn to_numpy(&self, x: &Array) -> Result<ArrayD<f64>> {
        Ok(self.tensor(x, Op::ToNumpy)?.data.mapv(f64::from))
    }

    fn to_list(&self, x: &Array) -> Result<Nested> {
        let t = self.tensor(x, Op::ToList)?;
        Ok(to_nested(t.data.mapv(f64::from).view(), DType::Float32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nested;

    /// The adapter, or `None` on machines without a usable GPU.
    fn torch() -> Option<TorchAdapter> {
        TorchAdapter::new().ok()
    }

    #[test]
    fn workgroup_grid_folds_large_inputs() {
        assert_eq!(elementwise_groups(1).unwrap(), (1, 1));
        assert_eq!(elementwise_groups(64 * 65_535).unwrap(), (65_535, 1));
        assert_eq!(elementwise_groups(64 * 65_536).unwrap(), (65_535, 2));
    }

    #[test]
    fn host_rules_match_kernel_rules() {
        assert_eq!(Binary::Floormod.apply(-7.0, 3.0), 2.0);
        assert_eq!(Unary::Round.apply(2.5), 2.0);
        assert_eq!(Unary::Not.apply(0.0), 1.0);
        assert_eq!(Binary::Or.code(), 8);
    }

    #[test]
    fn gpu_matmul_matches_host() {
        let Some(t) = torch() else { return };
        let a = t.array(&nested!([[1.0, 2.0], [3.0, 4.0]]), None, None).unwrap();
        let b = t.array(&nested!([[5.0, 6.0], [7.0, 8.0]]), None, None).unwrap();
        assert_eq!(t.dev_str(&a).unwrap(), "gpu:0");
        let c = t.matmul(&a, &b).unwrap();
        assert_eq!(t.to_list(&c).unwrap(), nested!([[19.0, 22.0], [43.0, 50.0]]));
    }

    #[test]
    fn only_float32_is_native() {
        let Some(t) = torch() else { return };
        assert!(matches!(
            t.zeros(&[2], DType::Int64, None),
            Err(Error::InvalidDtype { backend: Some(BackendId::Torch), .. })
        ));
        let x = t.array(&nested!([1, 2]), None, Some(Device::CPU)).unwrap();
        let y = t.add(&x, &x).unwrap();
        assert_eq!(t.to_list(&y).unwrap(), nested!([2.0, 4.0]));
    }

    #[test]
    fn shape_tensors_are_float32() {
        let Some(t) = torch() else { return };
        let x = t.zeros(&[2, 3], DType::Float32, Some(Device::CPU)).unwrap();
        let dims = t.shape_as_tensor(&x).unwrap();
        assert_eq!(t.dtype(&dims).unwrap(), DType::Float32);
        assert_eq!(t.dev(&dims).unwrap(), Device::CPU);
        assert_eq!(t.to_list(&dims).unwrap(), nested!([2.0, 3.0]));
        let n = t.get_num_dims_as_tensor(&x).unwrap();
        assert_eq!(t.to_list(&n).unwrap(), Nested::Float(2.0));
    }
}
