//! # `polytensor`
//!
//! One tensor API over several array engines, with the engine picked per
//! call.
//!
//! Every operation goes through a [`Dispatch`] facade. The facade resolves
//! a backend for the call (an explicit choice, else the innermost active
//! [`scope`], else the backend that produced the arguments, else the
//! process default), loads that backend's adapter on first use, checks
//! that it supports the operation, and forwards the call. Results come
//! back as [`Array`] values tagged with the backend that made them.
//!
//! ## Backends
//!
//! - **numpy**: eager, rayon-parallel `ndarray` kernels; always built
//! - **jax** (feature `jax`, default): the same kernels behind a
//!   signature-caching `compile_fn` and 32-bit defaults
//! - **torch** (feature `wgpu`): `float32` tensors on WGSL compute shaders
//! - **tf**, **mx**: known identifiers; install a loader on the
//!   [`Registry`] to provide them
//!
//! ## Example
//!
//! ```rust
//! use polytensor::backend::BackendId;
//! use polytensor::{nested, scope};
//!
//! let d = polytensor::auto();
//! let a = d.array(&nested!([1, 2, 3]), None, None).unwrap();
//! assert_eq!(d.dtype_str(&a).unwrap(), "int64"); // numpy by default
//!
//! let b = scope::with_backend(BackendId::Jax, || {
//!     d.array(&nested!([1, 2, 3]), None, None)
//! })
//! .unwrap()
//! .unwrap();
//! assert_eq!(b.backend(), BackendId::Jax);
//! assert_eq!(d.dtype_str(&b).unwrap(), "int32");
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events (backend loads, scope changes, one
//! `trace!` per dispatched call) and never installs a subscriber.

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::type_complexity
)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod backend;
pub mod capability;
pub mod config;
pub mod device;
pub mod dtype;
pub mod error;
pub mod infer;
pub mod nn;
pub mod ops;
pub mod registry;
pub mod scope;
pub mod tensors;

pub use adapter::{Adapter, CompiledFn, Reduction};
pub use backend::{default_backend, set_default_backend, unset_default_backend, BackendId};
pub use capability::{Capabilities, Op};
pub use config::Config;
pub use device::{Device, DeviceKind};
pub use dtype::DType;
pub use error::{Error, Result};
pub use ops::dispatch::Dispatch;
pub use registry::{Binding, Registry};
pub use tensors::{Array, Nested};

/// A facade that infers the backend per call, over the global registry.
#[must_use]
pub fn auto() -> Dispatch<'static> {
    Dispatch::auto()
}

/// A facade pinned to `backend`, over the global registry.
#[must_use]
pub fn on(backend: BackendId) -> Dispatch<'static> {
    Dispatch::on(backend)
}
