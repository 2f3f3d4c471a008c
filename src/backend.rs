//! Backend identifiers and the process-wide default backend.
//!
//! This module names the computation engines the crate can route to and
//! holds the default used when nothing else decides.
//!
//! # Supported Backends
//!
//! - `Numpy` — eager CPU arrays, always built, the baseline default.
//! - `Jax` — tracing engine on the host (feature `jax`).
//! - `Torch` — imperative GPU engine on `wgpu` (feature `wgpu`).
//! - `Tensorflow`, `Mxnet` — known identifiers without a bundled adapter;
//!   a loader can be installed on a [`Registry`](crate::registry::Registry).
//!
//! The default is stored in an `AtomicU8`, so reading it on every dispatch
//! is a single load. It is never consulted while a scope is active or when
//! the call carries an explicit backend or tagged arguments.

use crate::error::{Error, Result};
use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};

/// Identifier of a supported computation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum BackendId {
    /// Eager CPU array engine (default).
    #[default]
    Numpy = 0,
    /// Tracing/JIT engine.
    Jax = 1,
    /// Imperative GPU-capable engine.
    Torch = 2,
    /// Graph engine, no bundled adapter.
    Tensorflow = 3,
    /// Imperative engine, no bundled adapter.
    Mxnet = 4,
}

impl BackendId {
    /// Number of identifiers.
    pub const COUNT: usize = 5;

    /// Every identifier, in discriminant order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Numpy,
        Self::Jax,
        Self::Torch,
        Self::Tensorflow,
        Self::Mxnet,
    ];

    /// The canonical short name (`"numpy"`, `"jax"`, `"torch"`, `"tf"`, `"mx"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numpy => "numpy",
            Self::Jax => "jax",
            Self::Torch => "torch",
            Self::Tensorflow => "tf",
            Self::Mxnet => "mx",
        }
    }

    /// Position of this identifier in [`BackendId::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for BackendId {
    type Error = ();

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Numpy),
            1 => Ok(Self::Jax),
            2 => Ok(Self::Torch),
            3 => Ok(Self::Tensorflow),
            4 => Ok(Self::Mxnet),
            _ => Err(()),
        }
    }
}

impl FromStr for BackendId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "numpy" => Ok(Self::Numpy),
            "jax" => Ok(Self::Jax),
            "torch" => Ok(Self::Torch),
            "tf" | "tensorflow" => Ok(Self::Tensorflow),
            "mx" | "mxnet" => Ok(Self::Mxnet),
            _ => Err(Error::UnknownBackend { name: s.to_owned() }),
        }
    }
}

impl TryFrom<&str> for BackendId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

/// Sentinel stored while no default has been chosen.
const UNSET: u8 = u8::MAX;

/// Process-wide default backend, `UNSET` until chosen.
///
/// Relaxed ordering is enough: the value is a standalone flag and no
/// other memory is published through it.
static GLOBAL_DEFAULT_BACKEND: AtomicU8 = AtomicU8::new(UNSET);

/// Sets the backend used when a call has no explicit backend, no active
/// scope and no tagged arguments.
///
/// # Example
/// ```
/// use polytensor::backend::{default_backend, set_default_backend, BackendId};
/// set_default_backend(BackendId::Numpy);
/// assert_eq!(default_backend(), BackendId::Numpy);
/// ```
pub fn set_default_backend(b: BackendId) {
    let previous = GLOBAL_DEFAULT_BACKEND.swap(b as u8, Ordering::Relaxed);
    if previous != b as u8 {
        tracing::info!("default backend set to '{}'", b);
    }
}

/// Forgets any default chosen with [`set_default_backend`].
///
/// The next read falls back to the environment configuration again.
pub fn unset_default_backend() {
    GLOBAL_DEFAULT_BACKEND.store(UNSET, Ordering::Relaxed);
}

/// Returns the process default backend.
///
/// When no default was set, the `POLYTENSOR_BACKEND` environment variable
/// (read once per process) decides, and `Numpy` is the final fallback.
///
/// # Example
/// ```
/// use polytensor::backend::default_backend;
/// let backend = default_backend();
/// ```
pub fn default_backend() -> BackendId {
    BackendId::try_from(GLOBAL_DEFAULT_BACKEND.load(Ordering::Relaxed))
        .ok()
        .or_else(crate::config::env_default_backend)
        .unwrap_or_default()
}
