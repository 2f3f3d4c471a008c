//! Error types shared by the dispatch core and the adapters.
//!
//! The core raises its own variants eagerly, before touching any state.
//! Adapter variants (`InvalidArgument`, `ForeignValue`, `DeviceUnavailable`,
//! `Gpu`) travel back to the caller untouched.

use crate::backend::BackendId;
use crate::capability::Op;
use core::convert::Infallible;

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong while routing or running an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The identifier names no backend this crate knows about.
    #[error("unknown backend '{name}', expected one of numpy, jax, torch, tf, mx")]
    UnknownBackend {
        /// The identifier as given by the caller.
        name: String,
    },

    /// The backend is known but its adapter could not be loaded.
    #[error("backend '{backend}' failed to load: {reason}")]
    BackendLoad {
        /// Backend whose load failed.
        backend: BackendId,
        /// Loader-provided description of the failure.
        reason: String,
    },

    /// Example values passed to one call came from different backends.
    #[error("arguments mix backends '{first}' and '{second}'")]
    AmbiguousBackend {
        /// Tag of the first example value.
        first: BackendId,
        /// First tag that disagreed with it.
        second: BackendId,
    },

    /// The resolved backend does not implement the operation.
    #[error("backend '{backend}' does not support '{op}'")]
    UnsupportedOperation {
        /// Backend that was asked.
        backend: BackendId,
        /// Operation that is missing.
        op: Op,
    },

    /// A scatter reduction other than `sum`, `min` or `max`.
    #[error("reduction is '{reduction}', but it must be one of \"sum\", \"min\" or \"max\"")]
    InvalidReduction {
        /// The rejected reduction string.
        reduction: String,
    },

    /// A malformed device string.
    #[error("invalid device '{device}', must be in the form [ \"cpu:idx\" | \"gpu:idx\" | \"tpu:idx\" ]")]
    InvalidDevice {
        /// The rejected device string.
        device: String,
    },

    /// An unknown dtype string, or a dtype the backend cannot hold natively.
    #[error("invalid dtype '{dtype}'{}", for_backend(.backend))]
    InvalidDtype {
        /// The rejected dtype.
        dtype: String,
        /// Backend lacking native support, `None` for unknown strings.
        backend: Option<BackendId>,
    },

    /// A well-formed device the backend cannot place data on.
    #[error("backend '{backend}' cannot use device '{device}'")]
    DeviceUnavailable {
        /// Backend that was asked.
        backend: BackendId,
        /// Canonical device string.
        device: String,
    },

    /// An adapter received a value produced by another backend.
    #[error("'{op}' on backend '{backend}' received a value from backend '{found}'")]
    ForeignValue {
        /// Backend running the operation.
        backend: BackendId,
        /// Tag of the offending value.
        found: BackendId,
        /// Operation being run.
        op: Op,
    },

    /// Adapter-level argument error (shapes, axes, indices).
    #[error("{op}: {message}")]
    InvalidArgument {
        /// Operation that rejected its arguments.
        op: Op,
        /// What was wrong.
        message: String,
    },

    /// Failure reported by the GPU runtime while running a kernel.
    #[error("GPU failure: {0}")]
    Gpu(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid(op: Op, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            message: message.into(),
        }
    }
}

fn for_backend(backend: &Option<BackendId>) -> String {
    backend.map_or_else(String::new, |b| format!(" for backend '{b}'"))
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
