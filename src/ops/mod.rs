//! # Operation Layer
//!
//! The unified operation surface and the adapters bundled with the crate.
//!
//! ## Submodules
//!
//! - [`dispatch`] — the [`Dispatch`](dispatch::Dispatch) facade: backend
//!   inference, capability checks and forwarding
//! - [`cpu`] — rayon-parallel host adapters for `numpy` and (feature `jax`) `jax`
//! - [`wgpu`] *(opt-in)* — the GPU `torch` adapter on WGSL compute shaders
//!
//! ## Adding an Operation
//!
//! 1. Add an [`Op`](crate::capability::Op) variant and a defaulted method
//!    on [`Adapter`](crate::adapter::Adapter)
//! 2. Implement it in the adapters that support it and list it in their
//!    capability sets
//! 3. Add the facade method in [`dispatch`], parsing any string arguments
//!    before routing
//!
//! ## Feature Flags
//!
//! - `jax` (default) — the tracing host backend
//! - `wgpu` — the GPU `torch` backend

pub mod cpu;
pub mod dispatch;
#[cfg(feature = "wgpu")]
pub mod wgpu;
