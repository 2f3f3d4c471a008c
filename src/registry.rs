//! Lazy, load-once backend registry.
//!
//! The registry owns one slot per [`BackendId`]. A slot holds an optional
//! loader and, once the backend has been used, the [`Binding`] produced by
//! running that loader. Loading happens at most once per slot even when many
//! threads race on first use; a failed load is reported to every racer and
//! not cached, so a later call may retry.
//!
//! ```rust
//! use polytensor::backend::BackendId;
//! use polytensor::registry::Registry;
//! let registry = Registry::with_builtin();
//! let numpy = registry.get_binding(BackendId::Numpy).unwrap();
//! assert_eq!(numpy.id(), BackendId::Numpy);
//! ```

use crate::adapter::Adapter;
use crate::backend::BackendId;
use crate::capability::{Capabilities, Op};
use crate::device::DeviceKind;
use crate::dtype::DType;
use crate::error::{Error, Result};
use core::fmt;
use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, OnceLock};

/// Produces a backend's adapter on first use.
///
/// A loader returns a human-readable reason when the backend cannot be
/// initialized (missing runtime, no device).
pub type Loader = Arc<dyn Fn() -> core::result::Result<Box<dyn Adapter>, String> + Send + Sync>;

/// Wraps a closure as a [`Loader`].
pub fn loader<F>(f: F) -> Loader
where
    F: Fn() -> core::result::Result<Box<dyn Adapter>, String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A loaded backend: its adapter plus the metadata read from it at load time.
pub struct Binding {
    adapter: Box<dyn Adapter>,
    capabilities: Capabilities,
    dtypes: &'static [DType],
    device_kinds: &'static [DeviceKind],
}

impl Binding {
    fn new(adapter: Box<dyn Adapter>) -> Self {
        Self {
            capabilities: adapter.capabilities(),
            dtypes: adapter.dtypes(),
            device_kinds: adapter.device_kinds(),
            adapter,
        }
    }

    /// Backend this binding was loaded for.
    #[must_use]
    pub fn id(&self) -> BackendId {
        self.adapter.id()
    }

    /// Operations the adapter implements.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Dtypes the adapter holds natively.
    #[must_use]
    pub const fn dtypes(&self) -> &'static [DType] {
        self.dtypes
    }

    /// Device families the adapter can place values on.
    #[must_use]
    pub const fn device_kinds(&self) -> &'static [DeviceKind] {
        self.device_kinds
    }

    /// `true` if `op` is in the capability set.
    #[must_use]
    pub const fn supports(&self, op: Op) -> bool {
        self.capabilities.contains(op)
    }

    /// The adapter, for callers that already checked capabilities.
    #[must_use]
    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    /// The adapter, if it implements `op`.
    ///
    /// # Errors
    /// [`Error::UnsupportedOperation`] when `op` is missing.
    pub fn require(&self, op: Op) -> Result<&dyn Adapter> {
        if self.supports(op) {
            Ok(self.adapter())
        } else {
            Err(Error::UnsupportedOperation {
                backend: self.id(),
                op,
            })
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id())
            .field("ops", &self.capabilities.len())
            .field("dtypes", &self.dtypes)
            .field("device_kinds", &self.device_kinds)
            .finish()
    }
}

#[derive(Default)]
struct Slot {
    loader: RwLock<Option<Loader>>,
    binding: OnceLock<Arc<Binding>>,
    // serializes loads (and installs) so a loader runs at most once at a time
    init: Mutex<()>,
}

/// Maps backend identifiers to lazily loaded bindings.
pub struct Registry {
    slots: [Slot; BackendId::COUNT],
}

lazy_static! {
    static ref GLOBAL_REGISTRY: Registry = Registry::with_builtin();
}

impl Registry {
    /// A registry without any loaders.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::default()),
        }
    }

    /// A registry with loaders for every adapter compiled into this build.
    #[must_use]
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.install(
            BackendId::Numpy,
            loader(|| Ok(Box::new(crate::ops::cpu::NumpyAdapter::new()) as Box<dyn Adapter>)),
        );
        #[cfg(feature = "jax")]
        registry.install(
            BackendId::Jax,
            loader(|| Ok(Box::new(crate::ops::cpu::JaxAdapter::new()) as Box<dyn Adapter>)),
        );
        #[cfg(feature = "wgpu")]
        registry.install(
            BackendId::Torch,
            loader(|| {
                crate::ops::wgpu::TorchAdapter::new()
                    .map(|a| Box::new(a) as Box<dyn Adapter>)
                    .map_err(|e| e.to_string())
            }),
        );
        registry
    }

    /// The process-wide registry the facade uses.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    /// Sets the loader for `id`.
    ///
    /// Returns `false` (and changes nothing) if the backend is already
    /// loaded; a live binding is never swapped out from under its users.
    pub fn install(&self, id: BackendId, loader: Loader) -> bool {
        let slot = &self.slots[id.index()];
        let _init = slot.init.lock();
        if slot.binding.get().is_some() {
            tracing::warn!("backend '{}' is already loaded, keeping its adapter", id);
            return false;
        }
        *slot.loader.write() = Some(loader);
        true
    }

    /// Returns the binding for `id`, loading the backend on first use.
    ///
    /// # Errors
    /// [`Error::BackendLoad`] when no loader is installed or the loader fails.
    pub fn get_binding(&self, id: BackendId) -> Result<Arc<Binding>> {
        let slot = &self.slots[id.index()];
        if let Some(binding) = slot.binding.get() {
            return Ok(Arc::clone(binding));
        }

        let _init = slot.init.lock();
        // another thread may have finished loading while we waited
        if let Some(binding) = slot.binding.get() {
            return Ok(Arc::clone(binding));
        }

        let loader = slot.loader.read().clone().ok_or_else(|| Error::BackendLoad {
            backend: id,
            reason: missing_loader_reason(id).to_owned(),
        })?;
        let adapter = loader().map_err(|reason| {
            tracing::warn!("failed to load backend '{}': {}", id, reason);
            Error::BackendLoad {
                backend: id,
                reason,
            }
        })?;
        if adapter.id() != id {
            return Err(Error::BackendLoad {
                backend: id,
                reason: format!("loader produced an adapter for '{}'", adapter.id()),
            });
        }

        let binding = Arc::new(Binding::new(adapter));
        let missing = binding.capabilities().missing();
        if missing.is_empty() {
            tracing::info!("loaded backend '{}'", id);
        } else {
            let names: Vec<&str> = missing.iter().map(|op| op.name()).collect();
            tracing::warn!(
                "loaded backend '{}' without {} operations: {}",
                id,
                missing.len(),
                names.join(", ")
            );
        }
        // cannot already be set: every writer holds `init`
        let _ = slot.binding.set(Arc::clone(&binding));
        Ok(binding)
    }

    /// The binding of the backend that produced `value`.
    ///
    /// # Errors
    /// As [`Registry::get_binding`].
    pub fn binding_for(&self, value: &crate::tensors::Array) -> Result<Arc<Binding>> {
        self.get_binding(value.backend())
    }

    /// `true` once the backend has been loaded successfully.
    #[must_use]
    pub fn is_loaded(&self, id: BackendId) -> bool {
        self.slots[id.index()].binding.get().is_some()
    }

    /// Every backend loaded so far, in identifier order.
    #[must_use]
    pub fn loaded(&self) -> Vec<BackendId> {
        BackendId::ALL
            .into_iter()
            .filter(|&id| self.is_loaded(id))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("loaded", &self.loaded())
            .finish_non_exhaustive()
    }
}

const fn missing_loader_reason(id: BackendId) -> &'static str {
    match id {
        BackendId::Jax => "built without the `jax` feature",
        BackendId::Torch => "built without the `wgpu` feature",
        BackendId::Numpy | BackendId::Tensorflow | BackendId::Mxnet => "no adapter installed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Empty(BackendId);

    impl Adapter for Empty {
        fn id(&self) -> BackendId {
            self.0
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::from_ops(&[Op::Shape])
        }
        fn dtypes(&self) -> &'static [DType] {
            &[DType::Float32]
        }
        fn device_kinds(&self) -> &'static [DeviceKind] {
            &[DeviceKind::Cpu]
        }
    }

    #[test]
    fn missing_loader_is_a_load_error() {
        let r = Registry::new();
        match r.get_binding(BackendId::Mxnet) {
            Err(Error::BackendLoad { backend, .. }) => assert_eq!(backend, BackendId::Mxnet),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!r.is_loaded(BackendId::Mxnet));
    }

    #[test]
    fn loader_runs_once() {
        let r = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        r.install(
            BackendId::Tensorflow,
            loader(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Empty(BackendId::Tensorflow)) as Box<dyn Adapter>)
            }),
        );
        let a = r.get_binding(BackendId::Tensorflow).unwrap();
        let b = r.get_binding(BackendId::Tensorflow).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(a.supports(Op::Shape));
        assert!(matches!(
            a.require(Op::Matmul),
            Err(Error::UnsupportedOperation { op: Op::Matmul, .. })
        ));
        assert_eq!(r.loaded(), vec![BackendId::Tensorflow]);
    }

    #[test]
    fn install_after_load_is_refused() {
        let r = Registry::new();
        r.install(
            BackendId::Mxnet,
            loader(|| Ok(Box::new(Empty(BackendId::Mxnet)) as Box<dyn Adapter>)),
        );
        r.get_binding(BackendId::Mxnet).unwrap();
        assert!(!r.install(BackendId::Mxnet, loader(|| Err("nope".into()))));
    }

    #[test]
    fn mismatched_adapter_id_is_rejected() {
        let r = Registry::new();
        r.install(
            BackendId::Mxnet,
            loader(|| Ok(Box::new(Empty(BackendId::Tensorflow)) as Box<dyn Adapter>)),
        );
        assert!(matches!(
            r.get_binding(BackendId::Mxnet),
            Err(Error::BackendLoad { .. })
        ));
    }
}
