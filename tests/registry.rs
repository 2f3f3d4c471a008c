use polytensor::adapter::Adapter;
use polytensor::ops::cpu::NumpyAdapter;
use polytensor::registry::{loader, Registry};
use polytensor::{BackendId, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_first_use_loads_once() {
    let registry = Registry::new();
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    registry.install(
        BackendId::Numpy,
        loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NumpyAdapter::new()) as Box<dyn Adapter>)
        }),
    );

    let bindings: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| registry.get_binding(BackendId::Numpy).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(bindings.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert!(registry.is_loaded(BackendId::Numpy));
}

#[test]
fn test_failed_load_is_not_cached() {
    let registry = Registry::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    registry.install(
        BackendId::Numpy,
        loader(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("runtime not ready".to_owned())
            } else {
                Ok(Box::new(NumpyAdapter::new()) as Box<dyn Adapter>)
            }
        }),
    );

    match registry.get_binding(BackendId::Numpy) {
        Err(Error::BackendLoad { backend, reason }) => {
            assert_eq!(backend, BackendId::Numpy);
            assert_eq!(reason, "runtime not ready");
        }
        other => panic!("expected BackendLoad, got {other:?}"),
    }
    assert!(!registry.is_loaded(BackendId::Numpy));
    assert!(registry.get_binding(BackendId::Numpy).is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
#[cfg(feature = "jax")]
fn test_builtin_host_backends_are_complete() {
    let registry = Registry::with_builtin();
    let numpy = registry.get_binding(BackendId::Numpy).unwrap();
    assert!(numpy.capabilities().is_complete());
    assert_eq!(numpy.dtypes().len(), 8);
    let jax = registry.get_binding(BackendId::Jax).unwrap();
    assert_eq!(jax.dtypes().len(), 5);
    assert_eq!(registry.loaded(), vec![BackendId::Numpy, BackendId::Jax]);
}

#[test]
fn test_torch_loads_or_explains_why_not() {
    let registry = Registry::with_builtin();
    match registry.get_binding(BackendId::Torch) {
        Ok(torch) => {
            assert_eq!(torch.id(), BackendId::Torch);
            assert!(!torch.capabilities().is_complete());
            assert_eq!(torch.dtypes().len(), 1);
        }
        // no GPU on this machine, or built without `wgpu`
        Err(Error::BackendLoad { backend, reason }) => {
            assert_eq!(backend, BackendId::Torch);
            assert!(!reason.is_empty());
        }
        Err(other) => panic!("unexpected error {other:?}"),
    }
}
