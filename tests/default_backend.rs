// The default backend is process-global; everything touching it lives in
// this one test so parallel tests cannot observe a half-changed default.
#![cfg(feature = "jax")]

use polytensor::{default_backend, scope, set_default_backend, unset_default_backend, BackendId, Config};

#[test]
fn test_default_backend_lifecycle() {
    set_default_backend(BackendId::Jax);
    assert_eq!(default_backend(), BackendId::Jax);

    let d = polytensor::auto();
    assert_eq!(d.zeros(&[1], None, None).unwrap().backend(), BackendId::Jax);
    assert_eq!(d.backend_for(&[]).unwrap(), BackendId::Jax);

    // a scope still wins over the default
    let inside = scope::with_backend(BackendId::Numpy, || d.zeros(&[1], None, None))
        .unwrap()
        .unwrap();
    assert_eq!(inside.backend(), BackendId::Numpy);

    Config {
        default_backend: Some(BackendId::Numpy),
        seed: None,
    }
    .apply();
    assert_eq!(default_backend(), BackendId::Numpy);

    unset_default_backend();
    let expected = Config::from_env().default_backend.unwrap_or_default();
    assert_eq!(default_backend(), expected);
}
