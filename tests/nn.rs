use polytensor::{nested, nn, BackendId};

#[test]
fn test_binary_cross_entropy() {
    let d = polytensor::on(BackendId::Numpy);
    let x = d.array(&nested!([[0.3, 0.7, 0.5]]), None, None).unwrap();
    let y = d.array(&nested!([[0, 1, 0]]), None, None).unwrap();
    let loss = nn::binary_cross_entropy(&d, &x, &y, nn::DEFAULT_EPSILON).unwrap();

    let got = d.to_numpy(&loss).unwrap();
    let expected = [0.356_674_94, 0.356_674_94, 0.693_147_18];
    assert_eq!(got.shape(), &[1, 3]);
    for (g, e) in got.iter().zip(expected) {
        assert!((g - e).abs() < 1e-6, "{g} vs {e}");
    }
}

#[test]
#[cfg(feature = "jax")]
fn test_binary_cross_entropy_follows_argument_backend() {
    let jax = polytensor::on(BackendId::Jax);
    let x = jax.array(&nested!([0.9, 0.1]), None, None).unwrap();
    let y = jax.array(&nested!([1.0, 0.0]), None, None).unwrap();
    let loss = nn::binary_cross_entropy(&polytensor::auto(), &x, &y, 1e-7).unwrap();
    assert_eq!(loss.backend(), BackendId::Jax);
    assert_eq!(jax.dtype_str(&loss).unwrap(), "float32");
}
