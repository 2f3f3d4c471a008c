use polytensor::adapter::Adapter;
use polytensor::capability::{Capabilities, Op};
use polytensor::device::DeviceKind;
use polytensor::registry::{loader, Registry};
use polytensor::{nested, Array, BackendId, DType, Dispatch, Error, Nested};

fn numpy() -> Dispatch<'static> {
    polytensor::on(BackendId::Numpy)
}

#[test]
fn test_array_to_list_round_trip_per_dtype() {
    let d = numpy();
    let data = nested!([[0, 1, 1], [1, 0, 1]]);
    for dtype in DType::ALL {
        let a = d.array(&data, Some(dtype.as_str()), None).unwrap();
        assert_eq!(d.dtype(&a).unwrap(), dtype);
        assert_eq!(d.shape(&a).unwrap(), vec![2, 3]);
        assert_eq!(d.to_list(&a).unwrap(), data, "round trip through {dtype}");
    }
}

#[test]
#[cfg(feature = "jax")]
fn test_arguments_decide_the_backend() {
    let jax = polytensor::on(BackendId::Jax);
    let a = jax.array(&nested!([1.0, 2.0]), None, None).unwrap();
    let b = jax.array(&nested!([3.0, 4.0]), None, None).unwrap();

    let sum = polytensor::auto().add(&a, &b).unwrap();
    assert_eq!(sum.backend(), BackendId::Jax);
    assert_eq!(jax.to_list(&sum).unwrap(), nested!([4.0, 6.0]));
    assert_eq!(jax.dtype_str(&sum).unwrap(), "float32");
}

#[test]
#[cfg(feature = "jax")]
fn test_mixed_arguments_are_ambiguous() {
    let a = numpy().array(&nested!([1.0]), None, None).unwrap();
    let b = polytensor::on(BackendId::Jax)
        .array(&nested!([1.0]), None, None)
        .unwrap();
    match polytensor::auto().add(&a, &b) {
        Err(Error::AmbiguousBackend { first, second }) => {
            assert_eq!(first, BackendId::Numpy);
            assert_eq!(second, BackendId::Jax);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
#[cfg(feature = "jax")]
fn test_explicit_backend_beats_arguments() {
    let a = numpy().array(&nested!([1.0]), None, None).unwrap();
    match polytensor::on(BackendId::Jax).add(&a, &a) {
        Err(Error::ForeignValue { backend, found, op }) => {
            assert_eq!(backend, BackendId::Jax);
            assert_eq!(found, BackendId::Numpy);
            assert_eq!(op, Op::Add);
        }
        other => panic!("expected a foreign value error, got {other:?}"),
    }
}

#[test]
fn test_scatter_flat_reductions() {
    let d = numpy();
    let indices = d.array(&nested!([0, 1, 1, 4]), None, None).unwrap();
    let updates = d.array(&nested!([1.0, 2.0, 3.0, 4.0]), None, None).unwrap();
    let summed = d.scatter_flat(&indices, &updates, 6, "sum", None).unwrap();
    assert_eq!(
        d.to_list(&summed).unwrap(),
        nested!([1.0, 5.0, 0.0, 0.0, 4.0, 0.0])
    );

    let indices = d.array(&nested!([0, 0, 2]), None, None).unwrap();
    let updates = d.array(&nested!([3.0, 5.0, -1.0]), None, None).unwrap();
    let maxed = d.scatter_flat(&indices, &updates, 4, "max", None).unwrap();
    assert_eq!(d.to_list(&maxed).unwrap(), nested!([5.0, 0.0, -1.0, 0.0]));
    let mined = d.scatter_flat(&indices, &updates, 4, "min", None).unwrap();
    assert_eq!(d.to_list(&mined).unwrap(), nested!([3.0, 0.0, -1.0, 0.0]));
}

#[test]
fn test_unknown_reduction_is_rejected() {
    let d = numpy();
    let indices = d.array(&nested!([0]), None, None).unwrap();
    let updates = d.array(&nested!([1.0]), None, None).unwrap();
    match d.scatter_flat(&indices, &updates, 2, "bogus", None) {
        Err(Error::InvalidReduction { reduction }) => assert_eq!(reduction, "bogus"),
        other => panic!("expected InvalidReduction, got {other:?}"),
    }
}

#[test]
fn test_concatenate_without_axis_flattens() {
    let d = numpy();
    let a = d.array(&nested!([[0, 1], [2, 3]]), None, None).unwrap();
    let b = d.array(&nested!([4]), None, None).unwrap();
    let joined = d.concatenate(&[&a, &b], None).unwrap();
    assert_eq!(d.to_list(&joined).unwrap(), nested!([0, 1, 2, 3, 4]));

    let a = d.array(&nested!([[0, 1, 2]]), None, None).unwrap();
    let b = d.array(&nested!([[1, 2, 3]]), None, None).unwrap();
    let joined = d.concatenate(&[&a, &b], None).unwrap();
    assert_eq!(d.to_list(&joined).unwrap(), nested!([0, 1, 2, 1, 2, 3]));
}

#[test]
fn test_device_strings() {
    let d = numpy();
    assert!(matches!(
        d.zeros(&[1], None, Some("gpu:x")),
        Err(Error::InvalidDevice { .. })
    ));
    match d.zeros(&[1], None, Some("gpu:0")) {
        Err(Error::DeviceUnavailable { backend, device }) => {
            assert_eq!(backend, BackendId::Numpy);
            assert_eq!(device, "gpu:0");
        }
        other => panic!("expected DeviceUnavailable, got {other:?}"),
    }
    let x = d.ones(&[2], None, Some("cpu")).unwrap();
    assert_eq!(d.dev_str(&x).unwrap(), "cpu:0");
    assert!(!d.gpu_is_available().unwrap());
}

#[test]
#[cfg(feature = "jax")]
fn test_unsupported_dtype_is_not_substituted() {
    let jax = polytensor::on(BackendId::Jax);
    match jax.zeros(&[1], Some("float16"), None) {
        Err(Error::InvalidDtype { dtype, backend }) => {
            assert_eq!(dtype, "float16");
            assert_eq!(backend, Some(BackendId::Jax));
        }
        other => panic!("expected InvalidDtype, got {other:?}"),
    }
    assert!(matches!(
        numpy().zeros(&[1], Some("complex64"), None),
        Err(Error::InvalidDtype { backend: None, .. })
    ));
}

#[test]
fn test_seeded_draws_repeat() {
    let d = numpy();
    d.seed(7).unwrap();
    let first = d.random_uniform(0.0, 1.0, &[4], None).unwrap();
    d.seed(7).unwrap();
    let second = d.random_uniform(0.0, 1.0, &[4], None).unwrap();
    assert_eq!(d.to_numpy(&first).unwrap(), d.to_numpy(&second).unwrap());

    let ints = d.randint(0, 3, &[16], None).unwrap();
    assert_eq!(d.dtype_str(&ints).unwrap(), "int64");
    assert!(d.to_numpy(&ints).unwrap().iter().all(|&v| (0.0..3.0).contains(&v)));
}

#[test]
fn test_compile_fn_runs_the_function() {
    let d = numpy();
    let double = d
        .compile_fn(
            |xs: &[Array]| {
                let d = polytensor::on(BackendId::Numpy);
                Ok(vec![d.add(&xs[0], &xs[0])?])
            },
            true,
            None,
        )
        .unwrap();
    let x = d.array(&nested!([1, 2]), None, None).unwrap();
    let out = double.call(&[x]).unwrap();
    assert_eq!(d.to_list(&out[0]).unwrap(), nested!([2, 4]));
    assert_eq!(double.backend(), BackendId::Numpy);
}

/// Holds only `zeros`; payload is the shape.
struct ShapeOnly;

impl Adapter for ShapeOnly {
    fn id(&self) -> BackendId {
        BackendId::Tensorflow
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::from_ops(&[Op::Zeros, Op::Shape])
    }

    fn dtypes(&self) -> &'static [DType] {
        &[DType::Float32]
    }

    fn device_kinds(&self) -> &'static [DeviceKind] {
        &[DeviceKind::Cpu]
    }

    fn zeros(
        &self,
        shape: &[usize],
        _dtype: DType,
        _device: Option<polytensor::Device>,
    ) -> polytensor::Result<Array> {
        Ok(Array::new(BackendId::Tensorflow, shape.to_vec()))
    }

    fn shape(&self, x: &Array) -> polytensor::Result<Vec<usize>> {
        Ok(x.native::<Vec<usize>>(BackendId::Tensorflow, Op::Shape)?.clone())
    }
}

#[test]
fn test_partial_adapter_reports_unsupported_operations() {
    let registry = Registry::new();
    registry.install(
        BackendId::Tensorflow,
        loader(|| Ok(Box::new(ShapeOnly) as Box<dyn Adapter>)),
    );
    let d = Dispatch::new(&registry, Some(BackendId::Tensorflow));

    let z = d.zeros(&[2, 3], None, None).unwrap();
    assert_eq!(d.shape(&z).unwrap(), vec![2, 3]);
    match d.ones(&[1], None, None) {
        Err(Error::UnsupportedOperation { backend, op }) => {
            assert_eq!(backend, BackendId::Tensorflow);
            assert_eq!(op, Op::Ones);
        }
        other => panic!("expected UnsupportedOperation, got {other:?}"),
    }

    // arguments route to the same registry without the explicit id
    let inferred = Dispatch::new(&registry, None);
    assert_eq!(inferred.shape(&z).unwrap(), vec![2, 3]);
    assert!(matches!(
        inferred.to_list(&z),
        Err(Error::UnsupportedOperation { op: Op::ToList, .. })
    ));
}

#[test]
fn test_backend_without_loader_fails_to_load() {
    let registry = Registry::new();
    let d = Dispatch::new(&registry, Some(BackendId::Mxnet));
    match d.zeros(&[1], None, None) {
        Err(Error::BackendLoad { backend, .. }) => assert_eq!(backend, BackendId::Mxnet),
        other => panic!("expected BackendLoad, got {other:?}"),
    }
    assert!(matches!(
        "caffe".parse::<BackendId>(),
        Err(Error::UnknownBackend { .. })
    ));
}

#[test]
fn test_shape_and_math_surface() {
    let d = numpy();
    let a = d.array(&nested!([[1.0, 2.0], [3.0, 4.0]]), None, None).unwrap();
    let t = d.transpose(&a, None).unwrap();
    assert_eq!(d.to_list(&t).unwrap(), nested!([[1.0, 3.0], [2.0, 4.0]]));
    let p = d.matmul(&a, &t).unwrap();
    assert_eq!(d.to_list(&p).unwrap(), nested!([[5.0, 11.0], [11.0, 25.0]]));
    let best = d.argmax(&a, Some(1)).unwrap();
    assert_eq!(d.to_list(&best).unwrap(), nested!([1, 1]));
    let r = d.round(&d.array(&nested!([0.5, 1.5, 2.5]), None, None).unwrap()).unwrap();
    assert_eq!(d.to_list(&r).unwrap(), nested!([0.0, 2.0, 2.0]));
    assert!(matches!(
        d.split(&d.arange(5.0, None, None, None, None).unwrap(), Some(2), 0),
        Err(Error::InvalidArgument { op: Op::Split, .. })
    ));
    assert_eq!(d.get_num_dims(&a).unwrap(), 2);
    let dims = d.shape_as_tensor(&a).unwrap();
    assert_eq!(d.dtype_str(&dims).unwrap(), "int32");
    assert_eq!(d.to_list(&dims).unwrap(), Nested::from([2.0, 2.0]));
}
