//! Signature-caching `compile_fn` for the `jax` backend.
//!
//! A compiled function is traced once per distinct input signature (shapes
//! and dtypes of its arguments, or ranks and dtypes when `dynamic`), then
//! reused. The host kernels run eagerly either way; the trace count is what
//! callers can observe through [`CompiledFn::traces`].

use super::{HostPolicy, HostTensor};
use crate::adapter::{ArrayFn, CompiledFn};
use crate::backend::BackendId;
use crate::capability::Op;
use crate::dtype::DType;
use crate::error::Result;
use crate::tensors::Array;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shapes (`None` for dynamic dimensions) and dtypes of one call's inputs.
type Signature = Vec<(Vec<Option<usize>>, DType)>;

/// Tracing evaluation with 32-bit defaults.
#[derive(Debug, Clone, Copy)]
pub struct Traced;

impl HostPolicy for Traced {
    const ID: BackendId = BackendId::Jax;
    const DTYPES: &'static [DType] = &[
        DType::Bool,
        DType::Int32,
        DType::Int64,
        DType::Float32,
        DType::Float64,
    ];
    const INT: DType = DType::Int32;
    const FLOAT: DType = DType::Float32;

    fn compile(f: ArrayFn, dynamic: bool, example_inputs: Option<&[Array]>) -> Result<CompiledFn> {
        let tracer = Tracer {
            dynamic,
            seen: Mutex::new(HashSet::new()),
            traces: Arc::new(AtomicUsize::new(0)),
        };
        if let Some(examples) = example_inputs {
            tracer.observe(examples)?;
        }
        let traces = Arc::clone(&tracer.traces);
        let inner: ArrayFn = Arc::new(move |inputs: &[Array]| {
            tracer.observe(inputs)?;
            f(inputs)
        });
        Ok(CompiledFn::traced(Self::ID, inner, traces))
    }
}

struct Tracer {
    dynamic: bool,
    seen: Mutex<HashSet<Signature>>,
    traces: Arc<AtomicUsize>,
}

impl Tracer {
    fn signature(&self, inputs: &[Array]) -> Result<Signature> {
        inputs
            .iter()
            .map(|a| {
                let t: &HostTensor = a.native(Traced::ID, Op::CompileFn)?;
                let dims = t
                    .data()
                    .shape()
                    .iter()
                    .map(|&d| (!self.dynamic).then_some(d))
                    .collect();
                Ok((dims, t.dtype()))
            })
            .collect()
    }

    fn observe(&self, inputs: &[Array]) -> Result<()> {
        let signature = self.signature(inputs)?;
        if self.seen.lock().insert(signature) {
            let n = self.traces.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!("traced compiled function for a new input signature ({} so far)", n);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use crate::nested;
    use crate::ops::cpu::JaxAdapter;

    fn identity_fn() -> ArrayFn {
        Arc::new(|xs: &[Array]| Ok(xs.to_vec()))
    }

    #[test]
    fn retraces_per_shape_unless_dynamic() {
        let jax = JaxAdapter::new();
        let a = jax.array(&nested!([1.0, 2.0]), None, None).unwrap();
        let b = jax.array(&nested!([1.0, 2.0, 3.0]), None, None).unwrap();

        let fixed = jax.compile_fn(identity_fn(), false, None).unwrap();
        fixed.call(&[a.clone()]).unwrap();
        fixed.call(&[a.clone()]).unwrap();
        fixed.call(&[b.clone()]).unwrap();
        assert_eq!(fixed.traces(), 2);

        let dynamic = jax.compile_fn(identity_fn(), true, Some(&[a.clone()])).unwrap();
        assert_eq!(dynamic.traces(), 1);
        dynamic.call(&[b]).unwrap();
        assert_eq!(dynamic.traces(), 1);
    }

    #[test]
    fn foreign_inputs_fail_at_compile_time() {
        let jax = JaxAdapter::new();
        let foreign = Array::new(BackendId::Numpy, ());
        assert!(jax.compile_fn(identity_fn(), true, Some(&[foreign])).is_err());
    }
}
