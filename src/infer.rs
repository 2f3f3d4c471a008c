//! Backend inference for a single call.
//!
//! Precedence, first match wins:
//!
//! 1. an explicit backend passed with the call,
//! 2. the innermost active scope of the calling thread,
//! 3. the backend tag shared by every example value,
//! 4. the process default.
//!
//! Example values from different backends are an error when they decide
//! the call. An explicit backend or an active scope wins without looking at
//! them; a foreign value is then reported by the adapter.

use crate::backend::{default_backend, BackendId};
use crate::error::{Error, Result};
use crate::scope;
use crate::tensors::Array;

/// Picks the backend for one call.
///
/// Pure: reads its arguments and nothing else.
///
/// # Errors
/// [`Error::AmbiguousBackend`] naming the first two disagreeing tags.
///
/// # Example
/// ```
/// use polytensor::backend::BackendId;
/// use polytensor::infer::infer;
/// let id = infer(None, &[], Some(BackendId::Jax), BackendId::Numpy).unwrap();
/// assert_eq!(id, BackendId::Jax);
/// ```
pub fn infer(
    explicit: Option<BackendId>,
    examples: &[&Array],
    scope_top: Option<BackendId>,
    default: BackendId,
) -> Result<BackendId> {
    if let Some(id) = explicit.or(scope_top) {
        return Ok(id);
    }
    Ok(common_tag(examples)?.unwrap_or(default))
}

/// [`infer`] against the calling thread's scope and the process default.
///
/// # Errors
/// As [`infer`].
pub fn resolve(explicit: Option<BackendId>, examples: &[&Array]) -> Result<BackendId> {
    infer(explicit, examples, scope::current(), default_backend())
}

/// The tag every example carries, `None` without examples.
fn common_tag(examples: &[&Array]) -> Result<Option<BackendId>> {
    let Some((first, rest)) = examples.split_first() else {
        return Ok(None);
    };
    let first = first.backend();
    match rest.iter().map(|a| a.backend()).find(|&b| b != first) {
        Some(second) => Err(Error::AmbiguousBackend { first, second }),
        None => Ok(Some(first)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(id: BackendId) -> Array {
        Array::new(id, ())
    }

    #[test]
    fn explicit_beats_everything() {
        let a = tagged(BackendId::Jax);
        let b = tagged(BackendId::Torch);
        let id = infer(
            Some(BackendId::Numpy),
            &[&a, &b],
            Some(BackendId::Mxnet),
            BackendId::Tensorflow,
        )
        .unwrap();
        assert_eq!(id, BackendId::Numpy);
    }

    #[test]
    fn scope_beats_examples() {
        let a = tagged(BackendId::Jax);
        let id = infer(None, &[&a], Some(BackendId::Torch), BackendId::Numpy).unwrap();
        assert_eq!(id, BackendId::Torch);
        let id = infer(None, &[&a, &a], None, BackendId::Numpy).unwrap();
        assert_eq!(id, BackendId::Jax);
    }

    #[test]
    fn disagreeing_examples_are_ambiguous() {
        let a = tagged(BackendId::Jax);
        let b = tagged(BackendId::Jax);
        let c = tagged(BackendId::Torch);
        match infer(None, &[&a, &b, &c], None, BackendId::Numpy) {
            Err(Error::AmbiguousBackend { first, second }) => {
                assert_eq!((first, second), (BackendId::Jax, BackendId::Torch));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn default_when_nothing_else() {
        assert_eq!(
            infer(None, &[], None, BackendId::Mxnet).unwrap(),
            BackendId::Mxnet
        );
    }
}
