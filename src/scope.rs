//! Scoped backend overrides.
//!
//! Each thread has its own stack of active backends. [`enter`] pushes onto
//! the calling thread's stack and returns a [`ScopeGuard`]; dropping the
//! guard removes exactly its own frame, including during unwinding. Other
//! threads never see the override.
//!
//! ```rust
//! use polytensor::backend::BackendId;
//! use polytensor::scope;
//! {
//!     let _numpy = scope::enter(BackendId::Numpy).unwrap();
//!     assert_eq!(scope::current(), Some(BackendId::Numpy));
//! }
//! assert_eq!(scope::current(), None);
//! ```

use crate::backend::BackendId;
use crate::error::{Error, Result};
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;

/// One active scope: the guard that owns it and the backend it forces.
#[derive(Debug, Clone, Copy)]
struct Frame {
    id: u64,
    backend: BackendId,
}

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static NEXT_FRAME: Cell<u64> = const { Cell::new(0) };
}

/// Restores the scope stack on drop.
///
/// The guard is tied to the thread that created it and cannot be sent
/// elsewhere.
#[must_use = "the scope ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
    backend: BackendId,
    frame: u64,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// The backend this guard activated.
    #[must_use]
    pub const fn backend(&self) -> BackendId {
        self.backend
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        // the thread-local may already be gone during thread teardown
        let _ = SCOPE_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(pos) = stack.iter().rposition(|f| f.id == self.frame) else {
                return;
            };
            let inner = stack.len() - pos - 1;
            if inner > 0 {
                tracing::warn!(
                    "scope '{}' closed while {} inner scopes were still open",
                    self.backend,
                    inner
                );
            }
            // inner frames belong to live guards and stay in place
            stack.remove(pos);
        });
    }
}

/// Activates `backend` on the calling thread until the guard is dropped.
///
/// Accepts a [`BackendId`] or any string naming one.
///
/// # Errors
/// [`Error::UnknownBackend`] for unrecognized names; the stack is untouched.
pub fn enter<B>(backend: B) -> Result<ScopeGuard>
where
    B: TryInto<BackendId>,
    Error: From<B::Error>,
{
    let backend = backend.try_into()?;
    let frame = NEXT_FRAME.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    let depth = SCOPE_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(Frame { id: frame, backend });
        stack.len()
    });
    tracing::debug!("entered scope '{}' at depth {}", backend, depth);
    Ok(ScopeGuard {
        backend,
        frame,
        _not_send: PhantomData,
    })
}

/// Runs `f` with `backend` active, restoring the stack however `f` exits.
///
/// # Errors
/// [`Error::UnknownBackend`] for unrecognized names; `f` is not run.
pub fn with_backend<B, R>(backend: B, f: impl FnOnce() -> R) -> Result<R>
where
    B: TryInto<BackendId>,
    Error: From<B::Error>,
{
    let _guard = enter(backend)?;
    Ok(f())
}

/// Innermost active backend of the calling thread.
#[must_use]
pub fn current() -> Option<BackendId> {
    SCOPE_STACK.with(|stack| stack.borrow().last().map(|f| f.backend))
}

/// Number of active scopes on the calling thread.
#[must_use]
pub fn depth() -> usize {
    SCOPE_STACK.with(|stack| stack.borrow().len())
}

/// The calling thread's active scopes, outermost first.
#[must_use]
pub fn stack() -> Vec<BackendId> {
    SCOPE_STACK.with(|stack| stack.borrow().iter().map(|f| f.backend).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_restore_in_order() {
        let outer = enter(BackendId::Jax).unwrap();
        {
            let _inner = enter("numpy").unwrap();
            assert_eq!(stack(), vec![BackendId::Jax, BackendId::Numpy]);
        }
        assert_eq!(current(), Some(BackendId::Jax));
        drop(outer);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn unknown_name_leaves_stack_alone() {
        assert!(matches!(enter("theano"), Err(Error::UnknownBackend { .. })));
        assert_eq!(depth(), 0);
    }

    #[test]
    fn out_of_order_drop_keeps_live_inner_scopes() {
        let outer = enter(BackendId::Torch).unwrap();
        let inner = enter(BackendId::Jax).unwrap();
        drop(outer);
        assert_eq!(stack(), vec![BackendId::Jax]);
        drop(inner);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn stale_guard_leaves_newer_scopes_alone() {
        let outer = enter(BackendId::Torch).unwrap();
        let inner = enter(BackendId::Jax).unwrap();
        drop(outer);
        let _c = enter(BackendId::Numpy).unwrap();
        let _d = enter(BackendId::Tensorflow).unwrap();
        drop(inner);
        assert_eq!(current(), Some(BackendId::Tensorflow));
        assert_eq!(stack(), vec![BackendId::Numpy, BackendId::Tensorflow]);
    }

    #[test]
    fn panics_unwind_the_scope() {
        let result = std::panic::catch_unwind(|| {
            let _g = enter(BackendId::Jax).unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(current(), None);
    }
}
