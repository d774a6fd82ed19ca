use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::Arc;

type Cleanup = Box<dyn FnOnce() + Send>;

struct ScopeState {
    active: bool,
    cleanups: Vec<Cleanup>,
    children: Vec<EffectScope>,
}

/// A lifetime boundary for watchers, effects and computed values.
///
/// Anything reactive created inside [`EffectScope::run`] registers a cleanup
/// with the scope; [`EffectScope::stop`] runs them all. Stopping a scope
/// stops its child scopes first.
///
/// ```
/// use pantry::runtime::EffectScope;
/// use pantry::{watch, Signal, WatchOptions};
///
/// let scope = EffectScope::new();
/// let count = Signal::new(0);
/// let handle = scope
///     .run(|| {
///         let count = count.clone();
///         watch(move || count.get(), |_, _| {}, WatchOptions::default())
///     })
///     .unwrap();
///
/// scope.stop();
/// assert!(!handle.is_active());
/// ```
#[derive(Clone)]
pub struct EffectScope {
    inner: Arc<Mutex<ScopeState>>,
}

thread_local! {
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

impl EffectScope {
    /// Create a detached scope with no parent.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScopeState {
                active: true,
                cleanups: Vec::new(),
                children: Vec::new(),
            })),
        }
    }

    /// Create a scope that is stopped together with `self`.
    pub fn child(&self) -> Self {
        let child = Self::new();
        let mut state = self.inner.lock();
        state.children.retain(EffectScope::is_active);
        state.children.push(child.clone());
        child
    }

    /// The innermost scope currently running on this thread.
    pub fn current() -> Option<Self> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether the scope has not been stopped yet.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Run `f` with this scope as the current scope.
    ///
    /// Returns `None` without running `f` when the scope is already stopped.
    pub fn run<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        if !self.is_active() {
            return None;
        }

        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => Some(r),
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Register a cleanup with this scope. Runs immediately if already stopped.
    pub fn add_cleanup(&self, cleanup: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.lock();
        if state.active {
            state.cleanups.push(Box::new(cleanup));
        } else {
            drop(state);
            cleanup();
        }
    }

    /// Stop the scope: children first, then every registered cleanup.
    pub fn stop(&self) {
        let (children, cleanups) = {
            let mut state = self.inner.lock();
            if !state.active {
                return;
            }
            state.active = false;
            (
                std::mem::take(&mut state.children),
                std::mem::take(&mut state.cleanups),
            )
        };

        for child in children {
            child.stop();
        }
        for cleanup in cleanups {
            cleanup();
        }
    }

    /// Whether two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Register `cleanup` with the current scope.
///
/// Returns `false` (and drops `cleanup` unrun) when no scope is running.
pub fn on_scope_dispose(cleanup: impl FnOnce() + Send + 'static) -> bool {
    match EffectScope::current() {
        Some(scope) => {
            scope.add_cleanup(cleanup);
            true
        }
        None => false,
    }
}
