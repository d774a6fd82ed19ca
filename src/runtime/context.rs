use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type ObserverFn = Arc<dyn Fn() + Send + Sync>;

/// Reactive context for tracking dependencies.
struct ReactiveContext {
    current_observer: Option<usize>,
    // Map from source ID to set of observer IDs that depend on it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to set of source IDs it depends on
    observer_deps: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to the effect function
    observers: HashMap<usize, ObserverFn>,
    // Map from memo ID to dirty state
    memo_dirty: HashMap<usize, bool>,
    batch_depth: usize,
    // Effects queued while a batch is open, in first-notification order
    pending: Vec<usize>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            current_observer: None,
            dependencies: HashMap::new(),
            observer_deps: HashMap::new(),
            observers: HashMap::new(),
            memo_dirty: HashMap::new(),
            batch_depth: 0,
            pending: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.current_observer = None;
        self.dependencies.clear();
        self.observer_deps.clear();
        self.observers.clear();
        self.memo_dirty.clear();
        self.pending.clear();
    }

    fn clear_dependencies(&mut self, observer_id: usize) {
        if let Some(old_deps) = self.observer_deps.remove(&observer_id) {
            for source_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&source_id) {
                    deps.remove(&observer_id);
                }
            }
        }
    }
}

/// Reactive runtime for managing reactive primitives.
///
/// Supports both a global runtime (default) and scoped runtimes for isolation.
/// The runtime tracks dependencies between signals, effects, memos and
/// watchers, and manages the reactive graph. Every
/// [`Registry`](crate::Registry) owns its own runtime.
///
/// # Examples
///
/// Using the default global runtime:
///
/// ```
/// use pantry::Signal;
///
/// let signal = Signal::new(42);
/// assert_eq!(signal.get(), 42);
/// ```
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use pantry::runtime::ReactiveRuntime;
/// use pantry::Signal;
///
/// ReactiveRuntime::scope(|| {
///     let signal = Signal::new(0);
///     assert_eq!(signal.get(), 0);
/// });
/// // Runtime and all its state is dropped here
/// ```
pub struct ReactiveRuntime {
    next_id: AtomicUsize,
    context: Mutex<ReactiveContext>,
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
}

impl ReactiveRuntime {
    /// Create a new isolated runtime with its own dependency graph.
    pub fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            next_id: AtomicUsize::new(0),
            context: Mutex::new(ReactiveContext::new()),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime and all its state is cleaned up when the function returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let runtime = Self::new();
        Self::with_runtime(runtime, f)
    }

    /// Get or create the global runtime (fallback).
    pub fn global() -> Arc<Self> {
        use std::sync::OnceLock;
        static RUNTIME: OnceLock<Arc<ReactiveRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// Get the current reactive runtime (scoped or global fallback).
    ///
    /// Returns the runtime from the top of the thread-local stack,
    /// or the global runtime if no scoped runtime is active.
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .cloned()
                .unwrap_or_else(Self::global)
        })
    }

    /// Run a function with a specific runtime as the current context.
    ///
    /// This pushes the runtime onto the thread-local stack for the duration
    /// of the function execution.
    ///
    /// ```
    /// use pantry::runtime::ReactiveRuntime;
    /// use pantry::Signal;
    ///
    /// let runtime = ReactiveRuntime::new();
    /// ReactiveRuntime::with_runtime(runtime, || {
    ///     let signal = Signal::new(42);
    ///     assert_eq!(signal.get(), 42);
    /// });
    /// ```
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Clear all observers, dependencies, and state from this runtime.
    pub fn clear(&self) {
        self.context.lock().clear();
        self.next_id.store(0, Ordering::SeqCst);
    }

    /// Generate the next unique ID for a reactive primitive.
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Track a read of a source by the current observer.
    pub fn track_read(&self, source_id: usize) {
        let mut ctx = self.context.lock();
        if let Some(current_observer) = ctx.current_observer {
            ctx.dependencies
                .entry(source_id)
                .or_default()
                .insert(current_observer);
            ctx.observer_deps
                .entry(current_observer)
                .or_default()
                .insert(source_id);
        }
    }

    /// Notify all observers that depend on a source.
    pub fn notify_observers(&self, source_id: usize) {
        let observers = {
            let ctx = self.context.lock();
            ctx.dependencies
                .get(&source_id)
                .map(|obs| obs.iter().copied().collect::<Vec<_>>())
        };

        if let Some(observers) = observers {
            for observer_id in observers {
                self.mark_observer_dirty(observer_id);
            }
        }
    }

    /// Mark an observer (memo or effect) as dirty and propagate to dependents.
    fn mark_observer_dirty(&self, observer_id: usize) {
        let mut ctx = self.context.lock();

        if let Some(already_dirty) = ctx.memo_dirty.get(&observer_id).copied() {
            if already_dirty {
                return;
            }
            ctx.memo_dirty.insert(observer_id, true);

            let dependents = ctx
                .dependencies
                .get(&observer_id)
                .map(|deps| deps.iter().copied().collect::<Vec<_>>());
            drop(ctx);

            for dependent_id in dependents.into_iter().flatten() {
                self.mark_observer_dirty(dependent_id);
            }
            return;
        }

        if !ctx.observers.contains_key(&observer_id) {
            return;
        }
        if ctx.batch_depth > 0 {
            if !ctx.pending.contains(&observer_id) {
                ctx.pending.push(observer_id);
            }
            return;
        }
        drop(ctx);
        self.run_observer(observer_id);
    }

    /// Register an effect function for an observer ID.
    ///
    /// The function is not run; call [`run_observer`](Self::run_observer)
    /// to execute it and establish its dependencies.
    pub fn create_observer<F>(&self, observer_id: usize, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut ctx = self.context.lock();
        ctx.clear_dependencies(observer_id);
        ctx.observers.insert(observer_id, Arc::new(f));
    }

    /// Run an observer's effect, re-tracking its dependencies from scratch.
    pub fn run_observer(&self, observer_id: usize) {
        let effect = {
            let mut ctx = self.context.lock();
            ctx.clear_dependencies(observer_id);
            ctx.observers.get(&observer_id).cloned()
        };
        if let Some(effect) = effect {
            self.with_observer(observer_id, || effect());
        }
    }

    /// Detach an observer from the graph. Later notifications skip it.
    pub fn remove_observer(&self, observer_id: usize) {
        let mut ctx = self.context.lock();
        ctx.observers.remove(&observer_id);
        ctx.memo_dirty.remove(&observer_id);
        ctx.pending.retain(|id| *id != observer_id);
        ctx.clear_dependencies(observer_id);
    }

    /// Forget every dependency an observer collected so far.
    pub fn clear_dependencies(&self, observer_id: usize) {
        self.context.lock().clear_dependencies(observer_id);
    }

    /// Run a function with a specific observer as the current context.
    pub fn with_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.swap_observer(Some(observer_id), f)
    }

    /// Run a function without tracking any reads.
    pub fn untracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.swap_observer(None, f)
    }

    fn swap_observer<F, R>(&self, observer: Option<usize>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        struct Restore<'a> {
            runtime: &'a ReactiveRuntime,
            prev: Option<usize>,
        }

        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.runtime.context.lock().current_observer = self.prev;
            }
        }

        let prev = std::mem::replace(&mut self.context.lock().current_observer, observer);
        let _restore = Restore {
            runtime: self,
            prev,
        };
        f()
    }

    /// Run `f` with effect execution deferred until the outermost batch ends.
    ///
    /// Every effect notified inside the batch runs exactly once afterwards,
    /// in the order it was first notified.
    pub fn batch<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        struct Depth<'a>(&'a ReactiveRuntime);

        impl Drop for Depth<'_> {
            fn drop(&mut self) {
                let mut ctx = self.0.context.lock();
                ctx.batch_depth -= 1;
            }
        }

        self.context.lock().batch_depth += 1;
        let result = {
            let _depth = Depth(self);
            f()
        };

        let pending = {
            let mut ctx = self.context.lock();
            if ctx.batch_depth == 0 {
                std::mem::take(&mut ctx.pending)
            } else {
                Vec::new()
            }
        };
        for observer_id in pending {
            self.run_observer(observer_id);
        }
        result
    }

    /// Register a memo and mark it as dirty initially.
    pub fn register_memo(&self, memo_id: usize) {
        self.context.lock().memo_dirty.insert(memo_id, true);
    }

    /// Check if a memo is dirty (needs recomputation).
    pub fn is_memo_dirty(&self, memo_id: usize) -> bool {
        self.context
            .lock()
            .memo_dirty
            .get(&memo_id)
            .copied()
            .unwrap_or(true)
    }

    /// Mark a memo as clean (after recomputation).
    pub fn mark_memo_clean(&self, memo_id: usize) {
        self.context.lock().memo_dirty.insert(memo_id, false);
    }
}
