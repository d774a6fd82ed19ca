use crate::runtime::{on_scope_dispose, ReactiveRuntime};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// A memoized derived value that automatically tracks dependencies.
///
/// The computation runs lazily on first read and again only after one of
/// the values it read has changed. A `Computed` is read-only.
pub struct Computed<T> {
    compute: Arc<dyn Fn() -> T + Send + Sync>,
    cached: Arc<RwLock<Option<T>>>,
    id: usize,
    runtime: Weak<ReactiveRuntime>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            compute: Arc::clone(&self.compute),
            cached: Arc::clone(&self.cached),
            id: self.id,
            runtime: Weak::clone(&self.runtime),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Computed<T> {
    /// Create a new computed value in the current runtime.
    ///
    /// When created inside an [`EffectScope`](crate::runtime::EffectScope),
    /// the value stops tracking once the scope stops.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();
        runtime.register_memo(id);

        let weak = Arc::downgrade(&runtime);
        on_scope_dispose({
            let weak = weak.clone();
            move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.remove_observer(id);
                }
            }
        });

        Self {
            compute: Arc::new(compute),
            cached: Arc::new(RwLock::new(None)),
            id,
            runtime: weak,
        }
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        let Some(runtime) = self.runtime.upgrade() else {
            return (self.compute)();
        };
        runtime.track_read(self.id);

        if !runtime.is_memo_dirty(self.id) {
            if let Some(value) = self.cached.read().as_ref() {
                return value.clone();
            }
        }

        runtime.clear_dependencies(self.id);
        let value = runtime.with_observer(self.id, || (self.compute)());
        *self.cached.write() = Some(value.clone());
        runtime.mark_memo_clean(self.id);
        value
    }

    /// Get the computed's unique ID.
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Create a new memoized computation.
///
/// ```
/// use pantry::{create_memo, Signal};
///
/// let count = Signal::new(5);
/// let doubled = create_memo({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn create_memo<T, F>(compute: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(compute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn memo_basic() {
        let count = Signal::new(5);
        let doubled = create_memo({
            let count = count.clone();
            move || count.get() * 2
        });

        assert_eq!(doubled.get(), 10);

        count.set(10);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn memo_caches_between_changes() {
        ReactiveRuntime::scope(|| {
            let runs = Arc::new(AtomicUsize::new(0));
            let input = Signal::new(1);
            let squared = create_memo({
                let input = input.clone();
                let runs = runs.clone();
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    input.get() * input.get()
                }
            });

            assert_eq!(squared.get(), 1);
            assert_eq!(squared.get(), 1);
            assert_eq!(runs.load(Ordering::SeqCst), 1);

            input.set(3);
            assert_eq!(squared.get(), 9);
            assert_eq!(squared.get(), 9);
            assert_eq!(runs.load(Ordering::SeqCst), 2);
        });
    }
}
