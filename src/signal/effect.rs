use crate::runtime::{on_scope_dispose, ReactiveRuntime};
use std::sync::{Arc, Weak};

/// A side effect that runs when its dependencies change.
///
/// Effects automatically track signal reads and re-run when those signals
/// change. The effect runs immediately on creation to establish initial
/// dependencies, and stops when dropped or when the scope it was created in
/// stops.
///
/// ```
/// use pantry::{Effect, Signal};
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let count = Signal::new(0);
/// let counter = Arc::new(AtomicUsize::new(0));
/// let counter_clone = counter.clone();
///
/// let _effect = Effect::new({
///     let count = count.clone();
///     move || {
///         let _ = count.get();
///         counter_clone.fetch_add(1, Ordering::SeqCst);
///     }
/// });
///
/// // Effect runs immediately
/// assert_eq!(counter.load(Ordering::SeqCst), 1);
/// ```
pub struct Effect {
    id: usize,
    runtime: Weak<ReactiveRuntime>,
}

impl Effect {
    /// Create a new effect that runs when dependencies change.
    pub fn new<F>(effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();
        let weak = Arc::downgrade(&runtime);

        runtime.create_observer(id, effect);
        on_scope_dispose({
            let weak = weak.clone();
            move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.remove_observer(id);
                }
            }
        });
        runtime.run_observer(id);

        Self { id, runtime: weak }
    }

    /// Manually re-run the effect.
    pub fn run(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.run_observer(self.id);
        }
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_observer(self.id);
        }
    }
}

/// Create a new effect that runs when dependencies change.
pub fn create_effect<F>(effect: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn effect_runs_immediately() {
        ReactiveRuntime::scope(|| {
            let counter = Arc::new(AtomicUsize::new(0));
            let counter_clone = counter.clone();

            let _effect = create_effect(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            });

            assert_eq!(counter.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn dropped_effect_stops() {
        ReactiveRuntime::scope(|| {
            let counter = Arc::new(AtomicUsize::new(0));
            let signal = Signal::new(0);

            let effect = create_effect({
                let counter = counter.clone();
                let signal = signal.clone();
                move || {
                    signal.get();
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
            signal.set(1);
            assert_eq!(counter.load(Ordering::SeqCst), 2);

            drop(effect);
            signal.set(2);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        });
    }
}
