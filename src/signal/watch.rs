use crate::runtime::{on_scope_dispose, ReactiveRuntime};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Options recognized by [`watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Fire the callback once on registration with the current value.
    pub immediate: bool,
    /// Fire on every tracked mutation, even when the source value compares equal.
    pub deep: bool,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    pub fn deep() -> Self {
        Self {
            deep: true,
            ..Self::default()
        }
    }
}

/// Stop handle returned by [`watch`].
///
/// Dropping the handle does not stop the watcher; the enclosing scope or an
/// explicit [`stop`](WatchHandle::stop) does.
#[derive(Clone)]
pub struct WatchHandle {
    id: usize,
    runtime: Weak<ReactiveRuntime>,
    stopped: Arc<AtomicBool>,
}

impl WatchHandle {
    pub(crate) fn inert() -> Self {
        Self {
            id: usize::MAX,
            runtime: Weak::new(),
            stopped: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Detach the watcher. Calling this again is a no-op.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_observer(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

/// Observe `source` and call `callback(new, old)` when it changes.
///
/// `source` runs under dependency tracking; `callback` runs untracked.
/// `old` is `None` only for the immediate call.
///
/// ```
/// use pantry::{watch, Signal, WatchOptions};
/// use std::sync::{Arc, Mutex};
///
/// let count = Signal::new(1);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let handle = watch(
///     { let count = count.clone(); move || count.get() },
///     { let seen = seen.clone(); move |new: &i32, _old: Option<&i32>| seen.lock().unwrap().push(*new) },
///     WatchOptions::default(),
/// );
///
/// count.set(2);
/// count.set(2);
/// assert_eq!(*seen.lock().unwrap(), vec![2]);
/// handle.stop();
/// ```
pub fn watch<T, S, C>(source: S, callback: C, options: WatchOptions) -> WatchHandle
where
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T, Option<&T>) + Send + Sync + 'static,
{
    let runtime = ReactiveRuntime::current();
    let id = runtime.next_id();
    let weak = Arc::downgrade(&runtime);
    let previous: Mutex<Option<T>> = Mutex::new(None);

    runtime.create_observer(id, {
        let weak = weak.clone();
        move || {
            let next = source();
            let prev = previous.lock().replace(next.clone());
            let fire = match &prev {
                None => options.immediate,
                Some(prev) => options.deep || *prev != next,
            };
            if !fire {
                return;
            }
            match weak.upgrade() {
                Some(runtime) => runtime.untracked(|| callback(&next, prev.as_ref())),
                None => callback(&next, prev.as_ref()),
            }
        }
    });

    let handle = WatchHandle {
        id,
        runtime: weak,
        stopped: Arc::new(AtomicBool::new(false)),
    };
    let scoped = on_scope_dispose({
        let handle = handle.clone();
        move || handle.stop()
    });
    if !scoped {
        tracing::warn!(watcher = id, "watcher created outside of any scope");
    }

    runtime.run_observer(id);
    handle
}
