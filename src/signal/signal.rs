use crate::runtime::ReactiveRuntime;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};

/// A reactive cell that holds a value and notifies dependents when changed.
///
/// Cloning a signal yields another handle to the same cell.
pub struct Signal<T> {
    value: Arc<RwLock<T>>,
    id: usize,
    runtime: Weak<ReactiveRuntime>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            id: self.id,
            runtime: Weak::clone(&self.runtime),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal in the current runtime.
    pub fn new(initial: T) -> Self {
        Self::new_in(&ReactiveRuntime::current(), initial)
    }

    /// Create a new signal in a specific runtime.
    pub(crate) fn new_in(runtime: &Arc<ReactiveRuntime>, initial: T) -> Self {
        let id = runtime.next_id();

        Self {
            value: Arc::new(RwLock::new(initial)),
            id,
            runtime: Arc::downgrade(runtime),
        }
    }

    /// Get the current value of the signal.
    pub fn get(&self) -> T {
        self.track();
        self.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value for the signal.
    pub fn set(&self, new_value: T) {
        *self.value.write() = new_value;
        self.notify();
    }

    /// Update the value using a function.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.value.write();
        f(&mut value);
        drop(value); // Release the write lock before notifying
        self.notify();
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        let value = self.value.read();
        f(&value)
    }

    /// Like [`with`](Signal::with), without registering a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.value.read();
        f(&value)
    }
}

impl<T> Signal<T> {
    /// Get the signal's unique ID.
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn runtime(&self) -> Option<Arc<ReactiveRuntime>> {
        self.runtime.upgrade()
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    fn track(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track_read(self.id);
        }
    }

    fn notify(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.notify_observers(self.id);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_cell() {
        let a = Signal::new(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Signal::new(2)));
    }

    #[test]
    fn update_and_with() {
        let signal = Signal::new(vec![1, 2]);
        signal.update(|v| v.push(3));
        assert_eq!(signal.with(|v| v.len()), 3);
    }
}
