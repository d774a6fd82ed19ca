use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;
type Entries<A> = Mutex<Vec<(usize, Callback<A>)>>;

/// An ordered list of callbacks taking `&A`.
///
/// Clones share the same list.
pub struct SubscriptionList<A: ?Sized> {
    entries: Arc<Entries<A>>,
    next_id: Arc<AtomicUsize>,
}

impl<A: ?Sized> Clone for SubscriptionList<A> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<A: ?Sized + 'static> SubscriptionList<A> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append `callback` and return the handle that removes it again.
    pub fn add<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let callback: Callback<A> = Arc::new(callback);
        self.entries.lock().push((id, callback));

        let entries: Weak<Entries<A>> = Arc::downgrade(&self.entries);
        Unsubscribe::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.lock().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Call every callback registered before this call, in order.
    ///
    /// Callbacks added while the pass runs are not called in this pass. A
    /// panicking callback does not stop the pass; the first panic is resumed
    /// once every callback has run.
    pub fn trigger(&self, arg: &A) {
        let snapshot: Vec<Callback<A>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        let mut first_panic = None;
        for callback in snapshot {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(arg)));
            if let Err(e) = result {
                first_panic.get_or_insert(e);
            }
        }

        if let Some(e) = first_panic {
            std::panic::resume_unwind(e);
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<A: ?Sized + 'static> Default for SubscriptionList<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes one subscription. Only the first call has an effect.
#[derive(Clone)]
pub struct Unsubscribe {
    remove: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Unsubscribe {
    fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Arc::new(Mutex::new(Some(Box::new(remove)))),
        }
    }

    pub fn unsubscribe(&self) {
        let remove = self.remove.lock().take();
        if let Some(remove) = remove {
            remove();
        }
    }
}
