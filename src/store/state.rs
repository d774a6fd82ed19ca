use super::merge::merge;
use crate::signal::Signal;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A reactive JSON object whose fields are individual [`Signal`] cells.
///
/// Reading a field tracks that field only; adding a field notifies readers
/// of the object's shape. Clones share the same object, and a field cell
/// handed out by [`field`](ReactiveObject::field) stays linked to it.
#[derive(Clone)]
pub struct ReactiveObject {
    fields: Arc<RwLock<BTreeMap<String, Signal<Value>>>>,
    shape: Signal<usize>,
}

impl ReactiveObject {
    pub fn new() -> Self {
        Self {
            fields: Arc::new(RwLock::new(BTreeMap::new())),
            shape: Signal::new(0),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        let object = Self::new();
        {
            let mut fields = object.fields.write();
            for (key, value) in map {
                let cell = object.cell(value);
                fields.insert(key, cell);
            }
        }
        object
    }

    // New fields live in the same runtime as the object itself.
    fn cell(&self, value: Value) -> Signal<Value> {
        match self.shape.runtime() {
            Some(runtime) => Signal::new_in(&runtime, value),
            None => Signal::new(value),
        }
    }

    /// The cell behind `key`, if the field exists.
    pub fn field(&self, key: &str) -> Option<Signal<Value>> {
        self.shape.with(|_| ());
        self.fields.read().get(key).cloned()
    }

    /// Read one field.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.field(key).map(|cell| cell.get())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.shape.with(|_| ());
        self.fields.read().keys().cloned().collect()
    }

    /// Every `(key, cell)` pair, in key order.
    pub fn fields(&self) -> Vec<(String, Signal<Value>)> {
        self.shape.with(|_| ());
        self.fields
            .read()
            .iter()
            .map(|(key, cell)| (key.clone(), cell.clone()))
            .collect()
    }

    /// Overwrite one field, adding it when absent.
    pub fn set(&self, key: &str, value: Value) {
        let existing = self.fields.read().get(key).cloned();
        match existing {
            Some(cell) => cell.set(value),
            None => self.link(key, self.cell(value)),
        }
    }

    /// Install `cell` as the field `key`, sharing it with the caller.
    pub fn link(&self, key: &str, cell: Signal<Value>) {
        let len = {
            let mut fields = self.fields.write();
            fields.insert(key.to_string(), cell);
            fields.len()
        };
        self.shape.set(len);
    }

    /// Overwrite each top-level field of `values`.
    pub fn assign(&self, values: Map<String, Value>) {
        for (key, value) in values {
            self.set(&key, value);
        }
    }

    /// Deep-merge `patch` field by field.
    ///
    /// Objects nested under an existing object field are merged into that
    /// field's value; everything else overwrites or adds the field.
    pub fn merge(&self, patch: &Map<String, Value>) {
        for (key, incoming) in patch {
            let existing = self.fields.read().get(key).cloned();
            match (existing, incoming) {
                (Some(cell), Value::Object(incoming))
                    if cell.with_untracked(Value::is_object) =>
                {
                    cell.update(|value| {
                        if let Value::Object(current) = value {
                            merge(current, incoming);
                        }
                    });
                }
                (Some(cell), incoming) => cell.set(incoming.clone()),
                (None, incoming) => self.link(key, self.cell(incoming.clone())),
            }
        }
    }

    /// The whole object as JSON. Tracks the shape and every field.
    pub fn snapshot(&self) -> Value {
        let map = self
            .fields()
            .into_iter()
            .map(|(key, cell)| (key, cell.get()))
            .collect::<Map<_, _>>();
        Value::Object(map)
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read();
        f.debug_map()
            .entries(fields.iter().map(|(key, cell)| (key, cell.get_untracked())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ReactiveRuntime;
    use crate::signal::{watch, WatchOptions};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn merge_keeps_field_cells() {
        ReactiveRuntime::scope(|| {
            let state = ReactiveObject::from_map(object(json!({
                "user": { "name": "ada", "age": 36 },
                "tags": ["a"],
            })));
            let user = state.field("user").expect("user field");

            state.merge(&object(json!({ "user": { "age": 37 }, "tags": ["b", "c"], "new": 1 })));

            assert!(state.field("user").is_some_and(|cell| cell.ptr_eq(&user)));
            assert_eq!(
                state.snapshot(),
                json!({ "user": { "name": "ada", "age": 37 }, "tags": ["b", "c"], "new": 1 })
            );
        });
    }

    #[test]
    fn snapshot_watchers_see_added_fields() {
        ReactiveRuntime::scope(|| {
            let state = ReactiveObject::new();
            let calls = Arc::new(AtomicUsize::new(0));

            let handle = {
                let state = state.clone();
                let calls = calls.clone();
                watch(
                    move || state.snapshot(),
                    move |_, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                    },
                    WatchOptions::deep(),
                )
            };

            state.set("a", json!(1));
            state.set("a", json!(2));
            assert_eq!(calls.load(Ordering::SeqCst), 2);
            handle.stop();
        });
    }

    #[test]
    fn linked_cells_are_shared() {
        ReactiveRuntime::scope(|| {
            let cell = Signal::new(json!(0));
            let state = ReactiveObject::new();
            state.link("count", cell.clone());

            cell.set(json!(5));
            assert_eq!(state.get("count"), Some(json!(5)));

            state.set("count", json!(6));
            assert_eq!(cell.get(), json!(6));
        });
    }
}
