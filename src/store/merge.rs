use serde_json::{Map, Value};

/// Deep-merge `patch` into `target` in place.
///
/// For every key of `patch`: when both the existing and the incoming value
/// are objects they are merged recursively, otherwise the incoming value
/// overwrites the key. Arrays and scalars are replaced wholesale. Keys of
/// `target` missing from `patch` are kept.
pub fn merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, incoming) in patch {
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge(existing, incoming),
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}
