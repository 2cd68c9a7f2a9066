use serde_json::{Map, Value};

/// Merge `patch` into `target` following JSON merge-patch rules.
///
/// Non-null values overwrite, `null` removes the key, absent keys are kept.
/// Objects merge key by key at every level; arrays and scalars are replaced.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
