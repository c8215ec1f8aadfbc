//! Computes JSON merge patches (RFC 7386) between two versions of an object.
use serde_json::{Map, Value};

/// Returns the merge patch which transforms `original` into `modified`.
///
/// Only fields that differ are included, so applying the patch leaves fields changed concurrently by other
/// writers untouched. Fields missing from `modified` are removed with `null`.
pub(crate) fn merge_patch_diff(original: &Value, modified: &Value) -> Value {
    match (original, modified) {
        (Value::Object(original), Value::Object(modified)) => {
            let mut patch = Map::new();
            for (key, old_value) in original {
                match modified.get(key) {
                    None => {
                        patch.insert(key.clone(), Value::Null);
                    }
                    Some(new_value) if new_value != old_value => {
                        patch.insert(key.clone(), merge_patch_diff(old_value, new_value));
                    }
                    Some(_) => {}
                }
            }
            for (key, new_value) in modified {
                if !original.contains_key(key) {
                    patch.insert(key.clone(), new_value.clone());
                }
            }
            Value::Object(patch)
        }
        (_, modified) => modified.clone(),
    }
}
