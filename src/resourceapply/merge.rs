//! JSON merge helpers
//!
//! RFC 7386 merge patches and the subset check used to decide whether an
//! object on the server already carries everything we would write.

use serde_json::{Map, Value};

/// Apply an RFC 7386 merge patch to `target`
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

/// Compute the merge patch that turns `original` into `desired`; `None` when equal
pub fn merge_patch_diff(original: &Value, desired: &Value) -> Option<Value> {
    match (original, desired) {
        (Value::Object(orig), Value::Object(want)) => {
            let mut patch = Map::new();
            for key in orig.keys().filter(|k| !want.contains_key(*k)) {
                patch.insert(key.clone(), Value::Null);
            }
            for (key, value) in want {
                match orig.get(key) {
                    Some(current) => {
                        if let Some(nested) = merge_patch_diff(current, value) {
                            patch.insert(key.clone(), nested);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), value.clone());
                    }
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        _ if original == desired => None,
        _ => Some(desired.clone()),
    }
}

/// True when every field set in `desired` holds the same value in `existing`.
///
/// Fields only present in `existing` (server defaults, status) are ignored.
pub fn is_subset(desired: &Value, existing: &Value) -> bool {
    match (desired, existing) {
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(key, value)| {
            match have.get(key) {
                Some(current) => is_subset(value, current),
                None => value.is_null(),
            }
        }),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        _ => desired == existing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_rfc7386() {
        let mut target = json!({"a": "b", "c": {"d": "e", "f": "g"}});
        merge_patch(&mut target, &json!({"a": "z", "c": {"f": null}}));
        assert_eq!(target, json!({"a": "z", "c": {"d": "e"}}));

        let mut target = json!({"a": [1, 2]});
        merge_patch(&mut target, &json!({"a": [3]}));
        assert_eq!(target, json!({"a": [3]}));
    }

    #[test]
    fn test_diff_then_patch_reaches_desired() {
        let original = json!({"targetconfig": {"proxy": {"HTTP_PROXY": "a", "NO_PROXY": "b"}}});
        let desired = json!({"targetconfig": {"proxy": {"HTTP_PROXY": "c"}}});
        let patch = merge_patch_diff(&original, &desired).unwrap();
        let mut patched = original.clone();
        merge_patch(&mut patched, &patch);
        assert_eq!(patched, desired);

        assert!(merge_patch_diff(&desired, &desired).is_none());
    }

    #[test]
    fn test_is_subset_ignores_server_fields() {
        let desired = json!({"spec": {"replicas": 1, "template": {"spec": {"containers": [{"name": "op"}]}}}});
        let existing = json!({
            "spec": {"replicas": 1, "progressDeadlineSeconds": 600,
                     "template": {"spec": {"containers": [{"name": "op", "imagePullPolicy": "IfNotPresent"}]}}},
            "status": {"replicas": 1}
        });
        assert!(is_subset(&desired, &existing));
        assert!(!is_subset(&json!({"spec": {"replicas": 2}}), &existing));
        assert!(!is_subset(
            &json!({"spec": {"template": {"spec": {"containers": [{"name": "op"}, {"name": "x"}]}}}}),
            &existing
        ));
    }
}
