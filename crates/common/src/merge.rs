//! Key-wise deep merge for JSON option bags.
//!
//! Extension and host configuration is carried as `serde_json::Value` so that
//! type-level defaults and caller overrides can be combined without every
//! layer knowing the full schema.

use serde_json::Value;

/// Merge `overlay` onto `base`, returning a new value.
///
/// Objects merge key-wise and later values win. Everything else — arrays
/// included — replaces wholesale. Neither input is mutated.
#[must_use]
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let value = match base_map.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        },
        _ => overlay.clone(),
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn later_values_win() {
        let merged = deep_merge(&json!({"level": "info"}), &json!({"level": "debug"}));
        assert_eq!(merged, json!({"level": "debug"}));
    }

    #[test]
    fn objects_merge_key_wise() {
        let base = json!({"logging": {"name": "bramble", "level": "info"}, "repl": true});
        let overlay = json!({"logging": {"level": "debug"}});
        let merged = deep_merge(&base, &overlay);
        assert_eq!(
            merged,
            json!({"logging": {"name": "bramble", "level": "debug"}, "repl": true})
        );
    }

    #[test]
    fn arrays_replace_wholesale() {
        let base = json!({"dependencies": ["a", "b"]});
        let overlay = json!({"dependencies": ["c"]});
        assert_eq!(
            deep_merge(&base, &overlay),
            json!({"dependencies": ["c"]})
        );
    }

    #[test]
    fn missing_keys_come_from_base() {
        let merged = deep_merge(&json!({"a": 1, "b": 2}), &json!({"b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let base = json!({"nested": {"keep": true}});
        let overlay = json!({"nested": {"add": 1}});
        let _ = deep_merge(&base, &overlay);
        assert_eq!(base, json!({"nested": {"keep": true}}));
        assert_eq!(overlay, json!({"nested": {"add": 1}}));
    }

    #[test]
    fn explicit_null_overrides() {
        let merged = deep_merge(&json!({"device_id": "abc123"}), &json!({"device_id": null}));
        assert_eq!(merged, json!({"device_id": null}));
    }
}
