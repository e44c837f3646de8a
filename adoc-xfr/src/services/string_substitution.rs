//! Exact-match string substitution over a JSON tree
//!
//! Only string leaves are rewritten. Object keys are left alone unless
//! [`SubstitutionOptions::keys`] is set; numbers, booleans and null are cloned
//! untouched, so no numeric precision is lost.
//!
//! Everything here is pure: no I/O and no shared state.

use crate::models::TransformSpec;
use serde_json::{Map, Value};

/// Knobs for a substitution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionOptions {
    /// Also rewrite object keys
    pub keys: bool,
}

/// Result of a substitution pass
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub value: Value,
    /// Number of string leaves (and keys, when enabled) that changed
    pub changed_leaves: usize,
    /// Keys left unrenamed because the new name was already taken
    pub kept_keys: usize,
}

impl Substitution {
    pub fn changed(&self) -> bool {
        self.changed_leaves > 0
    }
}

#[derive(Default)]
struct Counters {
    changed_leaves: usize,
    kept_keys: usize,
}

/// Rewrite every string leaf of `value`
///
/// Returns the new tree and whether any leaf changed. Keys are not touched.
pub fn substitute(value: &Value, spec: &TransformSpec) -> (Value, bool) {
    let result = substitute_with(value, spec, SubstitutionOptions::default());
    let changed = result.changed();
    (result.value, changed)
}

/// Rewrite every string leaf of `value` with explicit options
///
/// With key rewriting on, a key whose new name already exists in the same
/// object keeps its original name so no member is overwritten.
pub fn substitute_with(value: &Value, spec: &TransformSpec, options: SubstitutionOptions) -> Substitution {
    if spec.is_empty() {
        return Substitution {
            value: value.clone(),
            changed_leaves: 0,
            kept_keys: 0,
        };
    }

    let mut counters = Counters::default();
    let value = rewrite(value, spec, options, &mut counters);
    Substitution {
        value,
        changed_leaves: counters.changed_leaves,
        kept_keys: counters.kept_keys,
    }
}

fn rewrite(value: &Value, spec: &TransformSpec, options: SubstitutionOptions, counters: &mut Counters) -> Value {
    match value {
        Value::String(text) => {
            let replaced = spec.apply_str(text);
            if replaced != *text {
                counters.changed_leaves += 1;
            }
            Value::String(replaced)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rewrite(item, spec, options, counters))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                let key = if options.keys {
                    rewrite_key(key, map, &out, spec, counters)
                } else {
                    key.clone()
                };
                out.insert(key, rewrite(item, spec, options, counters));
            }
            Value::Object(out)
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => value.clone(),
    }
}

fn rewrite_key(
    key: &str,
    original: &Map<String, Value>,
    out: &Map<String, Value>,
    spec: &TransformSpec,
    counters: &mut Counters,
) -> String {
    let replaced = spec.apply_str(key);
    if replaced == key {
        return replaced;
    }
    if original.contains_key(&replaced) || out.contains_key(&replaced) {
        tracing::warn!(key = %key, renamed = %replaced, "Key kept: renamed key already exists");
        counters.kept_keys += 1;
        return key.to_string();
    }
    counters.changed_leaves += 1;
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(pairs: &[(&str, &str)]) -> TransformSpec {
        TransformSpec::new(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_replaces_string_values_only() {
        let input = json!({"db": "PROD_DB", "count": 5, "flag": true});
        let (output, changed) = substitute(&input, &spec(&[("PROD_DB", "DEV_DB")]));
        assert_eq!(output, json!({"db": "DEV_DB", "count": 5, "flag": true}));
        assert!(changed);
    }

    #[test]
    fn test_keys_untouched_by_default() {
        let input = json!({"PROD_DB": "PROD_DB"});
        let (output, _) = substitute(&input, &spec(&[("PROD_DB", "DEV_DB")]));
        assert_eq!(output, json!({"PROD_DB": "DEV_DB"}));
    }

    #[test]
    fn test_key_substitution_escape_hatch() {
        let input = json!({"PROD_DB.orders": {"name": "PROD_DB"}});
        let result = substitute_with(
            &input,
            &spec(&[("PROD_DB", "DEV_DB")]),
            SubstitutionOptions { keys: true },
        );
        assert_eq!(result.value, json!({"DEV_DB.orders": {"name": "DEV_DB"}}));
        assert_eq!(result.changed_leaves, 2);
    }

    #[test]
    fn test_renamed_key_never_overwrites_existing_member() {
        let input = json!({"PROD": {"a": 1}, "DEV": {"b": 2}});
        let result = substitute_with(&input, &spec(&[("PROD", "DEV")]), SubstitutionOptions { keys: true });
        assert_eq!(result.value, json!({"PROD": {"a": 1}, "DEV": {"b": 2}}));
        assert_eq!(result.kept_keys, 1);
        assert_eq!(result.changed_leaves, 0);
    }

    #[test]
    fn test_two_keys_renamed_to_same_name() {
        let input = json!({"A": 1, "B": 2});
        let result = substitute_with(&input, &spec(&[("A", "C"), ("B", "C")]), SubstitutionOptions { keys: true });
        assert_eq!(result.value, json!({"C": 1, "B": 2}));
        assert_eq!(result.kept_keys, 1);
    }

    #[test]
    fn test_empty_spec_is_noop() {
        let input = json!({"a": ["x", 1, null]});
        let (output, changed) = substitute(&input, &TransformSpec::empty());
        assert_eq!(output, input);
        assert!(!changed);
    }

    #[test]
    fn test_non_string_leaves_are_untouched() {
        let input: Value =
            serde_json::from_str(r#"[12345678901234567890123, 1.10, -0.0, false, null, "1.10"]"#).unwrap();
        let (output, changed) = substitute(&input, &spec(&[("1", "2")]));
        assert!(changed);
        let text = serde_json::to_string(&output).unwrap();
        assert_eq!(text, r#"[12345678901234567890123,1.10,-0.0,false,null,"2.20"]"#);
    }

    #[test]
    fn test_array_order_and_nesting_preserved() {
        let input = json!([{"k": ["PROD", "x", {"deep": "PROD-PROD"}]}, "PROD"]);
        let (output, _) = substitute(&input, &spec(&[("PROD", "DEV")]));
        assert_eq!(output, json!([{"k": ["DEV", "x", {"deep": "DEV-DEV"}]}, "DEV"]));
    }

    #[test]
    fn test_pairs_apply_sequentially() {
        let input = json!("A");
        let (output, _) = substitute(&input, &spec(&[("A", "B"), ("B", "C")]));
        assert_eq!(output, json!("C"));
    }

    #[test]
    fn test_unchanged_when_no_match() {
        let input = json!({"a": "nothing here"});
        let (output, changed) = substitute(&input, &spec(&[("PROD", "DEV")]));
        assert_eq!(output, input);
        assert!(!changed);
    }

    #[test]
    fn test_second_pass_is_noop_when_replacements_do_not_contain_searches() {
        let pairs = spec(&[("PROD_DB", "DEV_DB"), ("prod.example.com", "dev.example.com")]);
        let input = json!({
            "conn": "jdbc://prod.example.com/PROD_DB",
            "nested": [{"n": "PROD_DB"}, 3, true]
        });
        let (once, changed_once) = substitute(&input, &pairs);
        let (twice, changed_twice) = substitute(&once, &pairs);
        assert!(changed_once);
        assert!(!changed_twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_key_order_preserved() {
        let input: Value = serde_json::from_str(r#"{"z": "PROD", "a": 1, "m": "PROD"}"#).unwrap();
        let (output, _) = substitute(&input, &spec(&[("PROD", "DEV")]));
        let keys: Vec<&String> = output.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
