//! # Manifest Walker
//!
//! Traverses an arbitrary, schemaless `serde_json::Value` tree (typically a decoded
//! Helm `valuesObject`) and applies a string-leaf rewrite function without touching
//! any other node. Map key order is whatever `serde_json` already holds (insertion
//! order, since the controller always decodes with the `preserve_order` behaviour of
//! `serde_yaml`/`serde_json::Value::Object` as a `Map`); array order is preserved.

use serde_json::Value;

/// Apply `f` to every string leaf in `value`, returning a new tree with every other
/// node (maps, arrays, numbers, bools, null) preserved exactly.
pub fn rewrite_strings(value: &Value, f: &impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| rewrite_strings(item, f)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), rewrite_strings(v, f)))
                .collect(),
        ),
        Value::Number(_) | Value::Bool(_) | Value::Null => value.clone(),
    }
}

/// Rewrite every `adhar://` shorthand string leaf in `value` against `bases`,
/// leaving every other leaf and the tree structure untouched.
#[must_use]
pub fn rewrite_shorthand_urls(value: &Value, bases: &crate::resolver::ResolverBases) -> Value {
    rewrite_strings(value, &|s| crate::resolver::resolve(s, bases))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverBases;
    use serde_json::json;

    fn bases() -> ResolverBases {
        ResolverBases {
            packages_base_url: "http://gitea/gitea_admin".to_string(),
            environments_base_url: "http://gitea/environments".to_string(),
        }
    }

    #[test]
    fn rewrites_only_string_leaves_and_preserves_structure() {
        let input = json!({
            "repoURLGit": "adhar://test",
            "nested": {
                "repoURLGit": "adhar://test",
                "bool": true,
                "int": 123
            },
            "arrayString": ["abc", "adhar://test"]
        });

        let output = rewrite_shorthand_urls(&input, &bases());

        assert_eq!(output["repoURLGit"], json!("http://gitea/gitea_admin/packages/test"));
        assert_eq!(
            output["nested"]["repoURLGit"],
            json!("http://gitea/gitea_admin/packages/test")
        );
        assert_eq!(output["nested"]["bool"], json!(true));
        assert_eq!(output["nested"]["int"], json!(123));
        assert_eq!(output["arrayString"][0], json!("abc"));
        assert_eq!(
            output["arrayString"][1],
            json!("http://gitea/gitea_admin/packages/test")
        );
    }

    #[test]
    fn identity_function_round_trips_the_tree() {
        let input = json!({
            "a": [1, 2.5, null, "x"],
            "b": {"c": "d"}
        });
        let output = rewrite_strings(&input, &|s| s.to_string());
        assert_eq!(input, output);
    }

    #[test]
    fn leaves_non_shorthand_strings_byte_equal() {
        let input = json!(["https://example.com/repo.git", "plain text"]);
        let output = rewrite_shorthand_urls(&input, &bases());
        assert_eq!(input, output);
    }
}
