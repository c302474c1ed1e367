//! Property maps carried by nodes and relationships.

use hashbrown::HashMap;
use super::Value;

/// Property names to values. Setting a key to `Value::Null` removes it.
pub type PropertyMap = HashMap<String, Value>;

/// Build a map from pairs, skipping null values.
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(_, v)| !v.is_null())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_skips_nulls() {
        let map = props([("name", Value::from("Ada")), ("nickname", Value::Null)]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("name"), Some(&Value::from("Ada")));
    }
}
