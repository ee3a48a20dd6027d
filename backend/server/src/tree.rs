//! Path addressed edits on a JSON document tree.
//!
//! Writes follow Firebase semantics: `null`, `{}` and `[]` are never stored. Writing one
//! removes the node, and parents left empty by a removal disappear with it.
use serde_json::{Map, Value};

use crate::error::StoreError;

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Drops nulls and empty containers, recursively. `None` when nothing is left.
pub fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, child)| prune(child).map(|child| (key, child)))
                .collect();

            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Array(items) => {
            let items: Vec<Value> = items
                .into_iter()
                .map(|item| prune(item).unwrap_or(Value::Null))
                .collect();

            items
                .iter()
                .any(|item| !item.is_null())
                .then_some(Value::Array(items))
        }
        scalar => Some(scalar),
    }
}

pub fn get_at<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| child(node, segment))
        .filter(|node| !node.is_null())
}

pub fn set_at(root: &mut Value, segments: &[&str], value: Value) {
    let value = prune(value);

    match segments.split_first() {
        None => *root = value.unwrap_or(Value::Null),
        Some(_) => set_in(root, segments, value),
    }
}

pub fn update_at(root: &mut Value, segments: &[&str], children: Map<String, Value>) {
    for (key, value) in children {
        let mut target = segments.to_vec();
        target.extend(key.split('/').filter(|segment| !segment.is_empty()));

        set_at(root, &target, value);
    }
}

/// Reads a counter node. Absent counts as zero.
pub fn counter_value(node: Option<&Value>, path: &str) -> Result<u64, StoreError> {
    match node {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| StoreError::NotACounter(path.to_string())),
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

fn set_in(node: &mut Value, segments: &[&str], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if value.is_none() && child(node, head).is_none() {
        return;
    }

    let map = as_object(node);

    if rest.is_empty() {
        match value {
            Some(value) => {
                map.insert(head.to_string(), value);
            }
            None => {
                map.remove(*head);
            }
        }
        return;
    }

    let next = map.entry(head.to_string()).or_insert(Value::Null);
    set_in(next, rest, value);

    if is_empty(next) {
        map.remove(*head);
    }
}

/// Arrays written into by index become objects keyed by index, scalars are replaced.
fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        let map = match node.take() {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null())
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            _ => Map::new(),
        };
        *node = Value::Object(map);
    }

    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}

fn is_empty(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.iter().all(Value::is_null),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_segments() {
        assert_eq!(segments("users/alice"), vec!["users", "alice"]);
        assert_eq!(segments("/decks//3/"), vec!["decks", "3"]);
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_prune_drops_empty() {
        let value = json!({
            "name": "alice",
            "decks": [],
            "flashcards": {},
            "gone": null,
            "nested": { "empty": {} },
        });
        assert_eq!(prune(value), Some(json!({ "name": "alice" })));
        assert_eq!(prune(json!({})), None);
        assert_eq!(prune(json!(0)), Some(json!(0)));
        assert_eq!(prune(json!("")), Some(json!("")));
    }

    #[test]
    fn test_set_and_get_nested() {
        let mut root = Value::Null;
        set_at(&mut root, &["decks", "1"], json!({ "owner": "alice", "card_counter": 0 }));
        set_at(&mut root, &["decks", "1", "flashcards", "0"], json!({ "title": "t" }));

        assert_eq!(get_at(&root, &["decks", "1", "owner"]), Some(&json!("alice")));
        assert_eq!(
            get_at(&root, &["decks", "1", "flashcards", "0", "title"]),
            Some(&json!("t"))
        );
        assert_eq!(get_at(&root, &["decks", "2"]), None);
    }

    #[test]
    fn test_delete_removes_empty_parents() {
        let mut root = Value::Null;
        set_at(&mut root, &["decks", "1", "flashcards", "0"], json!({ "title": "t" }));
        set_at(&mut root, &["decks", "1", "flashcards", "0"], Value::Null);

        assert_eq!(get_at(&root, &["decks"]), None);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut root = json!({ "users": { "alice": { "name": "Alice" } } });
        set_at(&mut root, &["users", "bob"], Value::Null);
        assert_eq!(root, json!({ "users": { "alice": { "name": "Alice" } } }));
    }

    #[test]
    fn test_get_into_array() {
        let root = json!({ "users": { "alice": { "decks": [4, 7] } } });
        assert_eq!(get_at(&root, &["users", "alice", "decks", "1"]), Some(&json!(7)));
        assert_eq!(get_at(&root, &["users", "alice", "decks", "2"]), None);
    }

    #[test]
    fn test_update_merges_children() {
        let mut root = json!({ "decks": { "1": { "name": "Old", "description": "d", "owner": "a" } } });
        let mut children = Map::new();
        children.insert("name".into(), json!("New"));
        children.insert("description".into(), Value::Null);

        update_at(&mut root, &["decks", "1"], children);
        assert_eq!(root, json!({ "decks": { "1": { "name": "New", "owner": "a" } } }));
    }

    #[test]
    fn test_counter_value() {
        assert_eq!(counter_value(None, "c").unwrap(), 0);
        assert_eq!(counter_value(Some(&json!(5)), "c").unwrap(), 5);
        assert!(counter_value(Some(&json!("five")), "c").is_err());
        assert!(counter_value(Some(&json!(-1)), "c").is_err());
    }
}
