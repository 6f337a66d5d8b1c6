//! The document path grammar: parses a dot-separated path string into an
//! ordered list of [`Directive`]s and applies them to a [`Value`] tree.

use crate::error::{DocumentError, Result};
use crate::value::Value;

/// A single step of path navigation.
///
/// Every directive but the last in a list is purely navigational (it
/// descends into, auto-creating as needed, the next container). The last
/// directive additionally determines the terminal operation: `MapKey`,
/// `ListIndex`, and `ListLastIndex` perform a **set** (or delete, if the
/// supplied value is absent); their `*Add` counterparts perform a
/// **numeric add**; `ListInsert` always **appends**.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Descend/create into a map by key, terminal operation: set.
    MapKey(String),
    /// Descend/create into a map by key, terminal operation: numeric add.
    MapKeyAdd(String),
    /// Descend/create into a list at an index, terminal operation: set.
    ListIndex(usize),
    /// Descend/create into a list at an index, terminal operation: add.
    ListIndexAdd(usize),
    /// Descend into the last element of a list (or index 0 of an empty
    /// one), terminal operation: set.
    ListLastIndex,
    /// Same navigation as `ListLastIndex`, terminal operation: add.
    ListLastIndexAdd,
    /// Append a new element to the current list. Only ever the terminal
    /// directive in a path (produced by a trailing unescaped `.`).
    ListInsert,
}

impl Directive {
    fn is_map_keyed(&self) -> bool {
        matches!(self, Directive::MapKey(_) | Directive::MapKeyAdd(_))
    }

    fn to_add_variant(&self) -> Directive {
        match self {
            Directive::MapKey(name) => Directive::MapKeyAdd(name.clone()),
            Directive::ListIndex(i) => Directive::ListIndexAdd(*i),
            Directive::ListLastIndex => Directive::ListLastIndexAdd,
            other => other.clone(),
        }
    }
}

/// Parse a path string into an ordered list of directives.
///
/// An empty path parses to an empty directive list, denoting the whole
/// document.
pub fn parse(path: &str) -> Result<Vec<Directive>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = path.chars().collect();
    let len = chars.len();
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut trailing_op: Option<char> = None;
    let mut idx = 0;

    while idx < len {
        let c = chars[idx];
        if c == '\\' {
            if idx + 1 >= len {
                return Err(DocumentError::InvalidPath {
                    path: path.to_string(),
                    reason: "path cannot end in a bare escape character".to_string(),
                });
            }
            current.push(chars[idx + 1]);
            idx += 2;
            continue;
        }
        if c == '.' && idx == len - 1 {
            trailing_op = Some('.');
            idx += 1;
            continue;
        }
        if c == '+' && idx == len - 1 {
            trailing_op = Some('+');
            idx += 1;
            continue;
        }
        if c == '.' {
            segments.push(std::mem::take(&mut current));
            idx += 1;
            continue;
        }
        current.push(c);
        idx += 1;
    }
    segments.push(current);

    if segments.iter().any(|s| s.is_empty()) {
        return Err(DocumentError::InvalidPath {
            path: path.to_string(),
            reason: "a path component cannot be empty (a bare operator or \
                     doubled separator is invalid)"
                .to_string(),
        });
    }

    let mut directives = Vec::with_capacity(segments.len());
    for segment in &segments {
        directives.push(component_directive(path, segment)?);
    }

    match trailing_op {
        Some('.') => directives.push(Directive::ListInsert),
        Some('+') => {
            let last = directives
                .last_mut()
                .expect("at least one directive exists when an operator is present");
            *last = last.to_add_variant();
        }
        _ => {}
    }

    Ok(directives)
}

fn component_directive(full_path: &str, component: &str) -> Result<Directive> {
    match component.parse::<i64>() {
        Ok(-1) => Ok(Directive::ListLastIndex),
        Ok(i) if i >= 0 => Ok(Directive::ListIndex(i as usize)),
        Ok(_) => Err(DocumentError::InvalidPath {
            path: full_path.to_string(),
            reason: format!("negative list index {:?} is not -1", component),
        }),
        Err(_) => Ok(Directive::MapKey(component.to_string())),
    }
}

/// Apply a parsed directive list to `root`, performing the set/add/insert
/// operation the last directive dictates. `value` of `None` means delete
/// (for set-kind terminal directives) or no-op (for add/insert-kind ones).
pub fn apply(root: &mut Value, directives: &[Directive], value: Option<Value>) -> Result<()> {
    if directives.is_empty() {
        return match value {
            Some(Value::Map(map)) => {
                *root = Value::Map(map);
                Ok(())
            }
            Some(_) => Err(DocumentError::InvalidPath {
                path: String::new(),
                reason: "the empty path only accepts a map value".to_string(),
            }),
            None => Err(DocumentError::InvalidPath {
                path: String::new(),
                reason: "the empty path cannot be deleted".to_string(),
            }),
        };
    }

    navigate(root, directives, value)
}

fn navigate(current: &mut Value, directives: &[Directive], value: Option<Value>) -> Result<()> {
    let (directive, rest) = directives
        .split_first()
        .expect("navigate is never called with an empty directive list");

    ensure_container(current, directive)?;

    if rest.is_empty() {
        apply_terminal(current, directive, value)
    } else {
        let child = descend(current, directive)?;
        navigate(child, rest, value)
    }
}

/// If `current` hasn't been created yet (`Null`), materialize the empty
/// container `directive` needs. If it already exists but is the wrong
/// shape, that is a path/data mismatch.
fn ensure_container(current: &mut Value, directive: &Directive) -> Result<()> {
    let wants_map = directive.is_map_keyed();

    if matches!(current, Value::Null) {
        *current = if wants_map {
            Value::empty_map()
        } else {
            Value::empty_list()
        };
        return Ok(());
    }

    let shape_matches = if wants_map {
        matches!(current, Value::Map(_))
    } else {
        matches!(current, Value::List(_))
    };

    if !shape_matches {
        return Err(DocumentError::InvalidPath {
            path: String::new(),
            reason: format!(
                "expected a {} at this position, found a {}",
                if wants_map { "map" } else { "list" },
                current.kind_name()
            ),
        });
    }

    Ok(())
}

fn descend<'a>(current: &'a mut Value, directive: &Directive) -> Result<&'a mut Value> {
    match directive {
        Directive::MapKey(name) | Directive::MapKeyAdd(name) => {
            let map = current.as_map_mut().expect("ensured map above");
            Ok(map.entry(name.clone()).or_insert(Value::Null))
        }
        Directive::ListIndex(i) | Directive::ListIndexAdd(i) => {
            let list = current.as_list_mut().expect("ensured list above");
            index_slot(list, *i)
        }
        Directive::ListLastIndex | Directive::ListLastIndexAdd => {
            let list = current.as_list_mut().expect("ensured list above");
            if list.is_empty() {
                list.push(Value::Null);
            }
            Ok(list.last_mut().expect("just ensured non-empty"))
        }
        Directive::ListInsert => {
            let list = current.as_list_mut().expect("ensured list above");
            list.push(Value::Null);
            Ok(list.last_mut().expect("just pushed"))
        }
    }
}

fn index_slot(list: &mut Vec<Value>, i: usize) -> Result<&mut Value> {
    use std::cmp::Ordering;
    match i.cmp(&list.len()) {
        Ordering::Less => Ok(&mut list[i]),
        Ordering::Equal => {
            list.push(Value::Null);
            Ok(list.last_mut().expect("just pushed"))
        }
        Ordering::Greater => Err(DocumentError::InvalidPath {
            path: String::new(),
            reason: format!(
                "list index {} is out of bounds for a list of length {}",
                i,
                list.len()
            ),
        }),
    }
}

fn apply_terminal(current: &mut Value, directive: &Directive, value: Option<Value>) -> Result<()> {
    match directive {
        Directive::MapKey(name) => {
            let map = current.as_map_mut().expect("ensured map above");
            match value {
                Some(v) => {
                    map.insert(name.clone(), v);
                }
                None => {
                    map.remove(name);
                }
            }
            Ok(())
        }
        Directive::MapKeyAdd(name) => {
            if let Some(v) = value {
                let map = current.as_map_mut().expect("ensured map above");
                match map.get_mut(name) {
                    Some(existing) => existing.add_numeric(v),
                    None => {
                        map.insert(name.clone(), v);
                    }
                }
            }
            Ok(())
        }
        Directive::ListIndex(i) => set_list_index(current, *i, value),
        Directive::ListIndexAdd(i) => add_list_index(current, *i, value),
        Directive::ListLastIndex => {
            let list = current.as_list_mut().expect("ensured list above");
            let i = if list.is_empty() { 0 } else { list.len() - 1 };
            set_list_index(current, i, value)
        }
        Directive::ListLastIndexAdd => {
            let list = current.as_list_mut().expect("ensured list above");
            let i = if list.is_empty() { 0 } else { list.len() - 1 };
            add_list_index(current, i, value)
        }
        Directive::ListInsert => {
            if let Some(v) = value {
                let list = current.as_list_mut().expect("ensured list above");
                list.push(v);
            }
            Ok(())
        }
    }
}

fn set_list_index(current: &mut Value, i: usize, value: Option<Value>) -> Result<()> {
    let list = current.as_list_mut().expect("ensured list above");
    match value {
        Some(v) => match i.cmp(&list.len()) {
            std::cmp::Ordering::Less => {
                list[i] = v;
                Ok(())
            }
            std::cmp::Ordering::Equal => {
                list.push(v);
                Ok(())
            }
            std::cmp::Ordering::Greater => Err(DocumentError::InvalidPath {
                path: String::new(),
                reason: format!(
                    "list index {} is out of bounds for a list of length {}",
                    i,
                    list.len()
                ),
            }),
        },
        None => {
            if i < list.len() {
                list.remove(i);
            }
            Ok(())
        }
    }
}

fn add_list_index(current: &mut Value, i: usize, value: Option<Value>) -> Result<()> {
    let v = match value {
        Some(v) => v,
        None => return Ok(()),
    };
    let list = current.as_list_mut().expect("ensured list above");
    match i.cmp(&list.len()) {
        std::cmp::Ordering::Less => {
            list[i].add_numeric(v);
            Ok(())
        }
        std::cmp::Ordering::Equal => {
            list.push(v);
            Ok(())
        }
        std::cmp::Ordering::Greater => Err(DocumentError::InvalidPath {
            path: String::new(),
            reason: format!(
                "list index {} is out of bounds for a list of length {}",
                i,
                list.len()
            ),
        }),
    }
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

/// Read-only counterpart to [`apply`]: resolve `directives` against `root`
/// without mutating anything. Returns `None` if any step in the path
/// doesn't exist or the container shape doesn't match (e.g. a map key
/// directive against a list).
pub fn get<'a>(root: &'a Value, directives: &[Directive]) -> Option<&'a Value> {
    let mut current = root;
    for directive in directives {
        current = match (current, directive) {
            (Value::Map(m), Directive::MapKey(name)) | (Value::Map(m), Directive::MapKeyAdd(name)) => {
                m.get(name)?
            }
            (Value::List(l), Directive::ListIndex(i)) | (Value::List(l), Directive::ListIndexAdd(i)) => {
                l.get(*i)?
            }
            (Value::List(l), Directive::ListLastIndex) | (Value::List(l), Directive::ListLastIndexAdd) => {
                l.last()?
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    fn assert_json_eq(v: &Value, json: &str) {
        assert_eq!(serde_json::to_value(v).unwrap(), serde_json::from_str::<serde_json::Value>(json).unwrap());
    }

    #[test]
    fn parses_plain_map_key_chain() {
        let directives = parse("a.b.c").unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::MapKey("a".into()),
                Directive::MapKey("b".into()),
                Directive::MapKey("c".into()),
            ]
        );
    }

    #[test]
    fn parses_negative_one_as_last_index() {
        let directives = parse("x.-1").unwrap();
        assert_eq!(
            directives,
            vec![Directive::MapKey("x".into()), Directive::ListLastIndex]
        );
    }

    #[test]
    fn trailing_dot_appends_insert_directive() {
        let directives = parse("x.").unwrap();
        assert_eq!(
            directives,
            vec![Directive::MapKey("x".into()), Directive::ListInsert]
        );
    }

    #[test]
    fn trailing_plus_converts_last_directive_to_add() {
        let directives = parse("s.events.handled+").unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::MapKey("s".into()),
                Directive::MapKey("events".into()),
                Directive::MapKeyAdd("handled".into()),
            ]
        );
    }

    #[test]
    fn escaped_dot_is_literal() {
        let directives = parse("a\\.b").unwrap();
        assert_eq!(directives, vec![Directive::MapKey("a.b".into())]);
    }

    #[test]
    fn bare_escape_at_end_is_invalid() {
        assert!(parse("a\\").is_err());
    }

    #[test]
    fn doubled_separator_is_invalid() {
        assert!(parse("a..b").is_err());
    }

    #[test]
    fn lone_operator_is_invalid() {
        assert!(parse(".").is_err());
        assert!(parse("+").is_err());
    }

    #[test]
    fn scenario_nested_map_creation() {
        let mut root = Value::empty_map();
        let directives = parse("a.b.c").unwrap();
        apply(&mut root, &directives, Some(Value::Int(1))).unwrap();
        assert_json_eq(&root, r#"{"a":{"b":{"c":1}}}"#);
    }

    #[test]
    fn scenario_last_index_then_append() {
        let mut root = doc(r#"{"x":[10,20]}"#);
        apply(&mut root, &parse("x.-1").unwrap(), Some(Value::Int(99))).unwrap();
        assert_json_eq(&root, r#"{"x":[10,99]}"#);

        apply(&mut root, &parse("x.").unwrap(), Some(Value::Int(30))).unwrap();
        assert_json_eq(&root, r#"{"x":[10,99,30]}"#);
    }

    #[test]
    fn scenario_numeric_add() {
        let mut root = doc(r#"{"s":{"events":{"handled":2}}}"#);
        apply(
            &mut root,
            &parse("s.events.handled+").unwrap(),
            Some(Value::Int(3)),
        )
        .unwrap();
        assert_json_eq(&root, r#"{"s":{"events":{"handled":5}}}"#);
    }

    #[test]
    fn scenario_delete_existing_key() {
        let mut root = doc(r#"{"m":{"k":1}}"#);
        apply(&mut root, &parse("m.k").unwrap(), None).unwrap();
        assert_json_eq(&root, r#"{"m":{}}"#);
    }

    #[test]
    fn delete_missing_key_is_noop() {
        let mut root = doc(r#"{"m":{}}"#);
        apply(&mut root, &parse("m.missing").unwrap(), None).unwrap();
        assert_json_eq(&root, r#"{"m":{}}"#);
    }

    #[test]
    fn last_index_on_empty_list_is_index_zero() {
        let mut root = doc(r#"{"x":[]}"#);
        apply(&mut root, &parse("x.-1").unwrap(), Some(Value::Int(1))).unwrap();
        assert_json_eq(&root, r#"{"x":[1]}"#);
    }

    #[test]
    fn set_at_len_appends_and_beyond_errors() {
        let mut root = doc(r#"{"x":[1,2]}"#);
        apply(&mut root, &parse("x.2").unwrap(), Some(Value::Int(3))).unwrap();
        assert_json_eq(&root, r#"{"x":[1,2,3]}"#);

        let err = apply(&mut root, &parse("x.10").unwrap(), Some(Value::Int(9)));
        assert!(err.is_err());
    }

    #[test]
    fn fresh_list_rejects_nonzero_index() {
        let mut root = Value::empty_map();
        let err = apply(&mut root, &parse("x.5").unwrap(), Some(Value::Int(1)));
        assert!(err.is_err());
    }

    #[test]
    fn fresh_list_accepts_index_zero_or_insert() {
        let mut root = Value::empty_map();
        apply(&mut root, &parse("x.0").unwrap(), Some(Value::Int(1))).unwrap();
        assert_json_eq(&root, r#"{"x":[1]}"#);

        let mut root2 = Value::empty_map();
        apply(&mut root2, &parse("y.").unwrap(), Some(Value::Int(2))).unwrap();
        assert_json_eq(&root2, r#"{"y":[2]}"#);
    }

    #[test]
    fn add_on_missing_numeric_slot_inserts_addend() {
        let mut root = Value::empty_map();
        apply(
            &mut root,
            &parse("counters.hits+").unwrap(),
            Some(Value::Int(4)),
        )
        .unwrap();
        assert_json_eq(&root, r#"{"counters":{"hits":4}}"#);
    }

    #[test]
    fn empty_path_replaces_root_map() {
        let mut root = doc(r#"{"old":1}"#);
        apply(&mut root, &[], Some(doc(r#"{"new":2}"#))).unwrap();
        assert_json_eq(&root, r#"{"new":2}"#);
    }

    #[test]
    fn empty_path_rejects_non_map_value() {
        let mut root = Value::empty_map();
        let err = apply(&mut root, &[], Some(Value::Int(1)));
        assert!(err.is_err());
    }

    #[test]
    fn get_resolves_nested_path() {
        let root = doc(r#"{"user":{"name":"alice","tags":["a","b"]}}"#);
        let directives = parse("user.name").unwrap();
        assert_eq!(get(&root, &directives), Some(&Value::String("alice".into())));

        let directives = parse("user.tags.-1").unwrap();
        assert_eq!(get(&root, &directives), Some(&Value::String("b".into())));
    }

    #[test]
    fn get_returns_none_for_missing_or_mismatched_shape() {
        let root = doc(r#"{"user":{"name":"alice"}}"#);
        assert_eq!(get(&root, &parse("user.age").unwrap()), None);
        assert_eq!(get(&root, &parse("user.name.0").unwrap()), None);
    }
}
