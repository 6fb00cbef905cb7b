//! JSON to CEL values for predicate variables

use cel_interpreter::objects::{Key, Map, Value};
use serde_json::{Number, Value as Json};
use std::collections::HashMap;
use std::sync::Arc;

/// Convert a JSON document into the equivalent CEL value
///
/// Whole numbers become `Int` (or `UInt` above `i64::MAX`) so that integer
/// literals in expressions compare equal.
pub(super) fn to_cel(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(flag) => Value::Bool(*flag),
        Json::Number(number) => number_to_cel(number),
        Json::String(text) => Value::String(text.clone().into()),
        Json::Array(items) => Value::List(items.iter().map(to_cel).collect::<Vec<_>>().into()),
        Json::Object(fields) => {
            let entries: HashMap<Key, Value> = fields
                .iter()
                .map(|(name, field)| (Key::from(name.clone()), to_cel(field)))
                .collect();
            Value::Map(Map {
                map: Arc::new(entries),
            })
        }
    }
}

fn number_to_cel(number: &Number) -> Value {
    match (number.as_i64(), number.as_u64(), number.as_f64()) {
        (Some(signed), _, _) => Value::Int(signed),
        (None, Some(unsigned), _) => Value::UInt(unsigned),
        (None, None, Some(float)) => Value::Float(float),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers() {
        assert!(matches!(to_cel(&json!(-3)), Value::Int(-3)));
        assert!(matches!(to_cel(&json!(u64::MAX)), Value::UInt(u64::MAX)));
        assert!(matches!(to_cel(&json!(0.5)), Value::Float(f) if f == 0.5));
    }

    #[test]
    fn test_subject_shaped_document() {
        let value = to_cel(&json!({
            "name": "alice",
            "authenticated": true,
            "roles": ["admin", "editor"],
            "attributes": {}
        }));

        let Value::Map(map) = value else {
            panic!("expected a map");
        };
        assert_eq!(map.map.len(), 4);
        assert!(matches!(
            map.map.get(&Key::from("roles".to_string())),
            Some(Value::List(roles)) if roles.len() == 2
        ));
        assert!(matches!(
            map.map.get(&Key::from("authenticated".to_string())),
            Some(Value::Bool(true))
        ));
    }
}
