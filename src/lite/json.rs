// JSON text <-> script values, on top of serde_json.

use std::rc::Rc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::lite::interp::{Interp, Throw};
use crate::lite::object::{ObjectKind, Property, Value, dense_elements, identity};

/// Largest integer magnitude written without a fractional part.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Parses JSON text into fresh script values. The error is the parser's message.
pub fn parse(interp: &Interp, text: &str) -> Result<Value, String> {
    let parsed: serde_json::Value = serde_json::from_str(text).map_err(|err| err.to_string())?;
    Ok(from_json(interp, parsed))
}

pub fn from_json(interp: &Interp, value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(&s),
        serde_json::Value::Array(items) => interp.new_array(items.into_iter().map(|item| from_json(interp, item)).collect()),
        serde_json::Value::Object(members) => {
            let obj = interp.new_object();
            for (key, member) in members {
                let member = from_json(interp, member);
                interp.define_own(&obj, &key, Property::data(member));
            }
            Value::Object(obj)
        }
    }
}

/// `JSON.stringify`. `None` when the value has no JSON form (`undefined`, functions).
pub fn stringify(interp: &Interp, value: &Value, indent: Option<&str>) -> Result<Option<String>, Throw> {
    let mut path = Vec::new();
    let Some(json) = to_json(interp, value, &mut path)? else {
        return Ok(None);
    };
    let text = match indent {
        None => serde_json::to_string(&json),
        Some(indent) => {
            let mut out = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
            json.serialize(&mut serializer).map(|()| String::from_utf8_lossy(&out).into_owned())
        }
    };
    text.map(Some).map_err(|err| interp.type_error(&err.to_string()))
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn to_json(interp: &Interp, value: &Value, path: &mut Vec<usize>) -> Result<Option<serde_json::Value>, Throw> {
    let obj = match value {
        Value::Undefined => return Ok(None),
        Value::Null => return Ok(Some(serde_json::Value::Null)),
        Value::Boolean(b) => return Ok(Some(serde_json::Value::Bool(*b))),
        Value::Number(n) => return Ok(Some(number_to_json(*n))),
        Value::String(s) => return Ok(Some(serde_json::Value::String(s.to_string()))),
        Value::Object(_) if value.is_callable() => return Ok(None),
        Value::Object(obj) => Rc::clone(obj),
    };
    let id = identity(&obj);
    if path.contains(&id) {
        return Err(interp.type_error("Converting circular structure to JSON"));
    }
    path.push(id);
    let result = object_to_json(interp, value, &obj, path);
    path.pop();
    result.map(Some)
}

fn object_to_json(
    interp: &Interp,
    value: &Value,
    obj: &crate::lite::object::ObjectRef,
    path: &mut Vec<usize>,
) -> Result<serde_json::Value, Throw> {
    let elements = match &obj.borrow().kind {
        ObjectKind::Array(elements) => Some(dense_elements(elements)),
        ObjectKind::Map(_) | ObjectKind::ArrayBuffer { .. } => return Ok(serde_json::Value::Object(serde_json::Map::new())),
        _ => None,
    };
    if let Some(elements) = elements {
        let mut items = Vec::with_capacity(elements.len());
        for element in &elements {
            items.push(to_json(interp, element, path)?.unwrap_or(serde_json::Value::Null));
        }
        return Ok(serde_json::Value::Array(items));
    }
    let mut members = serde_json::Map::new();
    for key in interp.own_enumerable_keys(obj) {
        let member = interp.get(value, &key)?;
        if let Some(member) = to_json(interp, &member, path)? {
            members.insert(key, member);
        }
    }
    Ok(serde_json::Value::Object(members))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;

    fn interp() -> Interp {
        Interp::new(64, 1024 * 1024, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn integers_print_without_fraction() {
        assert_eq!(number_to_json(3.0), serde_json::json!(3));
        assert_eq!(number_to_json(0.5), serde_json::json!(0.5));
        assert_eq!(number_to_json(f64::NAN), serde_json::Value::Null);
    }

    #[test]
    fn parse_then_stringify_keeps_member_order() {
        let interp = interp();
        let value = parse(&interp, r#"{"b":1,"a":[true,null,"x"]}"#).unwrap();
        let text = stringify(&interp, &value, None).unwrap();
        assert_eq!(text.as_deref(), Some(r#"{"b":1,"a":[true,null,"x"]}"#));
    }

    #[test]
    fn undefined_members_are_skipped() {
        let interp = interp();
        let obj = interp.new_object();
        interp.define_own(&obj, "gone", Property::data(Value::Undefined));
        interp.define_own(&obj, "kept", Property::data(Value::Number(1.0)));
        let text = stringify(&interp, &Value::Object(obj), None).unwrap();
        assert_eq!(text.as_deref(), Some(r#"{"kept":1}"#));
        assert_eq!(stringify(&interp, &Value::Undefined, None).unwrap(), None);
    }

    #[test]
    fn pretty_printing_uses_indent() {
        let interp = interp();
        let value = interp.new_array(vec![Value::Number(1.0)]);
        let text = stringify(&interp, &value, Some("  ")).unwrap();
        assert_eq!(text.as_deref(), Some("[\n  1\n]"));
    }

    #[test]
    fn malformed_text_is_rejected() {
        let interp = interp();
        assert!(parse(&interp, "{bad").is_err());
    }
}
