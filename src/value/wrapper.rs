use std::fmt;

use indexmap::IndexMap;

use crate::value::format_number;

/// Engine-neutral tagged value.
///
/// `Object` equality ignores key order; `Array` and `Map` keep their order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JsValueWrapper {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<JsValueWrapper>),
    Object(IndexMap<String, JsValueWrapper>),
    /// Arbitrary keys, insertion ordered.
    Map(Vec<(JsValueWrapper, JsValueWrapper)>),
    /// Binary payload with a type tag (e.g. an image format).
    ByteBuffer { bytes: Vec<u8>, kind: u32 },
}

impl JsValueWrapper {
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValueWrapper::Undefined | JsValueWrapper::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsValueWrapper::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValueWrapper::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValueWrapper::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsValueWrapper]> {
        match self {
            JsValueWrapper::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, JsValueWrapper>> {
        match self {
            JsValueWrapper::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up `key` when this is an object.
    pub fn get(&self, key: &str) -> Option<&JsValueWrapper> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl From<bool> for JsValueWrapper {
    fn from(b: bool) -> Self {
        JsValueWrapper::Boolean(b)
    }
}

impl From<f64> for JsValueWrapper {
    fn from(n: f64) -> Self {
        JsValueWrapper::Number(n)
    }
}

impl From<i32> for JsValueWrapper {
    fn from(n: i32) -> Self {
        JsValueWrapper::Number(f64::from(n))
    }
}

impl From<&str> for JsValueWrapper {
    fn from(s: &str) -> Self {
        JsValueWrapper::String(s.to_string())
    }
}

impl From<String> for JsValueWrapper {
    fn from(s: String) -> Self {
        JsValueWrapper::String(s)
    }
}

impl From<Vec<JsValueWrapper>> for JsValueWrapper {
    fn from(items: Vec<JsValueWrapper>) -> Self {
        JsValueWrapper::Array(items)
    }
}

impl From<IndexMap<String, JsValueWrapper>> for JsValueWrapper {
    fn from(map: IndexMap<String, JsValueWrapper>) -> Self {
        JsValueWrapper::Object(map)
    }
}

impl<K: Into<String>, V: Into<JsValueWrapper>> FromIterator<(K, V)> for JsValueWrapper {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        JsValueWrapper::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Console-style rendering: strings are quoted, integral numbers print without a fraction.
impl fmt::Display for JsValueWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValueWrapper::Undefined => f.write_str("undefined"),
            JsValueWrapper::Null => f.write_str("null"),
            JsValueWrapper::Boolean(b) => write!(f, "{b}"),
            JsValueWrapper::Number(n) => f.write_str(&format_number(*n)),
            JsValueWrapper::String(s) => write!(f, "{s:?}"),
            JsValueWrapper::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            JsValueWrapper::Object(map) if map.is_empty() => f.write_str("{}"),
            JsValueWrapper::Object(map) => {
                f.write_str("{ ")?;
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str(" }")
            }
            JsValueWrapper::Map(entries) => {
                write!(f, "Map({}) {{", entries.len())?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    f.write_str(if index > 0 { ", " } else { " " })?;
                    write!(f, "{key} => {value}")?;
                }
                f.write_str(if entries.is_empty() { "}" } else { " }" })
            }
            JsValueWrapper::ByteBuffer { bytes, kind } => write!(f, "ArrayBuffer {{ byteLength: {}, kind: {kind} }}", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_equality_ignores_key_order() {
        let a: JsValueWrapper = [("x", 1.0), ("y", 2.0)].into_iter().collect();
        let b: JsValueWrapper = [("y", 2.0), ("x", 1.0)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.get("y"), Some(&JsValueWrapper::Number(2.0)));
    }

    #[test]
    fn map_equality_keeps_order() {
        let a = JsValueWrapper::Map(vec![(1.0.into(), "a".into()), (2.0.into(), "b".into())]);
        let b = JsValueWrapper::Map(vec![(2.0.into(), "b".into()), (1.0.into(), "a".into())]);
        assert_ne!(a, b);
    }

    #[test]
    fn display_reads_like_a_console() {
        let value: JsValueWrapper = [
            ("n", JsValueWrapper::from(3)),
            ("s", "x".into()),
            ("list", JsValueWrapper::Array(vec![1.5.into(), JsValueWrapper::Null])),
        ]
        .into_iter()
        .collect();
        assert_eq!(value.to_string(), r#"{ n: 3, s: "x", list: [1.5, null] }"#);
        let map = JsValueWrapper::Map(vec![(1.into(), true.into())]);
        assert_eq!(map.to_string(), "Map(1) { 1 => true }");
        assert_eq!(JsValueWrapper::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    }
}
