//! Localization documents as a tagged tree.
//!
//! A document is an ordered mapping from key to [`Node`]. Strings and
//! string arrays are the translatable leaves; anything else JSON can hold
//! is carried through untouched as [`Node::Other`].

use serde_json::{Map, Value};

use crate::error::{KotobaError, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    entries: Vec<(String, Node)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    TextList(Vec<String>),
    Object(Document),
    /// Numbers, booleans, null and arrays that are not all strings
    Other(Value),
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a key, keeping the position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, node: Node) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = node,
            None => self.entries.push((key, node)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a JSON document. The top level must be an object.
    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(content)?;
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(serde::de::Error::custom(format!(
                "expected a JSON object at the top level, found {}",
                kind_name(&other)
            ))),
        }
    }

    /// Pretty-print with two-space indentation.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_value()).map_err(KotobaError::from)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, Node::from_value(v))).collect(),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, n)| (k.clone(), n.to_value()))
                .collect(),
        )
    }

    /// True when both trees have the same keys, nesting and array lengths.
    pub fn same_shape(&self, other: &Document) -> bool {
        self.len() == other.len()
            && self.iter().all(|(key, node)| match (node, other.get(key)) {
                (Node::Text(_), Some(Node::Text(_))) => true,
                (Node::TextList(a), Some(Node::TextList(b))) => a.len() == b.len(),
                (Node::Object(a), Some(Node::Object(b))) => a.same_shape(b),
                (Node::Other(a), Some(Node::Other(b))) => a == b,
                _ => false,
            })
    }
}

impl Node {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => Node::Text(s),
            Value::Object(map) => Node::Object(Document::from_map(map)),
            Value::Array(items) if items.iter().all(Value::is_string) => Node::TextList(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Node::Other(other),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Node::Text(s) => Value::String(s.clone()),
            Node::TextList(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Node::Object(doc) => doc.to_value(),
            Node::Other(v) => v.clone(),
        }
    }
}

impl FromIterator<(String, Node)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (key, node) in iter {
            doc.insert(key, node);
        }
        doc
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classifies_leaves() {
        let doc = Document::from_json(
            r#"{"a": "x", "b": ["y", "z"], "c": {"d": "w"}, "n": 3, "mixed": ["s", 1]}"#,
        )
        .unwrap();

        assert_eq!(doc.get("a"), Some(&Node::Text("x".to_string())));
        assert_eq!(doc.get("b"), Some(&Node::TextList(vec!["y".to_string(), "z".to_string()])));
        assert!(matches!(doc.get("c"), Some(Node::Object(_))));
        assert_eq!(doc.get("n"), Some(&Node::Other(serde_json::json!(3))));
        assert!(matches!(doc.get("mixed"), Some(Node::Other(_))));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let source = "{\n  \"zeta\": \"1\",\n  \"alpha\": {\n    \"m\": \"2\",\n    \"b\": \"3\"\n  },\n  \"list\": [\n    \"4\"\n  ]\n}";
        let doc = Document::from_json(source).unwrap();
        assert_eq!(doc.to_json_pretty().unwrap(), source);
    }

    #[test]
    fn test_top_level_must_be_object() {
        assert!(Document::from_json(r#"["a"]"#).is_err());
        assert!(Document::from_json("not json").is_err());
    }

    #[test]
    fn test_same_shape() {
        let a = Document::from_json(r#"{"a": "x", "l": ["1", "2"], "o": {"k": "v"}}"#).unwrap();
        let b = Document::from_json(r#"{"a": "y", "l": ["3", "4"], "o": {"k": "w"}}"#).unwrap();
        let c = Document::from_json(r#"{"a": "y", "l": ["3"], "o": {"k": "w"}}"#).unwrap();
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut doc = Document::new();
        doc.insert("a", Node::Text("1".to_string()));
        doc.insert("b", Node::Text("2".to_string()));
        doc.insert("a", Node::Text("3".to_string()));
        let keys: Vec<_> = doc.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&Node::Text("3".to_string())));
    }
}
