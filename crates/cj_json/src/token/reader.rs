use alloc::string::String;
use alloc::vec::Vec;

use super::{JsonRead, JsonToken, push_index_path, push_property_path};
use crate::JsonError;

struct Event {
    token: JsonToken,
    depth: usize,
    path: String,
}

/// Reads the tokens of a `serde_json` document.
///
/// The document is flattened into tokens up front, so reading never fails.
///
/// ```
/// use cj_json::token::{JsonRead, JsonToken, TokenReader};
///
/// let doc = serde_json::json!({"a": [1]});
/// let mut reader = TokenReader::new(&doc);
/// let mut kinds = Vec::new();
/// while reader.read().unwrap() {
///     kinds.push((reader.token().kind_name(), reader.depth()));
/// }
/// assert_eq!(kinds, [
///     ("StartObject", 0),
///     ("PropertyName", 1),
///     ("StartArray", 1),
///     ("Integer", 2),
///     ("EndArray", 1),
///     ("EndObject", 0),
/// ]);
/// ```
pub struct TokenReader {
    events: Vec<Event>,
    /// Index of the current event plus one; zero before the first read.
    cursor: usize,
    none: JsonToken,
}

impl TokenReader {
    pub fn new(document: &serde_json::Value) -> Self {
        Self::nested(document, 0, String::new())
    }

    /// A reader over a fragment that sits at `depth` and `path` of an
    /// enclosing document.
    pub fn nested(document: &serde_json::Value, depth: usize, path: String) -> Self {
        let mut events = Vec::new();
        flatten(document, depth, path, &mut events);
        Self {
            events,
            cursor: 0,
            none: JsonToken::None,
        }
    }

    #[inline]
    fn current(&self) -> Option<&Event> {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.events.get(index))
    }
}

fn flatten(value: &serde_json::Value, depth: usize, path: String, out: &mut Vec<Event>) {
    match value {
        serde_json::Value::Object(map) => {
            out.push(Event {
                token: JsonToken::StartObject,
                depth,
                path: path.clone(),
            });
            for (name, child) in map {
                let mut child_path = path.clone();
                push_property_path(&mut child_path, name);
                out.push(Event {
                    token: JsonToken::PropertyName(name.clone()),
                    depth: depth + 1,
                    path: child_path.clone(),
                });
                flatten(child, depth + 1, child_path, out);
            }
            out.push(Event {
                token: JsonToken::EndObject,
                depth,
                path,
            });
        }
        serde_json::Value::Array(items) => {
            out.push(Event {
                token: JsonToken::StartArray,
                depth,
                path: path.clone(),
            });
            for (index, child) in items.iter().enumerate() {
                let mut child_path = path.clone();
                push_index_path(&mut child_path, index);
                flatten(child, depth + 1, child_path, out);
            }
            out.push(Event {
                token: JsonToken::EndArray,
                depth,
                path,
            });
        }
        scalar => out.push(Event {
            token: scalar_token(scalar),
            depth,
            path,
        }),
    }
}

fn scalar_token(value: &serde_json::Value) -> JsonToken {
    match value {
        serde_json::Value::Null => JsonToken::Null,
        serde_json::Value::Bool(b) => JsonToken::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => JsonToken::Integer(i),
            None => JsonToken::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => JsonToken::String(s.clone()),
        // containers are flattened by the caller
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => JsonToken::Raw(value.clone()),
    }
}

impl JsonRead for TokenReader {
    fn read(&mut self) -> Result<bool, JsonError> {
        if self.cursor < self.events.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            self.cursor = self.events.len() + 1;
            Ok(false)
        }
    }

    #[inline]
    fn token(&self) -> &JsonToken {
        self.current().map_or(&self.none, |e| &e.token)
    }

    #[inline]
    fn depth(&self) -> usize {
        self.current().map_or(0, |e| e.depth)
    }

    fn path(&self) -> String {
        match self.current() {
            Some(event) => event.path.clone(),
            None => self
                .events
                .first()
                .map(|e| e.path.clone())
                .unwrap_or_default(),
        }
    }

    #[inline]
    fn position(&self) -> usize {
        self.cursor
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::TokenReader;
    use crate::token::{JsonRead, JsonToken};

    #[test]
    fn paths_follow_nesting() {
        let doc = json!({"items": [{"name": "a"}]});
        let mut reader = TokenReader::new(&doc);
        let mut paths = Vec::new();
        while reader.read().unwrap() {
            if let JsonToken::String(_) = reader.token() {
                paths.push(reader.path());
            }
        }
        assert_eq!(paths, ["items[0].name"]);
        assert_eq!(reader.token(), &JsonToken::None);
    }

    #[test]
    fn large_unsigned_becomes_float() {
        let doc = json!(u64::MAX);
        let mut reader = TokenReader::new(&doc);
        assert!(reader.read().unwrap());
        assert!(matches!(reader.token(), JsonToken::Float(_)));
        assert!(!reader.read().unwrap());
    }

    #[test]
    fn nested_reader_keeps_outer_path() {
        let doc = json!({"b": 1});
        let mut reader = TokenReader::nested(&doc, 2, "a".into());
        reader.read().unwrap();
        assert_eq!(reader.depth(), 2);
        reader.read().unwrap();
        assert_eq!(reader.path(), "a.b");
        assert_eq!(reader.depth(), 3);
    }
}
