//! Ordered key/value header records.

use crate::error::{Error, Result};
use crate::value::Value;

/// An insertion-ordered list of header fields.
///
/// Header decoders produce one of these fully populated; writers walk it in
/// order so that a read/write cycle preserves the field sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderRecord {
    entries: Vec<(String, Value)>,
}

impl HeaderRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, replacing an existing value in place or appending.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(core::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Like [`get_f64`](Self::get_f64) but a missing field is an error.
    pub fn require_f64(&self, key: &'static str) -> Result<f64> {
        self.get_f64(key).ok_or(Error::MissingField(key))
    }

    /// Like [`get_i64`](Self::get_i64) but a missing field is an error.
    pub fn require_i64(&self, key: &'static str) -> Result<i64> {
        self.get_i64(key).ok_or(Error::MissingField(key))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for HeaderRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut rec = HeaderRecord::new();
        for (k, v) in iter {
            rec.insert(k, v);
        }
        rec
    }
}

impl<'a> IntoIterator for &'a HeaderRecord {
    type Item = (&'a str, &'a Value);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_kept() {
        let mut rec = HeaderRecord::new();
        rec.insert("nchans", Value::Int32(64));
        rec.insert("tsamp", Value::Float64(6.4e-5));
        rec.insert("source_name", Value::Str("B0329+54".into()));
        let keys: Vec<&str> = rec.keys().collect();
        assert_eq!(keys, ["nchans", "tsamp", "source_name"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut rec: HeaderRecord = [("a", Value::Int32(1)), ("b", Value::Int32(2))]
            .into_iter()
            .collect();
        assert_eq!(rec.insert("a", Value::Int32(3)), Some(Value::Int32(1)));
        let keys: Vec<&str> = rec.keys().collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(rec.get_i64("a"), Some(3));
    }

    #[test]
    fn remove_and_typed_getters() {
        let mut rec = HeaderRecord::new();
        rec.insert("nbits", Value::Int32(8));
        rec.insert("fch1", Value::Float64(1400.0));
        rec.insert("flag", Value::Bool(true));
        assert_eq!(rec.get_f64("nbits"), Some(8.0));
        assert_eq!(rec.get_str("nbits"), None);
        assert_eq!(rec.get_bool("flag"), Some(true));
        assert_eq!(rec.remove("fch1"), Some(Value::Float64(1400.0)));
        assert!(!rec.contains("fch1"));
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn require_reports_field_name() {
        let rec = HeaderRecord::new();
        assert!(matches!(rec.require_f64("tsamp"), Err(Error::MissingField("tsamp"))));
    }
}
