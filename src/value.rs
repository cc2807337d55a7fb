use chrono::NaiveDateTime;
use std::fmt;

/// Display text of any nested object value. Searching never looks inside objects.
pub const OBJECT_DISPLAY: &str = "[object Object]";

/// A single field value of a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Object(Vec<(String, Value)>),
}

/// Coarse type of a value, used to pick the comparison tier when sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Text,
    Numeric,
    Other,
}

/// Primitive a value reduces to for relational comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Primitive {
    Str(String),
    Num(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Text(_) => ValueKind::Text,
            Value::Number(_) => ValueKind::Numeric,
            Value::Bool(_) | Value::Date(_) | Value::Object(_) => ValueKind::Other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    // Dates compare by their epoch milliseconds, objects by their display text.
    pub(crate) fn to_primitive(&self) -> Primitive {
        match self {
            Value::Null => Primitive::Num(0.0),
            Value::Text(s) => Primitive::Str(s.clone()),
            Value::Number(n) => Primitive::Num(*n),
            Value::Bool(b) => Primitive::Num(if *b { 1.0 } else { 0.0 }),
            Value::Date(d) => Primitive::Num(d.and_utc().timestamp_millis() as f64),
            Value::Object(_) => Primitive::Str(OBJECT_DISPLAY.to_string()),
        }
    }
}

impl Primitive {
    pub(crate) fn to_number(&self) -> f64 {
        match self {
            Primitive::Num(n) => *n,
            Primitive::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Value::Object(_) => f.write_str(OBJECT_DISPLAY),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row of domain data: field names mapped to values in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Cloned value of `key`, or `Value::Null` when the record has no such field.
    pub fn value(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Accessor closure reading `key` from a record.
    pub fn field(key: impl Into<String>) -> impl Fn(&Record) -> Value + Send + Sync + 'static {
        let key = key.into();
        move |record: &Record| record.value(&key)
    }

    /// Union of the keys of all records, in first-seen order.
    pub fn union_keys(records: &[Record]) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.to_string());
                }
            }
        }
        keys
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn display_follows_default_string_conversion() {
        assert_eq!(Value::Number(1.0).to_string(), "1");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "");
        let nested = Value::Object(vec![("inn".into(), Value::from("7701"))]);
        assert_eq!(nested.to_string(), OBJECT_DISPLAY);

        let d = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(Value::Date(d).to_string(), "2024-03-01 09:30:00");
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut r = Record::new().with("id", 1).with("name", "Альфа");
        r.insert("id", 7);
        r.insert("city", "Москва");
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["id", "name", "city"]);
        assert_eq!(r.value("id"), Value::Number(7.0));
        assert_eq!(r.value("missing"), Value::Null);
    }

    #[test]
    fn union_keys_keeps_first_seen_order() {
        let records = vec![
            Record::new().with("b", 1).with("a", 2),
            Record::new().with("a", 3).with("c", 4),
        ];
        assert_eq!(Record::union_keys(&records), vec!["b", "a", "c"]);
    }

    #[test]
    fn option_converts_to_null() {
        let none: Option<&str> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(2.5)), Value::Number(2.5));
    }

    #[test]
    fn primitive_coercion() {
        assert_eq!(Value::from("12").to_primitive().to_number(), 12.0);
        assert!(Value::from("abc").to_primitive().to_number().is_nan());
        assert_eq!(Value::Bool(true).to_primitive().to_number(), 1.0);
    }
}
