//! Runtime values for the interpreter core

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use super::container::OrderedMap;
use super::function::Function;
use super::record::Record;
use super::resource::Resource;

/// Type tag of a runtime value.
///
/// The declaration order is significant: it indexes the coercion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Void,
    Bool,
    Int,
    Float,
    Str,
    Array,
    Record,
    Function,
    Resource,
}

impl Tag {
    /// Number of tags (rows/columns of the coercion matrix)
    pub const COUNT: usize = 9;

    pub const ALL: [Tag; Tag::COUNT] = [
        Tag::Void,
        Tag::Bool,
        Tag::Int,
        Tag::Float,
        Tag::Str,
        Tag::Array,
        Tag::Record,
        Tag::Function,
        Tag::Resource,
    ];

    /// Human-readable name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Tag::Void => "void",
            Tag::Bool => "bool",
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::Str => "string",
            Tag::Array => "array",
            Tag::Record => "record",
            Tag::Function => "function",
            Tag::Resource => "resource",
        }
    }

    /// Lowercase prototype character for this tag
    pub fn code(self) -> char {
        match self {
            Tag::Void => 'v',
            Tag::Bool => 'b',
            Tag::Int => 'i',
            Tag::Float => 'f',
            Tag::Str => 's',
            Tag::Array => 'a',
            Tag::Record => 'r',
            Tag::Function => 'c',
            Tag::Resource => 'h',
        }
    }

    /// Parse a prototype character, ignoring case
    pub fn from_code(code: char) -> Option<Tag> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.code() == code.to_ascii_lowercase())
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value
///
/// Compound payloads sit behind `Rc` and are never mutated while shared:
/// every `*_mut` accessor goes through `Rc::make_mut`, so cloning a `Value`
/// behaves like a copy even though it only bumps a reference count.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Void,
    Bool(bool),
    /// Signed machine word
    Int(i64),
    Float(f64),
    /// Owned byte string
    Str(Rc<Vec<u8>>),
    Array(Rc<OrderedMap<Value>>),
    Record(Rc<Record>),
    /// Overload set
    Function(Rc<Function>),
    /// Opaque host handle
    Resource(Rc<Resource>),
}

impl Value {
    pub fn void() -> Self {
        Value::Void
    }

    pub fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    pub fn float(x: f64) -> Self {
        Value::Float(x)
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Str(Rc::new(bytes.into()))
    }

    pub fn array(items: OrderedMap<Value>) -> Self {
        Value::Array(Rc::new(items))
    }

    pub fn empty_array() -> Self {
        Value::array(OrderedMap::new())
    }

    pub fn record(record: Record) -> Self {
        Value::Record(Rc::new(record))
    }

    pub fn function(function: Function) -> Self {
        Value::Function(Rc::new(function))
    }

    pub fn resource(resource: Resource) -> Self {
        Value::Resource(Rc::new(resource))
    }

    /// Tag of this value
    pub fn tag(&self) -> Tag {
        match self {
            Value::Void => Tag::Void,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Float(_) => Tag::Float,
            Value::Str(_) => Tag::Str,
            Value::Array(_) => Tag::Array,
            Value::Record(_) => Tag::Record,
            Value::Function(_) => Tag::Function,
            Value::Resource(_) => Tag::Resource,
        }
    }

    /// Get type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Check if value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => items.live_len() > 0,
            Value::Record(_) | Value::Function(_) | Value::Resource(_) => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Str(s) => Some(s.as_slice()),
            _ => None,
        }
    }

    /// String payload decoded as UTF-8, replacing invalid sequences
    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        self.as_bytes().map(String::from_utf8_lossy)
    }

    /// Mutable access to a string payload, unsharing it first
    pub fn as_bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Value::Str(s) => Some(Rc::make_mut(s)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&OrderedMap<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Mutable access to an array payload, unsharing it first
    pub fn as_array_mut(&mut self) -> Option<&mut OrderedMap<Value>> {
        match self {
            Value::Array(items) => Some(Rc::make_mut(items)),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Mutable access to a record payload, unsharing it first
    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(record) => Some(Rc::make_mut(record)),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Rc<Resource>> {
        match self {
            Value::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    /// Deep, structure-preserving duplication.
    ///
    /// Strings, arrays and records get fresh allocations all the way down.
    /// Functions are immutable and resources wrap a single host handle, so
    /// both are shared.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Str(s) => Value::Str(Rc::new(s.as_ref().clone())),
            Value::Array(items) => Value::Array(Rc::new(items.map_values(Value::deep_copy))),
            Value::Record(record) => Value::Record(Rc::new(record.deep_copy())),
            other => other.clone(),
        }
    }

    /// JSON rendering for hosts and the CLI
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Map, Value as Json};

        match self {
            Value::Void => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(x) => serde_json::Number::from_f64(*x).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(String::from_utf8_lossy(s).into_owned()),
            Value::Array(items) => {
                if items.keys().next().is_some() {
                    let mut map = Map::new();
                    for (index, key, value) in items.iter() {
                        let key = match key {
                            Some(key) => key.to_string(),
                            None => positional_key(items, &map, index),
                        };
                        map.insert(key, value.to_json());
                    }
                    Json::Object(map)
                } else {
                    Json::Array(items.values().map(Value::to_json).collect())
                }
            }
            Value::Record(record) => {
                let mut map = Map::new();
                for (_, key, value) in record.fields().iter() {
                    if let Some(key) = key {
                        map.insert(key.to_string(), value.to_json());
                    }
                }
                Json::Object(map)
            }
            Value::Function(function) => Json::String(format!("<function {}>", function.name())),
            Value::Resource(resource) => Json::String(format!("<resource {}>", resource.kind())),
        }
    }

    /// Inverse of `to_json` for plain data.
    ///
    /// `null` is `void`; objects become keyed arrays in the map's key order.
    /// Integers outside `i64` fall back to `float`.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Void,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::string(s.as_str()),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::array(
                map.iter()
                    .map(|(key, value)| (key.as_str(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

/// Object key for an unkeyed slot: its index, prefixed with `#` until it
/// clashes with neither a real key nor an earlier entry
fn positional_key(items: &OrderedMap<Value>, map: &serde_json::Map<String, serde_json::Value>, index: usize) -> String {
    let mut key = index.to_string();
    while items.contains_key(&key) || map.contains_key(&key) {
        key.insert(0, '#');
    }
    key
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<OrderedMap<Value>> for Value {
    fn from(items: OrderedMap<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::record(record)
    }
}

/// Strict structural equality: tags must match, no coercion.
///
/// Script-level equality with coercion lives in `compare::equal`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Resource(a), Value::Resource(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, slot) in items.slots().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match slot {
                        Some((Some(key), value)) => {
                            write!(f, "{key:?} => ")?;
                            fmt_nested(f, value)?;
                        }
                        Some((None, value)) => fmt_nested(f, value)?,
                        None => write!(f, "_")?,
                    }
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                write!(f, "{} {{", record.class().unwrap_or("record"))?;
                for (i, (_, key, value)) in record.fields().iter().enumerate() {
                    write!(f, "{}", if i > 0 { ", " } else { " " })?;
                    write!(f, "{}: ", key.unwrap_or("_"))?;
                    fmt_nested(f, value)?;
                }
                if record.fields().live_len() > 0 {
                    write!(f, " ")?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => {
                write!(f, "<function {}", function.name())?;
                if function.len() > 1 {
                    write!(f, " x{}", function.len())?;
                }
                write!(f, ">")
            }
            Value::Resource(resource) => write!(f, "<resource {}#{}>", resource.kind(), resource.id()),
        }
    }
}

/// Strings inside containers are quoted so `["1"]` and `[1]` stay distinct
fn fmt_nested(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
        other => write!(f, "{other}"),
    }
}
