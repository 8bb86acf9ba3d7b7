// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::number::Number;

use core::fmt;
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;

/// A live object-graph value: the runtime representation mapping procedures
/// read from and write into.
///
/// Arrays and objects are reference counted with interior mutability so that
/// cyclic and shared graphs are representable and every container has an
/// identity (its pointer). `Undefined` indicates a failed probe and never
/// appears in mapped output.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<Object>),

    // Indicates that a lookup produced nothing.
    Undefined,
}

/// A mutable record value tagged with the name of its registered shape.
///
/// Untyped dictionaries use the same representation; their shape is
/// registered with dictionary kind and their fields are the string keys.
#[derive(Debug)]
pub struct Object {
    shape: RefCell<Rc<str>>,
    fields: RefCell<BTreeMap<Rc<str>, Value>>,
}

impl Object {
    pub fn new(shape: &str) -> Object {
        Object {
            shape: RefCell::new(shape.into()),
            fields: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn shape(&self) -> Rc<str> {
        self.shape.borrow().clone()
    }

    pub fn set_shape(&self, shape: &str) {
        *self.shape.borrow_mut() = shape.into();
    }

    pub fn fields(&self) -> Ref<'_, BTreeMap<Rc<str>, Value>> {
        self.fields.borrow()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.into(), value);
    }

    /// Field keys, in sorted order. Used for dictionary key probing.
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.fields.borrow().keys().cloned().collect()
    }
}

impl Value {
    pub fn new_object(shape: &str) -> Value {
        Value::Object(Rc::new(Object::new(shape)))
    }

    pub fn new_array() -> Value {
        Value::Array(Rc::new(RefCell::new(vec![])))
    }

    pub fn object_from<I>(shape: &str, fields: I) -> Value
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let obj = Object::new(shape);
        for (k, v) in fields {
            obj.set(k, v);
        }
        Value::Object(Rc::new(obj))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Null-or-undefined: the condition null guards test for.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Pointer identity of a container value. Scalars have no identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(Rc::as_ptr(a) as usize),
            Value::Object(o) => Some(Rc::as_ptr(o) as *const u8 as usize),
            _ => None,
        }
    }

    /// The shape tag of an object value, if it has a non-empty one.
    pub fn shape_name(&self) -> Option<Rc<str>> {
        match self {
            Value::Object(o) => {
                let shape = o.shape();
                if shape.is_empty() {
                    None
                } else {
                    Some(shape)
                }
            }
            _ => None,
        }
    }

    /// Retag an object value in place, returning it. Used to stamp a
    /// registered shape name onto an ingested payload.
    pub fn tagged(self, shape: &str) -> Value {
        if let Value::Object(o) = &self {
            o.set_shape(shape);
        }
        self
    }

    /// Read a member, returning `Null` for a missing field and `Undefined`
    /// when the receiver is not an object.
    pub fn get_member(&self, name: &str) -> Value {
        match self {
            Value::Object(o) => o.get(name).unwrap_or(Value::Null),
            _ => Value::Undefined,
        }
    }

    pub fn set_member(&self, name: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(o) => {
                o.set(name, value);
                Ok(())
            }
            _ => bail!("cannot set member '{name}' on a non-object value"),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(anyhow!("not a bool")),
        }
    }

    pub fn as_number(&self) -> Result<Number> {
        match self {
            Value::Number(n) => Ok(*n),
            _ => Err(anyhow!("not a number")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.as_number()?.as_i64()
    }

    pub fn as_str(&self) -> Result<Rc<str>> {
        match self {
            Value::String(s) => Ok(s.clone()),
            _ => Err(anyhow!("not a string")),
        }
    }

    pub fn as_object(&self) -> Result<Rc<Object>> {
        match self {
            Value::Object(o) => Ok(o.clone()),
            _ => Err(anyhow!("not an object")),
        }
    }

    /// Clone out the elements of an array value.
    pub fn elements(&self) -> Result<Vec<Value>> {
        match self {
            Value::Array(a) => Ok(a.borrow().clone()),
            _ => Err(anyhow!("not an array")),
        }
    }

    pub fn len(&self) -> Result<usize> {
        match self {
            Value::Array(a) => Ok(a.borrow().len()),
            Value::Object(o) => Ok(o.fields().len()),
            _ => Err(anyhow!("value has no length")),
        }
    }

    pub fn index(&self, i: usize) -> Value {
        match self {
            Value::Array(a) => a.borrow().get(i).cloned().unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    pub fn push(&self, v: Value) -> Result<()> {
        match self {
            Value::Array(a) => {
                a.borrow_mut().push(v);
                Ok(())
            }
            _ => bail!("cannot push onto a non-array value"),
        }
    }

    pub fn set_index(&self, i: usize, v: Value) -> Result<()> {
        match self {
            Value::Array(a) => {
                let mut items = a.borrow_mut();
                if i >= items.len() {
                    bail!("index {i} out of bounds");
                }
                items[i] = v;
                Ok(())
            }
            _ => bail!("cannot index-assign a non-array value"),
        }
    }

    pub fn truncate(&self, len: usize) -> Result<()> {
        match self {
            Value::Array(a) => {
                a.borrow_mut().truncate(len);
                Ok(())
            }
            _ => bail!("cannot truncate a non-array value"),
        }
    }

    /// Ingest a JSON document into an untagged value graph. Objects come
    /// back with an empty shape; callers tag the root via [`Value::tagged`].
    pub fn from_json_str(json: &str) -> Result<Value> {
        let parsed: serde_json::Value = serde_json::from_str(json)?;
        Ok(Value::from(parsed))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(Number::Int(i))
                } else {
                    Value::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                let items: Vec<Value> = items.into_iter().map(Value::from).collect();
                Value::Array(Rc::new(RefCell::new(items)))
            }
            serde_json::Value::Object(fields) => {
                let obj = Object::new("");
                for (k, v) in fields {
                    obj.set(&k, Value::from(v));
                }
                Value::Object(Rc::new(obj))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}

// Structural equality; identical containers short-circuit on pointer
// identity, which also keeps self-referential comparisons from recursing
// through their own cycle edge.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Object(a), Value::Object(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.shape() == b.shape() && *a.fields() == *b.fields())
            }
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s.as_ref()),
            Value::Array(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(o) => {
                let fields = o.fields();
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k.as_ref(), v)?;
                }
                map.end()
            }

            // display undefined as a special string
            Value::Undefined => serializer.serialize_str("<undefined>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_e) => Err(fmt::Error),
        }
    }
}
