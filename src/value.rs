//! Dynamic value tree and the callback implementations driving it.
//!
//! [`Value`] is a `serde_json::Value`-style representation of any message
//! the codec can carry. [`encode`] and [`decode`] are the convenience
//! drivers built on the callback core: the encode side owns the
//! grow-and-retry loop over [`crate::codec::encode`], the decode side
//! materializes a tree from the sink events.

use std::collections::HashMap;
use std::fmt;

use crate::codec::{self, DecodeSink, EncodeSource, FieldArg, Put, View};
use crate::error::{DecodeError, EncodeError};
use crate::schema::{FieldKind, Schema, Type};

/// Dynamic value for schema-driven encoding and decoding.
#[derive(Clone, Debug)]
pub enum Value {
    /// Signed 64-bit integer.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// UTF-8 string.
    Str(String),
    /// Raw binary data.
    Binary(Vec<u8>),
    /// IEEE 754 double-precision floating point.
    Double(f64),
    /// A struct (message) with named fields.
    Struct(HashMap<String, Value>),
    /// An ordered array of values.
    Array(Vec<Value>),
}

impl Value {
    /// Build a struct from key-value pairs.
    pub fn from_fields(fields: Vec<(&str, Value)>) -> Self {
        let mut map = HashMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        Value::Struct(map)
    }

    /// Get a field from a struct value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Short type description, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Str(_) => "string",
            Value::Binary(_) => "binary",
            Value::Double(_) => "double",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "\"{}\"", v),
            Value::Binary(v) => write!(f, "<binary {} bytes>", v.len()),
            Value::Double(v) => write!(f, "{}", v),
            Value::Struct(map) => {
                write!(f, "{{ ")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, " }}")
            }
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Array(v.into_iter().map(Value::Integer).collect())
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::Array(v.into_iter().map(Value::Boolean).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v.into_iter().map(Value::Str).collect())
    }
}

/// Encode a [`Value::Struct`] against a type descriptor.
///
/// Grows the output buffer and retries while the encoder reports
/// [`EncodeError::BufferTooSmall`], the way the original host binding
/// drives the core.
pub fn encode(schema: &Schema, ty: &Type, value: &Value) -> Result<Vec<u8>, EncodeError> {
    let fields = match value {
        Value::Struct(map) => map,
        other => {
            return Err(EncodeError::TypeMismatch {
                field: ty.name(schema).to_string(),
                expected: "struct".into(),
                actual: other.type_name().into(),
            });
        }
    };

    let mut cap = 128;
    loop {
        let mut buf = vec![0u8; cap];
        let mut source = ValueSource { schema, fields };
        match codec::encode(schema, ty, &mut buf, &mut source) {
            Ok(n) => {
                buf.truncate(n);
                return Ok(buf);
            }
            Err(EncodeError::BufferTooSmall) => cap *= 2,
            Err(e) => return Err(e),
        }
    }
}

/// Decode a payload against a type descriptor into a [`Value::Struct`].
pub fn decode(schema: &Schema, ty: &Type, data: &[u8]) -> Result<Value, DecodeError> {
    let mut sink = ValueSink {
        schema,
        out: HashMap::new(),
    };
    codec::decode(schema, ty, data, &mut sink)?;
    Ok(Value::Struct(sink.out))
}

/// [`EncodeSource`] over a field map.
struct ValueSource<'a> {
    schema: &'a Schema,
    fields: &'a HashMap<String, Value>,
}

impl ValueSource<'_> {
    fn put_one(
        &mut self,
        arg: &FieldArg<'_>,
        v: &Value,
        out: &mut [u8],
    ) -> Result<Put, EncodeError> {
        let mismatch = |expected: &str, actual: &Value| EncodeError::TypeMismatch {
            field: arg.tagname.to_string(),
            expected: expected.to_string(),
            actual: actual.type_name().to_string(),
        };

        match arg.kind {
            FieldKind::Integer => {
                // fixed-point fields carry scaled integers on the wire
                let wire = if arg.extra > 0 {
                    match v {
                        Value::Double(d) => (*d * arg.extra as f64).round() as i64,
                        Value::Integer(i) => i.checked_mul(arg.extra).ok_or_else(|| {
                            EncodeError::Abort(format!(
                                "decimal value overflows field '{}'",
                                arg.tagname
                            ))
                        })?,
                        other => return Err(mismatch("integer or double", other)),
                    }
                } else {
                    match v {
                        Value::Integer(i) => *i,
                        other => return Err(mismatch("integer", other)),
                    }
                };
                Ok(Put::Int(wire))
            }
            FieldKind::Boolean => match v {
                Value::Boolean(b) => Ok(Put::Bool(*b)),
                other => Err(mismatch("boolean", other)),
            },
            FieldKind::Double => match v {
                Value::Double(d) => Ok(Put::Double(*d)),
                Value::Integer(i) => Ok(Put::Double(*i as f64)),
                other => Err(mismatch("double", other)),
            },
            FieldKind::String => match v {
                Value::Str(s) => {
                    if out.len() < s.len() {
                        return Err(EncodeError::BufferTooSmall);
                    }
                    out[..s.len()].copy_from_slice(s.as_bytes());
                    Ok(Put::Bytes(s.len()))
                }
                other => Err(mismatch("string", other)),
            },
            FieldKind::Binary => match v {
                Value::Binary(b) => {
                    if out.len() < b.len() {
                        return Err(EncodeError::BufferTooSmall);
                    }
                    out[..b.len()].copy_from_slice(b);
                    Ok(Put::Bytes(b.len()))
                }
                other => Err(mismatch("binary", other)),
            },
            FieldKind::Struct(_) => match v {
                Value::Struct(map) => {
                    let st = arg.subtype.ok_or_else(|| {
                        EncodeError::Abort(format!("field '{}' has no subtype", arg.tagname))
                    })?;
                    let mut nested = ValueSource {
                        schema: self.schema,
                        fields: map,
                    };
                    let n = codec::encode(self.schema, st, out, &mut nested)?;
                    Ok(Put::Bytes(n))
                }
                other => Err(mismatch("struct", other)),
            },
        }
    }
}

impl EncodeSource for ValueSource<'_> {
    fn field_out(&mut self, arg: &FieldArg<'_>, out: &mut [u8]) -> Result<Put, EncodeError> {
        let val = match self.fields.get(arg.tagname) {
            Some(v) => v,
            // absent arrays are omitted outright, absent scalars skipped
            None => {
                return Ok(if arg.index >= 1 { Put::NoArray } else { Put::Nil });
            }
        };

        if arg.index >= 1 {
            let arr = match val {
                Value::Array(a) => a,
                other => {
                    return Err(EncodeError::TypeMismatch {
                        field: arg.tagname.to_string(),
                        expected: "array".into(),
                        actual: other.type_name().into(),
                    });
                }
            };
            match arr.get(arg.index as usize - 1) {
                Some(elem) => self.put_one(arg, elem, out),
                None => Ok(Put::Nil), // end of array
            }
        } else {
            self.put_one(arg, val, out)
        }
    }
}

/// [`DecodeSink`] building a field map.
struct ValueSink<'a> {
    schema: &'a Schema,
    out: HashMap<String, Value>,
}

impl DecodeSink for ValueSink<'_> {
    fn field_in(&mut self, arg: &FieldArg<'_>, view: View<'_>) -> Result<(), DecodeError> {
        let v = match view {
            View::Nil => {
                // empty-array marker
                self.out
                    .insert(arg.tagname.to_string(), Value::Array(Vec::new()));
                return Ok(());
            }
            View::Int(i) => {
                if arg.extra > 0 {
                    Value::Double(i as f64 / arg.extra as f64)
                } else {
                    Value::Integer(i)
                }
            }
            View::Bool(b) => Value::Boolean(b),
            View::Double(d) => Value::Double(d),
            View::Bytes(b) => {
                if arg.kind == FieldKind::Binary {
                    Value::Binary(b.to_vec())
                } else {
                    Value::Str(String::from_utf8(b.to_vec()).map_err(|e| {
                        DecodeError::InvalidUtf8 {
                            field: arg.tagname.to_string(),
                            source: e,
                        }
                    })?)
                }
            }
            View::Struct(bytes) => {
                let st = arg.subtype.ok_or_else(|| {
                    DecodeError::InvalidData(format!("field '{}' has no subtype", arg.tagname))
                })?;
                decode(self.schema, st, bytes)?
            }
        };

        if arg.index >= 1 {
            let entry = self
                .out
                .entry(arg.tagname.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(a) => a.push(v),
                _ => {
                    return Err(DecodeError::InvalidData(format!(
                        "field '{}' mixes array and scalar entries",
                        arg.tagname
                    )));
                }
            }
        } else {
            self.out.insert(arg.tagname.to_string(), v);
        }
        Ok(())
    }
}
