//! Schema bundle loader.
//!
//! The metadata blob is itself a message in the wire format, describing
//! types and protocols with this self-describing schema:
//!
//! ```text
//! .type {
//!     .field {
//!         name 0 : string
//!         buildin 1 : integer
//!         type 2 : integer
//!         tag 3 : integer
//!         array 4 : boolean
//!         key 5 : integer
//!         map 6 : boolean
//!     }
//!     name 0 : string
//!     fields 1 : *field
//! }
//! .protocol {
//!     name 0 : string
//!     tag 1 : integer
//!     request 2 : integer   # type index
//!     response 3 : integer  # type index
//!     confirm 4 : boolean
//! }
//! .group {
//!     type 0 : *type
//!     protocol 1 : *protocol
//! }
//! ```
//!
//! The loader walks records structurally (header slots, skip
//! reconstruction, body stepping) instead of recursing through the full
//! decoder, and copies every name into the schema's arena.

use crate::arena::Arena;
use crate::builder::{finish, pow10};
use crate::codec::wire::*;
use crate::error::SchemaError;
use crate::schema::{compute_layout, Field, FieldKind, Protocol, Schema, Type};

impl Schema {
    /// Parse a schema bundle. This is the `create` operation.
    pub fn from_bundle(data: &[u8]) -> Result<Schema, SchemaError> {
        load(data)
    }
}

/// Parse a schema bundle into a [`Schema`].
pub fn load(data: &[u8]) -> Result<Schema, SchemaError> {
    let sections = data_only_record(data)?;
    if sections.len() > 2 {
        return Err(SchemaError::Invalid(
            "schema bundle has more than two sections".into(),
        ));
    }

    let type_blobs = match sections.first() {
        Some(blob) => walk_array(blob)?,
        None => Vec::new(),
    };
    let proto_blobs = match sections.get(1) {
        Some(blob) => walk_array(blob)?,
        None => Vec::new(),
    };

    let mut arena = Arena::new();
    let type_count = type_blobs.len();

    let mut types = Vec::with_capacity(type_count);
    for blob in type_blobs {
        types.push(import_type(&mut arena, blob, type_count)?);
    }

    let mut protocols = Vec::with_capacity(proto_blobs.len());
    for blob in proto_blobs {
        protocols.push(import_protocol(&mut arena, blob, type_count)?);
    }

    finish(arena, types, protocols)
}

/// One header slot's worth of record content.
enum Entry<'a> {
    Inline(i32),
    Bytes(&'a [u8]),
}

fn truncated(need: usize, have: usize) -> SchemaError {
    SchemaError::Truncated { need, have }
}

/// Walk a record generically, reconstructing tags from skip slots and
/// stepping over body entries. Tags come out strictly ascending.
fn walk_record(data: &[u8]) -> Result<Vec<(i32, Entry<'_>)>, SchemaError> {
    let have = data.len();
    let fn_count =
        read_u16(data, 0).ok_or_else(|| truncated(SIZEOF_HEADER, have))? as usize;
    let header_end = SIZEOF_HEADER + fn_count * SIZEOF_FIELD;
    if have < header_end {
        return Err(truncated(header_end, have));
    }

    let mut entries = Vec::with_capacity(fn_count);
    let mut body = header_end;
    let mut tag: i32 = -1;

    for i in 0..fn_count {
        let slot = read_u16(data, SIZEOF_HEADER + i * SIZEOF_FIELD)
            .ok_or_else(|| truncated(header_end, have))?;
        tag += 1;
        if slot & 1 != 0 {
            tag += (slot / 2) as i32;
            continue;
        }
        let value = (slot / 2) as i32 - 1;
        if value < 0 {
            let sz = read_u32(data, body)
                .ok_or_else(|| truncated(body + SIZEOF_LENGTH, have))? as usize;
            let end = body + SIZEOF_LENGTH + sz;
            if have < end {
                return Err(truncated(end, have));
            }
            entries.push((tag, Entry::Bytes(&data[body + SIZEOF_LENGTH..end])));
            body = end;
        } else {
            entries.push((tag, Entry::Inline(value)));
        }
    }

    Ok(entries)
}

/// Walk a record whose slots must all be plain body references (the group
/// and type records), returning the body slices in slot order.
fn data_only_record(data: &[u8]) -> Result<Vec<&[u8]>, SchemaError> {
    let have = data.len();
    let fn_count =
        read_u16(data, 0).ok_or_else(|| truncated(SIZEOF_HEADER, have))? as usize;
    let header_end = SIZEOF_HEADER + fn_count * SIZEOF_FIELD;
    if have < header_end {
        return Err(truncated(header_end, have));
    }

    let mut parts = Vec::with_capacity(fn_count);
    let mut body = header_end;
    for i in 0..fn_count {
        let slot = read_u16(data, SIZEOF_HEADER + i * SIZEOF_FIELD)
            .ok_or_else(|| truncated(header_end, have))?;
        if slot != 0 {
            return Err(SchemaError::Invalid(
                "record slot must be a body reference".into(),
            ));
        }
        let sz = read_u32(data, body)
            .ok_or_else(|| truncated(body + SIZEOF_LENGTH, have))? as usize;
        let end = body + SIZEOF_LENGTH + sz;
        if have < end {
            return Err(truncated(end, have));
        }
        parts.push(&data[body + SIZEOF_LENGTH..end]);
        body = end;
    }

    Ok(parts)
}

/// Walk an array body: a sequence of length-prefixed items.
fn walk_array(data: &[u8]) -> Result<Vec<&[u8]>, SchemaError> {
    let mut items = Vec::new();
    let mut off = 0;
    while off < data.len() {
        let sz = read_u32(data, off)
            .ok_or_else(|| truncated(off + SIZEOF_LENGTH, data.len()))? as usize;
        let end = off + SIZEOF_LENGTH + sz;
        if data.len() < end {
            return Err(truncated(end, data.len()));
        }
        items.push(&data[off + SIZEOF_LENGTH..end]);
        off = end;
    }
    Ok(items)
}

fn import_string<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str, SchemaError> {
    std::str::from_utf8(bytes)
        .map_err(|_| SchemaError::Invalid(format!("{} is not valid utf-8", what)))
}

fn import_type(
    arena: &mut Arena,
    blob: &[u8],
    type_count: usize,
) -> Result<Type, SchemaError> {
    let parts = data_only_record(blob)?;
    if parts.is_empty() || parts.len() > 2 {
        return Err(SchemaError::Invalid(
            "type record must hold a name and an optional field list".into(),
        ));
    }

    let name_str = import_string(parts[0], "type name")?.to_string();
    let name = arena.intern_str(&name_str);

    let mut fields = Vec::new();
    if parts.len() == 2 {
        let mut last: i32 = -1;
        for fblob in walk_array(parts[1])? {
            let field = import_field(arena, fblob, type_count, &name_str)?;
            if field.tag as i32 <= last {
                return Err(SchemaError::NonAscendingTag {
                    type_name: name_str,
                    tag: field.tag,
                });
            }
            last = field.tag as i32;
            fields.push(field);
        }
    }

    let (base, maxn) = compute_layout(&fields);
    Ok(Type {
        name,
        fields,
        base,
        maxn,
    })
}

fn import_field(
    arena: &mut Arena,
    blob: &[u8],
    type_count: usize,
    type_name: &str,
) -> Result<Field, SchemaError> {
    let mut name = None;
    let mut builtin: Option<i32> = None;
    let mut kind: Option<FieldKind> = None;
    let mut tag: i32 = -1;
    let mut array = false;
    let mut key: i32 = -1;
    let mut map = false;
    let mut decimal: i64 = 0;

    for (etag, entry) in walk_record(blob)? {
        if etag == 0 {
            let Entry::Bytes(bytes) = entry else {
                return Err(SchemaError::Invalid(
                    "field name must be stored in the body".into(),
                ));
            };
            name = Some(arena.intern_str(import_string(bytes, "field name")?));
            continue;
        }
        let Entry::Inline(value) = entry else {
            return Err(SchemaError::Invalid(format!(
                "field attribute {} must be an inline value",
                etag
            )));
        };
        match etag {
            1 => {
                kind = Some(match value {
                    0 => FieldKind::Integer,
                    1 => FieldKind::Boolean,
                    2 => FieldKind::String,
                    3 => FieldKind::Double,
                    other => {
                        return Err(SchemaError::Invalid(format!(
                            "invalid builtin type {} in type '{}'",
                            other, type_name
                        )));
                    }
                });
                builtin = Some(value);
            }
            2 => match builtin {
                Some(0) => {
                    decimal = pow10(value as u32).ok_or_else(|| {
                        SchemaError::Invalid(format!(
                            "decimal exponent {} overflows in type '{}'",
                            value, type_name
                        ))
                    })?;
                }
                Some(2) => {
                    if value == 1 {
                        kind = Some(FieldKind::Binary);
                    }
                }
                Some(_) => {
                    return Err(SchemaError::Invalid(format!(
                        "field in type '{}' is typed both builtin and struct",
                        type_name
                    )));
                }
                None => {
                    if value as usize >= type_count {
                        return Err(SchemaError::TypeIndexOutOfRange {
                            index: value as usize,
                            count: type_count,
                        });
                    }
                    kind = Some(FieldKind::Struct(value as usize));
                }
            },
            3 => tag = value,
            4 => {
                if value != 0 {
                    array = true;
                }
            }
            5 => key = value,
            6 => {
                if value != 0 {
                    map = true;
                }
            }
            other => {
                return Err(SchemaError::Invalid(format!(
                    "unknown field attribute tag {} in type '{}'",
                    other, type_name
                )));
            }
        }
    }

    let (name, kind) = match (name, kind) {
        (Some(name), Some(kind)) if tag >= 0 => (name, kind),
        _ => {
            return Err(SchemaError::Invalid(format!(
                "field in type '{}' is missing its name, tag or type",
                type_name
            )));
        }
    };

    Ok(Field {
        name,
        tag: tag as u16,
        kind,
        array,
        key,
        map,
        decimal,
    })
}

fn import_protocol(
    arena: &mut Arena,
    blob: &[u8],
    type_count: usize,
) -> Result<Protocol, SchemaError> {
    let mut name = None;
    let mut tag: i32 = -1;
    let mut request = None;
    let mut response = None;
    let mut confirm = false;

    for (etag, entry) in walk_record(blob)? {
        if etag == 0 {
            let Entry::Bytes(bytes) = entry else {
                return Err(SchemaError::Invalid(
                    "protocol name must be stored in the body".into(),
                ));
            };
            name = Some(arena.intern_str(import_string(bytes, "protocol name")?));
            continue;
        }
        let Entry::Inline(value) = entry else {
            return Err(SchemaError::Invalid(format!(
                "protocol attribute {} must be an inline value",
                etag
            )));
        };
        match etag {
            1 => tag = value,
            2 | 3 => {
                if value as usize >= type_count {
                    return Err(SchemaError::TypeIndexOutOfRange {
                        index: value as usize,
                        count: type_count,
                    });
                }
                if etag == 2 {
                    request = Some(value as usize);
                } else {
                    response = Some(value as usize);
                }
            }
            4 => confirm = value != 0,
            other => {
                return Err(SchemaError::Invalid(format!(
                    "unknown protocol attribute tag {}",
                    other
                )));
            }
        }
    }

    let name = match name {
        Some(name) if tag >= 0 => name,
        _ => {
            return Err(SchemaError::Invalid(
                "protocol is missing its name or tag".into(),
            ));
        }
    };

    Ok(Protocol {
        name,
        tag: tag as u16,
        request,
        response,
        confirm,
    })
}
