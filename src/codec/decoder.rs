//! Callback-driven decoder.
//!
//! Walks the header reconstructing the running tag, steps over body
//! entries, and delivers each present field to the sink. Unknown tags are
//! skipped for forward compatibility; their body entries are still stepped
//! over.

use crate::error::DecodeError;
use crate::schema::{Field, FieldKind, Schema, Type};

use super::wire::*;
use super::{field_arg, DecodeSink, FieldArg, View};

fn truncated(need: usize, have: usize) -> DecodeError {
    DecodeError::Truncated { need, have }
}

/// Decode one message of type `ty`, pushing values into `sink`.
///
/// Returns the number of bytes consumed from `data`.
pub fn decode<S: DecodeSink + ?Sized>(
    schema: &Schema,
    ty: &Type,
    data: &[u8],
    sink: &mut S,
) -> Result<usize, DecodeError> {
    let total = data.len();
    if total < SIZEOF_HEADER {
        return Err(truncated(SIZEOF_HEADER, total));
    }
    let fn_count = read_u16(data, 0).ok_or_else(|| truncated(SIZEOF_HEADER, total))? as usize;
    let header_end = SIZEOF_HEADER + fn_count * SIZEOF_FIELD;
    if total < header_end {
        return Err(truncated(header_end, total));
    }

    let mut body = header_end;
    let mut tag: i32 = -1;

    for i in 0..fn_count {
        let slot = read_u16(data, SIZEOF_HEADER + i * SIZEOF_FIELD)
            .ok_or_else(|| truncated(header_end, total))?;
        tag += 1;
        if slot & 1 != 0 {
            tag += (slot / 2) as i32;
            continue;
        }
        let value = (slot / 2) as i32 - 1;

        let current = body;
        if value < 0 {
            let sz = read_u32(data, body).ok_or_else(|| truncated(body + SIZEOF_LENGTH, total))?
                as usize;
            let end = body + SIZEOF_LENGTH + sz;
            if total < end {
                return Err(truncated(end, total));
            }
            body = end;
        }

        if tag > u16::MAX as i32 {
            continue;
        }
        let f = match ty.field_by_tag(tag as u16) {
            Some(f) => f,
            None => continue, // unknown tag, skip for forward compatibility
        };
        let mut arg = field_arg(schema, f);

        if value < 0 {
            let entry = &data[current..body];
            if f.array {
                decode_array(f, &mut arg, entry, sink)?;
            } else {
                decode_scalar(f, &arg, entry, sink)?;
            }
        } else {
            if f.array {
                return Err(DecodeError::InvalidData(format!(
                    "array field '{}' has an inline value",
                    arg.tagname
                )));
            }
            match f.kind {
                FieldKind::Integer => sink.field_in(&arg, View::Int(value as i64))?,
                FieldKind::Boolean => sink.field_in(&arg, View::Bool(value != 0))?,
                _ => {
                    return Err(DecodeError::InvalidData(format!(
                        "{} field '{}' has an inline value",
                        f.kind.describe(),
                        arg.tagname
                    )));
                }
            }
        }
    }

    Ok(body)
}

/// Decode a non-array body entry (`[u32 length][content]`).
fn decode_scalar<S: DecodeSink + ?Sized>(
    f: &Field,
    arg: &FieldArg<'_>,
    entry: &[u8],
    sink: &mut S,
) -> Result<(), DecodeError> {
    let content = &entry[SIZEOF_LENGTH..];
    match f.kind {
        FieldKind::Integer | FieldKind::Double => {
            let bits = match content.len() {
                SIZEOF_INT32 => expand64(
                    read_u32(content, 0).ok_or_else(|| truncated(SIZEOF_INT32, content.len()))?,
                ),
                SIZEOF_INT64 => read_u64(content, 0)
                    .ok_or_else(|| truncated(SIZEOF_INT64, content.len()))?,
                other => {
                    return Err(DecodeError::InvalidData(format!(
                        "integer field '{}' has invalid size {}",
                        arg.tagname, other
                    )));
                }
            };
            let view = if f.kind == FieldKind::Double {
                View::Double(f64::from_bits(bits))
            } else {
                View::Int(bits as i64)
            };
            sink.field_in(arg, view)
        }
        FieldKind::String | FieldKind::Binary => sink.field_in(arg, View::Bytes(content)),
        FieldKind::Struct(_) => sink.field_in(arg, View::Struct(content)),
        FieldKind::Boolean => Err(DecodeError::InvalidData(format!(
            "boolean field '{}' in data part",
            arg.tagname
        ))),
    }
}

/// Decode an array body entry, delivering one callback per element with a
/// 1-based index, or the `index == -1` empty marker.
fn decode_array<S: DecodeSink + ?Sized>(
    f: &Field,
    arg: &mut FieldArg<'_>,
    entry: &[u8],
    sink: &mut S,
) -> Result<(), DecodeError> {
    let sz = read_u32(entry, 0).ok_or_else(|| truncated(SIZEOF_LENGTH, entry.len()))? as usize;
    if sz == 0 {
        arg.index = -1;
        return sink.field_in(arg, View::Nil);
    }
    let content = &entry[SIZEOF_LENGTH..];

    match f.kind {
        FieldKind::Integer | FieldKind::Double => {
            if sz == 1 {
                // alternate empty encoding: length prefix but no width byte
                arg.index = -1;
                return sink.field_in(arg, View::Nil);
            }
            let width = content[0] as usize;
            let elems = &content[1..];
            if width != SIZEOF_INT32 && width != SIZEOF_INT64 {
                return Err(DecodeError::InvalidData(format!(
                    "integer array '{}' has invalid element size {}",
                    arg.tagname, width
                )));
            }
            if elems.len() % width != 0 {
                return Err(DecodeError::InvalidData(format!(
                    "integer array '{}' length {} not divisible by element size {}",
                    arg.tagname,
                    elems.len(),
                    width
                )));
            }
            for (i, chunk) in elems.chunks_exact(width).enumerate() {
                let bits = if width == SIZEOF_INT32 {
                    expand64(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                } else {
                    u64::from_le_bytes([
                        chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6],
                        chunk[7],
                    ])
                };
                arg.index = i as i32 + 1;
                let view = if f.kind == FieldKind::Double {
                    View::Double(f64::from_bits(bits))
                } else {
                    View::Int(bits as i64)
                };
                sink.field_in(arg, view)?;
            }
            Ok(())
        }
        FieldKind::Boolean => {
            for (i, b) in content.iter().enumerate() {
                arg.index = i as i32 + 1;
                sink.field_in(arg, View::Bool(*b != 0))?;
            }
            Ok(())
        }
        FieldKind::String | FieldKind::Binary | FieldKind::Struct(_) => {
            let mut rest = content;
            let mut i = 1;
            while !rest.is_empty() {
                let esz = read_u32(rest, 0)
                    .ok_or_else(|| truncated(SIZEOF_LENGTH, rest.len()))?
                    as usize;
                if rest.len() < SIZEOF_LENGTH + esz {
                    return Err(truncated(SIZEOF_LENGTH + esz, rest.len()));
                }
                let elem = &rest[SIZEOF_LENGTH..SIZEOF_LENGTH + esz];
                arg.index = i;
                let view = match f.kind {
                    FieldKind::Struct(_) => View::Struct(elem),
                    _ => View::Bytes(elem),
                };
                sink.field_in(arg, view)?;
                rest = &rest[SIZEOF_LENGTH + esz..];
                i += 1;
            }
            Ok(())
        }
    }
}
