//! Callback-driven encoder.
//!
//! Writes the header and body into the caller's buffer in one pass, then
//! compacts the header when fewer slots than the type's `maxn` were used.
//! Exhausting the buffer surfaces as [`EncodeError::BufferTooSmall`]; the
//! caller retries with a larger buffer.

use crate::error::EncodeError;
use crate::schema::{Field, FieldKind, Schema, Type};

use super::wire::*;
use super::{field_arg, EncodeSource, FieldArg, Put};

/// Largest integer that fits a header slot inline.
const INLINE_MAX: u32 = 0x7ffe;

fn mismatch(arg: &FieldArg<'_>, expected: &str, got: &Put) -> EncodeError {
    EncodeError::TypeMismatch {
        field: arg.tagname.to_string(),
        expected: expected.to_string(),
        actual: format!("{:?}", got),
    }
}

/// Encode one message of type `ty`, pulling values from `source`.
///
/// Returns the number of bytes written to `buf`.
pub fn encode<S: EncodeSource + ?Sized>(
    schema: &Schema,
    ty: &Type,
    buf: &mut [u8],
    source: &mut S,
) -> Result<usize, EncodeError> {
    let header_sz = SIZEOF_HEADER + ty.maxn * SIZEOF_FIELD;
    if buf.len() < header_sz {
        return Err(EncodeError::BufferTooSmall);
    }

    let mut index = 0usize; // header slots used
    let mut lasttag: i32 = -1;
    let mut data = header_sz; // body cursor

    for f in &ty.fields {
        let mut arg = field_arg(schema, f);

        // slot value and body bytes consumed, None when the field is absent
        let outcome: Option<(u16, usize)> = if f.array {
            encode_array(f, &mut arg, buf, data, source)?.map(|sz| (0u16, sz))
        } else {
            match f.kind {
                FieldKind::Integer | FieldKind::Boolean | FieldKind::Double => {
                    match source.field_out(&arg, &mut [])? {
                        Put::Nil | Put::NoArray => None,
                        Put::Int(v) if f.kind == FieldKind::Integer => {
                            Some(encode_integer(v, buf, data)?)
                        }
                        Put::Bool(b) if f.kind == FieldKind::Boolean => {
                            Some(encode_integer(b as i64, buf, data)?)
                        }
                        Put::Double(d) if f.kind == FieldKind::Double => {
                            if buf.len() < data + SIZEOF_LENGTH + SIZEOF_INT64 {
                                return Err(EncodeError::BufferTooSmall);
                            }
                            write_u32(buf, data, SIZEOF_INT64 as u32);
                            write_u64(buf, data + SIZEOF_LENGTH, d.to_bits());
                            Some((0, SIZEOF_LENGTH + SIZEOF_INT64))
                        }
                        other => return Err(mismatch(&arg, f.kind.describe(), &other)),
                    }
                }
                FieldKind::String | FieldKind::Binary | FieldKind::Struct(_) => {
                    encode_object(f, &arg, buf, data, source)?.map(|sz| (0u16, sz))
                }
            }
        };

        if let Some((slot, consumed)) = outcome {
            data += consumed;

            let gap = f.tag as i32 - lasttag - 1;
            if gap > 0 {
                let skip = (gap - 1) * 2 + 1;
                if skip > 0xffff {
                    return Err(EncodeError::TagGapTooLarge {
                        field: f.name(schema).to_string(),
                    });
                }
                write_u16(buf, SIZEOF_HEADER + SIZEOF_FIELD * index, skip as u16);
                index += 1;
            }
            write_u16(buf, SIZEOF_HEADER + SIZEOF_FIELD * index, slot);
            index += 1;
            lasttag = f.tag as i32;
        }
    }

    write_u16(buf, 0, index as u16);

    let datasz = data - header_sz;
    if index != ty.maxn {
        // relocate the body down over the unused header tail
        buf.copy_within(header_sz..data, SIZEOF_HEADER + index * SIZEOF_FIELD);
    }
    Ok(SIZEOF_HEADER + index * SIZEOF_FIELD + datasz)
}

/// Encode an integer or boolean scalar: inline slot for 0..=32766,
/// otherwise a 4- or 8-byte body entry.
fn encode_integer(v: i64, buf: &mut [u8], data: usize) -> Result<(u16, usize), EncodeError> {
    if v as i32 as i64 == v {
        let u = v as i32 as u32;
        if u <= INLINE_MAX {
            return Ok((((u + 1) * 2) as u16, 0));
        }
        if buf.len() < data + SIZEOF_LENGTH + SIZEOF_INT32 {
            return Err(EncodeError::BufferTooSmall);
        }
        write_u32(buf, data, SIZEOF_INT32 as u32);
        write_u32(buf, data + SIZEOF_LENGTH, u);
        Ok((0, SIZEOF_LENGTH + SIZEOF_INT32))
    } else {
        if buf.len() < data + SIZEOF_LENGTH + SIZEOF_INT64 {
            return Err(EncodeError::BufferTooSmall);
        }
        write_u32(buf, data, SIZEOF_INT64 as u32);
        write_u64(buf, data + SIZEOF_LENGTH, v as u64);
        Ok((0, SIZEOF_LENGTH + SIZEOF_INT64))
    }
}

/// Encode a string, binary or struct scalar: the source fills the window
/// past the length prefix.
fn encode_object<S: EncodeSource + ?Sized>(
    f: &Field,
    arg: &FieldArg<'_>,
    buf: &mut [u8],
    data: usize,
    source: &mut S,
) -> Result<Option<usize>, EncodeError> {
    if buf.len() < data + SIZEOF_LENGTH {
        return Err(EncodeError::BufferTooSmall);
    }
    let (prefix, window) = buf[data..].split_at_mut(SIZEOF_LENGTH);
    match source.field_out(arg, window)? {
        Put::Nil | Put::NoArray => Ok(None),
        Put::Bytes(n) => {
            if n > window.len() {
                return Err(EncodeError::BufferTooSmall);
            }
            prefix.copy_from_slice(&(n as u32).to_le_bytes());
            Ok(Some(SIZEOF_LENGTH + n))
        }
        other => Err(mismatch(arg, f.kind.describe(), &other)),
    }
}

/// Encode an array field. Returns the total body bytes consumed
/// (including the length prefix), or `None` when the source answered
/// [`Put::NoArray`] and the field is omitted entirely.
fn encode_array<S: EncodeSource + ?Sized>(
    f: &Field,
    arg: &mut FieldArg<'_>,
    buf: &mut [u8],
    data: usize,
    source: &mut S,
) -> Result<Option<usize>, EncodeError> {
    if buf.len() < data + SIZEOF_LENGTH {
        return Err(EncodeError::BufferTooSmall);
    }
    let content = data + SIZEOF_LENGTH;

    let total = match f.kind {
        FieldKind::Integer | FieldKind::Double => {
            match encode_integer_array(f, arg, buf, content, source)? {
                None => return Ok(None),
                Some(sz) => sz,
            }
        }
        FieldKind::Boolean => {
            let mut cursor = content;
            let mut n = 0usize;
            loop {
                arg.index = n as i32 + 1;
                match source.field_out(arg, &mut [])? {
                    Put::Nil => break,
                    Put::NoArray => return Ok(None),
                    Put::Bool(b) => {
                        if buf.len() < cursor + 1 {
                            return Err(EncodeError::BufferTooSmall);
                        }
                        buf[cursor] = b as u8;
                        cursor += 1;
                        n += 1;
                    }
                    other => return Err(mismatch(arg, "boolean", &other)),
                }
            }
            cursor - content
        }
        FieldKind::String | FieldKind::Binary | FieldKind::Struct(_) => {
            let mut cursor = content;
            let mut i = 1;
            loop {
                arg.index = i;
                if buf.len() < cursor + SIZEOF_LENGTH {
                    return Err(EncodeError::BufferTooSmall);
                }
                let (prefix, window) = buf[cursor..].split_at_mut(SIZEOF_LENGTH);
                match source.field_out(arg, window)? {
                    Put::Nil => break,
                    Put::NoArray => return Ok(None),
                    Put::Bytes(n) => {
                        if n > window.len() {
                            return Err(EncodeError::BufferTooSmall);
                        }
                        prefix.copy_from_slice(&(n as u32).to_le_bytes());
                        cursor += SIZEOF_LENGTH + n;
                        i += 1;
                    }
                    other => return Err(mismatch(arg, f.kind.describe(), &other)),
                }
            }
            cursor - content
        }
    };

    write_u32(buf, data, total as u32);
    Ok(Some(SIZEOF_LENGTH + total))
}

/// Encode an integer or double array: a width byte followed by packed
/// elements. Starts at 4-byte width; the first element needing 64 bits
/// rewrites everything written so far as sign-extended 8-byte slots and
/// switches the width for the remainder.
fn encode_integer_array<S: EncodeSource + ?Sized>(
    f: &Field,
    arg: &mut FieldArg<'_>,
    buf: &mut [u8],
    content: usize,
    source: &mut S,
) -> Result<Option<usize>, EncodeError> {
    if buf.len() < content + 1 {
        return Err(EncodeError::BufferTooSmall);
    }
    let elems = content + 1;
    let mut cursor = elems;
    let mut intlen = SIZEOF_INT32;
    let mut n = 0usize;

    loop {
        arg.index = n as i32 + 1;
        let (needs64, bits): (bool, u64) = match source.field_out(arg, &mut [])? {
            Put::Nil => break,
            Put::NoArray => return Ok(None),
            Put::Int(v) if f.kind == FieldKind::Integer => {
                (v as i32 as i64 != v, v as u64)
            }
            Put::Double(d) if f.kind == FieldKind::Double => (true, d.to_bits()),
            other => return Err(mismatch(arg, f.kind.describe(), &other)),
        };

        if buf.len() < cursor + SIZEOF_INT64 {
            return Err(EncodeError::BufferTooSmall);
        }

        if !needs64 {
            write_u32(buf, cursor, bits as u32);
            if intlen == SIZEOF_INT64 {
                let fill = if bits & 0x8000_0000 != 0 { 0xFF } else { 0x00 };
                buf[cursor + SIZEOF_INT32..cursor + SIZEOF_INT64].fill(fill);
            }
        } else {
            if intlen == SIZEOF_INT32 {
                let new_cursor = elems + n * SIZEOF_INT64;
                if buf.len() < new_cursor + SIZEOF_INT64 {
                    return Err(EncodeError::BufferTooSmall);
                }
                // rewrite phase: widen elements in place, last first
                for i in (0..n).rev() {
                    let src = elems + i * SIZEOF_INT32;
                    let dst = elems + i * SIZEOF_INT64;
                    buf.copy_within(src..src + SIZEOF_INT32, dst);
                    let fill = if buf[dst + 3] & 0x80 != 0 { 0xFF } else { 0x00 };
                    buf[dst + SIZEOF_INT32..dst + SIZEOF_INT64].fill(fill);
                }
                intlen = SIZEOF_INT64;
                cursor = new_cursor;
            }
            write_u64(buf, cursor, bits);
        }

        cursor += intlen;
        n += 1;
    }

    if n == 0 {
        return Ok(Some(0));
    }
    buf[content] = intlen as u8;
    Ok(Some(1 + n * intlen))
}
