//! Callback-driven binary codec.
//!
//! The codec commits to no host data model: [`encode`] pulls values field
//! by field from an [`EncodeSource`] and [`decode`] pushes each present
//! field into a [`DecodeSink`]. Both receive a [`FieldArg`] describing the
//! field being visited. The [`crate::value`] module provides ready-made
//! implementations over a dynamic value tree.

pub mod decoder;
pub mod encoder;
pub mod wire;

use crate::schema::{FieldKind, Type};

pub use decoder::decode;
pub use encoder::encode;

/// Context for one callback invocation.
#[derive(Debug, Clone, Copy)]
pub struct FieldArg<'a> {
    /// Field name.
    pub tagname: &'a str,
    /// Field tag.
    pub tagid: u16,
    /// Field kind, with the array flag stripped; array traversal is
    /// expressed through `index` instead.
    pub kind: FieldKind,
    /// The nested type for struct fields.
    pub subtype: Option<&'a Type>,
    /// 0 for scalars; 1-based element position in arrays; -1 marks an
    /// empty array on decode.
    pub index: i32,
    /// The map key sub-tag, -1 if unset.
    pub mainindex: i32,
    /// Decimal scale for integers, 1 for binary strings, 0 otherwise.
    pub extra: i64,
    /// Key field name when the field is a map.
    pub ktagname: Option<&'a str>,
    /// Value field name when the field is a map.
    pub vtagname: Option<&'a str>,
}

/// What an [`EncodeSource`] produced for one field slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Put {
    /// The field is absent (for arrays: end of elements).
    Nil,
    /// The whole array is absent; do not encode the field at all.
    NoArray,
    /// An integer value; the encoder chooses the wire width.
    Int(i64),
    /// A boolean value.
    Bool(bool),
    /// A double value.
    Double(f64),
    /// `n` bytes were written into the supplied window.
    Bytes(usize),
}

/// A borrowed view of one decoded field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View<'a> {
    /// Empty-array marker, delivered with `index == -1`.
    Nil,
    /// Integer, sign-extended to 64 bits when wire width was 4 bytes.
    Int(i64),
    Bool(bool),
    Double(f64),
    /// String or binary content.
    Bytes(&'a [u8]),
    /// A nested record; the sink decodes it against `arg.subtype`.
    Struct(&'a [u8]),
}

/// Pull side of the codec: supplies field values during [`encode`].
///
/// For string, binary and struct kinds the source writes the payload into
/// `out` and answers [`Put::Bytes`]; numeric kinds ignore `out`. Returning
/// an error aborts the encode.
pub trait EncodeSource {
    fn field_out(
        &mut self,
        arg: &FieldArg<'_>,
        out: &mut [u8],
    ) -> Result<Put, crate::error::EncodeError>;
}

/// Push side of the codec: receives field values during [`decode`].
///
/// Returning an error aborts the decode.
pub trait DecodeSink {
    fn field_in(
        &mut self,
        arg: &FieldArg<'_>,
        value: View<'_>,
    ) -> Result<(), crate::error::DecodeError>;
}

/// Build the callback context for a field, resolving names and map
/// companions through the schema.
pub(crate) fn field_arg<'a>(
    schema: &'a crate::schema::Schema,
    field: &'a crate::schema::Field,
) -> FieldArg<'a> {
    let subtype = schema.subtype(field);
    let (ktagname, vtagname) = match subtype {
        Some(st) if field.map && st.fields.len() >= 2 => (
            Some(st.fields[0].name(schema)),
            Some(st.fields[1].name(schema)),
        ),
        _ => (None, None),
    };
    FieldArg {
        tagname: field.name(schema),
        tagid: field.tag,
        kind: field.kind,
        subtype,
        index: 0,
        mainindex: field.key,
        extra: field.extra(),
        ktagname,
        vtagname,
    }
}
