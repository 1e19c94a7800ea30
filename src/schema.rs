//! Descriptor model: schema root, types, fields and protocols.
//!
//! A [`Schema`] is immutable after construction and owns all descriptor
//! storage through its arena, so it can be shared freely between threads.

use std::fmt;

use crate::arena::{Arena, Text};

/// The kind of a field, without the orthogonal array flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Boolean,
    String,
    /// Raw byte string (the STRING wire kind with the binary flag set).
    Binary,
    Double,
    /// A user-defined struct type; the value indexes into [`Schema::types`].
    Struct(usize),
}

impl FieldKind {
    /// Short name used in dumps and error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::String => "string",
            FieldKind::Binary => "binary",
            FieldKind::Double => "double",
            FieldKind::Struct(_) => "struct",
        }
    }
}

/// A field definition within a type.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: Text,
    /// Field tag, unique within the type.
    pub tag: u16,
    pub kind: FieldKind,
    /// Whether this field is an array.
    pub array: bool,
    /// For maps and indexed arrays: the tag of the key field in the
    /// subtype, -1 if unset.
    pub key: i32,
    /// Present the struct-array as a key→value map on decode.
    pub map: bool,
    /// For fixed-point integers: the 10^k scale factor, 0 when plain.
    pub decimal: i64,
}

impl Field {
    /// Field name, resolved through the owning schema.
    pub fn name<'s>(&self, schema: &'s Schema) -> &'s str {
        schema.arena.text(self.name)
    }

    /// The `extra` value of the callback contract: the decimal scale for
    /// integers, 1 for binary strings, 0 otherwise.
    pub fn extra(&self) -> i64 {
        match self.kind {
            FieldKind::Integer => self.decimal,
            FieldKind::Binary => 1,
            _ => 0,
        }
    }
}

/// A user-defined type (message) in the schema.
#[derive(Debug, Clone)]
pub struct Type {
    pub(crate) name: Text,
    /// Fields sorted by strictly ascending tag.
    pub fields: Vec<Field>,
    /// If tags are contiguous starting at `fields[0].tag`, that tag;
    /// -1 when lookup must fall back to binary search.
    pub base: i32,
    /// Header slots needed to encode every field: field count plus one
    /// skip slot per tag discontinuity.
    pub maxn: usize,
}

impl Type {
    /// Type name, resolved through the owning schema.
    pub fn name<'s>(&self, schema: &'s Schema) -> &'s str {
        schema.arena.text(self.name)
    }

    /// Find a field by tag, by direct offset when tags are dense and by
    /// binary search otherwise.
    pub fn field_by_tag(&self, tag: u16) -> Option<&Field> {
        if self.base >= 0 {
            let idx = tag as i32 - self.base;
            if idx < 0 || idx as usize >= self.fields.len() {
                return None;
            }
            Some(&self.fields[idx as usize])
        } else {
            self.fields
                .binary_search_by_key(&tag, |f| f.tag)
                .ok()
                .map(|idx| &self.fields[idx])
        }
    }

    /// Find a field by name.
    pub fn field_by_name<'s>(&'s self, schema: &Schema, name: &str) -> Option<&'s Field> {
        self.fields.iter().find(|f| f.name(schema) == name)
    }
}

/// Which side of a protocol to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolSide {
    Request,
    Response,
}

/// A protocol definition for RPC.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub(crate) name: Text,
    /// Protocol tag number.
    pub tag: u16,
    /// Index into [`Schema::types`] for the request type, if any.
    pub request: Option<usize>,
    /// Index into [`Schema::types`] for the response type, if any.
    pub response: Option<usize>,
    /// An empty reply is still expected when the response type is absent.
    pub confirm: bool,
}

impl Protocol {
    /// Protocol name, resolved through the owning schema.
    pub fn name<'s>(&self, schema: &'s Schema) -> &'s str {
        schema.arena.text(self.name)
    }
}

/// The schema root: all types and protocols plus the arena that owns
/// their names.
#[derive(Debug)]
pub struct Schema {
    pub(crate) arena: Arena,
    /// All types in bundle order; struct fields reference these by index.
    pub types: Vec<Type>,
    /// All protocols, sorted by ascending tag.
    pub protocols: Vec<Protocol>,
}

impl Schema {
    /// Look up a type by name.
    pub fn type_by_name(&self, name: &str) -> Option<&Type> {
        self.types.iter().find(|t| t.name(self) == name)
    }

    /// Index of a type by name, for wiring struct references.
    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.name(self) == name)
    }

    /// The subtype of a struct field, if any.
    pub fn subtype(&self, field: &Field) -> Option<&Type> {
        match field.kind {
            FieldKind::Struct(idx) => self.types.get(idx),
            _ => None,
        }
    }

    /// Look up a protocol by name.
    pub fn protocol_by_name(&self, name: &str) -> Option<&Protocol> {
        self.protocols.iter().find(|p| p.name(self) == name)
    }

    /// Look up a protocol by tag (binary search over the sorted vector).
    pub fn protocol_by_tag(&self, tag: u16) -> Option<&Protocol> {
        self.protocols
            .binary_search_by_key(&tag, |p| p.tag)
            .ok()
            .map(|idx| &self.protocols[idx])
    }

    /// Tag of the named protocol.
    pub fn protocol_tag(&self, name: &str) -> Option<u16> {
        self.protocol_by_name(name).map(|p| p.tag)
    }

    /// Name of the protocol with the given tag.
    pub fn protocol_name(&self, tag: u16) -> Option<&str> {
        self.protocol_by_tag(tag).map(|p| p.name(self))
    }

    /// Request or response type of the protocol with the given tag.
    pub fn protocol_query(&self, tag: u16, side: ProtocolSide) -> Option<&Type> {
        let p = self.protocol_by_tag(tag)?;
        let idx = match side {
            ProtocolSide::Request => p.request?,
            ProtocolSide::Response => p.response?,
        };
        self.types.get(idx)
    }

    /// Whether the protocol produces a reply: a response type is present
    /// or the confirm flag is set.
    pub fn protocol_has_response(&self, tag: u16) -> bool {
        self.protocol_by_tag(tag)
            .map(|p| p.response.is_some() || p.confirm)
            .unwrap_or(false)
    }
}

/// Compute the dense-lookup base and the encoded header slot count for a
/// tag-sorted field list.
pub(crate) fn compute_layout(fields: &[Field]) -> (i32, usize) {
    if fields.is_empty() {
        return (-1, 0);
    }

    let n = fields.len();
    let mut maxn = n;
    // the running tag starts at -1, so a first tag above 0 also needs a
    // skip slot
    let mut last: i32 = -1;
    for f in fields {
        let tag = f.tag as i32;
        if tag > last + 1 {
            maxn += 1;
        }
        last = tag;
    }

    let base = fields[0].tag as i32;
    let span = fields[n - 1].tag as i32 - base + 1;
    let base = if span as usize != n { -1 } else { base };

    (base, maxn)
}

impl fmt::Display for Schema {
    /// Human-readable schema listing, for debugging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} types ===", self.types.len())?;
        for t in &self.types {
            writeln!(f, "{}", t.name(self))?;
            for fd in &t.fields {
                let container = if fd.array { "*" } else { "" };
                let kind_name = match fd.kind {
                    FieldKind::Struct(idx) => self
                        .types
                        .get(idx)
                        .map(|st| st.name(self))
                        .unwrap_or("invalid"),
                    other => other.describe(),
                };
                write!(f, "\t{} ({}) {}{}", fd.name(self), fd.tag, container, kind_name)?;
                if fd.kind == FieldKind::Integer && fd.decimal > 0 {
                    write!(f, "({})", fd.decimal)?;
                }
                if fd.key >= 0 {
                    write!(f, " key[{}]", fd.key)?;
                    if fd.map {
                        if let Some(st) = self.subtype(fd) {
                            if st.fields.len() > 1 {
                                write!(f, " value[{}]", st.fields[1].tag)?;
                            }
                        }
                    }
                }
                writeln!(f)?;
            }
        }

        writeln!(f, "=== {} protocol ===", self.protocols.len())?;
        for p in &self.protocols {
            let request = p
                .request
                .and_then(|idx| self.types.get(idx))
                .map(|t| t.name(self));
            match request {
                Some(name) => write!(f, "\t{} ({}) request:{}", p.name(self), p.tag, name)?,
                None => write!(f, "\t{} ({}) request:(null)", p.name(self), p.tag)?,
            }
            let response = p
                .response
                .and_then(|idx| self.types.get(idx))
                .map(|t| t.name(self));
            if let Some(name) = response {
                write!(f, " response:{}", name)?;
            } else if p.confirm {
                write!(f, " response nil")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
