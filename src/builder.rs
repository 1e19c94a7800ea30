//! Programmatic schema assembly.
//!
//! [`SchemaBuilder`] is the in-process counterpart of the external schema
//! compiler: it takes descriptor definitions, runs the same validation and
//! layout computation as the bundle loader, and produces an immutable
//! [`Schema`].

use crate::arena::Arena;
use crate::error::SchemaError;
use crate::schema::{compute_layout, Field, FieldKind, Protocol, Schema, Type};

/// Definition of one field, fed to [`SchemaBuilder::add_field`].
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    tag: u16,
    kind: FieldKind,
    array: bool,
    key: i32,
    map: bool,
    decimal_digits: u32,
}

impl FieldDef {
    pub fn new(name: &str, tag: u16, kind: FieldKind) -> Self {
        FieldDef {
            name: name.to_string(),
            tag,
            kind,
            array: false,
            key: -1,
            map: false,
            decimal_digits: 0,
        }
    }

    /// Mark the field as an array.
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Set the key sub-tag for indexed struct arrays.
    pub fn key(mut self, tag: u16) -> Self {
        self.key = tag as i32;
        self
    }

    /// Present the struct-array as a key→value map.
    pub fn map(mut self) -> Self {
        self.map = true;
        self
    }

    /// Fixed-point integer with `digits` decimal digits.
    pub fn decimal(mut self, digits: u32) -> Self {
        self.decimal_digits = digits;
        self
    }
}

#[derive(Debug)]
struct ProtocolDef {
    name: String,
    tag: u16,
    request: Option<usize>,
    response: Option<usize>,
    confirm: bool,
}

/// Assembles a [`Schema`] from descriptor definitions.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<(String, Vec<FieldDef>)>,
    protocols: Vec<ProtocolDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type and return its index, used for struct field kinds
    /// and protocol references. Types may reference later indices.
    pub fn add_type(&mut self, name: &str) -> usize {
        self.types.push((name.to_string(), Vec::new()));
        self.types.len() - 1
    }

    /// Add a field to a previously declared type.
    pub fn add_field(&mut self, type_index: usize, def: FieldDef) -> &mut Self {
        self.types[type_index].1.push(def);
        self
    }

    /// Declare a protocol. `request`/`response` are type indices.
    pub fn add_protocol(
        &mut self,
        name: &str,
        tag: u16,
        request: Option<usize>,
        response: Option<usize>,
        confirm: bool,
    ) -> &mut Self {
        self.protocols.push(ProtocolDef {
            name: name.to_string(),
            tag,
            request,
            response,
            confirm,
        });
        self
    }

    /// Validate everything and produce the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut arena = Arena::new();
        let mut types = Vec::with_capacity(self.types.len());

        for (name, mut defs) in self.types {
            defs.sort_by_key(|d| d.tag);
            for pair in defs.windows(2) {
                if pair[0].tag == pair[1].tag {
                    return Err(SchemaError::DuplicateTag {
                        type_name: name,
                        tag: pair[0].tag,
                    });
                }
            }

            let mut fields = Vec::with_capacity(defs.len());
            for def in defs {
                let decimal = if def.kind == FieldKind::Integer && def.decimal_digits > 0 {
                    pow10(def.decimal_digits).ok_or_else(|| {
                        SchemaError::Invalid(format!(
                            "decimal scale 10^{} overflows on field '{}'",
                            def.decimal_digits, def.name
                        ))
                    })?
                } else {
                    0
                };
                fields.push(Field {
                    name: arena.intern_str(&def.name),
                    tag: def.tag,
                    kind: def.kind,
                    array: def.array,
                    key: def.key,
                    map: def.map,
                    decimal,
                });
            }

            let (base, maxn) = compute_layout(&fields);
            types.push(Type {
                name: arena.intern_str(&name),
                fields,
                base,
                maxn,
            });
        }

        let protocols = self
            .protocols
            .into_iter()
            .map(|def| Protocol {
                name: arena.intern_str(&def.name),
                tag: def.tag,
                request: def.request,
                response: def.response,
                confirm: def.confirm,
            })
            .collect();

        finish(arena, types, protocols)
    }
}

/// 10^k with overflow detection.
pub(crate) fn pow10(k: u32) -> Option<i64> {
    10i64.checked_pow(k)
}

/// Shared final step of the builder and the bundle loader: reference and
/// map/key validation, protocol ordering, schema assembly.
pub(crate) fn finish(
    arena: Arena,
    types: Vec<Type>,
    mut protocols: Vec<Protocol>,
) -> Result<Schema, SchemaError> {
    let count = types.len();

    for t in &types {
        for f in &t.fields {
            if let FieldKind::Struct(idx) = f.kind {
                if idx >= count {
                    return Err(SchemaError::TypeIndexOutOfRange { index: idx, count });
                }
            }
            if f.map || f.key >= 0 {
                let ok = f.array
                    && match f.kind {
                        FieldKind::Struct(idx) => {
                            let st = &types[idx];
                            let key_ok = f.key >= 0
                                && st.fields.iter().any(|sf| sf.tag as i32 == f.key);
                            key_ok && (!f.map || st.fields.len() >= 2)
                        }
                        _ => false,
                    };
                if !ok {
                    return Err(SchemaError::InvalidMapField {
                        type_name: arena.text(t.name).to_string(),
                        field_name: arena.text(f.name).to_string(),
                    });
                }
            }
        }
    }

    protocols.sort_by_key(|p| p.tag);
    for pair in protocols.windows(2) {
        if pair[0].tag == pair[1].tag {
            return Err(SchemaError::DuplicateProtocolTag {
                tag: pair[1].tag,
                name: arena.text(pair[1].name).to_string(),
            });
        }
    }
    for p in &protocols {
        for idx in [p.request, p.response].into_iter().flatten() {
            if idx >= count {
                return Err(SchemaError::TypeIndexOutOfRange { index: idx, count });
            }
        }
    }

    Ok(Schema {
        arena,
        types,
        protocols,
    })
}
