//! Shared test support: the self-describing meta-schema and a bundle
//! writer built on it, mirroring how the external schema compiler emits
//! metadata blobs.

#![allow(dead_code)]

use sproto_core::value::{self, Value};
use sproto_core::{FieldDef, FieldKind, Schema, SchemaBuilder};

/// The schema of schemas: what a metadata bundle is encoded against.
pub fn meta_schema() -> Schema {
    let mut b = SchemaBuilder::new();
    let field = b.add_type("field");
    let ty = b.add_type("type");
    let protocol = b.add_type("protocol");
    let group = b.add_type("group");

    b.add_field(field, FieldDef::new("name", 0, FieldKind::String));
    b.add_field(field, FieldDef::new("buildin", 1, FieldKind::Integer));
    b.add_field(field, FieldDef::new("type", 2, FieldKind::Integer));
    b.add_field(field, FieldDef::new("tag", 3, FieldKind::Integer));
    b.add_field(field, FieldDef::new("array", 4, FieldKind::Boolean));
    b.add_field(field, FieldDef::new("key", 5, FieldKind::Integer));
    b.add_field(field, FieldDef::new("map", 6, FieldKind::Boolean));

    b.add_field(ty, FieldDef::new("name", 0, FieldKind::String));
    b.add_field(ty, FieldDef::new("fields", 1, FieldKind::Struct(field)).array());

    b.add_field(protocol, FieldDef::new("name", 0, FieldKind::String));
    b.add_field(protocol, FieldDef::new("tag", 1, FieldKind::Integer));
    b.add_field(protocol, FieldDef::new("request", 2, FieldKind::Integer));
    b.add_field(protocol, FieldDef::new("response", 3, FieldKind::Integer));
    b.add_field(protocol, FieldDef::new("confirm", 4, FieldKind::Boolean));

    b.add_field(group, FieldDef::new("type", 0, FieldKind::Struct(ty)).array());
    b.add_field(
        group,
        FieldDef::new("protocol", 1, FieldKind::Struct(protocol)).array(),
    );

    b.build().expect("meta schema builds")
}

/// Field description destined for a bundle.
#[derive(Clone)]
pub struct FieldDesc {
    pub name: &'static str,
    pub builtin: Option<i64>,
    pub type_index: Option<i64>,
    pub tag: i64,
    pub array: bool,
    pub key: Option<i64>,
    pub map: bool,
}

impl FieldDesc {
    pub fn builtin(name: &'static str, tag: i64, id: i64) -> Self {
        FieldDesc {
            name,
            builtin: Some(id),
            type_index: None,
            tag,
            array: false,
            key: None,
            map: false,
        }
    }

    pub fn integer(name: &'static str, tag: i64) -> Self {
        Self::builtin(name, tag, 0)
    }

    pub fn boolean(name: &'static str, tag: i64) -> Self {
        Self::builtin(name, tag, 1)
    }

    pub fn string(name: &'static str, tag: i64) -> Self {
        Self::builtin(name, tag, 2)
    }

    pub fn binary(name: &'static str, tag: i64) -> Self {
        let mut f = Self::builtin(name, tag, 2);
        f.type_index = Some(1);
        f
    }

    pub fn double(name: &'static str, tag: i64) -> Self {
        Self::builtin(name, tag, 3)
    }

    pub fn decimal(name: &'static str, tag: i64, digits: i64) -> Self {
        let mut f = Self::builtin(name, tag, 0);
        f.type_index = Some(digits);
        f
    }

    pub fn struct_ref(name: &'static str, tag: i64, type_index: i64) -> Self {
        FieldDesc {
            name,
            builtin: None,
            type_index: Some(type_index),
            tag,
            array: false,
            key: None,
            map: false,
        }
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn key(mut self, tag: i64) -> Self {
        self.key = Some(tag);
        self
    }

    pub fn map(mut self) -> Self {
        self.map = true;
        self
    }

    pub fn to_value(&self) -> Value {
        let mut kv: Vec<(&str, Value)> = vec![
            ("name", self.name.into()),
            ("tag", Value::Integer(self.tag)),
        ];
        if let Some(b) = self.builtin {
            kv.push(("buildin", Value::Integer(b)));
        }
        if let Some(t) = self.type_index {
            kv.push(("type", Value::Integer(t)));
        }
        if self.array {
            kv.push(("array", Value::Boolean(true)));
        }
        if let Some(k) = self.key {
            kv.push(("key", Value::Integer(k)));
        }
        if self.map {
            kv.push(("map", Value::Boolean(true)));
        }
        Value::from_fields(kv)
    }
}

/// Type description destined for a bundle.
pub struct TypeDesc {
    pub name: &'static str,
    pub fields: Vec<FieldDesc>,
}

impl TypeDesc {
    pub fn new(name: &'static str, fields: Vec<FieldDesc>) -> Self {
        TypeDesc { name, fields }
    }

    pub fn to_value(&self) -> Value {
        let mut kv: Vec<(&str, Value)> = vec![("name", self.name.into())];
        if !self.fields.is_empty() {
            kv.push((
                "fields",
                Value::Array(self.fields.iter().map(|f| f.to_value()).collect()),
            ));
        }
        Value::from_fields(kv)
    }
}

/// Protocol description destined for a bundle.
pub struct ProtoDesc {
    pub name: &'static str,
    pub tag: i64,
    pub request: Option<i64>,
    pub response: Option<i64>,
    pub confirm: bool,
}

impl ProtoDesc {
    pub fn to_value(&self) -> Value {
        let mut kv: Vec<(&str, Value)> = vec![
            ("name", self.name.into()),
            ("tag", Value::Integer(self.tag)),
        ];
        if let Some(r) = self.request {
            kv.push(("request", Value::Integer(r)));
        }
        if let Some(r) = self.response {
            kv.push(("response", Value::Integer(r)));
        }
        if self.confirm {
            kv.push(("confirm", Value::Boolean(true)));
        }
        Value::from_fields(kv)
    }
}

/// Serialize a group value against the meta-schema.
pub fn encode_group(group: &Value) -> Vec<u8> {
    let meta = meta_schema();
    let group_type = meta.type_by_name("group").expect("group type");
    value::encode(&meta, group_type, group).expect("group encodes")
}

/// Emit a metadata bundle for the described schema.
pub fn build_bundle(types: &[TypeDesc], protocols: &[ProtoDesc]) -> Vec<u8> {
    let mut kv: Vec<(&str, Value)> = vec![(
        "type",
        Value::Array(types.iter().map(|t| t.to_value()).collect()),
    )];
    if !protocols.is_empty() {
        kv.push((
            "protocol",
            Value::Array(protocols.iter().map(|p| p.to_value()).collect()),
        ));
    }
    encode_group(&Value::from_fields(kv))
}

/// A bundle for an address-book style schema exercising every field kind.
pub fn address_book_bundle() -> Vec<u8> {
    // type indices: 0 = PhoneNumber, 1 = Person, 2 = AddressBook
    build_bundle(
        &[
            TypeDesc::new(
                "PhoneNumber",
                vec![
                    FieldDesc::string("number", 0),
                    FieldDesc::integer("kind", 1),
                ],
            ),
            TypeDesc::new(
                "Person",
                vec![
                    FieldDesc::string("name", 0),
                    FieldDesc::integer("id", 1),
                    FieldDesc::string("email", 2),
                    FieldDesc::struct_ref("phone", 3, 0).array(),
                    FieldDesc::boolean("married", 5),
                    FieldDesc::decimal("height", 6, 2),
                    FieldDesc::binary("avatar", 7),
                    FieldDesc::double("score", 8),
                ],
            ),
            TypeDesc::new(
                "AddressBook",
                vec![
                    FieldDesc::struct_ref("person", 0, 1).array().key(1),
                    FieldDesc::string("city", 1),
                ],
            ),
        ],
        &[
            ProtoDesc {
                name: "get",
                tag: 1,
                request: Some(1),
                response: Some(2),
                confirm: false,
            },
            ProtoDesc {
                name: "put",
                tag: 2,
                request: Some(1),
                response: None,
                confirm: true,
            },
            ProtoDesc {
                name: "ping",
                tag: 5,
                request: None,
                response: None,
                confirm: false,
            },
        ],
    )
}
