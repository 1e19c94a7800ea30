//! Schema-driven sproto binary codec.
//!
//! Message structures are described by a schema — loaded from a
//! self-describing metadata bundle or assembled with [`SchemaBuilder`] —
//! and instances are encoded and decoded against it at runtime. The codec
//! itself is callback-driven and commits to no host data model; the
//! [`value`] module layers a dynamic value tree on top for hosts that want
//! one. The independent [`pack`] module shrinks the typically zero-heavy
//! encoded payloads before transmission.
//!
//! # Quick Start
//!
//! ```rust
//! use sproto_core::{FieldDef, FieldKind, SchemaBuilder};
//! use sproto_core::value::{self, Value};
//!
//! let mut builder = SchemaBuilder::new();
//! let person = builder.add_type("Person");
//! builder.add_field(person, FieldDef::new("name", 0, FieldKind::String));
//! builder.add_field(person, FieldDef::new("age", 1, FieldKind::Integer));
//! let schema = builder.build().unwrap();
//!
//! let person_type = schema.type_by_name("Person").unwrap();
//! let message = Value::from_fields(vec![
//!     ("name", "Alice".into()),
//!     ("age", 30i64.into()),
//! ]);
//!
//! let encoded = value::encode(&schema, person_type, &message).unwrap();
//! let decoded = value::decode(&schema, person_type, &encoded).unwrap();
//! assert_eq!(message, decoded);
//! ```

pub mod arena;
pub mod builder;
pub mod bundle;
pub mod codec;
pub mod error;
pub mod pack;
pub mod schema;
pub mod value;

pub use builder::{FieldDef, SchemaBuilder};
pub use codec::{DecodeSink, EncodeSource, FieldArg, Put, View};
pub use error::{DecodeError, EncodeError, PackError, SchemaError, SprotoError};
pub use schema::{Field, FieldKind, Protocol, ProtocolSide, Schema, Type};
pub use value::Value;
