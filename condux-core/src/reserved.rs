//! Reserved-field check for provider state
//!
//! A provider value pairs the state with its `dispatch` handle, so a state
//! that already serializes with a top-level `dispatch` field is rejected.
//!
//! Only the top level is inspected: struct field names, map keys and the tag
//! of externally tagged enum variants. Nested values are never serialized, so
//! states that no text format can represent (e.g. maps keyed by tuples) pass.

use serde::ser::{self, Serialize};

use crate::error::Error;

/// Field name reserved for the dispatch handle.
pub const RESERVED_FIELD: &str = "dispatch";

/// Reject states that serialize with a top-level `dispatch` field.
///
/// ```
/// use condux_core::{check_reserved, Error};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Bad {
///     dispatch: u8,
/// }
///
/// assert!(check_reserved(&42).is_ok());
/// assert!(matches!(
///     check_reserved(&Bad { dispatch: 1 }),
///     Err(Error::ReservedFieldConflict)
/// ));
/// ```
pub fn check_reserved<S: Serialize + ?Sized>(state: &S) -> Result<(), Error> {
    if state.serialize(TopLevelKeys)? {
        Err(Error::ReservedFieldConflict)
    } else {
        Ok(())
    }
}

fn is_reserved<K: Serialize + ?Sized>(key: &K) -> bool {
    // Keys that are not strings can never name the field
    matches!(
        serde_json::to_value(key),
        Ok(serde_json::Value::String(name)) if name == RESERVED_FIELD
    )
}

/// Serializer answering "does the top level define the reserved field?".
struct TopLevelKeys;

/// Compound collector: remembers whether the reserved key was seen and
/// ignores every value.
struct Scan {
    found: bool,
}

impl Scan {
    fn new(found: bool) -> Self {
        Self { found }
    }
}

type Found = Result<bool, serde_json::Error>;

impl ser::Serializer for TopLevelKeys {
    type Ok = bool;
    type Error = serde_json::Error;

    type SerializeSeq = Scan;
    type SerializeTuple = Scan;
    type SerializeTupleStruct = Scan;
    type SerializeTupleVariant = Scan;
    type SerializeMap = Scan;
    type SerializeStruct = Scan;
    type SerializeStructVariant = Scan;

    fn serialize_bool(self, _v: bool) -> Found {
        Ok(false)
    }

    fn serialize_i8(self, _v: i8) -> Found {
        Ok(false)
    }

    fn serialize_i16(self, _v: i16) -> Found {
        Ok(false)
    }

    fn serialize_i32(self, _v: i32) -> Found {
        Ok(false)
    }

    fn serialize_i64(self, _v: i64) -> Found {
        Ok(false)
    }

    fn serialize_i128(self, _v: i128) -> Found {
        Ok(false)
    }

    fn serialize_u8(self, _v: u8) -> Found {
        Ok(false)
    }

    fn serialize_u16(self, _v: u16) -> Found {
        Ok(false)
    }

    fn serialize_u32(self, _v: u32) -> Found {
        Ok(false)
    }

    fn serialize_u64(self, _v: u64) -> Found {
        Ok(false)
    }

    fn serialize_u128(self, _v: u128) -> Found {
        Ok(false)
    }

    fn serialize_f32(self, _v: f32) -> Found {
        Ok(false)
    }

    fn serialize_f64(self, _v: f64) -> Found {
        Ok(false)
    }

    fn serialize_char(self, _v: char) -> Found {
        Ok(false)
    }

    fn serialize_str(self, _v: &str) -> Found {
        Ok(false)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Found {
        Ok(false)
    }

    fn serialize_none(self) -> Found {
        Ok(false)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Found {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Found {
        Ok(false)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Found {
        Ok(false)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Found {
        Ok(false)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Found {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _value: &T,
    ) -> Found {
        Ok(variant == RESERVED_FIELD)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Scan, serde_json::Error> {
        Ok(Scan::new(false))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Scan, serde_json::Error> {
        Ok(Scan::new(false))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Scan, serde_json::Error> {
        Ok(Scan::new(false))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Scan, serde_json::Error> {
        Ok(Scan::new(variant == RESERVED_FIELD))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Scan, serde_json::Error> {
        Ok(Scan::new(false))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Scan, serde_json::Error> {
        Ok(Scan::new(false))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Scan, serde_json::Error> {
        Ok(Scan::new(variant == RESERVED_FIELD))
    }
}

impl ser::SerializeSeq for Scan {
    type Ok = bool;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Found {
        Ok(self.found)
    }
}

impl ser::SerializeTuple for Scan {
    type Ok = bool;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Found {
        Ok(self.found)
    }
}

impl ser::SerializeTupleStruct for Scan {
    type Ok = bool;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Found {
        Ok(self.found)
    }
}

impl ser::SerializeTupleVariant for Scan {
    type Ok = bool;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Found {
        Ok(self.found)
    }
}

impl ser::SerializeMap for Scan {
    type Ok = bool;
    type Error = serde_json::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        self.found |= is_reserved(key);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Found {
        Ok(self.found)
    }
}

impl ser::SerializeStruct for Scan {
    type Ok = bool;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        _value: &T,
    ) -> Result<(), Self::Error> {
        self.found |= key == RESERVED_FIELD;
        Ok(())
    }

    fn end(self) -> Found {
        Ok(self.found)
    }
}

impl ser::SerializeStructVariant for Scan {
    type Ok = bool;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end(self) -> Found {
        Ok(self.found)
    }
}
