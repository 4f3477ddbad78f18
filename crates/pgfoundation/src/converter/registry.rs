//! Codec registry: codec names and the wire types they handle.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use pgfoundation_core::error::{ConverterError, Error, FoundationErrorKind, Result};

use super::{
    ARRAY_TYPE, ArrayCodec, BooleanCodec, BoxCodec, ByteaCodec, CircleCodec, Codec,
    HstoreCodec, IntervalCodec, JsonCodec, LtreeCodec, NumberCodec, PointCodec, RangeCodec,
    SegmentCodec, StringCodec, TimestampCodec,
};

/// Maps codec names to codecs and wire type names to codec names.
///
/// A codec name is registered once unless an override is requested. A wire
/// type belongs to the last codec it was assigned to.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Rc<dyn Codec>>,
    types: BTreeMap<String, String>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converter_names())
            .field("types", &self.types)
            .finish()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("Array", Rc::new(ArrayCodec), &[ARRAY_TYPE]);
        registry.insert("Boolean", Rc::new(BooleanCodec), &["bool"]);
        registry.insert(
            "Number",
            Rc::new(NumberCodec),
            &["int2", "int4", "int8", "oid", "numeric", "float4", "float8"],
        );
        registry.insert(
            "String",
            Rc::new(StringCodec),
            &[
                "varchar", "char", "bpchar", "text", "uuid", "tsvector", "xml", "name",
                "regclass", "inet", "cidr", "macaddr", "timetz",
            ],
        );
        registry.insert(
            "Timestamp",
            Rc::new(TimestampCodec),
            &["timestamp", "timestamptz", "date", "time"],
        );
        registry.insert("Interval", Rc::new(IntervalCodec), &["interval"]);
        registry.insert("Binary", Rc::new(ByteaCodec), &["bytea"]);
        registry.insert("JSON", Rc::new(JsonCodec), &["json", "jsonb"]);
        registry.insert("Point", Rc::new(PointCodec), &["point"]);
        registry.insert("Circle", Rc::new(CircleCodec), &["circle"]);
        registry.insert("Box", Rc::new(BoxCodec), &["box"]);
        registry.insert("Segment", Rc::new(SegmentCodec), &["lseg"]);
        registry.insert(
            "NumberRange",
            Rc::new(RangeCodec::new()),
            &["int4range", "int8range", "numrange"],
        );
        registry.insert(
            "TsRange",
            Rc::new(RangeCodec::new()),
            &["tsrange", "tstzrange", "daterange"],
        );
        registry.insert("HStore", Rc::new(HstoreCodec), &["hstore"]);
        registry.insert("Ltree", Rc::new(LtreeCodec), &["ltree"]);
        registry
    }

    fn insert(&mut self, name: &str, codec: Rc<dyn Codec>, wire_types: &[&str]) {
        self.converters.insert(name.to_string(), codec);
        for wire_type in wire_types {
            self.types.insert((*wire_type).to_string(), name.to_string());
        }
    }

    /// Register `codec` under `name` and assign it `wire_types`.
    pub fn register(
        &mut self,
        name: &str,
        codec: Rc<dyn Codec>,
        wire_types: &[&str],
        allow_override: bool,
    ) -> Result<()> {
        if self.converters.contains_key(name) && !allow_override {
            return Err(Error::foundation(
                FoundationErrorKind::Duplicate,
                format!("a converter named '{name}' is already registered"),
            ));
        }
        tracing::debug!(converter = name, types = ?wire_types, "Registering converter");
        self.insert(name, codec, wire_types);
        Ok(())
    }

    /// Assign a wire type to an already registered codec.
    pub fn add_type_to_converter(&mut self, name: &str, wire_type: &str) -> Result<()> {
        if !self.converters.contains_key(name) {
            return Err(Error::Converter(ConverterError::new(
                wire_type,
                format!(
                    "no converter named '{name}' (known converters: {})",
                    self.converter_names().join(", ")
                ),
            )));
        }
        self.types.insert(wire_type.to_string(), name.to_string());
        Ok(())
    }

    pub fn resolve_by_type(&self, wire_type: &str) -> Result<Rc<dyn Codec>> {
        self.types
            .get(wire_type)
            .and_then(|name| self.converters.get(name))
            .cloned()
            .ok_or_else(|| {
                Error::Converter(ConverterError::new(
                    wire_type,
                    format!(
                        "no converter registered for type '{wire_type}' (known types: {})",
                        self.types().join(", ")
                    ),
                ))
            })
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Codec>> {
        self.converters.get(name).cloned()
    }

    /// Name of the codec handling `wire_type`.
    pub fn converter_name_for(&self, wire_type: &str) -> Option<&str> {
        self.types.get(wire_type).map(String::as_str)
    }

    pub fn has_type(&self, wire_type: &str) -> bool {
        self.types.contains_key(wire_type)
    }

    pub fn has_converter(&self, name: &str) -> bool {
        self.converters.contains_key(name)
    }

    /// Known wire types, sorted.
    pub fn types(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Registered codec names, sorted.
    pub fn converter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.converters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_common_types() {
        let registry = ConverterRegistry::with_defaults();
        for wire_type in ["bool", "int4", "numeric", "text", "timestamptz", "jsonb", "array", "tstzrange"] {
            assert!(registry.has_type(wire_type), "{wire_type}");
        }
        assert_eq!(registry.converter_name_for("int8"), Some("Number"));
        assert_eq!(registry.converter_name_for("timetz"), Some("String"));
        assert_eq!(registry.converter_name_for("daterange"), Some("TsRange"));
    }

    #[test]
    fn test_duplicate_name_requires_override() {
        let mut registry = ConverterRegistry::with_defaults();
        let err = registry
            .register("Number", Rc::new(StringCodec), &["money"], false)
            .unwrap_err();
        assert!(matches!(err, Error::Foundation(ref f) if f.kind == FoundationErrorKind::Duplicate));
        assert!(!registry.has_type("money"));

        registry
            .register("Number", Rc::new(StringCodec), &["money"], true)
            .unwrap();
        assert_eq!(registry.converter_name_for("money"), Some("Number"));
    }

    #[test]
    fn test_last_registration_wins_for_a_type() {
        let mut registry = ConverterRegistry::new();
        registry.register("A", Rc::new(StringCodec), &["citext"], false).unwrap();
        registry.register("B", Rc::new(StringCodec), &["citext"], false).unwrap();
        assert_eq!(registry.converter_name_for("citext"), Some("B"));
    }

    #[test]
    fn test_resolve_unknown_type_lists_known_types() {
        let mut registry = ConverterRegistry::new();
        registry.register("String", Rc::new(StringCodec), &["text", "varchar"], false).unwrap();
        let err = registry.resolve_by_type("geography").err().unwrap();
        match err {
            Error::Converter(e) => {
                assert_eq!(e.type_name, "geography");
                assert!(e.message.contains("known types: text, varchar"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_type_for_unknown_converter_fails() {
        let mut registry = ConverterRegistry::with_defaults();
        let err = registry.add_type_to_converter("Geo", "geography").unwrap_err();
        assert!(matches!(err, Error::Converter(_)));
        registry.add_type_to_converter("String", "citext").unwrap();
        assert_eq!(registry.converter_name_for("citext"), Some("String"));
    }
}
