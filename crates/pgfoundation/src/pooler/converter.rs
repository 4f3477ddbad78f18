use std::cell::RefCell;
use std::rc::Rc;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};

use super::{Pooler, PoolerContext};
use crate::client::{Client, client_type};
use crate::converter::{ARRAY_TYPE, Codec, ConverterClient, ConverterRegistry, array_element_type};

/// Creates one [`ConverterClient`] per wire type from a [`ConverterRegistry`].
///
/// Every array type (`_int4`, `text[]`) maps to the single `array` client.
pub struct ConverterPooler {
    context: PoolerContext,
    registry: RefCell<ConverterRegistry>,
}

impl ConverterPooler {
    pub fn new(registry: ConverterRegistry) -> Self {
        Self {
            context: PoolerContext::new(),
            registry: RefCell::new(registry),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConverterRegistry::with_defaults())
    }

    /// Register a codec after the session is built. Converter clients
    /// already created for `wire_types` are dropped so the next lookup
    /// picks the new codec.
    pub fn register_converter(
        &self,
        name: &str,
        codec: Rc<dyn Codec>,
        wire_types: &[&str],
        allow_override: bool,
    ) -> Result<()> {
        self.registry
            .borrow_mut()
            .register(name, codec, wire_types, allow_override)?;
        self.forget_clients(wire_types)
    }

    pub fn add_type_to_converter(&self, name: &str, wire_type: &str) -> Result<()> {
        self.registry.borrow_mut().add_type_to_converter(name, wire_type)?;
        self.forget_clients(&[wire_type])
    }

    /// Whether `wire_type` (or its element type, for arrays) has a codec.
    pub fn has_type(&self, wire_type: &str) -> bool {
        let registry = self.registry.borrow();
        match array_element_type(wire_type) {
            Some(element) => registry.has_type(ARRAY_TYPE) && registry.has_type(element),
            None => registry.has_type(wire_type),
        }
    }

    /// Known wire types, sorted.
    pub fn types(&self) -> Vec<String> {
        self.registry.borrow().types().into_iter().map(str::to_string).collect()
    }

    fn forget_clients(&self, wire_types: &[&str]) -> Result<()> {
        let Ok(session) = self.context.session() else {
            return Ok(());
        };
        for wire_type in wire_types {
            session.clear_client(client_type::CONVERTER, wire_type)?;
        }
        Ok(())
    }
}

impl Pooler for ConverterPooler {
    fn pooler_type(&self) -> &str {
        client_type::CONVERTER
    }

    fn context(&self) -> &PoolerContext {
        &self.context
    }

    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>> {
        let key = if array_element_type(identifier).is_some() {
            ARRAY_TYPE
        } else {
            identifier
        };
        if !self.registry.borrow().has_type(key) {
            return Err(Error::foundation(
                FoundationErrorKind::UnknownClient,
                format!(
                    "no converter for type '{identifier}' (known types: {})",
                    self.types().join(", ")
                ),
            ));
        }
        self.context.get_or_create(client_type::CONVERTER, key, |_| {
            let codec = self.registry.borrow().resolve_by_type(key)?;
            Ok(Rc::new(ConverterClient::new(key, codec)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::StringCodec;
    use crate::session::Session;
    use crate::testing::MockConnector;
    use pgfoundation_core::Value;

    fn session_with_converters() -> (Session, Rc<ConverterPooler>) {
        let session = Session::for_tests(&MockConnector::new());
        let pooler = Rc::new(ConverterPooler::with_defaults());
        session.register_pooler(pooler.clone()).unwrap();
        (session, pooler)
    }

    #[test]
    fn test_arrays_share_one_client() {
        let (session, _) = session_with_converters();
        let a = session.get_client_via_pooler("converter", "_int4").unwrap();
        let b = session.get_client_via_pooler("converter", "varchar[]").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.client_identifier(), "array");
    }

    #[test]
    fn test_unknown_type_lists_known_types() {
        let (session, pooler) = session_with_converters();
        let err = session.get_client_via_pooler("converter", "geography").err().unwrap();
        assert!(matches!(err, Error::Foundation(ref f) if f.kind == FoundationErrorKind::UnknownClient));
        assert!(err.to_string().contains("int4"));
        assert!(!pooler.has_type("geography"));
        assert!(pooler.has_type("_text"));
        assert!(!pooler.has_type("_geography"));
    }

    #[test]
    fn test_late_registration_replaces_client() {
        let (session, pooler) = session_with_converters();
        assert!(session.get_client_via_pooler("converter", "citext").is_err());
        pooler.add_type_to_converter("String", "citext").unwrap();
        assert_eq!(
            session.decode_value(Some("Hello"), "citext").unwrap(),
            Value::Text("Hello".into())
        );

        let before = session.get_client_via_pooler("converter", "money").ok();
        assert!(before.is_none());
        pooler
            .register_converter("Money", Rc::new(StringCodec), &["money", "int4"], false)
            .unwrap();
        assert_eq!(
            session.decode_value(Some("$1.00"), "money").unwrap(),
            Value::Text("$1.00".into())
        );
        // int4 is now a String type
        assert_eq!(
            session.decode_value(Some("12"), "int4").unwrap(),
            Value::Text("12".into())
        );
    }
}
