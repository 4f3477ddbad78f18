use std::rc::Rc;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};

use super::{Pooler, PoolerContext};
use crate::client::{Client, client_type};
use crate::inspector::Inspector;

const DEFAULT_INSPECTOR: &str = "default";

#[derive(Debug, Default)]
pub struct InspectorPooler {
    context: PoolerContext,
}

impl InspectorPooler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pooler for InspectorPooler {
    fn pooler_type(&self) -> &str {
        client_type::INSPECTOR
    }

    fn context(&self) -> &PoolerContext {
        &self.context
    }

    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>> {
        let identifier = match identifier {
            "" | DEFAULT_INSPECTOR => DEFAULT_INSPECTOR,
            other => {
                return Err(Error::foundation(
                    FoundationErrorKind::UnknownClient,
                    format!("unknown inspector '{other}' (expected '{DEFAULT_INSPECTOR}')"),
                ));
            }
        };
        self.context
            .get_or_create(client_type::INSPECTOR, identifier, |_| {
                Ok(Rc::new(Inspector::new(identifier)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};

    #[test]
    fn test_empty_and_default_share_one_inspector() {
        let session = default_session(&MockConnector::new());
        let implicit = session.get_client_via_pooler(client_type::INSPECTOR, "").unwrap();
        let named = session.get_client_via_pooler(client_type::INSPECTOR, "default").unwrap();
        assert!(Rc::ptr_eq(&implicit, &named));
        assert_eq!(session.clients_of_type(client_type::INSPECTOR).len(), 1);
    }

    #[test]
    fn test_unknown_inspector_is_rejected() {
        let session = default_session(&MockConnector::new());
        let err = session
            .get_client_via_pooler(client_type::INSPECTOR, "legacy")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Foundation(ref f) if f.kind == FoundationErrorKind::UnknownClient));
        assert!(!session.has_client(client_type::INSPECTOR, "legacy"));
    }
}
