//! Registered clients keyed by `(type, identifier)`.

use std::collections::HashMap;
use std::rc::Rc;

use pgfoundation_core::error::{Error, Result};

use super::Client;

/// At most one live client per `(type, identifier)`.
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<String, HashMap<String, Rc<dyn Client>>>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .clients
            .iter()
            .flat_map(|(t, ids)| ids.keys().map(move |id| format!("{t}:{id}")))
            .collect();
        keys.sort();
        f.debug_struct("ClientRegistry").field("clients", &keys).finish()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a client, returning the one it replaced. The replaced client
    /// is not shut down.
    pub fn add(&mut self, client: Rc<dyn Client>) -> Option<Rc<dyn Client>> {
        let client_type = client.client_type().to_string();
        let identifier = client.client_identifier().to_string();
        self.clients
            .entry(client_type)
            .or_default()
            .insert(identifier, client)
    }

    pub fn get(&self, client_type: &str, identifier: &str) -> Option<Rc<dyn Client>> {
        self.clients
            .get(client_type)
            .and_then(|ids| ids.get(identifier))
            .cloned()
    }

    pub fn has(&self, client_type: &str, identifier: &str) -> bool {
        self.clients
            .get(client_type)
            .is_some_and(|ids| ids.contains_key(identifier))
    }

    /// Detach a client without shutting it down.
    pub fn remove(&mut self, client_type: &str, identifier: &str) -> Option<Rc<dyn Client>> {
        let ids = self.clients.get_mut(client_type)?;
        let client = ids.remove(identifier);
        if ids.is_empty() {
            self.clients.remove(client_type);
        }
        client
    }

    /// Shut a client down and remove it; no-op when absent.
    pub fn clear(&mut self, client_type: &str, identifier: &str) -> Result<()> {
        match self.remove(client_type, identifier) {
            Some(client) => client.shutdown(),
            None => Ok(()),
        }
    }

    pub fn clients_of_type(&self, client_type: &str) -> Vec<Rc<dyn Client>> {
        self.clients
            .get(client_type)
            .map(|ids| ids.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn identifiers_of_type(&self, client_type: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .clients
            .get(client_type)
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the registry, handing back every client.
    pub fn take_all(&mut self) -> Vec<Rc<dyn Client>> {
        self.clients
            .drain()
            .flat_map(|(_, ids)| ids.into_values())
            .collect()
    }

    /// Shut down every client, collecting failures instead of stopping at
    /// the first one. The registry is empty afterwards.
    pub fn shutdown_all(&mut self) -> Vec<Error> {
        shutdown_clients(self.take_all())
    }
}

/// Shut down each client in turn and collect the failures.
pub fn shutdown_clients(clients: Vec<Rc<dyn Client>>) -> Vec<Error> {
    let mut errors = Vec::new();
    for client in clients {
        if let Err(e) = client.shutdown() {
            tracing::warn!(
                client_type = client.client_type(),
                identifier = client.client_identifier(),
                error = %e,
                "Client shutdown failed"
            );
            errors.push(e);
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientContext;
    use pgfoundation_core::error::FoundationErrorKind;
    use std::cell::Cell;

    struct Counted {
        client_type: &'static str,
        identifier: &'static str,
        context: ClientContext,
        shutdowns: Cell<usize>,
        fail: bool,
    }

    impl Counted {
        fn build(client_type: &'static str, identifier: &'static str, fail: bool) -> Rc<Self> {
            Rc::new(Self {
                client_type,
                identifier,
                context: ClientContext::new(),
                shutdowns: Cell::new(0),
                fail,
            })
        }

        fn new(client_type: &'static str, identifier: &'static str) -> Rc<Self> {
            Self::build(client_type, identifier, false)
        }

        fn failing(client_type: &'static str, identifier: &'static str) -> Rc<Self> {
            Self::build(client_type, identifier, true)
        }
    }

    impl Client for Counted {
        fn client_type(&self) -> &str {
            self.client_type
        }

        fn client_identifier(&self) -> &str {
            self.identifier
        }

        fn context(&self) -> &ClientContext {
            &self.context
        }

        fn shutdown(&self) -> Result<()> {
            self.shutdowns.set(self.shutdowns.get() + 1);
            if self.fail {
                Err(Error::foundation(
                    FoundationErrorKind::Unsupported,
                    format!("{} refuses to stop", self.identifier),
                ))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_get_absent_is_none() {
        let mut registry = ClientRegistry::new();
        assert!(registry.get("query", "a").is_none());
        registry.add(Counted::new("query", "a"));
        assert!(registry.get("query", "b").is_none());
        assert!(registry.get("observer", "a").is_none());
    }

    #[test]
    fn test_add_then_get_is_identical() {
        let mut registry = ClientRegistry::new();
        let client = Counted::new("query", "a");
        registry.add(client.clone());
        let found = registry.get("query", "a").unwrap();
        assert!(Rc::ptr_eq(&found, &(client as Rc<dyn Client>)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_replaces_without_shutdown() {
        let mut registry = ClientRegistry::new();
        let first = Counted::new("query", "a");
        registry.add(first.clone());
        let replaced = registry.add(Counted::new("query", "a"));
        assert!(replaced.is_some());
        assert_eq!(first.shutdowns.get(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_shuts_down_once_and_removes() {
        let mut registry = ClientRegistry::new();
        let client = Counted::new("query", "a");
        registry.add(client.clone());

        registry.clear("query", "a").unwrap();
        assert_eq!(client.shutdowns.get(), 1);
        assert!(registry.get("query", "a").is_none());

        // absent: no-op
        registry.clear("query", "a").unwrap();
        assert_eq!(client.shutdowns.get(), 1);
    }

    #[test]
    fn test_shutdown_all_attempts_every_client() {
        let mut registry = ClientRegistry::new();
        let a = Counted::new("query", "a");
        let bad = Counted::failing("observer", "bad");
        let c = Counted::new("listener", "c");
        registry.add(a.clone());
        registry.add(bad.clone());
        registry.add(c.clone());

        let errors = registry.shutdown_all();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("bad refuses to stop"));
        assert_eq!(a.shutdowns.get(), 1);
        assert_eq!(bad.shutdowns.get(), 1);
        assert_eq!(c.shutdowns.get(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clients_of_type() {
        let mut registry = ClientRegistry::new();
        registry.add(Counted::new("query", "b"));
        registry.add(Counted::new("query", "a"));
        registry.add(Counted::new("listener", "a"));
        assert_eq!(registry.clients_of_type("query").len(), 2);
        assert_eq!(registry.identifiers_of_type("query"), vec!["a", "b"]);
        assert!(registry.clients_of_type("inspector").is_empty());
    }
}
