//! In-process event listeners.
//!
//! A [`Listener`] is a named sink for events raised inside the process,
//! such as the `query:pre` / `query:post` events of the query managers. An
//! event `prefix:suffix` reaches the listener named exactly after it and the
//! one named `prefix`.

use std::cell::RefCell;
use std::rc::Rc;

use pgfoundation_core::error::Result;

use crate::client::{Client, ClientContext, client_type};

/// Event callback: event name and JSON payload.
pub type ListenerCallback = Rc<dyn Fn(&str, &serde_json::Value)>;

pub struct Listener {
    name: String,
    callbacks: RefCell<Vec<ListenerCallback>>,
    context: ClientContext,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("callbacks", &self.callbacks.borrow().len())
            .finish()
    }
}

impl Listener {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callbacks: RefCell::new(Vec::new()),
            context: ClientContext::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attach(&self, callback: ListenerCallback) {
        self.callbacks.borrow_mut().push(callback);
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Call every attached callback in attachment order.
    ///
    /// Callbacks may attach further callbacks; those run from the next
    /// event on.
    pub fn notify(&self, event: &str, payload: &serde_json::Value) -> Result<()> {
        let callbacks: Vec<ListenerCallback> = self.callbacks.borrow().clone();
        tracing::trace!(listener = %self.name, event = %event, callbacks = callbacks.len(), "Notifying listener");
        for callback in callbacks {
            callback(event, payload);
        }
        Ok(())
    }
}

impl Client for Listener {
    fn client_type(&self) -> &str {
        client_type::LISTENER
    }

    fn client_identifier(&self) -> &str {
        &self.name
    }

    fn context(&self) -> &ClientContext {
        &self.context
    }

    fn shutdown(&self) -> Result<()> {
        self.callbacks.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_callbacks_run_in_order() {
        let listener = Listener::new("query");
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            listener.attach(Rc::new(move |_: &str, _: &serde_json::Value| order.borrow_mut().push(i)));
        }
        listener.notify("query:pre", &serde_json::Value::Null).unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_callback_may_attach() {
        let listener = Rc::new(Listener::new("x"));
        let calls = Rc::new(Cell::new(0));
        let inner = Rc::clone(&listener);
        let counter = Rc::clone(&calls);
        listener.attach(Rc::new(move |_: &str, _: &serde_json::Value| {
            counter.set(counter.get() + 1);
            let counter = Rc::clone(&counter);
            inner.attach(Rc::new(move |_: &str, _: &serde_json::Value| counter.set(counter.get() + 10)));
        }));
        listener.notify("x", &serde_json::Value::Null).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(listener.callback_count(), 2);
        listener.notify("x", &serde_json::Value::Null).unwrap();
        assert_eq!(calls.get(), 12);
        // break the self-reference
        listener.shutdown().unwrap();
    }
}
