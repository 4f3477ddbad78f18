use std::rc::Rc;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};

use super::{Pooler, PoolerContext};
use crate::client::{Client, client_type, downcast_client};
use crate::listener::Listener;
use crate::observer::Observer;

/// Creates [`Listener`]s and dispatches in-process events to them.
#[derive(Debug, Default)]
pub struct ListenerPooler {
    context: PoolerContext,
}

impl ListenerPooler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to the listener named `event` and, for a
    /// `prefix:suffix` event, to the listener named `prefix`. Listeners are
    /// never created here. Returns how many listeners were reached.
    pub fn notify(&self, event: &str, payload: &serde_json::Value) -> Result<usize> {
        let session = self.context.session()?;
        let mut names = vec![event];
        if let Some((prefix, _)) = event.split_once(':') {
            if !prefix.is_empty() && prefix != event {
                names.push(prefix);
            }
        }

        let mut reached = 0;
        for name in names {
            let Some(client) = session.get_client(client_type::LISTENER, name) else {
                continue;
            };
            downcast_client::<Listener>(client)?.notify(event, payload)?;
            reached += 1;
        }
        Ok(reached)
    }
}

impl Pooler for ListenerPooler {
    fn pooler_type(&self) -> &str {
        client_type::LISTENER
    }

    fn context(&self) -> &PoolerContext {
        &self.context
    }

    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>> {
        require_name(identifier, "listener")?;
        self.context.get_or_create(client_type::LISTENER, identifier, |_| {
            Ok(Rc::new(Listener::new(identifier)))
        })
    }
}

/// Creates one [`Observer`] per channel.
#[derive(Debug, Default)]
pub struct ObserverPooler {
    context: PoolerContext,
}

impl ObserverPooler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pooler for ObserverPooler {
    fn pooler_type(&self) -> &str {
        client_type::OBSERVER
    }

    fn context(&self) -> &PoolerContext {
        &self.context
    }

    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>> {
        require_name(identifier, "observer channel")?;
        self.context.get_or_create(client_type::OBSERVER, identifier, |_| {
            Ok(Rc::new(Observer::new(identifier)))
        })
    }
}

fn require_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::foundation(
            FoundationErrorKind::UnknownClient,
            format!("a {what} needs a name"),
        ));
    }
    Ok(())
}
