use crate::core::value::Value;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::command::route_key;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type HandlerFn = dyn Fn(&Value) -> Result<()> + Send + Sync + 'static;

/// Event dispatcher routing inbound application frames to handlers.
///
/// Frames are routed by their `evt` field, falling back to `cmd` for
/// responses that carry no event.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<String, Arc<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `handler` for `name`, replacing any previous one.
    pub fn register<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        handlers.insert(name.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Remove the handler for `name`. Returns whether one was registered.
    pub fn unregister(&self, name: &str) -> Result<bool> {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        Ok(handlers.remove(name).is_some())
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers
            .read()
            .map(|handlers| handlers.contains_key(name))
            .unwrap_or(false)
    }

    /// Run the handler matching `body`.
    ///
    /// Returns `Ok(false)` when no handler matches. The lock is released
    /// before the handler runs, so handlers may register others.
    pub fn dispatch(&self, body: &Value) -> Result<bool> {
        let Some(key) = route_key(body) else {
            return Ok(false);
        };

        let handler = {
            let handlers = self
                .handlers
                .read()
                .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?;
            handlers.get(key).cloned()
        };

        match handler {
            Some(handler) => handler(body).map(|()| true),
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.handlers.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("Dispatcher").field("handlers", &count).finish()
    }
}
