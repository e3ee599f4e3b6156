//! Typed callback dispatch, resolved once at startup.

use crate::core::traits::CallbackHandler;
use di::{Ref, inject, injectable};
use std::collections::HashMap;

/// Maps message-topic tags to their handlers. Built once when the service
/// provider is constructed; lookups are read-only afterwards.
pub struct DispatchTable {
    handlers: HashMap<&'static str, Ref<dyn CallbackHandler>>,
}

#[injectable]
impl DispatchTable {
    #[inject]
    pub fn create(chatbot: Ref<dyn CallbackHandler>) -> Self {
        DispatchTable::with_handlers(vec![chatbot])
    }
}

impl DispatchTable {
    pub fn with_handlers(handlers: Vec<Ref<dyn CallbackHandler>>) -> Self {
        DispatchTable {
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.topic(), handler))
                .collect(),
        }
    }

    pub fn resolve(&self, topic: &str) -> Option<&Ref<dyn CallbackHandler>> {
        self.handlers.get(topic)
    }
}
