//! In-process signal paths: a per-context event bus (same-context
//! notifications) and a broadcast hub with named topics (cross-context
//! delivery, originator included).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::envelope::SyncEnvelope;

pub type Listener = Arc<dyn Fn(&SyncEnvelope) + Send + Sync>;

type ListenerRegistry = Mutex<Vec<(u64, Listener)>>;

/// Deregistration handle for a bus listener.
pub struct BusHandle {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl BusHandle {
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().expect("bus registry poisoned").retain(|(id, _)| *id != self.id);
        }
    }
}

/// Callback registry scoped to one execution context.
#[derive(Clone)]
pub struct EventBus {
    listeners: Arc<ListenerRegistry>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { listeners: Arc::new(Mutex::new(Vec::new())), next_id: Arc::new(AtomicU64::new(0)) }
    }

    pub fn on<F>(&self, callback: F) -> BusHandle
    where
        F: Fn(&SyncEnvelope) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.listeners
            .lock()
            .expect("bus registry poisoned")
            .push((id, Arc::new(callback)));
        BusHandle { id, registry: Arc::downgrade(&self.listeners) }
    }

    pub fn emit(&self, envelope: &SyncEnvelope) {
        let listeners: Vec<Listener> = {
            let registry = self.listeners.lock().expect("bus registry poisoned");
            registry.iter().map(|(_, listener)| listener.clone()).collect()
        };
        for listener in listeners {
            listener(envelope);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().expect("bus registry poisoned").len()
    }
}

/// Named-topic broadcast shared across contexts. Join the same topic from
/// several contexts and every post reaches all of them, including the one
/// that posted.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    topics: Arc<Mutex<HashMap<String, EventBus>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, topic: &str) -> BroadcastTopic {
        let bus = self
            .topics
            .lock()
            .expect("hub lock poisoned")
            .entry(topic.to_string())
            .or_default()
            .clone();
        BroadcastTopic { name: topic.to_string(), bus }
    }
}

#[derive(Clone)]
pub struct BroadcastTopic {
    name: String,
    bus: EventBus,
}

impl BroadcastTopic {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post(&self, envelope: &SyncEnvelope) {
        self.bus.emit(envelope);
    }

    pub fn on<F>(&self, callback: F) -> BusHandle
    where
        F: Fn(&SyncEnvelope) + Send + Sync + 'static,
    {
        self.bus.on(callback)
    }
}
