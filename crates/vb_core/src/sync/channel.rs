//! Best-effort replication of match snapshots across contexts.
//!
//! A publish fans out over three independent paths: the shared durable slot
//! (plus its change notifications), the same-context bus, and the
//! cross-context broadcast topic. Delivery is at-most-once per path and
//! unordered; receivers apply every snapshot as a full-state replace, so the
//! last snapshot to ARRIVE wins, not the newest by timestamp. For a single
//! active controller that limitation is accepted rather than papered over.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::bus::{BroadcastHub, BroadcastTopic, BusHandle, EventBus};
use super::envelope::SyncEnvelope;
use super::error::{SlotError, SyncError};
use super::slot::{SlotStore, WatchHandle, KEY_PREFIX, STATE_KEY};
use crate::models::MatchState;
use crate::timing::{Clock, TaskHandle, Timers};

/// Broadcast topic every scoreboard context joins.
pub const SYNC_TOPIC: &str = "volleyball-scoreboard";

/// Inbound bursts are collapsed per path over this window.
pub const DEBOUNCE_DELAY_MS: u64 = 100;

/// Connectivity poll interval.
pub const POLLING_INTERVAL_MS: u64 = 500;

/// A durable snapshot older than this means the producer went quiet.
pub const DISCONNECT_AFTER_MS: u64 = 30_000;

/// Grace delay before replaying the durable snapshot to a new subscriber.
pub const STARTUP_SYNC_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Debug, Clone)]
struct ConnectionState {
    status: ConnectionStatus,
    last_update: Option<u64>,
}

/// Snapshot of the channel's health, for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub status: ConnectionStatus,
    pub is_connected: bool,
    pub last_update: Option<u64>,
    pub active_subscribers: usize,
}

#[derive(Clone)]
pub struct SyncChannel {
    slot: Arc<dyn SlotStore>,
    topic: BroadcastTopic,
    local_bus: EventBus,
    timers: Timers,
    clock: Arc<dyn Clock>,
    connection: Arc<Mutex<ConnectionState>>,
    subscribers: Arc<AtomicUsize>,
}

impl SyncChannel {
    /// One channel per execution context. Contexts that should see each
    /// other share the same slot store and hub.
    pub fn new(slot: Arc<dyn SlotStore>, hub: &BroadcastHub, timers: Timers) -> Self {
        let clock = timers.clock();
        Self {
            slot,
            topic: hub.join(SYNC_TOPIC),
            local_bus: EventBus::new(),
            timers,
            clock,
            connection: Arc::new(Mutex::new(ConnectionState {
                status: ConnectionStatus::Disconnected,
                last_update: None,
            })),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replicate a snapshot over all three paths. The durable write may
    /// fail on quota; that path degrades (after a one-shot eviction retry)
    /// while the in-process paths still deliver.
    pub fn publish(&self, state: &MatchState) -> Result<(), SyncError> {
        let envelope = SyncEnvelope::capture(state, self.clock.as_ref());
        let encoded = envelope.encode()?;

        match self.slot.set(STATE_KEY, &encoded) {
            Ok(()) => {}
            Err(SlotError::QuotaExceeded { size, .. }) => {
                log::warn!("storage quota exceeded ({} bytes), evicting old keys", size);
                self.evict_nonessential_keys();
                if let Err(err) = self.slot.set(STATE_KEY, &encoded) {
                    log::warn!("durable path still failing, continuing without it: {}", err);
                }
            }
            Err(err) => {
                log::warn!("durable write failed: {}", err);
            }
        }

        self.local_bus.emit(&envelope);
        self.topic.post(&envelope);

        self.set_status(ConnectionStatus::Connected, Some(envelope.timestamp));
        Ok(())
    }

    /// Register a callback on all three inbound paths, each behind its own
    /// debounce window. Invalid payloads are dropped and flip the channel
    /// to disconnected. After a short grace delay the current durable
    /// snapshot is replayed once so late joiners catch up.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SyncEnvelope) + Send + Sync + 'static,
    {
        let sink: Arc<dyn Fn(SyncEnvelope) + Send + Sync> = Arc::new(callback);

        let storage_debounce = Debouncer::new(self.timers.clone(), DEBOUNCE_DELAY_MS, sink.clone());
        let bus_debounce = Debouncer::new(self.timers.clone(), DEBOUNCE_DELAY_MS, sink.clone());
        let topic_debounce = Debouncer::new(self.timers.clone(), DEBOUNCE_DELAY_MS, sink.clone());

        let watch = {
            let connection = self.connection.clone();
            let clock = self.clock.clone();
            let debouncer = storage_debounce.clone();
            self.slot.watch(Arc::new(move |key, value| {
                if key != STATE_KEY {
                    return;
                }
                let Some(raw) = value else {
                    return;
                };
                match SyncEnvelope::decode(raw) {
                    Ok(envelope) => ingest(&connection, &clock, &debouncer, envelope, "storage"),
                    Err(err) => {
                        log::warn!("dropping invalid snapshot from storage: {}", err);
                        set_status_on(&connection, ConnectionStatus::Disconnected, None);
                    }
                }
            }))
        };

        let bus = {
            let connection = self.connection.clone();
            let clock = self.clock.clone();
            let debouncer = bus_debounce.clone();
            self.local_bus.on(move |envelope| {
                ingest(&connection, &clock, &debouncer, envelope.clone(), "local bus");
            })
        };

        let topic = {
            let connection = self.connection.clone();
            let clock = self.clock.clone();
            let debouncer = topic_debounce.clone();
            self.topic.on(move |envelope| {
                ingest(&connection, &clock, &debouncer, envelope.clone(), "broadcast");
            })
        };

        let replay = {
            let slot = self.slot.clone();
            let sink = sink.clone();
            self.timers.schedule_once(STARTUP_SYNC_DELAY_MS, move || {
                if let Some(raw) = slot.get(STATE_KEY) {
                    match SyncEnvelope::decode(&raw) {
                        Ok(envelope) => sink(envelope),
                        Err(err) => log::warn!("skipping startup replay: {}", err),
                    }
                }
            })
        };

        self.subscribers.fetch_add(1, Ordering::SeqCst);

        Subscription {
            watch,
            bus,
            topic,
            debouncers: vec![storage_debounce, bus_debounce, topic_debounce],
            replay,
            subscribers: self.subscribers.clone(),
        }
    }

    /// Synchronous durable read; `None` when absent or invalid.
    pub fn current_snapshot(&self) -> Option<SyncEnvelope> {
        let raw = self.slot.get(STATE_KEY)?;
        match SyncEnvelope::decode(&raw) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                log::warn!("stored snapshot is invalid: {}", err);
                None
            }
        }
    }

    /// Drop a durable snapshot that has gone stale (older than the
    /// staleness horizon). Run at adapter startup.
    pub fn cleanup(&self) {
        let Some(envelope) = self.current_snapshot() else {
            return;
        };
        if envelope.is_stale(self.clock.now_ms()) {
            self.slot.remove(STATE_KEY);
            log::info!("removed stale snapshot from storage");
        }
    }

    /// Heuristic liveness: a repeating poll of the durable timestamp. The
    /// returned handle belongs to the adapter that started the check and
    /// must be cancelled on teardown.
    pub fn connectivity_task(&self) -> TaskHandle {
        let slot = self.slot.clone();
        let clock = self.clock.clone();
        let connection = self.connection.clone();
        self.timers.schedule_repeating(POLLING_INTERVAL_MS, move || {
            let snapshot =
                slot.get(STATE_KEY).and_then(|raw| SyncEnvelope::decode(&raw).ok());
            match snapshot {
                Some(envelope) => {
                    let age = clock.now_ms().saturating_sub(envelope.timestamp);
                    if age > DISCONNECT_AFTER_MS {
                        set_status_on(&connection, ConnectionStatus::Disconnected, None);
                    } else {
                        set_status_on(
                            &connection,
                            ConnectionStatus::Connected,
                            Some(envelope.timestamp),
                        );
                    }
                }
                None => set_status_on(&connection, ConnectionStatus::Disconnected, None),
            }
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.lock().expect("connection lock poisoned").status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn last_update(&self) -> Option<u64> {
        self.connection.lock().expect("connection lock poisoned").last_update
    }

    /// Mark a reconnection attempt in progress; the next connectivity poll
    /// or valid inbound snapshot resolves it.
    pub fn mark_reconnecting(&self) {
        let mut connection = self.connection.lock().expect("connection lock poisoned");
        connection.status = ConnectionStatus::Reconnecting;
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        let connection = self.connection.lock().expect("connection lock poisoned");
        ConnectionStats {
            status: connection.status,
            is_connected: connection.status == ConnectionStatus::Connected,
            last_update: connection.last_update,
            active_subscribers: self.subscribers.load(Ordering::SeqCst),
        }
    }

    fn set_status(&self, status: ConnectionStatus, last_update: Option<u64>) {
        set_status_on(&self.connection, status, last_update);
    }

    fn evict_nonessential_keys(&self) {
        for key in self.slot.keys() {
            if key.starts_with(KEY_PREFIX) && key != STATE_KEY {
                log::debug!("evicting {}", key);
                self.slot.remove(&key);
            }
        }
    }
}

fn set_status_on(
    connection: &Arc<Mutex<ConnectionState>>,
    status: ConnectionStatus,
    last_update: Option<u64>,
) {
    let mut state = connection.lock().expect("connection lock poisoned");
    state.status = status;
    if last_update.is_some() {
        state.last_update = last_update;
    }
}

/// Validate, flag staleness, mark connected, and hand to the path's
/// debouncer.
fn ingest(
    connection: &Arc<Mutex<ConnectionState>>,
    clock: &Arc<dyn Clock>,
    debouncer: &Debouncer,
    envelope: SyncEnvelope,
    path: &str,
) {
    if let Err(err) = envelope.validate() {
        log::warn!("dropping invalid snapshot from {}: {}", path, err);
        set_status_on(connection, ConnectionStatus::Disconnected, None);
        return;
    }
    let now = clock.now_ms();
    if envelope.is_stale(now) {
        log::warn!(
            "snapshot from {} is {} ms old, applying anyway",
            path,
            envelope.age_ms(now)
        );
    }
    set_status_on(connection, ConnectionStatus::Connected, Some(envelope.timestamp));
    debouncer.submit(envelope);
}

/// Trailing-edge debounce: each submission replaces the pending envelope
/// and re-arms the flush timer.
#[derive(Clone)]
struct Debouncer {
    timers: Timers,
    delay_ms: u64,
    pending: Arc<Mutex<Option<SyncEnvelope>>>,
    task: Arc<Mutex<Option<TaskHandle>>>,
    sink: Arc<dyn Fn(SyncEnvelope) + Send + Sync>,
}

impl Debouncer {
    fn new(timers: Timers, delay_ms: u64, sink: Arc<dyn Fn(SyncEnvelope) + Send + Sync>) -> Self {
        Self {
            timers,
            delay_ms,
            pending: Arc::new(Mutex::new(None)),
            task: Arc::new(Mutex::new(None)),
            sink,
        }
    }

    fn submit(&self, envelope: SyncEnvelope) {
        *self.pending.lock().expect("debounce lock poisoned") = Some(envelope);

        let mut task = self.task.lock().expect("debounce task lock poisoned");
        if let Some(handle) = task.take() {
            handle.cancel();
        }
        let pending = self.pending.clone();
        let sink = self.sink.clone();
        let task_slot = self.task.clone();
        *task = Some(self.timers.schedule_once(self.delay_ms, move || {
            let envelope = pending.lock().expect("debounce lock poisoned").take();
            task_slot.lock().expect("debounce task lock poisoned").take();
            if let Some(envelope) = envelope {
                sink(envelope);
            }
        }));
    }

    fn cancel(&self) {
        if let Some(handle) = self.task.lock().expect("debounce task lock poisoned").take() {
            handle.cancel();
        }
        self.pending.lock().expect("debounce lock poisoned").take();
    }
}

/// Registration handle covering all three inbound paths. Tearing it down
/// removes every listener and cancels pending debounce and replay timers.
pub struct Subscription {
    watch: WatchHandle,
    bus: BusHandle,
    topic: BusHandle,
    debouncers: Vec<Debouncer>,
    replay: TaskHandle,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.watch.cancel();
        self.bus.cancel();
        self.topic.cancel();
        for debouncer in &self.debouncers {
            debouncer.cancel();
        }
        self.replay.cancel();
        self.subscribers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameSettings, TeamSide};
    use crate::store::ScoreboardStore;
    use crate::sync::slot::MemorySlotStore;
    use crate::timing::ManualClock;

    struct Fixture {
        clock: Arc<ManualClock>,
        timers: Timers,
        slot: MemorySlotStore,
        hub: BroadcastHub,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(1_000_000));
            let timers = Timers::new(clock.clone());
            Self { clock, timers, slot: MemorySlotStore::new(), hub: BroadcastHub::new() }
        }

        fn channel(&self) -> SyncChannel {
            SyncChannel::new(Arc::new(self.slot.clone()), &self.hub, self.timers.clone())
        }

        fn state(&self) -> MatchState {
            MatchState::new(self.clock.now_ms(), GameSettings::default())
        }

        fn flush(&self, ms: u64) {
            self.clock.advance(ms);
            self.timers.run_due();
        }
    }

    fn received() -> (Arc<Mutex<Vec<SyncEnvelope>>>, impl Fn(SyncEnvelope) + Send + Sync) {
        let seen: Arc<Mutex<Vec<SyncEnvelope>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |envelope| sink.lock().unwrap().push(envelope))
    }

    #[test]
    fn publish_writes_durable_snapshot() {
        let fx = Fixture::new();
        let channel = fx.channel();

        channel.publish(&fx.state()).unwrap();

        let snapshot = channel.current_snapshot().unwrap();
        assert_eq!(snapshot.timestamp, fx.clock.now_ms());
        assert!(channel.is_connected());
    }

    #[test]
    fn subscriber_receives_after_debounce() {
        let fx = Fixture::new();
        let publisher = fx.channel();
        let receiver = fx.channel();

        let (seen, callback) = received();
        let sub = receiver.subscribe(callback);
        // Let the startup replay window pass while storage is still empty.
        fx.flush(STARTUP_SYNC_DELAY_MS);

        publisher.publish(&fx.state()).unwrap();
        assert!(seen.lock().unwrap().is_empty(), "debounce must delay delivery");

        fx.flush(DEBOUNCE_DELAY_MS);
        // Storage watch and broadcast topic are independent paths, so the
        // same publish may arrive up to twice; application is idempotent.
        let count = seen.lock().unwrap().len();
        assert!((1..=2).contains(&count), "got {} deliveries", count);

        sub.unsubscribe();
    }

    #[test]
    fn burst_collapses_to_last_snapshot() {
        let fx = Fixture::new();
        let publisher = fx.channel();
        let receiver = fx.channel();

        let (seen, callback) = received();
        let sub = receiver.subscribe(callback);
        fx.flush(STARTUP_SYNC_DELAY_MS);

        let mut store = ScoreboardStore::new(fx.clock.clone());
        for _ in 0..5 {
            store.score_point(TeamSide::Local);
            publisher.publish(store.state()).unwrap();
        }

        fx.flush(DEBOUNCE_DELAY_MS);
        let seen = seen.lock().unwrap();
        assert!(seen.len() <= 2);
        for envelope in seen.iter() {
            assert_eq!(envelope.state.local.score, 5);
        }

        drop(seen);
        sub.unsubscribe();
    }

    #[test]
    fn invalid_payload_dropped_and_disconnects() {
        let fx = Fixture::new();
        let channel = fx.channel();

        let (seen, callback) = received();
        let sub = channel.subscribe(callback);

        channel.publish(&fx.state()).unwrap();
        fx.flush(DEBOUNCE_DELAY_MS);
        assert!(channel.is_connected());
        let delivered_before = seen.lock().unwrap().len();

        let mut value = serde_json::to_value(SyncEnvelope::capture(
            &fx.state(),
            fx.clock.as_ref(),
        ))
        .unwrap();
        value.as_object_mut().unwrap().remove("history");
        fx.slot.set(STATE_KEY, &value.to_string()).unwrap();

        fx.flush(DEBOUNCE_DELAY_MS);
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
        assert_eq!(seen.lock().unwrap().len(), delivered_before);

        sub.unsubscribe();
    }

    #[test]
    fn quota_pressure_evicts_and_retries() {
        let fx = Fixture::new();
        let slot = MemorySlotStore::with_quota(32 * 1024);
        let channel = SyncChannel::new(Arc::new(slot.clone()), &fx.hub, fx.timers.clone());

        // Non-essential junk filling almost the whole quota.
        slot.set("volleyball_old_junk", &"x".repeat(31 * 1024)).unwrap();

        channel.publish(&fx.state()).unwrap();

        assert!(slot.get("volleyball_old_junk").is_none(), "junk should be evicted");
        assert!(channel.current_snapshot().is_some());
    }

    #[test]
    fn quota_failure_still_delivers_in_process() {
        let fx = Fixture::new();
        // Quota too small even after eviction.
        let slot = MemorySlotStore::with_quota(64);
        let publisher = SyncChannel::new(Arc::new(slot.clone()), &fx.hub, fx.timers.clone());
        let receiver = fx.channel();

        let (seen, callback) = received();
        let sub = receiver.subscribe(callback);

        publisher.publish(&fx.state()).unwrap();
        fx.flush(DEBOUNCE_DELAY_MS);

        assert!(slot.get(STATE_KEY).is_none());
        assert_eq!(seen.lock().unwrap().len(), 1, "broadcast path must still deliver");

        sub.unsubscribe();
    }

    #[test]
    fn connectivity_flips_after_silence() {
        let fx = Fixture::new();
        let channel = fx.channel();
        let task = channel.connectivity_task();

        channel.publish(&fx.state()).unwrap();
        fx.flush(POLLING_INTERVAL_MS);
        assert!(channel.is_connected());

        fx.clock.advance(DISCONNECT_AFTER_MS + 1_000);
        fx.timers.run_due();
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);

        channel.publish(&fx.state()).unwrap();
        fx.flush(POLLING_INTERVAL_MS);
        assert!(channel.is_connected());

        task.cancel();
        assert_eq!(fx.timers.pending(), 0);
    }

    #[test]
    fn startup_replay_reaches_late_joiner() {
        let fx = Fixture::new();
        let publisher = fx.channel();
        publisher.publish(&fx.state()).unwrap();

        let late = fx.channel();
        let (seen, callback) = received();
        let sub = late.subscribe(callback);

        fx.flush(STARTUP_SYNC_DELAY_MS);
        assert_eq!(seen.lock().unwrap().len(), 1);

        sub.unsubscribe();
    }

    #[test]
    fn unsubscribe_stops_delivery_and_releases_timers() {
        let fx = Fixture::new();
        let publisher = fx.channel();
        let receiver = fx.channel();

        let (seen, callback) = received();
        let sub = receiver.subscribe(callback);
        sub.unsubscribe();
        assert_eq!(fx.timers.pending(), 0);

        publisher.publish(&fx.state()).unwrap();
        fx.flush(DEBOUNCE_DELAY_MS);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn cleanup_drops_stale_snapshot_only() {
        let fx = Fixture::new();
        let channel = fx.channel();

        channel.publish(&fx.state()).unwrap();
        channel.cleanup();
        assert!(channel.current_snapshot().is_some());

        fx.clock.advance(2 * 3_600_000);
        channel.cleanup();
        assert!(channel.current_snapshot().is_none());
    }

    #[test]
    fn connection_stats_track_subscribers() {
        let fx = Fixture::new();
        let channel = fx.channel();
        assert_eq!(channel.connection_stats().active_subscribers, 0);

        let sub = channel.subscribe(|_| {});
        assert_eq!(channel.connection_stats().active_subscribers, 1);

        sub.unsubscribe();
        assert_eq!(channel.connection_stats().active_subscribers, 0);
    }
}
