//! Duplicate-heartbeat suppression — §9 Open Question resolution: a
//! `DashMap`-backed cache keyed by `agent_id + room_id`, entries expiring
//! after a 24h TTL, so a restarted bootstrap sequence does not re-emit
//! membership/state events the room already has. Grounded in `dashmap`
//! usage already present in the teacher's Cargo.toml for concurrent
//! in-memory state; the TTL-sweep shape follows
//! `skynet_scheduler::engine::SchedulerEngine::mark_missed_on_startup`'s
//! "compare against now, act on what's stale" pattern.

use std::time::{Duration, Instant};

use dashmap::DashMap;

pub const HEARTBEAT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct HeartbeatCache {
    seen: DashMap<String, Instant>,
    ttl: Duration,
}

impl HeartbeatCache {
    pub fn new() -> Self {
        Self { seen: DashMap::new(), ttl: HEARTBEAT_TTL }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { seen: DashMap::new(), ttl }
    }

    fn key(agent_id: &str, room_id: &str) -> String {
        format!("{agent_id}:{room_id}")
    }

    /// Record a heartbeat for `(agent_id, room_id)` and report whether it was
    /// already seen within the TTL window — i.e. whether this heartbeat is a
    /// duplicate to be suppressed.
    pub fn observe(&self, agent_id: &str, room_id: &str) -> bool {
        let key = Self::key(agent_id, room_id);
        let now = Instant::now();
        if let Some(mut entry) = self.seen.get_mut(&key) {
            if now.duration_since(*entry) < self.ttl {
                return true;
            }
            *entry = now;
            return false;
        }
        self.seen.insert(key, now);
        false
    }

    /// Drop entries older than the TTL. Call periodically from the
    /// scheduler's tick loop to bound memory use.
    pub fn sweep(&self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) < ttl);
    }
}

impl Default for HeartbeatCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_observe_within_ttl_is_duplicate() {
        let cache = HeartbeatCache::with_ttl(Duration::from_secs(60));
        assert!(!cache.observe("agent-1", "room-1"));
        assert!(cache.observe("agent-1", "room-1"));
    }

    #[test]
    fn different_rooms_are_independent() {
        let cache = HeartbeatCache::with_ttl(Duration::from_secs(60));
        assert!(!cache.observe("agent-1", "room-1"));
        assert!(!cache.observe("agent-1", "room-2"));
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let cache = HeartbeatCache::with_ttl(Duration::from_millis(1));
        cache.observe("agent-1", "room-1");
        std::thread::sleep(Duration::from_millis(5));
        cache.sweep();
        assert!(cache.seen.is_empty());
    }
}
