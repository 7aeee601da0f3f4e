//! The window ledger: a per-resource sliding log of
//! `ScheduledRequest` entries, admitting candidate times iff
//! `|{s : t - window < s <= t}| < limit`, grounded in the same
//! sliding-log admission algorithm the rate limiter uses, generalized
//! from a single global limit to one ledger per `resource_id`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Default bound on the ledger's total entry count across all resources.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// One registered future attempt.
#[derive(Debug, Clone, Copy)]
struct Entry {
    #[allow(dead_code)]
    id: Uuid,
    scheduled_at: Instant,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct ResourceLog {
    entries: VecDeque<Entry>,
}

/// The daemon's in-memory admission-control ledger, one sliding log per
/// `resource_id`, each protected by its own mutex so unrelated resources
/// never contend.
#[derive(Debug)]
pub struct WindowLedger {
    resources: Mutex<HashMap<String, Arc<Mutex<ResourceLog>>>>,
    total_entries: AtomicUsize,
    max_entries: usize,
}

/// The result of a `CanSchedule` check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    /// Whether `candidate` is admissible right now.
    pub can_schedule: bool,
    /// If not admissible, the earliest instant it would become so.
    pub wait_until: Instant,
}

impl WindowLedger {
    /// Builds an empty ledger bounded at `max_entries` total entries.
    pub fn new(max_entries: usize) -> Self {
        Self { resources: Mutex::new(HashMap::new()), total_entries: AtomicUsize::new(0), max_entries }
    }

    fn resource_lock(&self, resource_id: &str) -> Arc<Mutex<ResourceLog>> {
        let mut resources = self.resources.lock().expect("ledger mutex poisoned");
        resources.entry(resource_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(ResourceLog::default()))).clone()
    }

    /// Checks whether `candidate` is admissible for `resource_id` without
    /// registering it.
    pub fn can_schedule(&self, resource_id: &str, limit: u64, window: Duration, candidate: Instant) -> Admission {
        let lock = self.resource_lock(resource_id);
        let log = lock.lock().expect("resource mutex poisoned");
        evaluate_admission(&log.entries, limit, window, candidate)
    }

    /// Evaluates admission and registers `scheduled_ats` for
    /// `resource_id` under one hold of the resource's lock, so the check
    /// and the register are observably atomic from a single caller's
    /// perspective: no other caller's registration can land between the
    /// two. Registration happens regardless of the admission verdict,
    /// matching `register` unconditionally appending to the log.
    pub fn schedule_and_register(
        &self,
        resource_id: &str,
        limit: u64,
        window: Duration,
        candidate: Instant,
        scheduled_ats: &[Instant],
    ) -> (Admission, usize) {
        let lock = self.resource_lock(resource_id);
        let mut log = lock.lock().expect("resource mutex poisoned");
        let admission = evaluate_admission(&log.entries, limit, window, candidate);
        for &scheduled_at in scheduled_ats {
            log.entries.push_back(Entry {
                id: Uuid::new_v4(),
                scheduled_at,
                expires_at: scheduled_at + Duration::from_secs(3600),
            });
        }
        drop(log);
        self.total_entries.fetch_add(scheduled_ats.len(), Ordering::SeqCst);
        self.enforce_global_cap();
        (admission, scheduled_ats.len())
    }

    /// Registers a batch of planned attempts for `resource_id`, each with
    /// `expires_at = scheduled_at + 1h`.
    /// Returns how many entries were accepted (all of them, unless the
    /// global cap forces eviction of even-older entries elsewhere).
    pub fn register(&self, resource_id: &str, scheduled_ats: &[Instant]) -> usize {
        let lock = self.resource_lock(resource_id);
        let mut log = lock.lock().expect("resource mutex poisoned");
        for &scheduled_at in scheduled_ats {
            log.entries.push_back(Entry {
                id: Uuid::new_v4(),
                scheduled_at,
                expires_at: scheduled_at + Duration::from_secs(3600),
            });
        }
        drop(log);
        self.total_entries.fetch_add(scheduled_ats.len(), Ordering::SeqCst);
        self.enforce_global_cap();
        scheduled_ats.len()
    }

    /// Drops entries whose `expires_at <= now`, across every resource.
    /// Intended to run at least once per minute.
    pub fn sweep(&self, now: Instant) {
        let resources = self.resources.lock().expect("ledger mutex poisoned").clone();
        let mut removed = 0usize;
        for lock in resources.values() {
            let mut log = lock.lock().expect("resource mutex poisoned");
            let before = log.entries.len();
            log.entries.retain(|e| e.expires_at > now);
            removed += before - log.entries.len();
        }
        if removed > 0 {
            self.total_entries.fetch_sub(removed, Ordering::SeqCst);
        }
    }

    /// Evicts the globally oldest entries until the ledger is back at or
    /// under `max_entries`.
    fn enforce_global_cap(&self) {
        loop {
            if self.total_entries.load(Ordering::SeqCst) <= self.max_entries {
                return;
            }
            let resources = self.resources.lock().expect("ledger mutex poisoned").clone();
            let mut oldest: Option<(Arc<Mutex<ResourceLog>>, Instant)> = None;
            for lock in resources.values() {
                let log = lock.lock().expect("resource mutex poisoned");
                if let Some(front) = log.entries.front() {
                    if oldest.as_ref().map(|(_, t)| front.scheduled_at < *t).unwrap_or(true) {
                        oldest = Some((lock.clone(), front.scheduled_at));
                    }
                }
            }
            let Some((lock, _)) = oldest else { return };
            let mut log = lock.lock().expect("resource mutex poisoned");
            if log.entries.pop_front().is_some() {
                self.total_entries.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Total entries across all resources, for the admin health surface.
    pub fn total_entries(&self) -> usize {
        self.total_entries.load(Ordering::SeqCst)
    }

    /// Entry count for one resource, for the admin `/ledger/:resource_id`
    /// endpoint. Returns 0 for a resource never seen.
    pub fn resource_entry_count(&self, resource_id: &str) -> usize {
        let resources = self.resources.lock().expect("ledger mutex poisoned");
        match resources.get(resource_id) {
            Some(lock) => lock.lock().expect("resource mutex poisoned").entries.len(),
            None => 0,
        }
    }
}

fn evaluate_admission(entries: &VecDeque<Entry>, limit: u64, window: Duration, candidate: Instant) -> Admission {
    let window_start = candidate.checked_sub(window);
    let in_window = entries
        .iter()
        .filter(|e| match window_start {
            Some(start) => e.scheduled_at > start && e.scheduled_at <= candidate,
            None => e.scheduled_at <= candidate,
        })
        .count() as u64;

    if in_window < limit {
        return Admission { can_schedule: true, wait_until: candidate };
    }

    let earliest_to_expire = entries
        .iter()
        .filter(|e| match window_start {
            Some(start) => e.scheduled_at > start,
            None => true,
        })
        .map(|e| e.scheduled_at)
        .min()
        .unwrap_or(candidate);

    Admission { can_schedule: false, wait_until: earliest_to_expire + window }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_until_limit_reached() {
        let ledger = WindowLedger::new(DEFAULT_MAX_ENTRIES);
        let now = Instant::now();
        let first = ledger.can_schedule("r", 2, Duration::from_secs(1), now);
        assert!(first.can_schedule);
        ledger.register("r", &[now]);

        let second = ledger.can_schedule("r", 2, Duration::from_secs(1), now);
        assert!(second.can_schedule);
        ledger.register("r", &[now]);

        let third = ledger.can_schedule("r", 2, Duration::from_secs(1), now);
        assert!(!third.can_schedule);
    }

    #[test]
    fn wait_until_is_when_oldest_conflicting_entry_expires() {
        let ledger = WindowLedger::new(DEFAULT_MAX_ENTRIES);
        let now = Instant::now();
        ledger.register("r", &[now, now]);
        let admission = ledger.can_schedule("r", 2, Duration::from_millis(100), now);
        assert!(!admission.can_schedule);
        assert_eq!(admission.wait_until, now + Duration::from_millis(100));
    }

    #[test]
    fn entries_outside_window_do_not_count() {
        let ledger = WindowLedger::new(DEFAULT_MAX_ENTRIES);
        let now = Instant::now();
        let old = now - Duration::from_secs(10);
        ledger.register("r", &[old, old]);
        let admission = ledger.can_schedule("r", 2, Duration::from_secs(1), now);
        assert!(admission.can_schedule);
    }

    #[test]
    fn different_resources_do_not_share_capacity() {
        let ledger = WindowLedger::new(DEFAULT_MAX_ENTRIES);
        let now = Instant::now();
        ledger.register("resource-a", &[now, now]);
        let admission = ledger.can_schedule("resource-b", 2, Duration::from_secs(1), now);
        assert!(admission.can_schedule);
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let ledger = WindowLedger::new(DEFAULT_MAX_ENTRIES);
        let now = Instant::now();
        let long_ago = now - Duration::from_secs(7200);
        ledger.register("r", &[long_ago]);
        assert_eq!(ledger.total_entries(), 1);
        ledger.sweep(now);
        assert_eq!(ledger.total_entries(), 0);
    }

    #[test]
    fn schedule_and_register_admits_and_registers_in_one_call() {
        let ledger = WindowLedger::new(DEFAULT_MAX_ENTRIES);
        let now = Instant::now();
        let (admission, accepted) = ledger.schedule_and_register("r", 2, Duration::from_secs(1), now, &[now]);
        assert!(admission.can_schedule);
        assert_eq!(accepted, 1);
        assert_eq!(ledger.resource_entry_count("r"), 1);
    }

    #[test]
    fn schedule_and_register_still_registers_when_not_admissible() {
        let ledger = WindowLedger::new(DEFAULT_MAX_ENTRIES);
        let now = Instant::now();
        ledger.register("r", &[now, now]);
        let (admission, accepted) = ledger.schedule_and_register("r", 2, Duration::from_secs(1), now, &[now]);
        assert!(!admission.can_schedule);
        assert_eq!(accepted, 1);
        assert_eq!(ledger.resource_entry_count("r"), 3);
    }

    #[test]
    fn global_cap_evicts_oldest_first() {
        let ledger = WindowLedger::new(2);
        let now = Instant::now();
        ledger.register("r", &[now - Duration::from_secs(2), now - Duration::from_secs(1), now]);
        assert_eq!(ledger.total_entries(), 2);
        let admission = ledger.can_schedule("r", 100, Duration::from_secs(10), now - Duration::from_secs(2));
        assert!(admission.can_schedule);
    }
}
