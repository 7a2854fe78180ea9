use super::SyncConfig;
use crate::core::Entity;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// What the echo of one local mutation is expected to look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Echo {
    /// An insert or update carrying this content fingerprint.
    Write(String),
    /// A delete.
    Removal,
}

impl Echo {
    pub fn write<E: Entity>(entity: &E) -> Self {
        Self::Write(entity.content_fingerprint())
    }
}

#[derive(Debug, Clone)]
struct TrackedAction {
    echo: Echo,
    expires_at: Instant,
    /// The backend confirmed the write; only its echo is still outstanding.
    acknowledged: bool,
}

/// A create still waiting for its canonical id.
#[derive(Debug, Clone)]
struct PendingCreate {
    temp_id: String,
    fingerprint: String,
    expires_at: Instant,
    /// Canonical id of the insert that was taken as this create's echo.
    claimed_by: Option<String>,
}

/// Ids currently being mutated by this client.
///
/// Each local mutation holds one entry for its id, tagged with the echo it
/// expects; an observed event consumes an entry only if it matches. Entries
/// expire on their own so a lost echo cannot silence notifications for that
/// id forever.
///
/// Creates are tracked separately by content fingerprint, since their echo
/// may arrive before the response that reveals the canonical id.
#[derive(Debug)]
pub struct SelfActionTracker {
    entries: HashMap<String, VecDeque<TrackedAction>>,
    creates: Vec<PendingCreate>,
    ttl: Duration,
    echo_grace: Duration,
}

impl SelfActionTracker {
    pub fn new(ttl: Duration, echo_grace: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            creates: Vec::new(),
            ttl,
            echo_grace,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.tracked_ttl, config.echo_grace)
    }

    /// Registers a local mutation of `id` that is about to be sent.
    pub fn begin(&mut self, id: &str, echo: Echo) {
        let now = Instant::now();
        self.purge(id, now);
        self.entries
            .entry(id.to_string())
            .or_default()
            .push_back(TrackedAction {
                echo,
                expires_at: now + self.ttl,
                acknowledged: false,
            });
    }

    /// Success path: the write is durable, keep waiting for its echo for at
    /// most `echo_grace`.
    ///
    /// Acknowledges the oldest pending entry of `id`. When the echo already
    /// consumed it there is nothing left to wait for.
    pub fn settle(&mut self, id: &str) {
        let now = Instant::now();
        self.purge(id, now);
        let grace_deadline = now + self.echo_grace;
        let Some(actions) = self.entries.get_mut(id) else {
            return;
        };
        if let Some(action) = actions.iter_mut().find(|action| !action.acknowledged) {
            action.acknowledged = true;
            action.expires_at = grace_deadline;
        }
    }

    /// Records an echo still expected for an acknowledged write that was
    /// never registered under `id` (a create learns its canonical id only
    /// from the response).
    pub fn expect_echo(&mut self, id: &str, echo: Echo) {
        let now = Instant::now();
        self.purge(id, now);
        self.entries
            .entry(id.to_string())
            .or_default()
            .push_back(TrackedAction {
                echo,
                expires_at: now + self.echo_grace,
                acknowledged: true,
            });
    }

    /// Failure path: drops the newest pending entry of `id`.
    pub fn end(&mut self, id: &str) {
        let now = Instant::now();
        self.purge(id, now);
        let Some(actions) = self.entries.get_mut(id) else {
            return;
        };
        if let Some(index) = actions.iter().rposition(|action| !action.acknowledged) {
            actions.remove(index);
        }
        if actions.is_empty() {
            self.entries.remove(id);
        }
    }

    /// Called by the Reconciler for every event: returns true (and uses up
    /// one entry) when the event is the echo of a local mutation.
    pub fn consume(&mut self, id: &str, observed: &Echo) -> bool {
        let now = Instant::now();
        self.purge(id, now);
        let Some(actions) = self.entries.get_mut(id) else {
            return false;
        };
        let Some(index) = actions.iter().position(|action| action.echo == *observed) else {
            return false;
        };
        actions.remove(index);
        if actions.is_empty() {
            self.entries.remove(id);
        }
        true
    }

    /// Registers a create shown under `temp_id` whose canonical record will
    /// carry `fingerprint`.
    pub fn begin_create(&mut self, temp_id: &str, fingerprint: String) {
        let now = Instant::now();
        self.purge_creates(now);
        self.creates.push(PendingCreate {
            temp_id: temp_id.to_string(),
            fingerprint,
            expires_at: now + self.ttl,
            claimed_by: None,
        });
    }

    /// Matches an insert of `id` against the oldest unclaimed create with the
    /// same fingerprint. Returns the placeholder's temporary id on a match.
    pub fn claim_create(&mut self, id: &str, fingerprint: &str) -> Option<String> {
        let now = Instant::now();
        self.purge_creates(now);
        let pending = self
            .creates
            .iter_mut()
            .find(|pending| pending.claimed_by.is_none() && pending.fingerprint == fingerprint)?;
        pending.claimed_by = Some(id.to_string());
        Some(pending.temp_id.clone())
    }

    /// Closes the create shown under `temp_id`, on success or failure.
    /// Returns the canonical id its echo was matched to, if any.
    pub fn finish_create(&mut self, temp_id: &str) -> Option<String> {
        let index = self
            .creates
            .iter()
            .position(|pending| pending.temp_id == temp_id)?;
        self.creates.remove(index).claimed_by
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        let now = Instant::now();
        let by_id = self
            .entries
            .get(id)
            .is_some_and(|actions| actions.iter().any(|action| action.expires_at > now));
        by_id
            || self
                .creates
                .iter()
                .any(|pending| pending.temp_id == id && pending.expires_at > now)
    }

    /// Number of live entries across all ids, pending creates included.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let writes = self
            .entries
            .values()
            .flat_map(|actions| actions.iter())
            .filter(|action| action.expires_at > now)
            .count();
        let creates = self
            .creates
            .iter()
            .filter(|pending| pending.expires_at > now)
            .count();
        writes + creates
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge(&mut self, id: &str, now: Instant) {
        if let Some(actions) = self.entries.get_mut(id) {
            actions.retain(|action| action.expires_at > now);
            if actions.is_empty() {
                self.entries.remove(id);
            }
        }
    }

    fn purge_creates(&mut self, now: Instant) {
        self.creates.retain(|pending| pending.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn tracker() -> SelfActionTracker {
        SelfActionTracker::new(Duration::from_secs(10), Duration::from_secs(3))
    }

    fn write(content: &str) -> Echo {
        Echo::Write(content.to_string())
    }

    #[test]
    fn consume_suppresses_exactly_once() {
        let mut tracker = tracker();
        tracker.begin("srv-1", write("done"));
        assert!(tracker.is_tracked("srv-1"));
        assert!(!tracker.is_tracked("srv-2"));

        assert!(tracker.consume("srv-1", &write("done")));
        assert!(!tracker.consume("srv-1", &write("done")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn non_matching_event_leaves_entry_in_place() {
        let mut tracker = tracker();
        tracker.begin("srv-1", write("completed"));

        assert!(!tracker.consume("srv-1", &write("in-progress")));
        assert!(!tracker.consume("srv-1", &Echo::Removal));
        assert!(tracker.consume("srv-1", &write("completed")));
    }

    #[test]
    fn concurrent_mutations_of_one_id_each_hold_an_entry() {
        let mut tracker = tracker();
        tracker.begin("srv-1", write("a"));
        tracker.begin("srv-1", write("b"));
        assert_eq!(tracker.len(), 2);

        tracker.end("srv-1");
        assert_eq!(tracker.len(), 1);
        assert!(tracker.consume("srv-1", &write("a")));
        assert!(!tracker.is_tracked("srv-1"));
    }

    #[test]
    fn end_on_untracked_id_is_harmless() {
        let mut tracker = tracker();
        tracker.end("srv-1");
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_entry_expires_after_ttl() {
        let mut tracker = tracker();
        tracker.begin("srv-1", Echo::Removal);

        advance(Duration::from_secs(9)).await;
        assert!(tracker.is_tracked("srv-1"));

        advance(Duration::from_secs(2)).await;
        assert!(!tracker.is_tracked("srv-1"));
        assert!(!tracker.consume("srv-1", &Echo::Removal));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_shortens_expiry_to_echo_grace() {
        let mut tracker = tracker();
        tracker.begin("srv-1", write("x"));
        tracker.settle("srv-1");

        advance(Duration::from_secs(2)).await;
        assert!(tracker.is_tracked("srv-1"));

        advance(Duration::from_secs(2)).await;
        assert!(!tracker.is_tracked("srv-1"));
    }

    #[test]
    fn settle_after_echo_records_nothing() {
        let mut tracker = tracker();
        tracker.begin("srv-1", write("mine"));
        assert!(tracker.consume("srv-1", &write("mine")));

        tracker.settle("srv-1");
        assert!(tracker.is_empty());
        assert!(!tracker.consume("srv-1", &write("mine")));
    }

    #[tokio::test(start_paused = true)]
    async fn expected_echo_lasts_for_the_grace_window() {
        let mut tracker = tracker();
        tracker.expect_echo("srv-9", write("new"));
        assert!(tracker.is_tracked("srv-9"));

        advance(Duration::from_secs(4)).await;
        assert!(!tracker.consume("srv-9", &write("new")));
    }

    #[test]
    fn end_prefers_pending_over_acknowledged_entries() {
        let mut tracker = tracker();
        tracker.begin("srv-1", write("first"));
        tracker.settle("srv-1");
        tracker.begin("srv-1", write("second"));

        // the second mutation fails; the first one's echo must still be expected
        tracker.end("srv-1");
        assert_eq!(tracker.len(), 1);
        assert!(tracker.consume("srv-1", &write("first")));
    }

    #[test]
    fn create_is_claimed_once_by_matching_insert() {
        let mut tracker = tracker();
        tracker.begin_create("tmp-a", "home|Dentist".into());
        assert!(tracker.is_tracked("tmp-a"));

        assert_eq!(tracker.claim_create("srv-1", "home|Roof"), None);
        assert_eq!(
            tracker.claim_create("srv-1", "home|Dentist"),
            Some("tmp-a".to_string())
        );
        assert_eq!(tracker.claim_create("srv-2", "home|Dentist"), None);

        assert_eq!(tracker.finish_create("tmp-a"), Some("srv-1".to_string()));
        assert!(tracker.is_empty());
    }

    #[test]
    fn unclaimed_create_finishes_without_id() {
        let mut tracker = tracker();
        tracker.begin_create("tmp-a", "home|Dentist".into());
        assert_eq!(tracker.finish_create("tmp-a"), None);
        assert_eq!(tracker.finish_create("tmp-a"), None);
        assert!(tracker.is_empty());
    }
}
