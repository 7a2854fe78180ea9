use crate::core::ParseEnumError;
use std::str::FromStr;
use std::time::Duration;

/// How the Reconciler resolves two writes to the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Whichever event is processed last overwrites the store entry.
    #[default]
    LastApplied,
    /// Remote writes whose `Entity::revision` is older than the stored one
    /// are discarded. Entities without a revision fall back to last-applied.
    NewerRevisionWins,
}

impl FromStr for ConflictPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-applied" | "last_applied" => Ok(Self::LastApplied),
            "newer-revision-wins" | "newer_revision_wins" | "newer" => {
                Ok(Self::NewerRevisionWins)
            }
            _ => Err(ParseEnumError::new("conflict policy", s)),
        }
    }
}

/// Sync engine configuration
///
/// One instance is shared by every component of a mounted view.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on how long an in-flight local mutation suppresses
    /// notifications for its id
    pub tracked_ttl: Duration,

    /// How long after a successful write its echo is still expected
    pub echo_grace: Duration,

    /// Conflict resolution for remote events
    pub conflict_policy: ConflictPolicy,

    /// Buffer size of change channels created by the in-memory backend
    pub channel_capacity: usize,

    /// Re-fetch the full list after every rollback
    pub reload_after_rollback: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            tracked_ttl: Duration::from_secs(10),
            echo_grace: Duration::from_secs(3),
            conflict_policy: ConflictPolicy::LastApplied,
            channel_capacity: 256,
            reload_after_rollback: false,
        }
    }

    /// Reads `HEARTHSYNC_*` environment variables, falling back to defaults
    /// for anything missing or unparsable.
    ///
    /// - `HEARTHSYNC_TRACKED_TTL_MS`
    /// - `HEARTHSYNC_ECHO_GRACE_MS`
    /// - `HEARTHSYNC_CONFLICT_POLICY` (`last-applied` | `newer-revision-wins`)
    /// - `HEARTHSYNC_CHANNEL_CAPACITY`
    /// - `HEARTHSYNC_RELOAD_AFTER_ROLLBACK` (`true` | `false`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        if let Some(ttl) = millis("HEARTHSYNC_TRACKED_TTL_MS") {
            config.tracked_ttl = ttl;
        }
        if let Some(grace) = millis("HEARTHSYNC_ECHO_GRACE_MS") {
            config.echo_grace = grace;
        }
        if let Some(policy) =
            lookup("HEARTHSYNC_CONFLICT_POLICY").and_then(|raw| raw.parse::<ConflictPolicy>().ok())
        {
            config.conflict_policy = policy;
        }
        if let Some(capacity) = lookup("HEARTHSYNC_CHANNEL_CAPACITY")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
        {
            config = config.channel_capacity(capacity);
        }
        if let Some(reload) = lookup("HEARTHSYNC_RELOAD_AFTER_ROLLBACK")
            .and_then(|raw| raw.trim().parse::<bool>().ok())
        {
            config.reload_after_rollback = reload;
        }
        config
    }

    /// Set the in-flight tracking TTL
    pub fn tracked_ttl(mut self, ttl: Duration) -> Self {
        self.tracked_ttl = ttl;
        self
    }

    /// Set the post-acknowledgement echo window
    pub fn echo_grace(mut self, grace: Duration) -> Self {
        self.echo_grace = grace;
        self
    }

    /// Set the conflict policy
    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Set the change channel buffer size (at least 1)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Enable or disable the full reload after a rollback
    pub fn reload_after_rollback(mut self, enabled: bool) -> Self {
        self.reload_after_rollback = enabled;
        self
    }
}
