use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{Level, event};

/// What happened to a remote record, as worded in a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeVerb {
    Created,
    Updated,
    Removed,
}

impl fmt::Display for ChangeVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Removed => "removed",
        };
        write!(f, "{label}")
    }
}

pub fn change_message(kind: &str, title: &str, verb: ChangeVerb) -> String {
    format!("{kind} \"{title}\" was {verb}")
}

/// Sink for transient "someone changed X" messages.
///
/// Implementations must return promptly; the Reconciler has already
/// written the store when `notify` runs.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

/// Emits every toast as a tracing event.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    label: Option<String>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every message with the owning client, handy when several views
    /// share one process.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        match &self.label {
            Some(label) => event!(Level::INFO, client = %label, "{message}"),
            None => event!(Level::INFO, "{message}"),
        }
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn message_names_kind_title_and_verb() {
        assert_eq!(
            change_message("Event", "Dentist", ChangeVerb::Removed),
            "Event \"Dentist\" was removed"
        );
    }

    #[test]
    fn closures_are_notifiers() {
        let calls = AtomicUsize::new(0);
        let notifier = |_: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        notifier.notify("hello");
        notifier.notify("again");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.notify("one");
        notifier.notify("two");
        assert_eq!(notifier.messages(), vec!["one", "two"]);
        notifier.clear();
        assert_eq!(notifier.count(), 0);
    }
}
