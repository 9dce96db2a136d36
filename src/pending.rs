//! Short-lived store for commands awaiting user confirmation.
//!
//! Transcribed voice commands are held here between the confirmation
//! prompt and the button press. Tokens are single use: a consume removes
//! the entry, so a double tap on the same button finds nothing the second
//! time. Entries that outlive the TTL are reaped by a periodic sweep.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A command text waiting for its owner to confirm or discard it.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub token: String,
    pub caller_id: u64,
    pub text: String,
    created_at: Instant,
}

impl PendingCommand {
    fn expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Token-keyed pending command store.
///
/// Interior mutability over a plain mutex: entries are touched only from
/// quick synchronous sections of the update handlers, never held across
/// an await.
pub struct PendingCommands {
    entries: Mutex<HashMap<String, PendingCommand>>,
    ttl: Duration,
}

impl PendingCommands {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Park a command and hand back the opaque token to embed in the
    /// confirmation buttons.
    pub fn store(&self, caller_id: u64, text: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let command = PendingCommand {
            token: token.clone(),
            caller_id,
            text: text.to_string(),
            created_at: Instant::now(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(token.clone(), command);
        }
        token
    }

    /// Remove and return the command for `token`. Expired entries count
    /// as absent even if the sweep has not reached them yet.
    pub fn consume(&self, token: &str) -> Option<PendingCommand> {
        let mut entries = self.entries.lock().ok()?;
        let command = entries.remove(token)?;
        if command.expired(self.ttl) {
            return None;
        }
        Some(command)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, command| !command.expired(self.ttl));
        before - entries.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn stored_command_comes_back_intact() {
        let store = PendingCommands::new(Duration::from_secs(300));
        let token = store.store(42, "create issue for the login bug");

        let command = store.consume(&token).expect("token should resolve");
        assert_eq!(command.caller_id, 42);
        assert_eq!(command.text, "create issue for the login bug");
        assert_eq!(command.token, token);
    }

    #[test]
    fn tokens_are_single_use() {
        let store = PendingCommands::new(Duration::from_secs(300));
        let token = store.store(42, "run the deploy task");

        assert!(store.consume(&token).is_some());
        assert!(store.consume(&token).is_none());
    }

    #[test]
    fn unknown_token_resolves_to_nothing() {
        let store = PendingCommands::new(Duration::from_secs(300));
        assert!(store.consume("no-such-token").is_none());
    }

    #[test]
    fn distinct_commands_get_distinct_tokens() {
        let store = PendingCommands::new(Duration::from_secs(300));
        let a = store.store(1, "first");
        let b = store.store(1, "second");
        assert_ne!(a, b);
        assert_eq!(store.consume(&a).map(|c| c.text), Some("first".into()));
        assert_eq!(store.consume(&b).map(|c| c.text), Some("second".into()));
    }

    #[test]
    fn expired_entries_cannot_be_consumed() {
        let store = PendingCommands::new(Duration::from_millis(10));
        let token = store.store(42, "stale command");

        thread::sleep(Duration::from_millis(25));
        assert!(store.consume(&token).is_none());
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let store = PendingCommands::new(Duration::from_millis(40));
        store.store(1, "old");
        thread::sleep(Duration::from_millis(55));
        let fresh = store.store(1, "fresh");

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.consume(&fresh).is_some());
    }

    #[test]
    fn sweep_on_empty_store_is_zero() {
        let store = PendingCommands::new(Duration::from_secs(1));
        assert_eq!(store.sweep_expired(), 0);
    }
}
