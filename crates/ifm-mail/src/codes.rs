use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Wrong guesses allowed before a code is discarded.
pub const MAX_ATTEMPTS: u32 = 5;

struct Entry {
    code: String,
    expires_at: Instant,
    failed_attempts: u32,
}

/// Outstanding verification codes keyed by recipient address.
///
/// Issuing a new code for a recipient replaces the previous one. A code is
/// consumed by the first successful check or by `MAX_ATTEMPTS` wrong ones.
pub struct CodeStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl CodeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(&self, recipient: &str, code: String) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            normalize(recipient),
            Entry {
                code,
                expires_at: now + self.ttl,
                failed_attempts: 0,
            },
        );
    }

    /// True if `code` matches the live code for `recipient`; the code is
    /// removed on success. Expired codes are dropped and never match.
    pub fn verify(&self, recipient: &str, code: &str) -> bool {
        let key = normalize(recipient);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let Some(entry) = entries.get_mut(&key) else {
            return false;
        };
        let expired = Instant::now() >= entry.expires_at;
        let matched = entry.code == code.trim();
        if !expired && !matched {
            entry.failed_attempts += 1;
        }
        if expired || matched || entry.failed_attempts >= MAX_ATTEMPTS {
            entries.remove(&key);
        }
        matched && !expired
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(recipient: &str) -> String {
    recipient.trim().to_ascii_lowercase()
}
