use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Time-based deny list of abusive origins.
///
/// Entries past their expiry are logically absent; they are evicted
/// lazily on read under the same lock that guards inserts.
#[derive(Default)]
pub struct BlockList {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `origin` until `now + duration`, replacing any prior entry.
    /// Returns the expiry instant.
    pub fn insert(&self, origin: &str, duration: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
        let until = now + duration;
        self.entries
            .lock()
            .expect("block list lock poisoned")
            .insert(origin.to_owned(), until);
        until
    }

    pub fn is_blocked(&self, origin: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().expect("block list lock poisoned");
        match entries.get(origin) {
            None => false,
            Some(&until) if until <= now => {
                entries.remove(origin);
                false
            }
            Some(_) => true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("block list lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
