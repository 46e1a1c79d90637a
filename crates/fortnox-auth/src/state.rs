//! CSRF `state` values for in-progress authorizations
//!
//! Each authorization URL carries a fresh random `state`. The value is
//! remembered with a deadline and can be redeemed exactly once. Expired
//! entries are swept lazily whenever a value is issued or checked; there is
//! no background timer.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use tokio::time::{Duration, Instant};

use crate::constants::{STATE_BYTES, STATE_TTL};

/// Generate an unguessable `state` value: 256 random bits, base64url.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Outstanding `state` values and their deadlines.
#[derive(Debug)]
pub struct PendingAuthorizations {
    entries: HashMap<String, Instant>,
    ttl: Duration,
}

impl Default for PendingAuthorizations {
    fn default() -> Self {
        Self::new(STATE_TTL)
    }
}

impl PendingAuthorizations {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Issue and record a new `state` value.
    pub fn issue(&mut self) -> String {
        let state = generate_state();
        self.entries.insert(state.clone(), Instant::now() + self.ttl);
        self.sweep();
        state
    }

    /// Redeem `state`. Returns true only for a known, unexpired value; the
    /// value is removed either way, so a second call always returns false.
    pub fn validate(&mut self, state: &str) -> bool {
        self.sweep();
        match self.entries.remove(state) {
            Some(expires_at) => Instant::now() <= expires_at,
            None => false,
        }
    }

    /// Number of values still awaiting redemption (expired ones included
    /// until the next sweep).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, expires_at| now <= *expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_url_safe_and_256_bits() {
        let state = generate_state();
        // 32 bytes -> 43 base64url chars without padding
        assert_eq!(state.len(), 43);
        assert!(
            state
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "state must be URL-safe base64: {state}"
        );
        let decoded = URL_SAFE_NO_PAD.decode(&state).expect("valid base64url");
        assert_eq!(decoded.len(), STATE_BYTES);
    }

    #[test]
    fn states_are_unique() {
        let mut pending = PendingAuthorizations::default();
        let a = pending.issue();
        let b = pending.issue();
        assert_ne!(a, b);
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn state_validates_exactly_once() {
        let mut pending = PendingAuthorizations::default();
        let states: Vec<String> = (0..5).map(|_| pending.issue()).collect();
        for state in &states {
            assert!(pending.validate(state));
            assert!(!pending.validate(state));
            assert!(!pending.validate(state));
        }
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_state_fails() {
        let mut pending = PendingAuthorizations::default();
        pending.issue();
        assert!(!pending.validate("never-issued"));
        assert!(!pending.validate(""));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_state_fails_on_first_use() {
        let mut pending = PendingAuthorizations::default();
        let state = pending.issue();
        tokio::time::advance(STATE_TTL + Duration::from_secs(1)).await;
        assert!(!pending.validate(&state));
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn state_is_valid_until_ttl() {
        let mut pending = PendingAuthorizations::default();
        let state = pending.issue();
        tokio::time::advance(STATE_TTL - Duration::from_secs(1)).await;
        assert!(pending.validate(&state));
    }

    #[tokio::test(start_paused = true)]
    async fn issuing_sweeps_expired_entries() {
        let mut pending = PendingAuthorizations::default();
        pending.issue();
        pending.issue();
        tokio::time::advance(STATE_TTL + Duration::from_secs(1)).await;
        let fresh = pending.issue();
        assert_eq!(pending.len(), 1);
        assert!(pending.validate(&fresh));
    }
}
