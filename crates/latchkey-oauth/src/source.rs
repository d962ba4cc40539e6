//! Nonce and clock sources.
//!
//! Both are injectable so signing can be reproduced exactly in tests.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngExt;

/// Produces a unique, unpredictable `oauth_nonce` per request.
pub trait NonceSource: Send + Sync {
    /// Next nonce.
    fn next(&self) -> String;
}

/// Supplies `oauth_timestamp` as Unix seconds.
pub trait ClockSource: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> u64;
}

/// Cryptographically random nonce (32 hex characters).
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNonce;

impl NonceSource for RandomNonce {
    fn next(&self) -> String {
        let bytes: [u8; 16] = rand::rng().random();
        hex::encode(bytes)
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> u64 {
        // A clock before 1970 is reported as the epoch itself
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}

/// Always returns the same nonce. For tests only: servers reject replays.
#[derive(Debug, Clone)]
pub struct FixedNonce(pub String);

impl FixedNonce {
    /// Create a fixed nonce source.
    pub fn new(nonce: impl Into<String>) -> Self {
        Self(nonce.into())
    }
}

impl NonceSource for FixedNonce {
    fn next(&self) -> String {
        self.0.clone()
    }
}

/// Always returns the same timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl ClockSource for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}
