// src/miner/session.rs
//! Shared state of one mining attempt
//!
//! A session covers one template: it starts in [`SessionState::Mining`] and
//! ends either when a worker claims a solution or when the owner cancels
//! it. The state word is the only synchronisation point between workers;
//! the solution slot is written at most once, by the thread that won the
//! claim.

use crate::template::{BlockTemplate, HEADER_LEN, NONCE_LEN};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Not searching: never started, or cancelled
    Idle = 0,
    /// Workers are hashing
    Mining = 1,
    /// A solution was claimed and stored
    Completed = 2,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Mining,
            2 => SessionState::Completed,
            _ => SessionState::Idle,
        }
    }
}

/// A header whose digest meets the template target
#[derive(Clone, Debug)]
pub struct Solution {
    /// Winning nonce as placed in the header
    pub nonce: [u8; NONCE_LEN],
    /// RandomX digest of `header`
    pub hash: [u8; 32],
    /// Full 140-byte solved header
    pub header: [u8; HEADER_LEN],
    /// Template the header was built from
    pub template: Arc<BlockTemplate>,
}

/// State shared by the owner and all workers of one mining attempt
pub struct MiningSession {
    template: Arc<BlockTemplate>,
    state: AtomicU8,
    hashes: AtomicU64,
    solution: OnceLock<Solution>,
    started: Instant,
}

impl MiningSession {
    /// Creates a session in the mining state
    pub fn new(template: Arc<BlockTemplate>) -> Self {
        MiningSession {
            template,
            state: AtomicU8::new(SessionState::Mining as u8),
            hashes: AtomicU64::new(0),
            solution: OnceLock::new(),
            started: Instant::now(),
        }
    }

    pub fn template(&self) -> &Arc<BlockTemplate> {
        &self.template
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_mining(&self) -> bool {
        self.state() == SessionState::Mining
    }

    /// Counts one computed digest
    #[inline]
    pub fn record_hash(&self) {
        self.hashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hash_count(&self) -> u64 {
        self.hashes.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Hashes per second over whole elapsed seconds; zero during the first
    /// second
    pub fn hashrate(&self) -> f64 {
        let secs = self.elapsed().as_secs();
        if secs == 0 {
            return 0.0;
        }
        self.hash_count() as f64 / secs as f64
    }

    /// Tries to become the one thread that reports a solution
    ///
    /// Only the first claim while mining succeeds; it stores `solution` and
    /// moves the session to [`SessionState::Completed`], which makes every
    /// other worker stop. Late or cancelled claims return `false` and leave
    /// the session untouched.
    pub fn claim(&self, solution: Solution) -> bool {
        if self
            .state
            .compare_exchange(
                SessionState::Mining as u8,
                SessionState::Completed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }
        // only the thread that won the state swap reaches this point
        let stored = self.solution.set(solution).is_ok();
        debug_assert!(stored, "solution slot written twice");
        true
    }

    /// Stops the search without a solution
    ///
    /// A completed session stays completed.
    pub fn cancel(&self) {
        let _ = self.state.compare_exchange(
            SessionState::Mining as u8,
            SessionState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Stored solution, if a worker claimed one
    pub fn solution(&self) -> Option<&Solution> {
        self.solution.get()
    }
}
