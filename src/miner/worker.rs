// src/miner/worker.rs
//! Nonce search worker
//!
//! Each mining thread owns one VM and one 140-byte header buffer. It starts
//! from a random nonce and walks forward one step at a time until it finds
//! a digest under the target or the session stops.

use crate::miner::randomx::{RandomXBackend, VmHandle};
use crate::miner::resources::lock_vm;
use crate::miner::session::{MiningSession, Solution};
use crate::miner::topology::{pin_current_thread, ThreadPlacement};
use crate::template::{hash_meets_target, HEADER_PREFIX_LEN, NONCE_LEN};
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;

/// How a worker's search ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// This worker claimed the solution
    Found,
    /// Found a valid digest but another worker claimed first
    Lost,
    /// Session stopped before this worker found anything
    Stopped,
}

/// One mining thread's search loop
pub struct Worker<B: RandomXBackend> {
    /// Thread ordinal, used for logging
    id: usize,
    /// RandomX implementation
    backend: Arc<B>,
    /// VM this worker hashes with exclusively
    vm: VmHandle<B>,
    /// CPU to pin to on multi-domain machines
    placement: Option<ThreadPlacement>,
    /// Session this worker searches for
    session: Arc<MiningSession>,
}

impl<B: RandomXBackend> Worker<B> {
    /// Creates a new Worker instance
    ///
    /// # Arguments
    /// * `id` - Thread ordinal
    /// * `backend` - RandomX implementation
    /// * `vm` - VM owned by this thread
    /// * `placement` - Pinning target, if any
    /// * `session` - Session to search for
    pub fn new(
        id: usize,
        backend: Arc<B>,
        vm: VmHandle<B>,
        placement: Option<ThreadPlacement>,
        session: Arc<MiningSession>,
    ) -> Self {
        Worker {
            id,
            backend,
            vm,
            placement,
            session,
        }
    }

    /// Searches until a solution is found or the session stops
    pub fn run(self) -> WorkerExit {
        if let Some(placement) = self.placement {
            pin_current_thread(placement.cpu_id);
        }

        let mut vm = lock_vm::<B>(&self.vm);
        let template = self.session.template();
        let mut header = *template.header_base();
        let mut nonce = random_nonce();

        log::debug!("Worker {} started", self.id);

        while self.session.is_mining() {
            header[HEADER_PREFIX_LEN..].copy_from_slice(&nonce);
            let hash = self.backend.hash(&mut vm, &header);
            self.session.record_hash();

            if hash_meets_target(&hash, &template.target) {
                let solution = Solution {
                    nonce,
                    hash,
                    header,
                    template: Arc::clone(template),
                };
                return if self.session.claim(solution) {
                    log::info!("Worker {} found a solution", self.id);
                    WorkerExit::Found
                } else {
                    WorkerExit::Lost
                };
            }

            increment_nonce(&mut nonce);
        }

        WorkerExit::Stopped
    }
}

/// Fresh random starting nonce
///
/// Bytes 0, 1, 30 and 31 are cleared so the walk has headroom at both ends
/// before carrying out of the random region.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    if let Err(e) = OsRng.try_fill_bytes(&mut nonce) {
        log::warn!("OS entropy unavailable ({}), using thread RNG", e);
        rand::thread_rng().fill_bytes(&mut nonce);
    }
    nonce[0] = 0;
    nonce[1] = 0;
    nonce[30] = 0;
    nonce[31] = 0;
    nonce
}

/// Adds one to `nonce` read as a 256-bit little-endian integer
pub fn increment_nonce(nonce: &mut [u8; NONCE_LEN]) {
    for byte in nonce.iter_mut() {
        let (next, carry) = byte.overflowing_add(1);
        *byte = next;
        if !carry {
            break;
        }
    }
}
