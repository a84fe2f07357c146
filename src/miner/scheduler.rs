// src/miner/scheduler.rs
//! Mining thread scheduler
//!
//! Starts one worker per configured thread for each template, stops and
//! joins them, and serialises every reconfiguration of the RandomX
//! resources against running workers.

use crate::miner::randomx::{RandomXBackend, SeedHash};
use crate::miner::resources::{ResourceManager, SeedChange};
use crate::miner::session::{MiningSession, SessionState, Solution};
use crate::miner::topology::Topology;
use crate::miner::worker::{Worker, WorkerExit};
use crate::template::BlockTemplate;
use crate::types::MiningMode;
use crate::utils::error::MinerError;
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Coordinates mining threads over one set of RandomX resources
pub struct Scheduler<B: RandomXBackend> {
    /// RandomX implementation shared with workers
    backend: Arc<B>,
    /// Caches, dataset and VMs; locked for every start and reconfiguration
    resources: Mutex<ResourceManager<B>>,
    /// Current (or last) session, readable without locking
    session: ArcSwapOption<MiningSession>,
    /// Join handles of the running workers
    workers: Mutex<Vec<JoinHandle<WorkerExit>>>,
}

impl<B: RandomXBackend> Scheduler<B> {
    /// Creates a scheduler; RandomX memory is allocated by
    /// [`initialize`](Self::initialize)
    ///
    /// # Arguments
    /// * `backend` - RandomX implementation
    /// * `topology` - Detected memory layout
    /// * `mode` - Light or fast VMs
    /// * `threads` - Number of mining threads, at least one
    pub fn new(
        backend: Arc<B>,
        topology: Topology,
        mode: MiningMode,
        threads: usize,
    ) -> Result<Self, MinerError> {
        let resources = ResourceManager::new(Arc::clone(&backend), topology, mode, threads)?;
        Ok(Scheduler {
            backend,
            resources: Mutex::new(resources),
            session: ArcSwapOption::empty(),
            workers: Mutex::new(Vec::new()),
        })
    }

    fn resources(&self) -> MutexGuard<'_, ResourceManager<B>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds RandomX resources for `seed`
    pub fn initialize(&self, seed: &[u8]) -> Result<(), MinerError> {
        let mut resources = self.resources();
        self.halt();
        resources.initialize(seed)
    }

    /// Starts mining `template` on every thread
    ///
    /// Any previous session is stopped first. Fails if the resources are
    /// not built or a thread cannot be spawned; in the latter case the
    /// workers already running are stopped again.
    pub fn start_mining(&self, template: Arc<BlockTemplate>) -> Result<(), MinerError> {
        let resources = self.resources();
        self.halt();

        if !resources.is_ready() {
            return Err(MinerError::ResourceError(
                "RandomX resources are not initialized".into(),
            ));
        }

        let session = Arc::new(MiningSession::new(Arc::clone(&template)));
        self.session.store(Some(Arc::clone(&session)));

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for id in 0..resources.thread_count() {
            let vm = resources.vm_for_thread(id).ok_or_else(|| {
                MinerError::ResourceError(format!("no VM for thread {}", id))
            });
            let vm = match vm {
                Ok(vm) => vm,
                Err(e) => {
                    drop(workers);
                    self.halt();
                    return Err(e);
                }
            };
            let worker = Worker::new(
                id,
                Arc::clone(&self.backend),
                vm,
                resources.placement(id),
                Arc::clone(&session),
            );
            let spawned = std::thread::Builder::new()
                .name(format!("rx-miner-{}", id))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    drop(workers);
                    self.halt();
                    return Err(e.into());
                }
            }
        }

        log::info!(
            "Mining block {} with {} threads",
            template.height,
            resources.thread_count()
        );
        Ok(())
    }

    /// Cancels the current session and joins every worker
    fn halt(&self) {
        if let Some(session) = self.session.load_full() {
            session.cancel();
        }
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                log::error!("Mining thread panicked");
            }
        }
    }

    /// Stops mining and waits for all threads to exit
    pub fn stop(&self) {
        let _resources = self.resources();
        self.halt();
    }

    pub fn is_mining(&self) -> bool {
        self.session
            .load()
            .as_ref()
            .is_some_and(|s| s.is_mining())
    }

    /// Lifecycle state of the current session
    pub fn state(&self) -> SessionState {
        self.session
            .load()
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state())
    }

    /// Solution of the last session
    ///
    /// Joins the workers first so the returned value is final.
    pub fn solution(&self) -> Option<Solution> {
        if self.state() == SessionState::Completed {
            self.stop();
        }
        self.session.load().as_ref()?.solution().cloned()
    }

    /// Digests computed in the current session
    pub fn hash_count(&self) -> u64 {
        self.session.load().as_ref().map_or(0, |s| s.hash_count())
    }

    /// Hashes per second in the current session
    pub fn hashrate(&self) -> f64 {
        self.session.load().as_ref().map_or(0.0, |s| s.hashrate())
    }

    /// Switches to a new RandomX seed
    ///
    /// Mining is stopped only when the seed actually changes.
    pub fn update_seed(&self, seed: &[u8]) -> Result<SeedChange, MinerError> {
        let mut resources = self.resources();
        if resources.current_seed().is_some_and(|s| s[..] == *seed) && resources.is_ready() {
            return Ok(SeedChange::Unchanged);
        }
        self.halt();
        resources.update_seed(seed)
    }

    /// Changes the number of mining threads, rebuilding all VMs
    pub fn set_thread_count(&self, threads: usize) -> Result<(), MinerError> {
        let mut resources = self.resources();
        if threads == 0 {
            return Err(MinerError::ConfigError(
                "thread count must be at least 1".into(),
            ));
        }
        self.halt();
        resources.set_thread_count(threads)
    }

    pub fn thread_count(&self) -> usize {
        self.resources().thread_count()
    }

    pub fn mode(&self) -> MiningMode {
        self.resources().mode()
    }

    pub fn current_seed(&self) -> Option<SeedHash> {
        self.resources().current_seed()
    }
}

impl<B: RandomXBackend> Drop for Scheduler<B> {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::randomx::testing::FakeBackend;
    use crate::template::block_template::tests::block_1583;
    use crate::template::hash_meets_target;
    use std::time::{Duration, Instant};

    const SEED: [u8; 32] = [0x5e; 32];

    fn scheduler(threads: usize) -> Scheduler<FakeBackend> {
        let s = Scheduler::new(
            Arc::new(FakeBackend::new()),
            Topology::SingleDomain,
            MiningMode::Light,
            threads,
        )
        .unwrap();
        s.initialize(&SEED).unwrap();
        s
    }

    fn template_with_word7(word7: u32) -> Arc<BlockTemplate> {
        let mut target = [0xffu8; 32];
        target[28..].copy_from_slice(&word7.to_le_bytes());
        Arc::new(BlockTemplate::parse(&block_1583()).unwrap().with_target(target))
    }

    fn wait_until_done(s: &Scheduler<FakeBackend>) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while s.is_mining() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_race_produces_one_valid_solution() {
        let s = scheduler(8);
        let template = template_with_word7(0x2000_0000);
        s.start_mining(Arc::clone(&template)).unwrap();
        wait_until_done(&s);

        let handles: Vec<_> = s.workers.lock().unwrap().drain(..).collect();
        assert_eq!(handles.len(), 8);
        let exits: Vec<WorkerExit> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let found = exits.iter().filter(|e| **e == WorkerExit::Found).count();
        assert_eq!(found, 1, "exits: {:?}", exits);

        let solution = s.solution().expect("solution");
        assert_eq!(s.state(), SessionState::Completed);
        assert!(hash_meets_target(&solution.hash, &template.target));
        assert_eq!(solution.hash, FakeBackend::digest(&SEED, &solution.header));
        assert_eq!(&solution.header[..108], template.header_prefix());
        assert!(s.hash_count() >= 1);
    }

    #[test]
    fn test_stop_cancels_unsolvable_search() {
        let s = scheduler(2);
        s.start_mining(template_with_word7(0).with_target([0; 32]).into())
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(s.is_mining());

        s.stop();
        assert!(!s.is_mining());
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.solution().is_none());
    }

    #[test]
    fn test_restart_replaces_session() {
        let s = scheduler(2);
        let unsolvable = Arc::new(template_with_word7(0).with_target([0; 32]));
        s.start_mining(Arc::clone(&unsolvable)).unwrap();
        s.start_mining(unsolvable).unwrap();
        assert!(s.is_mining());
        s.stop();
    }

    #[test]
    fn test_unchanged_seed_keeps_mining() {
        let s = scheduler(2);
        s.start_mining(Arc::new(template_with_word7(0).with_target([0; 32])))
            .unwrap();
        assert_eq!(s.update_seed(&SEED).unwrap(), SeedChange::Unchanged);
        assert!(s.is_mining());

        assert_eq!(s.update_seed(&[1u8; 32]).unwrap(), SeedChange::Reloaded);
        assert!(!s.is_mining());
        assert_eq!(s.current_seed(), Some([1u8; 32]));
    }

    #[test]
    fn test_thread_count_change() {
        let s = scheduler(2);
        assert!(s.set_thread_count(0).is_err());
        assert_eq!(s.thread_count(), 2);

        s.set_thread_count(4).unwrap();
        assert_eq!(s.thread_count(), 4);
        s.start_mining(template_with_word7(0x2000_0000)).unwrap();
        wait_until_done(&s);
        assert!(s.solution().is_some());
    }

    #[test]
    fn test_start_requires_initialized_resources() {
        let s = Scheduler::new(
            Arc::new(FakeBackend::new()),
            Topology::SingleDomain,
            MiningMode::Fast,
            1,
        )
        .unwrap();
        assert!(matches!(
            s.start_mining(template_with_word7(0xffff_ffff)),
            Err(MinerError::ResourceError(_))
        ));
        assert_eq!(s.hashrate(), 0.0);
    }
}
