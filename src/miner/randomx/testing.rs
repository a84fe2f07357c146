//! Deterministic in-memory backend for unit tests

use super::{RandomXBackend, VmMemory};
use crate::utils::error::MinerError;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Allocation and call counters shared with the test
#[derive(Default)]
pub(crate) struct Counters {
    pub caches_allocated: AtomicUsize,
    pub caches_seeded: AtomicUsize,
    pub datasets_allocated: AtomicUsize,
    pub vms_created: AtomicUsize,
    pub vms_rebound: AtomicUsize,
    pub chunks: Mutex<Vec<Range<u64>>>,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeCache {
    pub seed: Vec<u8>,
}

pub(crate) struct FakeDataset {
    seed: Arc<Mutex<Vec<u8>>>,
}

/// Light VMs copy the cache seed, fast VMs share the dataset slot
pub(crate) struct FakeVm {
    seed: Arc<Mutex<Vec<u8>>>,
}

pub(crate) struct FakeBackend {
    pub counters: Arc<Counters>,
    items: u64,
    vm_budget: Option<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend {
            counters: Arc::new(Counters::default()),
            items: 1000,
            vm_budget: None,
        }
    }

    pub fn with_items(mut self, items: u64) -> Self {
        self.items = items;
        self
    }

    /// Fails every VM creation after the first `n`
    pub fn failing_after_vms(mut self, n: usize) -> Self {
        self.vm_budget = Some(AtomicUsize::new(n));
        self
    }

    /// Lets `n` more VM creations succeed on a budgeted backend
    pub fn allow_vms(&self, n: usize) {
        if let Some(budget) = &self.vm_budget {
            budget.store(n, Ordering::SeqCst);
        }
    }

    pub fn digest(seed: &[u8], input: &[u8]) -> [u8; 32] {
        let mut lanes = [
            0xcbf2_9ce4_8422_2325u64,
            0x9e37_79b9_7f4a_7c15,
            0x6a09_e667_f3bc_c908,
            0xbb67_ae85_84ca_a73b,
        ];
        for (i, byte) in seed.iter().chain(input).enumerate() {
            let lane = &mut lanes[i % 4];
            *lane = (*lane ^ u64::from(*byte))
                .wrapping_mul(0x0100_0000_01b3)
                .rotate_left(7);
        }
        for _ in 0..4 {
            for i in 0..4 {
                let next = lanes[(i + 1) % 4];
                lanes[i] ^= next.rotate_left(17);
                lanes[i] = lanes[i].wrapping_mul(0x9e37_79b9_7f4a_7c15);
                lanes[i] ^= lanes[i] >> 29;
            }
        }
        let mut out = [0u8; 32];
        for (chunk, lane) in out.chunks_mut(8).zip(lanes) {
            chunk.copy_from_slice(&lane.to_le_bytes());
        }
        out
    }
}

impl RandomXBackend for FakeBackend {
    type Cache = FakeCache;
    type Dataset = FakeDataset;
    type Vm = FakeVm;

    fn alloc_cache(&self) -> Result<FakeCache, MinerError> {
        self.counters.caches_allocated.fetch_add(1, Ordering::SeqCst);
        Ok(FakeCache { seed: Vec::new() })
    }

    fn init_cache(&self, cache: &mut FakeCache, seed: &[u8]) -> Result<(), MinerError> {
        self.counters.caches_seeded.fetch_add(1, Ordering::SeqCst);
        cache.seed = seed.to_vec();
        Ok(())
    }

    fn alloc_dataset(&self) -> Result<FakeDataset, MinerError> {
        self.counters.datasets_allocated.fetch_add(1, Ordering::SeqCst);
        Ok(FakeDataset {
            seed: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn dataset_item_count(&self) -> u64 {
        self.items
    }

    fn init_dataset(&self, dataset: &FakeDataset, cache: &FakeCache, items: Range<u64>) {
        self.counters.chunks.lock().unwrap().push(items);
        *dataset.seed.lock().unwrap() = cache.seed.clone();
    }

    fn create_vm(&self, memory: VmMemory<'_, Self>) -> Result<FakeVm, MinerError> {
        if let Some(budget) = &self.vm_budget {
            if budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            {
                return Err(MinerError::ResourceError("VM creation failed".into()));
            }
        }
        self.counters.vms_created.fetch_add(1, Ordering::SeqCst);
        let seed = match memory {
            VmMemory::Light(cache) => Arc::new(Mutex::new(cache.seed.clone())),
            VmMemory::Fast(dataset) => Arc::clone(&dataset.seed),
        };
        Ok(FakeVm { seed })
    }

    fn set_vm_dataset(&self, vm: &mut FakeVm, dataset: &FakeDataset) -> Result<(), MinerError> {
        self.counters.vms_rebound.fetch_add(1, Ordering::SeqCst);
        vm.seed = Arc::clone(&dataset.seed);
        Ok(())
    }

    fn hash(&self, vm: &mut FakeVm, input: &[u8]) -> [u8; 32] {
        let seed = vm.seed.lock().unwrap();
        Self::digest(&seed, input)
    }
}
