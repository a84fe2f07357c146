// src/miner/resources.rs
//! RandomX resource lifecycle
//!
//! Owns every cache, dataset and VM the miner uses and rebuilds them when
//! the seed, thread count or topology demands it. Callers must make sure no
//! mining thread is running while any `&mut self` method executes.

use crate::miner::randomx::{RandomXBackend, SeedHash, VmHandle, VmMemory};
use crate::miner::topology::{pin_current_thread, ThreadPlacement, Topology};
use crate::types::MiningMode;
use crate::utils::error::MinerError;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Outcome of [`ResourceManager::update_seed`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedChange {
    /// Seed was already loaded; nothing was touched
    Unchanged,
    /// Caches (and the dataset in fast mode) were rebuilt for the new seed
    Reloaded,
}

/// Per-node cache and VMs (light mode on multi-domain machines)
struct NodeResources<B: RandomXBackend> {
    vms: Vec<VmHandle<B>>,
    cache: B::Cache,
}

/// RandomX resource manager
pub struct ResourceManager<B: RandomXBackend> {
    // Field order is drop order: VMs go before the memory they read.
    vms: Vec<VmHandle<B>>,
    nodes: Vec<Option<NodeResources<B>>>,
    dataset: Option<B::Dataset>,
    cache: Option<B::Cache>,

    backend: Arc<B>,
    mode: MiningMode,
    topology: Topology,
    thread_count: usize,
    placements: Vec<ThreadPlacement>,
    current_seed: Option<SeedHash>,
    teardowns: usize,
}

impl<B: RandomXBackend> ResourceManager<B> {
    /// Creates an empty manager; nothing is allocated until
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
        if threads == 0 {
            return Err(MinerError::ConfigError(
                "thread count must be at least 1".into(),
            ));
        }
        let placements = topology.assign_threads(threads);
        Ok(ResourceManager {
            vms: Vec::new(),
            nodes: Vec::new(),
            dataset: None,
            cache: None,
            backend,
            mode,
            topology,
            thread_count: threads,
            placements,
            current_seed: None,
            teardowns: 0,
        })
    }

    pub fn mode(&self) -> MiningMode {
        self.mode
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn current_seed(&self) -> Option<SeedHash> {
        self.current_seed
    }

    /// Pinning target for `thread_id`; `None` on single-domain machines
    pub fn placement(&self, thread_id: usize) -> Option<ThreadPlacement> {
        self.placements.get(thread_id).copied()
    }

    /// Number of times held resources were released
    pub fn teardowns(&self) -> usize {
        self.teardowns
    }

    /// True when every thread has a VM
    pub fn is_ready(&self) -> bool {
        (0..self.thread_count).all(|t| self.vm_for_thread(t).is_some())
    }

    fn uses_node_caches(&self) -> bool {
        self.mode == MiningMode::Light && self.topology.is_multi_domain()
    }

    /// Allocates and seeds everything for the configured mode
    ///
    /// Previously held resources are released first. On failure nothing
    /// stays allocated, but the seed is remembered so a later
    /// [`set_thread_count`](Self::set_thread_count) can retry.
    pub fn initialize(&mut self, seed: &[u8]) -> Result<(), MinerError> {
        let seed = parse_seed(seed)?;
        self.release();
        self.current_seed = Some(seed);

        let started = Instant::now();
        if let Err(e) = self.build(&seed) {
            log::error!("RandomX initialization failed: {}", e);
            self.release();
            return Err(e);
        }

        log::info!(
            "RandomX {} mode ready: {} threads in {:.1}s",
            self.mode,
            self.thread_count,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn build(&mut self, seed: &SeedHash) -> Result<(), MinerError> {
        let backend = &*self.backend;
        let mut cache = backend.alloc_cache()?;
        backend.init_cache(&mut cache, seed)?;

        if self.mode == MiningMode::Fast {
            let dataset = backend.alloc_dataset()?;
            populate_dataset(backend, &dataset, &cache)?;
            self.vms = (0..self.thread_count)
                .map(|_| new_vm(backend, VmMemory::Fast(&dataset)))
                .collect::<Result<_, _>>()?;
            self.dataset = Some(dataset);
        } else if self.uses_node_caches() {
            self.nodes = build_node_resources(backend, &self.topology, &self.placements, seed)?;
        } else {
            self.vms = (0..self.thread_count)
                .map(|_| new_vm(backend, VmMemory::Light(&cache)))
                .collect::<Result<_, _>>()?;
        }

        self.cache = Some(cache);
        Ok(())
    }

    /// Switches every cache (and the dataset in fast mode) to `seed`
    ///
    /// A seed equal to the loaded one is a no-op. Fast-mode VMs are
    /// rebound to the regenerated dataset; light-mode VMs are recreated.
    /// If nothing is allocated yet this falls back to a full
    /// [`initialize`](Self::initialize). On failure all resources are
    /// released and the caller must not mine until it reconfigures.
    pub fn update_seed(&mut self, seed: &[u8]) -> Result<SeedChange, MinerError> {
        let seed = parse_seed(seed)?;
        if self.current_seed == Some(seed) && self.is_ready() {
            return Ok(SeedChange::Unchanged);
        }
        if self.cache.is_none() {
            self.initialize(&seed)?;
            return Ok(SeedChange::Reloaded);
        }

        self.current_seed = Some(seed);
        let started = Instant::now();
        if let Err(e) = self.reseed(&seed) {
            log::error!("RandomX seed update failed: {}", e);
            self.release();
            return Err(e);
        }
        log::info!(
            "RandomX seed updated in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        Ok(SeedChange::Reloaded)
    }

    fn reseed(&mut self, seed: &SeedHash) -> Result<(), MinerError> {
        let backend = &*self.backend;
        let cache = self
            .cache
            .as_mut()
            .ok_or_else(|| MinerError::ResourceError("no cache allocated".into()))?;
        backend.init_cache(cache, seed)?;

        if self.mode == MiningMode::Fast {
            let dataset = self
                .dataset
                .as_ref()
                .ok_or_else(|| MinerError::ResourceError("no dataset allocated".into()))?;
            populate_dataset(backend, dataset, &*cache)?;
            for vm in &self.vms {
                backend.set_vm_dataset(&mut lock_vm::<B>(vm), dataset)?;
            }
        } else if self.topology.is_multi_domain() {
            for node in self.nodes.iter_mut().flatten() {
                backend.init_cache(&mut node.cache, seed)?;
                for vm in node.vms.iter_mut() {
                    *vm = new_vm(backend, VmMemory::Light(&node.cache))?;
                }
            }
        } else {
            for vm in self.vms.iter_mut() {
                *vm = new_vm(backend, VmMemory::Light(&*cache))?;
            }
        }
        Ok(())
    }

    /// Resizes the VM set to `threads`
    ///
    /// Releases everything, recomputes placement and, if a seed was ever
    /// loaded, re-initializes with it. Zero is rejected without touching
    /// any state.
    pub fn set_thread_count(&mut self, threads: usize) -> Result<(), MinerError> {
        if threads == 0 {
            return Err(MinerError::ConfigError(
                "thread count must be at least 1".into(),
            ));
        }
        if threads == self.thread_count && self.is_ready() {
            return Ok(());
        }

        log::info!("Changing thread count {} -> {}", self.thread_count, threads);
        self.release();
        self.thread_count = threads;
        self.placements = self.topology.assign_threads(threads);

        match self.current_seed {
            Some(seed) => self.initialize(&seed),
            None => Ok(()),
        }
    }

    /// VM owned by mining thread `thread_id`
    ///
    /// `None` for ids outside `0..thread_count` or when resources are not
    /// built.
    pub fn vm_for_thread(&self, thread_id: usize) -> Option<VmHandle<B>> {
        if thread_id >= self.thread_count {
            return None;
        }
        if self.uses_node_caches() {
            let placement = self.placements.get(thread_id)?;
            let node = self.nodes.get(placement.node)?.as_ref()?;
            node.vms.get(placement.slot).cloned()
        } else {
            self.vms.get(thread_id).cloned()
        }
    }

    /// Drops all VMs, the dataset and every cache, in that order
    pub fn release(&mut self) {
        let held = !self.vms.is_empty()
            || !self.nodes.is_empty()
            || self.dataset.is_some()
            || self.cache.is_some();

        self.vms.clear();
        self.nodes.clear();
        self.dataset = None;
        self.cache = None;

        if held {
            self.teardowns += 1;
            log::debug!("RandomX resources released");
        }
    }
}

/// Checks that `seed` is exactly 32 bytes
pub fn parse_seed(seed: &[u8]) -> Result<SeedHash, MinerError> {
    SeedHash::try_from(seed).map_err(|_| {
        MinerError::ConfigError(format!("seed hash must be 32 bytes, got {}", seed.len()))
    })
}

/// Locks a VM, ignoring poisoning from a panicked worker
pub(crate) fn lock_vm<B: RandomXBackend>(vm: &VmHandle<B>) -> MutexGuard<'_, B::Vm> {
    vm.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_vm<B: RandomXBackend>(
    backend: &B,
    memory: VmMemory<'_, B>,
) -> Result<VmHandle<B>, MinerError> {
    Ok(Arc::new(Mutex::new(backend.create_vm(memory)?)))
}

/// Splits `0..items` into `helpers` contiguous ranges
///
/// All ranges get `items / helpers` items except the last, which also
/// takes the remainder. Never yields more ranges than items.
pub fn dataset_chunks(items: u64, helpers: usize) -> Vec<Range<u64>> {
    if items == 0 {
        return Vec::new();
    }
    let helpers = (helpers as u64).clamp(1, items);
    let per_helper = items / helpers;
    (0..helpers)
        .map(|i| {
            let start = i * per_helper;
            let end = if i + 1 == helpers { items } else { start + per_helper };
            start..end
        })
        .collect()
}

/// Populates `dataset` from `cache` on a short-lived helper pool
///
/// The pool is sized by hardware concurrency, not by mining threads.
fn populate_dataset<B: RandomXBackend>(
    backend: &B,
    dataset: &B::Dataset,
    cache: &B::Cache,
) -> Result<(), MinerError> {
    let items = backend.dataset_item_count();
    let helpers = num_cpus::get().min(usize::try_from(items).unwrap_or(usize::MAX)).max(1);
    let chunks = dataset_chunks(items, helpers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(helpers)
        .thread_name(|i| format!("rx-dataset-{}", i))
        .build()?;

    let started = Instant::now();
    pool.scope(|s| {
        for chunk in chunks {
            s.spawn(move |_| backend.init_dataset(dataset, cache, chunk));
        }
    });
    log::info!(
        "Dataset initialized in {:.1}s using {} helper threads",
        started.elapsed().as_secs_f64(),
        helpers
    );
    Ok(())
}

/// Builds one cache and its VMs per node that hosts at least one thread
///
/// Each node is set up from a thread pinned to one of its CPUs so the
/// cache pages are first touched, and therefore placed, on that node.
fn build_node_resources<B: RandomXBackend>(
    backend: &B,
    topology: &Topology,
    placements: &[ThreadPlacement],
    seed: &SeedHash,
) -> Result<Vec<Option<NodeResources<B>>>, MinerError> {
    let nodes = topology.nodes();
    let counts = Topology::threads_per_node(placements, nodes.len());

    std::thread::scope(|s| {
        let handles: Vec<_> = nodes
            .iter()
            .zip(counts)
            .map(|(node, count)| {
                s.spawn(move || -> Result<Option<NodeResources<B>>, MinerError> {
                    if count == 0 {
                        return Ok(None);
                    }
                    if let Some(&cpu) = node.cpu_ids.first() {
                        pin_current_thread(cpu);
                    }
                    let mut cache = backend.alloc_cache()?;
                    backend.init_cache(&mut cache, seed)?;
                    let vms = (0..count)
                        .map(|_| new_vm(backend, VmMemory::Light(&cache)))
                        .collect::<Result<Vec<_>, _>>()?;
                    log::info!("NUMA node {}: cache ready, {} VMs", node.id, count);
                    Ok(Some(NodeResources { vms, cache }))
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(MinerError::ResourceError("node setup thread panicked".into()))
                })
            })
            .collect()
    })
}
