//! RandomX oracle seam
//!
//! The miner never implements RandomX itself. It drives an opaque backend
//! through [`RandomXBackend`]: caches are seeded, a dataset can be derived
//! from a cache in item ranges, and VMs bound to either one turn byte
//! buffers into 32-byte digests.
//!
//! Allocation and VM creation are expensive and only happen on
//! (re)configuration. [`RandomXBackend::hash`] is the only call on the
//! mining hot path.

/// Production backend over the `rust-randomx` bindings
pub mod rust_randomx;

#[cfg(test)]
pub(crate) mod testing;

use crate::utils::error::MinerError;
use std::ops::Range;
use std::sync::{Arc, Mutex};

pub use self::rust_randomx::RustRandomX;

/// A 32-byte RandomX epoch seed
pub type SeedHash = [u8; 32];

/// Memory a VM reads from
///
/// Light VMs are bound to a cache, fast VMs to a populated dataset; a VM
/// never gets both.
pub enum VmMemory<'a, B: RandomXBackend + ?Sized> {
    /// Cache-backed VM (light mode)
    Light(&'a B::Cache),
    /// Dataset-backed VM (fast mode)
    Fast(&'a B::Dataset),
}

/// Shared handle to one VM
///
/// Exactly one mining thread locks a given VM during a session, so the
/// lock is uncontended; reconfiguration takes it only after every worker
/// has been joined.
pub type VmHandle<B> = Arc<Mutex<<B as RandomXBackend>::Vm>>;

/// Operations the miner needs from a RandomX implementation
pub trait RandomXBackend: Send + Sync + 'static {
    /// Seeded cache (~256 MiB)
    type Cache: Send + Sync;
    /// Full dataset derived from a cache (~2 GiB)
    type Dataset: Send + Sync;
    /// Virtual machine computing digests
    type Vm: Send;

    /// Allocates an unseeded cache
    fn alloc_cache(&self) -> Result<Self::Cache, MinerError>;

    /// Seeds (or re-seeds) `cache` in place
    fn init_cache(&self, cache: &mut Self::Cache, seed: &[u8]) -> Result<(), MinerError>;

    /// Allocates an unpopulated dataset
    fn alloc_dataset(&self) -> Result<Self::Dataset, MinerError>;

    /// Number of independently initialisable dataset items
    fn dataset_item_count(&self) -> u64;

    /// Populates dataset `items` from `cache`
    ///
    /// Called concurrently from several helper threads with disjoint
    /// ranges that together cover `0..dataset_item_count()`.
    fn init_dataset(&self, dataset: &Self::Dataset, cache: &Self::Cache, items: Range<u64>);

    /// Creates a VM bound to `memory`
    fn create_vm(&self, memory: VmMemory<'_, Self>) -> Result<Self::Vm, MinerError>;

    /// Points a fast VM at a (re)populated dataset without recreating it
    fn set_vm_dataset(&self, vm: &mut Self::Vm, dataset: &Self::Dataset) -> Result<(), MinerError>;

    /// Computes the RandomX digest of `input`
    fn hash(&self, vm: &mut Self::Vm, input: &[u8]) -> [u8; 32];
}
