// src/miner/randomx/rust_randomx.rs
//! RandomX backend over the `rust-randomx` crate
//!
//! `rust-randomx` exposes RandomX as a [`Context`] (cache, plus dataset in
//! fast mode) and a [`Hasher`] bound to one context. Both are reference
//! counted and thread-safe, so caches and datasets here are just context
//! slots that get swapped when a new seed arrives.

use super::{RandomXBackend, VmMemory};
use crate::utils::error::MinerError;
use arc_swap::ArcSwapOption;
use rust_randomx::{Context, Hasher};
use std::ops::Range;
use std::sync::{Arc, OnceLock};

/// Seed plus the light-mode context built from it
///
/// The context is created by the first light VM. Fast mode only reads the
/// seed, since a fast context builds its own cache.
pub struct RxCache {
    seed: Vec<u8>,
    context: OnceLock<Arc<Context>>,
}

impl RxCache {
    fn light_context(&self) -> Result<Arc<Context>, MinerError> {
        if self.seed.is_empty() {
            return Err(MinerError::ResourceError(
                "RandomX cache has not been seeded".into(),
            ));
        }
        let context = self.context.get_or_init(|| {
            log::debug!("Building light RandomX context");
            Arc::new(Context::new(&self.seed, false))
        });
        Ok(Arc::clone(context))
    }
}

/// Fast-mode context slot
///
/// Replaced atomically on each population so VMs rebound through
/// [`RandomXBackend::set_vm_dataset`] pick up the new dataset.
pub struct RxDataset {
    context: ArcSwapOption<Context>,
}

/// Production RandomX backend
#[derive(Debug, Default, Clone, Copy)]
pub struct RustRandomX;

impl RustRandomX {
    pub fn new() -> Self {
        RustRandomX
    }
}

impl RandomXBackend for RustRandomX {
    type Cache = RxCache;
    type Dataset = RxDataset;
    type Vm = Hasher;

    fn alloc_cache(&self) -> Result<RxCache, MinerError> {
        Ok(RxCache {
            seed: Vec::new(),
            context: OnceLock::new(),
        })
    }

    fn init_cache(&self, cache: &mut RxCache, seed: &[u8]) -> Result<(), MinerError> {
        cache.context = OnceLock::new();
        cache.seed = seed.to_vec();
        Ok(())
    }

    fn alloc_dataset(&self) -> Result<RxDataset, MinerError> {
        Ok(RxDataset {
            context: ArcSwapOption::empty(),
        })
    }

    /// Always one
    ///
    /// `rust-randomx` builds a fast context as a single unit and already
    /// spreads the item initialisation across the available cores, so the
    /// whole dataset is handed to one helper.
    fn dataset_item_count(&self) -> u64 {
        1
    }

    fn init_dataset(&self, dataset: &RxDataset, cache: &RxCache, items: Range<u64>) {
        if items.is_empty() || items.start != 0 {
            return;
        }
        log::debug!("Building fast RandomX context");
        dataset
            .context
            .store(Some(Arc::new(Context::new(&cache.seed, true))));
    }

    fn create_vm(&self, memory: VmMemory<'_, Self>) -> Result<Hasher, MinerError> {
        let context = match memory {
            VmMemory::Light(cache) => cache.light_context()?,
            VmMemory::Fast(dataset) => dataset.context.load_full().ok_or_else(|| {
                MinerError::ResourceError("RandomX dataset has not been populated".into())
            })?,
        };
        Ok(Hasher::new(context))
    }

    fn set_vm_dataset(&self, vm: &mut Hasher, dataset: &RxDataset) -> Result<(), MinerError> {
        let context = dataset.context.load_full().ok_or_else(|| {
            MinerError::ResourceError("RandomX dataset has not been populated".into())
        })?;
        vm.update(context);
        Ok(())
    }

    fn hash(&self, vm: &mut Hasher, input: &[u8]) -> [u8; 32] {
        let output = vm.hash(input);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&output.as_ref()[..32]);
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseeded_cache_cannot_back_a_vm() {
        let backend = RustRandomX::new();
        let cache = backend.alloc_cache().unwrap();
        assert!(matches!(
            backend.create_vm(VmMemory::Light(&cache)),
            Err(MinerError::ResourceError(_))
        ));
    }

    #[test]
    fn test_seeding_defers_the_light_context() {
        let backend = RustRandomX::new();
        let mut cache = backend.alloc_cache().unwrap();
        backend.init_cache(&mut cache, &[7u8; 32]).unwrap();
        assert_eq!(cache.seed, vec![7u8; 32]);
        assert!(cache.context.get().is_none());
    }

    #[test]
    fn test_unpopulated_dataset_cannot_back_a_vm() {
        let backend = RustRandomX::new();
        let dataset = backend.alloc_dataset().unwrap();
        assert!(backend.create_vm(VmMemory::Fast(&dataset)).is_err());
    }

    #[test]
    fn test_dataset_is_a_single_item() {
        assert_eq!(RustRandomX::new().dataset_item_count(), 1);
    }
}
