// src/stats/system.rs
//! Host resource detection and thread-count sizing

use sysinfo::System;

/// Fast mode: dataset plus cache and headroom, in MiB
pub const FAST_MODE_BASE_MB: u64 = 2560;

/// Light mode: one cache plus headroom, in MiB
pub const LIGHT_MODE_BASE_MB: u64 = 300;

/// Per-thread scratchpad and VM overhead, in MiB
pub const PER_THREAD_MB: u64 = 4;

/// CPU and memory available to the miner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemResources {
    /// Logical CPUs
    pub cpu_count: usize,
    /// Physical RAM in MiB
    pub total_memory_mb: u64,
    /// Currently available RAM in MiB
    pub available_memory_mb: u64,
}

impl SystemResources {
    /// Reads the current host state
    pub fn detect() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        SystemResources {
            cpu_count: num_cpus::get(),
            total_memory_mb: system.total_memory() / (1024 * 1024),
            available_memory_mb: system.available_memory() / (1024 * 1024),
        }
    }

    /// Whether the fast-mode dataset fits at all
    pub fn supports_fast_mode(&self) -> bool {
        self.available_memory_mb >= FAST_MODE_BASE_MB
    }

    /// Largest thread count the available memory and CPUs support
    ///
    /// Fast mode returns 0 when the dataset does not fit; otherwise, and
    /// always in light mode, the result is at least one.
    pub fn optimal_threads(&self, fast: bool) -> usize {
        let base = if fast {
            if !self.supports_fast_mode() {
                return 0;
            }
            FAST_MODE_BASE_MB
        } else {
            LIGHT_MODE_BASE_MB
        };
        let spare = self.available_memory_mb.saturating_sub(base);
        let by_memory = usize::try_from(spare / PER_THREAD_MB).unwrap_or(usize::MAX);
        self.cpu_count.min(by_memory).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(cpu_count: usize, available_memory_mb: u64) -> SystemResources {
        SystemResources {
            cpu_count,
            total_memory_mb: available_memory_mb,
            available_memory_mb,
        }
    }

    #[test]
    fn test_fast_mode_needs_dataset_memory() {
        assert_eq!(host(8, 2000).optimal_threads(true), 0);
        assert_eq!(host(8, 2559).optimal_threads(true), 0);
        assert_eq!(host(8, 2560).optimal_threads(true), 1);
        assert_eq!(host(8, 2572).optimal_threads(true), 3);
        assert_eq!(host(8, 16384).optimal_threads(true), 8);
        assert!(!host(8, 2000).supports_fast_mode());
    }

    #[test]
    fn test_light_mode_always_allows_one_thread() {
        assert_eq!(host(4, 100).optimal_threads(false), 1);
        assert_eq!(host(4, 308).optimal_threads(false), 2);
        assert_eq!(host(4, 8192).optimal_threads(false), 4);
        assert_eq!(host(0, 8192).optimal_threads(false), 1);
    }

    #[test]
    fn test_detect_reports_cpus() {
        assert!(SystemResources::detect().cpu_count >= 1);
    }
}
