// src/stats/reporter.rs
use crate::network::SubmitOutcome;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::{Components, System};

/// Statistics related to mining performance
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Hashes computed in the current session
    pub hashes_total: u64,
    /// Current session hashrate (hashes per second)
    pub hashrate: f64,
    /// Solved blocks the node stored
    pub blocks_accepted: u64,
    /// Solved blocks the node refused
    pub blocks_rejected: u64,
    /// Seconds since the reporter was created
    pub uptime_secs: u64,
}

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used on the host (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

/// Snapshot of the miner's hash counters
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSample {
    pub hashes: u64,
    pub hashrate: f64,
}

/// Collects and reports mining and hardware statistics
pub struct StatsReporter {
    /// Atomic counters for mining statistics
    stats: Arc<MiningStatsAtomic>,
    /// System information collector
    system: System,
    /// Hardware component information collector
    components: Components,
    /// Interval at which stats are reported
    report_interval: Duration,
}

/// Atomic counters shared with the listener and reporting threads
struct MiningStatsAtomic {
    accepted: AtomicU64,
    rejected: AtomicU64,
    running: AtomicBool,
    start_time: Instant,
}

impl StatsReporter {
    /// Creates a new StatsReporter with the specified reporting interval
    ///
    /// # Arguments
    /// * `report_interval` - How often to log statistics
    pub fn new(report_interval: Duration) -> Self {
        StatsReporter {
            stats: Arc::new(MiningStatsAtomic {
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                running: AtomicBool::new(true),
                start_time: Instant::now(),
            }),
            system: System::new(),
            components: Components::new_with_refreshed_list(),
            report_interval,
        }
    }

    /// Creates and returns a channel sender for block submission results
    ///
    /// The reporter listens for these events on a background thread.
    pub fn result_sender(&self) -> Sender<BlockResult> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.start_result_listener(rx);
        tx
    }

    /// Gets the current mining statistics
    ///
    /// # Arguments
    /// * `sample` - Latest hash counters from the scheduler
    pub fn get_stats(&self, sample: HashSample) -> MiningStats {
        MiningStats {
            hashes_total: sample.hashes,
            hashrate: sample.hashrate,
            blocks_accepted: self.stats.accepted.load(Ordering::Relaxed),
            blocks_rejected: self.stats.rejected.load(Ordering::Relaxed),
            uptime_secs: self.stats.start_time.elapsed().as_secs(),
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    pub fn get_hardware_stats(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU") || c.label().contains("Package"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }

    /// Starts the periodic reporting of statistics
    ///
    /// Spawns a background thread that logs one line per interval until
    /// [`stop`](Self::stop) is called.
    ///
    /// # Arguments
    /// * `source` - Returns the scheduler's current hash counters
    pub fn start_reporting<F>(&self, source: F)
    where
        F: Fn() -> HashSample + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        let interval = self.report_interval;

        std::thread::spawn(move || {
            let mut reporter = StatsReporter {
                stats,
                system: System::new(),
                components: Components::new_with_refreshed_list(),
                report_interval: interval,
            };

            while reporter.stats.running.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if !reporter.stats.running.load(Ordering::Relaxed) {
                    break;
                }
                let mining_stats = reporter.get_stats(source());
                let hw_stats = reporter.get_hardware_stats();

                log::info!(
                    "Hashrate: {} | Hashes: {} | Blocks accepted/rejected: {}/{} | CPU: {:.1}% | Temp: {:.1}°C",
                    format_hashrate(mining_stats.hashrate),
                    mining_stats.hashes_total,
                    mining_stats.blocks_accepted,
                    mining_stats.blocks_rejected,
                    hw_stats.cpu_usage,
                    hw_stats.temperature
                );
            }
        });
    }

    /// Ends the reporting thread after its current sleep
    pub fn stop(&self) {
        self.stats.running.store(false, Ordering::Relaxed);
    }

    /// Starts a listener for block results on a background thread
    fn start_result_listener(&self, receiver: Receiver<BlockResult>) {
        let stats = Arc::clone(&self.stats);

        std::thread::spawn(move || {
            for result in receiver {
                match result {
                    BlockResult::Accepted => stats.accepted.fetch_add(1, Ordering::Relaxed),
                    BlockResult::Rejected => stats.rejected.fetch_add(1, Ordering::Relaxed),
                };
            }
        });
    }
}

/// Result of submitting a solved block to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockResult {
    /// The node stored the block
    Accepted,
    /// The node refused the block
    Rejected,
}

impl From<&SubmitOutcome> for BlockResult {
    fn from(outcome: &SubmitOutcome) -> Self {
        if outcome.is_stored() {
            BlockResult::Accepted
        } else {
            BlockResult::Rejected
        }
    }
}

/// Formats a hashrate with an SI prefix, e.g. `1.50 KH/s`
pub fn format_hashrate(hashrate: f64) -> String {
    if hashrate >= 1e9 {
        format!("{:.2} GH/s", hashrate / 1e9)
    } else if hashrate >= 1e6 {
        format!("{:.2} MH/s", hashrate / 1e6)
    } else if hashrate >= 1e3 {
        format!("{:.2} KH/s", hashrate / 1e3)
    } else {
        format!("{:.2} H/s", hashrate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashrate_formatting() {
        assert_eq!(format_hashrate(0.0), "0.00 H/s");
        assert_eq!(format_hashrate(999.0), "999.00 H/s");
        assert_eq!(format_hashrate(1500.0), "1.50 KH/s");
        assert_eq!(format_hashrate(2.5e6), "2.50 MH/s");
        assert_eq!(format_hashrate(3e9), "3.00 GH/s");
    }

    #[test]
    fn test_outcomes_map_to_results() {
        assert_eq!(BlockResult::from(&SubmitOutcome::Accepted), BlockResult::Accepted);
        assert_eq!(
            BlockResult::from(&SubmitOutcome::Duplicate("duplicate".into())),
            BlockResult::Accepted
        );
        assert_eq!(
            BlockResult::from(&SubmitOutcome::Rejected("rejected".into())),
            BlockResult::Rejected
        );
    }

    #[test]
    fn test_results_are_counted() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        let tx = reporter.result_sender();
        tx.send(BlockResult::Accepted).unwrap();
        tx.send(BlockResult::Accepted).unwrap();
        tx.send(BlockResult::Rejected).unwrap();
        drop(tx);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut stats = reporter.get_stats(HashSample::default());
        while stats.blocks_accepted + stats.blocks_rejected < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            stats = reporter.get_stats(HashSample::default());
        }
        assert_eq!(stats.blocks_accepted, 2);
        assert_eq!(stats.blocks_rejected, 1);
    }
}
