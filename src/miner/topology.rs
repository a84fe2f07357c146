// src/miner/topology.rs
//! NUMA topology detection and thread placement
//!
//! Threads are spread round-robin over memory domains, then round-robin
//! over each domain's CPUs. On a single-domain machine nothing is pinned
//! and the scheduler places threads freely.

use std::fs;
use std::path::{Path, PathBuf};

/// One memory domain and the CPUs attached to it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumaNode {
    pub id: usize,
    pub cpu_ids: Vec<usize>,
}

/// Machine memory layout as seen by the miner
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topology {
    /// No usable NUMA information, or only one domain
    SingleDomain,
    /// Two or more domains, each with at least one CPU
    MultiDomain(Vec<NumaNode>),
}

/// Where a mining thread runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadPlacement {
    /// Index into [`Topology::nodes`]
    pub node: usize,
    /// CPU to pin to
    pub cpu_id: usize,
    /// Ordinal of the thread among those placed on the same node
    pub slot: usize,
}

impl Topology {
    /// Builds a topology from detected nodes, collapsing to single-domain
    /// when fewer than two nodes have CPUs
    pub fn from_nodes(nodes: Vec<NumaNode>) -> Self {
        let nodes: Vec<NumaNode> = nodes.into_iter().filter(|n| !n.cpu_ids.is_empty()).collect();
        if nodes.len() < 2 {
            Topology::SingleDomain
        } else {
            Topology::MultiDomain(nodes)
        }
    }

    pub fn is_multi_domain(&self) -> bool {
        matches!(self, Topology::MultiDomain(_))
    }

    pub fn nodes(&self) -> &[NumaNode] {
        match self {
            Topology::SingleDomain => &[],
            Topology::MultiDomain(nodes) => nodes,
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            Topology::SingleDomain => 1,
            Topology::MultiDomain(nodes) => nodes.len(),
        }
    }

    /// Assigns `threads` mining threads to nodes and CPUs
    ///
    /// Thread `t` goes to node `t mod N`; within a node, the k-th thread
    /// placed there gets CPU `cpu_ids[k mod len]`. Empty on single-domain
    /// machines.
    pub fn assign_threads(&self, threads: usize) -> Vec<ThreadPlacement> {
        let nodes = self.nodes();
        if nodes.is_empty() {
            return Vec::new();
        }

        let mut per_node = vec![0usize; nodes.len()];
        (0..threads)
            .map(|t| {
                let node = t % nodes.len();
                let slot = per_node[node];
                per_node[node] += 1;
                let cpus = &nodes[node].cpu_ids;
                ThreadPlacement {
                    node,
                    cpu_id: cpus[slot % cpus.len()],
                    slot,
                }
            })
            .collect()
    }

    /// Number of placed threads on each node, in node order
    pub fn threads_per_node(placements: &[ThreadPlacement], node_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; node_count];
        for p in placements {
            counts[p.node] += 1;
        }
        counts
    }
}

/// Source of topology information
pub trait TopologyProvider {
    fn detect(&self) -> Topology;
}

/// Reads NUMA layout from Linux sysfs
pub struct SysfsTopology {
    root: PathBuf,
}

impl SysfsTopology {
    pub fn new() -> Self {
        Self::with_root("/sys/devices/system/node")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        SysfsTopology { root: root.into() }
    }

    fn read_nodes(root: &Path) -> std::io::Result<Vec<NumaNode>> {
        let mut nodes = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_prefix("node"))
                .and_then(|n| n.parse::<usize>().ok())
            else {
                continue;
            };
            let cpulist = match fs::read_to_string(entry.path().join("cpulist")) {
                Ok(list) => list,
                Err(_) => continue,
            };
            nodes.push(NumaNode {
                id,
                cpu_ids: parse_cpu_list(&cpulist),
            });
        }
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }
}

impl Default for SysfsTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyProvider for SysfsTopology {
    fn detect(&self) -> Topology {
        match Self::read_nodes(&self.root) {
            Ok(nodes) => {
                let topology = Topology::from_nodes(nodes);
                if let Topology::MultiDomain(nodes) = &topology {
                    log::info!("Detected {} NUMA nodes", nodes.len());
                }
                topology
            }
            Err(e) => {
                log::debug!("NUMA information unavailable ({}), assuming one domain", e);
                Topology::SingleDomain
            }
        }
    }
}

/// Parses a kernel CPU list such as `0-3,8,10-11`
///
/// Malformed fragments are skipped.
pub fn parse_cpu_list(list: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in list.trim().split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                    cpus.extend(lo..=hi);
                }
            }
            None => {
                if let Ok(cpu) = part.parse() {
                    cpus.push(cpu);
                }
            }
        }
    }
    cpus
}

/// Pins the calling thread to `cpu_id`
///
/// Best effort: a failure is logged and mining continues unpinned.
pub fn pin_current_thread(cpu_id: usize) -> bool {
    let pinned = core_affinity::set_for_current(core_affinity::CoreId { id: cpu_id });
    if !pinned {
        log::warn!("Failed to pin thread to CPU {}", cpu_id);
    }
    pinned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> Topology {
        Topology::from_nodes(vec![
            NumaNode { id: 0, cpu_ids: vec![0, 1] },
            NumaNode { id: 1, cpu_ids: vec![2, 3] },
        ])
    }

    #[test]
    fn test_cpu_list_parsing() {
        assert_eq!(parse_cpu_list("0-3,8,10-11\n"), vec![0, 1, 2, 3, 8, 10, 11]);
        assert_eq!(parse_cpu_list(""), Vec::<usize>::new());
        assert_eq!(parse_cpu_list("x,4"), vec![4]);
    }

    #[test]
    fn test_round_robin_placement() {
        let placements = two_nodes().assign_threads(5);
        let nodes: Vec<usize> = placements.iter().map(|p| p.node).collect();
        let cpus: Vec<usize> = placements.iter().map(|p| p.cpu_id).collect();
        assert_eq!(nodes, vec![0, 1, 0, 1, 0]);
        assert_eq!(cpus, vec![0, 2, 1, 3, 0]);
        assert_eq!(placements[4].slot, 2);
        assert_eq!(Topology::threads_per_node(&placements, 2), vec![3, 2]);
    }

    #[test]
    fn test_single_domain_places_nothing() {
        assert!(Topology::SingleDomain.assign_threads(8).is_empty());
        assert_eq!(Topology::SingleDomain.node_count(), 1);
    }

    #[test]
    fn test_cpuless_nodes_collapse_to_single_domain() {
        let topology = Topology::from_nodes(vec![
            NumaNode { id: 0, cpu_ids: vec![0, 1] },
            NumaNode { id: 1, cpu_ids: vec![] },
        ]);
        assert_eq!(topology, Topology::SingleDomain);
    }

    #[test]
    fn test_sysfs_detection() {
        let dir = tempfile::tempdir().unwrap();
        for (node, list) in [("node0", "0-1\n"), ("node1", "2,3\n")] {
            fs::create_dir(dir.path().join(node)).unwrap();
            fs::write(dir.path().join(node).join("cpulist"), list).unwrap();
        }
        fs::create_dir(dir.path().join("power")).unwrap();

        let topology = SysfsTopology::with_root(dir.path()).detect();
        assert_eq!(topology, two_nodes());
    }

    #[test]
    fn test_missing_sysfs_is_single_domain() {
        let topology = SysfsTopology::with_root("/nonexistent/node/tree").detect();
        assert_eq!(topology, Topology::SingleDomain);
    }
}
