//! Views derived from a [`TopologySnapshot`] and the holder of the active one.
//!
//! A refresh loop parses `CLUSTER NODES`, hands the snapshot to
//! [`TopologyCell::apply`], and the cell swaps the active [`ClusterView`] only
//! when the snapshot's change hash differs from the current one. Readers take
//! an `Arc` of the view and never observe a half-built topology.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::nodes::{NodeInfo, TopologySnapshot};
use super::routing::RoutingTable;
use super::slots::SlotRange;
use crate::config::ObservabilityConfig;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a digest, fed incrementally.
struct Fnv64a(u64);

impl Fnv64a {
    fn new() -> Self {
        Self(FNV_OFFSET)
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Write for Fnv64a {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        for byte in s.bytes() {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
        Ok(())
    }
}

impl TopologySnapshot {
    /// Order-sensitive digest of the snapshot.
    ///
    /// Covers every node's id, endpoint, bus port, failure flag, master id
    /// and owned ranges. Two snapshots parsed from identical replies hash
    /// equally; reordering nodes changes the hash.
    pub fn hash_sum(&self) -> u64 {
        let mut hasher = Fnv64a::new();
        for node in self {
            // Writing into the hasher cannot fail.
            let _ = write!(
                hasher,
                "{}\t{}\t{}\t{}\t{}",
                node.id,
                node.endpoint,
                node.bus_port,
                node.failed,
                node.replica_of.as_deref().unwrap_or("")
            );
            for (from, to) in &node.owned_slots {
                let _ = write!(hasher, "\t{}-{}", from, to);
            }
            let _ = hasher.write_str("\n");
        }
        hasher.finish()
    }

    /// Add every reachable endpoint to `addresses` and every slot under
    /// migration (in either direction) to `migrating`.
    pub fn collect_addresses_and_migrations(
        &self,
        addresses: &mut HashSet<String>,
        migrating: &mut HashSet<u16>,
    ) {
        for node in self {
            if !node.host.is_empty() && node.port != 0 {
                addresses.insert(node.endpoint.clone());
            }
            migrating.extend(node.migrations.iter().map(|m| m.slot));
        }
    }

    /// The routing table: one range per owned slot range of every master,
    /// served by the master followed by its replicas in snapshot order.
    pub fn slots_ranges(&self) -> Vec<SlotRange> {
        let mut replicas: HashMap<&str, Vec<String>> = HashMap::new();
        for node in self {
            if let Some(master) = node.replica_of.as_deref() {
                replicas
                    .entry(master)
                    .or_default()
                    .push(node.endpoint.clone());
            }
        }

        let mut ranges = Vec::new();
        for master in self.masters() {
            let mut addresses = vec![master.endpoint.clone()];
            if let Some(rs) = replicas.get(master.id.as_str()) {
                addresses.extend(rs.iter().cloned());
            }
            for &(from, to) in &master.owned_slots {
                ranges.push(SlotRange::new(from, to, addresses.clone()));
            }
        }
        ranges.sort_by_key(|range| range.from);
        ranges
    }

    pub fn masters(&self) -> impl Iterator<Item = &NodeInfo> {
        self.iter().filter(|node| node.is_master())
    }

    pub fn replicas_of<'a>(&'a self, master_id: &'a str) -> impl Iterator<Item = &'a NodeInfo> {
        self.iter()
            .filter(move |node| node.replica_of.as_deref() == Some(master_id))
    }

    /// The node that answered `CLUSTER NODES`.
    pub fn myself(&self) -> Option<&NodeInfo> {
        self.iter().find(|node| node.is_self)
    }

    pub fn node(&self, id: &str) -> Option<&NodeInfo> {
        self.iter().find(|node| node.id == id)
    }
}

/// Everything a client needs from one topology snapshot, computed once.
#[derive(Debug, Default)]
pub struct ClusterView {
    snapshot: TopologySnapshot,
    hash: u64,
    ranges: Vec<SlotRange>,
    routing: RoutingTable,
    addresses: HashSet<String>,
    migrating: HashSet<u16>,
}

impl ClusterView {
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Self {
        let hash = snapshot.hash_sum();
        let ranges = snapshot.slots_ranges();
        let routing = RoutingTable::from_ranges(&ranges);
        let mut addresses = HashSet::new();
        let mut migrating = HashSet::new();
        snapshot.collect_addresses_and_migrations(&mut addresses, &mut migrating);

        Self {
            snapshot,
            hash,
            ranges,
            routing,
            addresses,
            migrating,
        }
    }

    pub fn snapshot(&self) -> &TopologySnapshot {
        &self.snapshot
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn ranges(&self) -> &[SlotRange] {
        &self.ranges
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Endpoints the connection layer should keep connected.
    pub fn addresses(&self) -> &HashSet<String> {
        &self.addresses
    }

    /// Whether `slot` is being migrated and may answer with ASK.
    pub fn is_migrating(&self, slot: u16) -> bool {
        self.migrating.contains(&slot)
    }

    pub fn migrating_slots(&self) -> &HashSet<u16> {
        &self.migrating
    }
}

/// Holder of the active [`ClusterView`].
#[derive(Debug)]
pub struct TopologyCell {
    current: RwLock<Arc<ClusterView>>,
    observability: ObservabilityConfig,
}

impl TopologyCell {
    /// Create a cell holding an empty topology.
    pub fn new(observability: ObservabilityConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(ClusterView::from_snapshot(
                TopologySnapshot::default(),
            ))),
            observability,
        }
    }

    /// The active view.
    pub fn load(&self) -> Arc<ClusterView> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the active view if `snapshot` differs from it.
    ///
    /// Returns `true` when the view was swapped.
    pub fn apply(&self, snapshot: TopologySnapshot) -> bool {
        let hash = snapshot.hash_sum();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if guard.hash() == hash {
            debug!(hash, "cluster topology unchanged");
            return false;
        }

        let view = ClusterView::from_snapshot(snapshot);
        if self.observability.log_topology_changes {
            info!(
                old_hash = guard.hash(),
                new_hash = hash,
                nodes = view.snapshot().len(),
                shards = view.routing().shard_count(),
                migrating = view.migrating_slots().len(),
                "cluster topology changed"
            );
        }
        *guard = Arc::new(view);
        true
    }
}

impl Default for TopologyCell {
    fn default() -> Self {
        Self::new(ObservabilityConfig::default())
    }
}
