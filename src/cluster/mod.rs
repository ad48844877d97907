//! Cluster topology for AiKv Redis Cluster clients.
//!
//! This module turns cluster-introspection replies into routing state:
//!
//! ```text
//! CLUSTER NODES ──► parse_cluster_info ──► TopologySnapshot ──► ClusterView
//!                                                                 │ hash, ranges,
//! CLUSTER SLOTS ──► parse_slots_info ──► Vec<SlotRange> ──┐        │ addresses,
//!                                                        ▼        ▼ migrations
//!                                                   RoutingTable (slot → shard)
//! ```
//!
//! [`TopologyCell`] holds the active view and swaps it only when the change
//! hash of a freshly parsed snapshot differs.

mod nodes;
mod routing;
mod slots;
mod topology;

pub use nodes::{parse_cluster_info, MigrationDirection, NodeInfo, SlotMigration, TopologySnapshot};
pub use routing::{RoutingTable, Shard};
pub use slots::{parse_slots_info, SlotRange};
pub use topology::{ClusterView, TopologyCell};

/// Number of hash slots in a Redis Cluster (16384)
pub const SLOT_COUNT: u16 = 16384;
