//! AiKv cluster client core.
//!
//! Topology resolution and slot routing for Redis Cluster clients:
//!
//! - [`cluster`] parses `CLUSTER NODES` / `CLUSTER SLOTS` replies, derives
//!   the routing table and change hash, and holds the active topology
//! - [`scan`] drives a `SCAN` across every master shard
//! - [`protocol`] defines the decoded reply values the parsers consume
//!
//! Socket I/O, the RESP codec and retry policy belong to the caller.

pub mod cluster;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod scan;

pub use cluster::{
    parse_cluster_info, parse_slots_info, ClusterView, NodeInfo, RoutingTable, SlotRange,
    TopologyCell, TopologySnapshot, SLOT_COUNT,
};
pub use config::{Config, ObservabilityConfig};
pub use error::{Error, ErrorKind, ErrorTrait, Property, Result};
pub use protocol::RespValue;
pub use scan::{ClusterConnections, ScanCommand, ScanOpts, ShardConnection, ShardScanner};
