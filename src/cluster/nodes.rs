//! CLUSTER NODES reply parsing.
//!
//! Each record of the reply has the form
//!
//! ```text
//! <id> <ip:port@cport[,hostname]> <flags> <master-id|-> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> ...
//! ```
//!
//! where every trailing slot token is either a single slot (`42`), an
//! inclusive range (`0-5460`), or a migration marker (`[42->-<node-id>]`
//! while migrating out, `[42-<-<node-id>]` while importing).

use tracing::debug;

use super::SLOT_COUNT;
use crate::error::{Error, Property, Result};
use crate::protocol::RespValue;

/// Lines shorter than this are not node records.
const MIN_RECORD_LEN: usize = 16;
/// Number of fixed fields preceding the slot tokens.
const FIXED_FIELDS: usize = 8;

const IMPORTING_MARKER: &str = "-<-";
const MIGRATING_MARKER: &str = "->-";

/// Direction of a slot migration as seen from the reporting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationDirection {
    /// The slot is being moved from this node to the peer
    MigratingOut,
    /// The slot is being moved from the peer to this node
    ImportingIn,
}

/// A slot in the middle of being moved between two masters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotMigration {
    pub slot: u16,
    pub direction: MigrationDirection,
    /// Id of the node on the other side of the migration
    pub peer: String,
}

/// A cluster node as reported by `CLUSTER NODES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Node id (40 hex characters)
    pub id: String,
    /// Client endpoint (`ip:port`)
    pub endpoint: String,
    /// Host part of the endpoint; empty for nodes without an address
    pub host: String,
    /// Client port; 0 when unknown
    pub port: u16,
    /// Cluster bus port; 0 when unknown
    pub bus_port: u16,
    /// Node is flagged `fail` or `pfail`
    pub failed: bool,
    /// Node is the one that answered the command
    pub is_self: bool,
    /// Id of the master this node replicates, `None` for masters
    pub replica_of: Option<String>,
    /// Owned slot ranges, inclusive on both ends
    pub owned_slots: Vec<(u16, u16)>,
    pub migrations: Vec<SlotMigration>,
}

impl NodeInfo {
    pub fn is_master(&self) -> bool {
        self.replica_of.is_none()
    }

    /// Total number of slots owned by this node.
    pub fn slot_count(&self) -> u32 {
        self.owned_slots
            .iter()
            .map(|&(from, to)| u32::from(to) - u32::from(from) + 1)
            .sum()
    }

    /// Parse a single record of a `CLUSTER NODES` reply.
    pub fn parse_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < FIXED_FIELDS {
            return Err(Error::unexpected(format!(
                "node record has {} fields, expected at least {}",
                parts.len(),
                FIXED_FIELDS
            ))
            .with(Property::Line, line));
        }

        let (endpoint, bus) = match parts[1].split('@').collect::<Vec<_>>().as_slice() {
            [endpoint, bus] if endpoint.matches(':').count() == 1 => (*endpoint, *bus),
            _ => {
                return Err(Error::unexpected(format!(
                    "ip-port is not in 'ip:port@port2' format, but {:?}",
                    parts[1]
                ))
                .with(Property::Line, line))
            }
        };
        let (host, port) = endpoint.split_once(':').unwrap_or((endpoint, ""));
        // Since Redis 7 the bus port may be followed by ",hostname".
        let bus = bus.split(',').next().unwrap_or(bus);

        let flags = parts[2];
        let replica_of = flags.contains("slave").then(|| parts[3].to_string());

        let mut node = NodeInfo {
            id: parts[0].to_string(),
            endpoint: endpoint.to_string(),
            host: host.to_string(),
            port: port.parse().unwrap_or(0),
            bus_port: bus.parse().unwrap_or(0),
            failed: flags.contains("fail"),
            is_self: flags.contains("myself"),
            replica_of,
            owned_slots: Vec::new(),
            migrations: Vec::new(),
        };

        for token in &parts[FIXED_FIELDS..] {
            if token.starts_with('[') {
                node.migrations.push(parse_migration(token, line)?);
            } else if let Some((from, to)) = token.split_once('-') {
                let from = parse_slot_number(from, token, line)?;
                let to = parse_slot_number(to, token, line)?;
                if from > to {
                    return Err(Error::unexpected(format!("slot range is reversed: {:?}", token))
                        .with(Property::Val, token)
                        .with(Property::Line, line));
                }
                node.owned_slots.push((from, to));
            } else {
                let slot = parse_slot_number(token, token, line)?;
                node.owned_slots.push((slot, slot));
            }
        }

        Ok(node)
    }
}

fn parse_slot_number(text: &str, token: &str, line: &str) -> Result<u16> {
    match text.parse::<u16>() {
        Ok(slot) if slot < SLOT_COUNT => Ok(slot),
        _ => Err(
            Error::unexpected(format!("slot number is not an integer: {:?}", text))
                .with(Property::Val, token)
                .with(Property::Line, line),
        ),
    }
}

fn parse_migration(token: &str, line: &str) -> Result<SlotMigration> {
    let malformed = || {
        Error::unexpected(format!("malformed migrating slot: {:?}", token))
            .with(Property::Val, token)
            .with(Property::Line, line)
    };

    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(malformed)?;

    let (direction, ix, marker) = if let Some(ix) = inner.find(IMPORTING_MARKER) {
        (MigrationDirection::ImportingIn, ix, IMPORTING_MARKER)
    } else if let Some(ix) = inner.find(MIGRATING_MARKER) {
        (MigrationDirection::MigratingOut, ix, MIGRATING_MARKER)
    } else {
        return Err(malformed());
    };

    Ok(SlotMigration {
        slot: parse_slot_number(&inner[..ix], token, line)?,
        direction,
        peer: inner[ix + marker.len()..].to_string(),
    })
}

/// Nodes of a cluster as seen by one `CLUSTER NODES` call.
///
/// Masters always precede replicas. A snapshot is never modified after it is
/// built; a refresh produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    nodes: Vec<NodeInfo>,
}

impl TopologySnapshot {
    /// Build a snapshot, moving masters in front of replicas.
    ///
    /// The sort is stable: within masters and within replicas nodes keep
    /// the order they were given in.
    pub fn new(mut nodes: Vec<NodeInfo>) -> Self {
        nodes.sort_by_key(|node| !node.is_master());
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeInfo> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<'a> IntoIterator for &'a TopologySnapshot {
    type Item = &'a NodeInfo;
    type IntoIter = std::slice::Iter<'a, NodeInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Parse a `CLUSTER NODES` reply.
///
/// Error replies are returned unchanged. The reply must be a bulk string;
/// lines too short to be a node record are skipped, and any malformed record
/// fails the whole parse.
pub fn parse_cluster_info(reply: &RespValue) -> Result<TopologySnapshot> {
    let text = match reply {
        RespValue::Error(err) => return Err(err.clone()),
        RespValue::Bulk(bytes) => String::from_utf8_lossy(bytes),
        other => {
            return Err(Error::unexpected(format!(
                "type is not bulk string, but {}",
                other.type_name()
            ))
            .with(Property::Response, format!("{:?}", other)))
        }
    };

    let nodes = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| line.len() >= MIN_RECORD_LEN)
        .map(NodeInfo::parse_line)
        .collect::<Result<Vec<_>>>()?;

    let snapshot = TopologySnapshot::new(nodes);
    debug!(nodes = snapshot.len(), "parsed CLUSTER NODES reply");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ResponseError, ResultError};

    const MASTER_LINE: &str = "07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-5460";
    const REPLICA_LINE: &str = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:7003@17003 slave 07c37dfeb235213a872192d90877d0cd55635b91 0 1426238316232 1 connected";

    fn assert_unexpected(line: &str) -> Error {
        let err = NodeInfo::parse_line(line).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Response(ResponseError::Unexpected));
        assert_eq!(err.property(Property::Line), Some(line));
        err
    }

    #[test]
    fn test_parse_master_line() {
        let node = NodeInfo::parse_line(MASTER_LINE).unwrap();
        assert_eq!(node.id, "07c37dfeb235213a872192d90877d0cd55635b91");
        assert_eq!(node.endpoint, "127.0.0.1:7000");
        assert_eq!(node.host, "127.0.0.1");
        assert_eq!(node.port, 7000);
        assert_eq!(node.bus_port, 17000);
        assert!(node.is_self);
        assert!(!node.failed);
        assert!(node.is_master());
        assert_eq!(node.replica_of, None);
        assert_eq!(node.owned_slots, vec![(0, 5460)]);
        assert!(node.migrations.is_empty());
        assert_eq!(node.slot_count(), 5461);
    }

    #[test]
    fn test_parse_replica_line() {
        let node = NodeInfo::parse_line(REPLICA_LINE).unwrap();
        assert!(!node.is_master());
        assert!(!node.is_self);
        assert_eq!(
            node.replica_of.as_deref(),
            Some("07c37dfeb235213a872192d90877d0cd55635b91")
        );
        assert!(node.owned_slots.is_empty());
    }

    #[test]
    fn test_parse_failed_flags() {
        let line = "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:7001@17001 master,fail - 0 0 2 disconnected 5461-10922";
        assert!(NodeInfo::parse_line(line).unwrap().failed);

        let line = "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:7001@17001 master,pfail - 0 0 2 connected 5461-10922";
        assert!(NodeInfo::parse_line(line).unwrap().failed);
    }

    #[test]
    fn test_parse_single_slots_and_ranges() {
        let line = "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:7001@17001 master - 0 0 2 connected 0 5-9 16383";
        let node = NodeInfo::parse_line(line).unwrap();
        assert_eq!(node.owned_slots, vec![(0, 0), (5, 9), (16383, 16383)]);
        assert_eq!(node.slot_count(), 7);
    }

    #[test]
    fn test_parse_migrations() {
        let line = "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:7001@17001 master - 0 0 2 connected 0-99 [100-<-abc123] [42->-def456]";
        let node = NodeInfo::parse_line(line).unwrap();
        assert_eq!(node.owned_slots, vec![(0, 99)]);
        assert_eq!(
            node.migrations,
            vec![
                SlotMigration {
                    slot: 100,
                    direction: MigrationDirection::ImportingIn,
                    peer: "abc123".to_string(),
                },
                SlotMigration {
                    slot: 42,
                    direction: MigrationDirection::MigratingOut,
                    peer: "def456".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_hostname_suffix() {
        let line = "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 10.0.0.1:6379@16379,redis-0.example master - 0 0 2 connected 0-16383";
        let node = NodeInfo::parse_line(line).unwrap();
        assert_eq!(node.endpoint, "10.0.0.1:6379");
        assert_eq!(node.bus_port, 16379);
    }

    #[test]
    fn test_parse_noaddr_node() {
        let line = "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 :0@0 master,fail,noaddr - 0 0 2 disconnected";
        let node = NodeInfo::parse_line(line).unwrap();
        assert_eq!(node.host, "");
        assert_eq!(node.port, 0);
        assert_eq!(node.bus_port, 0);
        assert!(node.failed);
    }

    #[test]
    fn test_bad_address_formats() {
        assert_unexpected("07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:7000 master - 0 0 1 connected");
        assert_unexpected("07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:7000@1@2 master - 0 0 1 connected");
        assert_unexpected("07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1@17000 master - 0 0 1 connected");
        assert_unexpected("07c37dfeb235213a872192d90877d0cd55635b91 ::1:7000@17000 master - 0 0 1 connected");
    }

    #[test]
    fn test_bad_slot_tokens() {
        let prefix = "07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:7000@17000 master - 0 0 1 connected";
        for token in ["abc", "1-x", "x-1", "16384", "10-5", "[x->-abc]", "[100]", "[100->-abc"] {
            let line = format!("{} {}", prefix, token);
            let err = assert_unexpected(&line);
            assert_eq!(err.property(Property::Val), Some(token));
        }
    }

    #[test]
    fn test_too_few_fields() {
        assert_unexpected("07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:7000@17000 master -");
    }

    #[test]
    fn test_parse_cluster_info_orders_masters_first() {
        let text = format!(
            "{}\n{}\n{}\n",
            REPLICA_LINE,
            MASTER_LINE,
            "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:7001@17001 master - 0 0 2 connected 5461-16383"
        );
        let snapshot = parse_cluster_info(&RespValue::bulk_string(text)).unwrap();

        assert_eq!(snapshot.len(), 3);
        let ids: Vec<&str> = snapshot.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "07c37dfeb235213a872192d90877d0cd55635b91",
                "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1",
                "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca",
            ]
        );
    }

    #[test]
    fn test_parse_cluster_info_skips_short_lines_and_crlf() {
        let text = format!("\r\n{}\r\nvars\r\n{}\r\n", MASTER_LINE, REPLICA_LINE);
        let snapshot = parse_cluster_info(&RespValue::bulk_string(text)).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.nodes()[0].owned_slots, vec![(0, 5460)]);
    }

    #[test]
    fn test_parse_cluster_info_rejects_non_bulk() {
        let err = parse_cluster_info(&RespValue::integer(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Response(ResponseError::Unexpected));

        let err = parse_cluster_info(&RespValue::array(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Response(ResponseError::Unexpected));
    }

    #[test]
    fn test_parse_cluster_info_passes_error_through() {
        let reply = RespValue::error_reply("ERR This instance has cluster support disabled");
        let err = parse_cluster_info(&reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Result(ResultError::Generic));
        assert_eq!(Some(&err), reply.as_error());
    }

    #[test]
    fn test_parse_cluster_info_fails_on_one_bad_record() {
        let text = format!("{}\n{} oops\n", MASTER_LINE, REPLICA_LINE);
        assert!(parse_cluster_info(&RespValue::bulk_string(text)).is_err());
    }

    #[test]
    fn test_empty_reply() {
        let snapshot = parse_cluster_info(&RespValue::bulk_string("")).unwrap();
        assert!(snapshot.is_empty());
    }
}
