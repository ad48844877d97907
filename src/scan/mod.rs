//! Cross-shard scanning.
//!
//! A keyspace `SCAN` on a cluster has to be run on every master separately.
//! [`ShardScanner`] walks the masters one after another, driving each shard's
//! cursor to completion before moving on:
//!
//! ```text
//! Ready(pending) ──► Scanning(shard, cursor) ──cursor "0"──► Ready(rest) ──► ... ──► Done
//!        │                    │
//!        └──── no connection / error reply ──► Failed (sticky)
//! ```

mod opts;

pub use opts::{ScanCommand, ScanOpts};

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::cluster::RoutingTable;
use crate::config::ObservabilityConfig;
use crate::error::{ClusterError, ConnectionError, Error, ErrorKind, Property, RequestError, Result};
use crate::protocol::{parse_scan_response, RespValue};

/// Cursor value that starts and ends an iteration.
const TERMINAL_CURSOR: &[u8] = b"0";

/// A connection to one cluster node.
#[async_trait]
pub trait ShardConnection: Send + Sync {
    /// Send one command and wait for its decoded reply.
    async fn call(&self, args: Vec<Bytes>) -> RespValue;
}

/// Connection lookup provided by the client.
pub trait ClusterConnections: Send + Sync {
    type Connection: ShardConnection;

    /// Connection to `address`, or `None` if it is not established.
    fn connection_for(&self, address: &str) -> Option<Self::Connection>;

    /// Hash slot of `key`.
    fn slot_for_key(&self, key: &[u8]) -> u16;
}

/// Iterates one logical scan across the master shards of a cluster.
///
/// A scanner is driven by one caller at a time; every call to
/// [`next`](Self::next) continues where the previous one stopped.
pub struct ShardScanner<C: ClusterConnections> {
    opts: ScanOpts,
    cluster: Arc<C>,
    pending: VecDeque<String>,
    cursor: Option<Bytes>,
    failed: Option<Error>,
    observability: ObservabilityConfig,
}

impl<C: ClusterConnections> ShardScanner<C> {
    /// Plan a scan over the shards currently known to `routing`.
    ///
    /// `SCAN` visits every master once; key-scoped commands visit only the
    /// master owning the key's slot. With nothing to visit the scanner starts
    /// in the failed state.
    pub fn new(opts: ScanOpts, routing: &RoutingTable, cluster: Arc<C>) -> Self {
        let mut scanner = Self {
            opts,
            cluster,
            pending: VecDeque::new(),
            cursor: None,
            failed: None,
            observability: ObservabilityConfig::default(),
        };

        if scanner.opts.command.is_keyspace() {
            scanner.pending = routing.masters().map(str::to_string).collect();
            if scanner.pending.is_empty() {
                scanner.failed = Some(Error::new(
                    ErrorKind::Cluster(ClusterError::ConfigEmpty),
                    "no master shard is known",
                ));
            }
            return scanner;
        }

        let Some(key) = scanner.opts.key.as_ref() else {
            scanner.failed = Some(
                Error::new(
                    ErrorKind::Request(RequestError::NoSlotKey),
                    "no key to determine cluster slot",
                )
                .with(Property::Request, scanner.opts.command.as_str()),
            );
            return scanner;
        };

        let slot = scanner.cluster.slot_for_key(key);
        match routing.master_for_slot(slot) {
            Some(master) => scanner.pending.push_back(master.to_string()),
            None => {
                scanner.failed = Some(
                    Error::new(
                        ErrorKind::Cluster(ClusterError::ConfigEmpty),
                        "no master serves the key's slot",
                    )
                    .with(Property::Slot, slot),
                )
            }
        }
        scanner
    }

    /// Attach call-site traces to errors raised by this scanner.
    pub fn with_observability(mut self, observability: ObservabilityConfig) -> Self {
        self.observability = observability;
        self
    }

    /// Fetch the next batch of keys.
    ///
    /// Returns `Ok(None)` once every shard has been iterated to its terminal
    /// cursor. Keys are not deduplicated across shards. Once an error has
    /// been returned, every later call returns the same error.
    pub async fn next(&mut self) -> Result<Option<Vec<Bytes>>> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        if self.cursor_is_terminal() {
            let done = self.pending.pop_front();
            debug!(shard = ?done, remaining = self.pending.len(), "shard scan finished");
            self.cursor = None;
        }

        let Some(address) = self.pending.front().cloned() else {
            return Ok(None);
        };

        let Some(conn) = self.cluster.connection_for(&address) else {
            warn!(address = %address, "no connection for shard scan");
            let err = Error::new(
                ErrorKind::Connection(ConnectionError::NotConnected),
                "connection is not established",
            )
            .with(Property::Address, &address)
            .traced(&self.observability);
            return Err(self.fail(err));
        };

        let cursor = self
            .cursor
            .clone()
            .unwrap_or_else(|| Bytes::from_static(TERMINAL_CURSOR));
        let reply = conn.call(self.opts.request(&cursor)).await;

        match parse_scan_response(&reply) {
            Ok((next, keys)) => {
                self.cursor = Some(next);
                Ok(Some(keys))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Drive the scan to completion, concatenating every batch.
    pub async fn collect_keys(mut self) -> Result<Vec<Bytes>> {
        let mut keys = Vec::new();
        while let Some(batch) = self.next().await? {
            keys.extend(batch);
        }
        Ok(keys)
    }

    /// Addresses of the shards not finished yet, current one first.
    pub fn pending_shards(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// The sticky error, if the scan has failed.
    pub fn error(&self) -> Option<&Error> {
        self.failed.as_ref()
    }

    /// Whether the scan finished without error.
    pub fn is_done(&self) -> bool {
        self.failed.is_none()
            && (self.pending.is_empty() || (self.pending.len() == 1 && self.cursor_is_terminal()))
    }

    fn cursor_is_terminal(&self) -> bool {
        self.cursor.as_deref() == Some(TERMINAL_CURSOR)
    }

    fn fail(&mut self, err: Error) -> Error {
        self.failed = Some(err.clone());
        err
    }
}
