//! Slot-to-shard routing table.
//!
//! Built from a list of [`SlotRange`]s; every slot maps in O(1) to the shard
//! (master plus replicas) serving it.

use std::collections::HashMap;

use tracing::debug;

use super::slots::SlotRange;
use super::SLOT_COUNT;

/// A master and its replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    addresses: Vec<String>,
}

impl Shard {
    /// Address of the master.
    pub fn master(&self) -> &str {
        &self.addresses[0]
    }

    pub fn replicas(&self) -> &[String] {
        &self.addresses[1..]
    }

    /// Master address followed by replica addresses.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }
}

/// Mapping from hash slot to the shard serving it.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    /// Index into `shards` for each of the 16384 slots
    slots: Vec<Option<u16>>,
    shards: Vec<Shard>,
}

impl RoutingTable {
    /// Build a routing table from slot ranges.
    ///
    /// Ranges served by the same master share a shard; the replica list of the
    /// first such range wins. Ranges without addresses are ignored, and a later
    /// range overrides an earlier one where they overlap.
    pub fn from_ranges(ranges: &[SlotRange]) -> Self {
        let mut table = Self::default();
        let mut by_master: HashMap<&str, u16> = HashMap::new();

        for range in ranges {
            let Some(master) = range.master() else {
                continue;
            };
            let shard = *by_master.entry(master).or_insert_with(|| {
                table.shards.push(Shard {
                    addresses: range.addresses.clone(),
                });
                (table.shards.len() - 1) as u16
            });

            let to = range.to.min(SLOT_COUNT - 1);
            for slot in range.from..=to {
                table.slots[slot as usize] = Some(shard);
            }
        }

        debug!(
            shards = table.shards.len(),
            covered = table.covered_slots(),
            "built routing table"
        );
        table
    }

    pub fn shard_for_slot(&self, slot: u16) -> Option<&Shard> {
        let index = (*self.slots.get(slot as usize)?)?;
        self.shards.get(index as usize)
    }

    /// Master address for `slot`, if any master serves it.
    pub fn master_for_slot(&self, slot: u16) -> Option<&str> {
        self.shard_for_slot(slot).map(Shard::master)
    }

    /// Master and replica addresses for `slot`.
    pub fn addresses_for_slot(&self, slot: u16) -> Option<&[String]> {
        self.shard_for_slot(slot).map(Shard::addresses)
    }

    /// One master address per shard.
    pub fn masters(&self) -> impl Iterator<Item = &str> {
        self.shards.iter().map(Shard::master)
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Number of slots served by some shard.
    pub fn covered_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether every slot is served.
    pub fn is_complete(&self) -> bool {
        self.covered_slots() == SLOT_COUNT as usize
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            slots: vec![None; SLOT_COUNT as usize],
            shards: Vec::new(),
        }
    }
}
