//! CLUSTER SLOTS reply parsing.
//!
//! The reply is an array of entries, each of the form
//! `[from, to, [host, port, ...], [host, port, ...], ...]` where the first
//! address is the master serving the range and the rest are its replicas.

use tracing::debug;

use super::SLOT_COUNT;
use crate::error::{Error, Property, Result};
use crate::protocol::RespValue;

/// Highest client port whose cluster bus port (`port + 10000`) is still valid.
const MAX_CLIENT_PORT: i64 = 65535 - 10000;

/// A contiguous range of hash slots and the addresses serving it.
///
/// `addresses[0]` is the master; the remaining entries are replicas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRange {
    /// Start of the slot range (inclusive)
    pub from: u16,
    /// End of the slot range (inclusive)
    pub to: u16,
    /// Master address followed by replica addresses (`host:port`)
    pub addresses: Vec<String>,
}

impl SlotRange {
    pub fn new(from: u16, to: u16, addresses: Vec<String>) -> Self {
        Self {
            from,
            to,
            addresses,
        }
    }

    /// Address of the master serving this range.
    pub fn master(&self) -> Option<&str> {
        self.addresses.first().map(String::as_str)
    }

    /// Addresses of the replicas serving this range.
    pub fn replicas(&self) -> &[String] {
        self.addresses.get(1..).unwrap_or(&[])
    }

    pub fn contains(&self, slot: u16) -> bool {
        self.from <= slot && slot <= self.to
    }

    /// Number of slots in this range.
    pub fn count(&self) -> u32 {
        u32::from(self.to) - u32::from(self.from) + 1
    }
}

/// Parse a `CLUSTER SLOTS` reply.
///
/// Error replies are returned unchanged. Any structural mismatch fails the
/// whole parse with `Response/Unexpected`, naming the offending element.
/// Replica addresses of each range are sorted, and ranges are returned in
/// ascending `from` order.
pub fn parse_slots_info(reply: &RespValue) -> Result<Vec<SlotRange>> {
    let entries = match reply {
        RespValue::Error(err) => return Err(err.clone()),
        RespValue::Array(entries) => entries,
        other => {
            return Err(Error::unexpected(format!(
                "type is not array, but {}",
                other.type_name()
            ))
            .with(Property::Response, format!("{:?}", other)))
        }
    };

    let mut ranges = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(i, entry))
        .collect::<Result<Vec<_>>>()?;
    ranges.sort_by_key(|range| range.from);

    debug!(ranges = ranges.len(), "parsed CLUSTER SLOTS reply");
    Ok(ranges)
}

fn mismatch(index: String, value: &impl std::fmt::Debug) -> Error {
    Error::unexpected(format!("format mismatch: {}", index))
        .with(Property::Index, index)
        .with(Property::Val, format!("{:?}", value))
}

fn parse_entry(i: usize, entry: &RespValue) -> Result<SlotRange> {
    let fields = match entry {
        RespValue::Array(fields) if fields.len() >= 3 => fields,
        _ => return Err(mismatch(format!("res[{}]", i), entry)),
    };

    let from = parse_slot(i, 0, &fields[0])?;
    let to = parse_slot(i, 1, &fields[1])?;
    if from > to {
        return Err(Error::unexpected(format!(
            "range wrong: res[{}] from {} is past to {}",
            i, from, to
        ))
        .with(Property::Index, format!("res[{}]", i))
        .with(Property::Val, format!("{:?}", entry)));
    }

    let mut addresses = fields[2..]
        .iter()
        .enumerate()
        .map(|(j, field)| parse_address(i, j + 2, field))
        .collect::<Result<Vec<_>>>()?;
    addresses[1..].sort();

    Ok(SlotRange::new(from, to, addresses))
}

fn parse_slot(i: usize, j: usize, field: &RespValue) -> Result<u16> {
    match field {
        RespValue::Integer(n) if (0..i64::from(SLOT_COUNT)).contains(n) => Ok(*n as u16),
        _ => Err(mismatch(format!("res[{}][{}]", i, j), field)),
    }
}

fn parse_address(i: usize, j: usize, field: &RespValue) -> Result<String> {
    let wrong = || {
        let index = format!("res[{}][{}]", i, j);
        Error::unexpected(format!("address format mismatch: {}", index))
            .with(Property::Index, index)
            .with(Property::Val, format!("{:?}", field))
    };

    let parts = match field {
        RespValue::Array(parts) if parts.len() >= 2 => parts,
        _ => return Err(wrong()),
    };

    match (&parts[0], &parts[1]) {
        (RespValue::Bulk(host), RespValue::Integer(port))
            if *port > 0 && *port <= MAX_CLIENT_PORT =>
        {
            Ok(format!("{}:{}", String::from_utf8_lossy(host), port))
        }
        _ => Err(wrong()),
    }
}
