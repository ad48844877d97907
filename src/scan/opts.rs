use bytes::Bytes;

use crate::config::ScanConfig;

/// Commands of the `SCAN` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanCommand {
    /// Iterate the whole keyspace of every master
    #[default]
    Scan,
    Sscan,
    Hscan,
    Zscan,
}

impl ScanCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanCommand::Scan => "SCAN",
            ScanCommand::Sscan => "SSCAN",
            ScanCommand::Hscan => "HSCAN",
            ScanCommand::Zscan => "ZSCAN",
        }
    }

    /// `SCAN` walks every shard; the others iterate a single key.
    pub fn is_keyspace(self) -> bool {
        self == ScanCommand::Scan
    }
}

/// Options of one logical scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOpts {
    pub command: ScanCommand,
    /// Key to iterate for `SSCAN`/`HSCAN`/`ZSCAN`
    pub key: Option<Bytes>,
    /// `MATCH` pattern
    pub pattern: Option<Bytes>,
    /// `COUNT` hint
    pub count: Option<u32>,
}

impl ScanOpts {
    /// Keyspace-wide `SCAN`.
    pub fn keyspace() -> Self {
        Self::default()
    }

    /// Scan of a single collection key.
    pub fn for_key(command: ScanCommand, key: impl Into<Bytes>) -> Self {
        Self {
            command,
            key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Keyspace-wide `SCAN` with pattern and count taken from configuration.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            pattern: config.pattern.clone().map(Bytes::from),
            count: config.count,
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<Bytes>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Request arguments for one step: `<CMD> [key] <cursor> [MATCH p] [COUNT n]`.
    pub fn request(&self, cursor: &Bytes) -> Vec<Bytes> {
        let mut args = vec![Bytes::from_static(self.command.as_str().as_bytes())];
        if !self.command.is_keyspace() {
            if let Some(key) = &self.key {
                args.push(key.clone());
            }
        }
        args.push(cursor.clone());
        if let Some(pattern) = &self.pattern {
            args.push(Bytes::from_static(b"MATCH"));
            args.push(pattern.clone());
        }
        if let Some(count) = self.count {
            args.push(Bytes::from_static(b"COUNT"));
            args.push(Bytes::from(count.to_string()));
        }
        args
    }
}
