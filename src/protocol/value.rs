use bytes::Bytes;

use crate::error::Error;

/// A reply value as handed over by the transport.
///
/// Error replies are decoded into an [`Error`] by the transport and are
/// returned verbatim by every parser in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<RespValue>),
    Error(Error),
}

impl RespValue {
    pub fn integer(value: i64) -> Self {
        RespValue::Integer(value)
    }

    pub fn bulk_string(value: impl Into<Bytes>) -> Self {
        RespValue::Bulk(value.into())
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(items)
    }

    /// Build an error reply from the text the server sent after `-`.
    pub fn error_reply(line: &str) -> Self {
        RespValue::Error(Error::from_reply(line))
    }

    /// Returns the carried error if this is an error reply.
    pub fn as_error(&self) -> Option<&Error> {
        match self {
            RespValue::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RespValue::Integer(_) => "integer",
            RespValue::Bulk(_) => "bulk",
            RespValue::Array(_) => "array",
            RespValue::Error(_) => "error",
        }
    }
}

impl From<Error> for RespValue {
    fn from(err: Error) -> Self {
        RespValue::Error(err)
    }
}
