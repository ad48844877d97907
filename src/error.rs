//! Error types for cluster topology handling.
//!
//! Every error carries a closed [`ErrorKind`] (a kind plus its subtype), a
//! human-readable message and a list of diagnostic properties. Behavioural
//! questions ("was the request sent?", "is this a redirect?") are answered by
//! [`ErrorKind::has_trait`] instead of by inspecting the kind hierarchy.

use std::backtrace::Backtrace;
use std::fmt;

use crate::config::ObservabilityConfig;

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Options are wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptsError {
    /// Context is not passed to constructor
    ContextIsNil,
    /// No address is given to constructor
    NoAddress,
    /// Configuration could not be read or parsed
    Invalid,
}

/// Connection was not established when the request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionError {
    NotConnected,
    Dial,
    Auth,
    Init,
    ConnSetup,
}

/// Request is malformed and cannot be serialized; no reason to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestError {
    ArgumentType,
    BatchFormat,
    NoSlotKey,
    Cancelled,
}

/// Server returned something the client did not expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseError {
    /// Response is not a valid reply for the command
    Format,
    /// Response is a valid reply, but its structure or type is unexpected
    Unexpected,
    HeaderlineTooLarge,
    HeaderlineEmpty,
    IntegerParsing,
    NoFinalRn,
    UnknownHeaderType,
    Ping,
}

/// Regular error replies sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultError {
    Generic,
    Moved,
    Ask,
    Loading,
    ExecEmpty,
    ExecAbort,
    TryAgain,
}

/// Cluster-level configuration problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterError {
    /// No master shard is known
    ConfigEmpty,
}

/// Kind and subtype of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Opts(OptsError),
    /// Connection or cluster was shut down
    ContextClosed,
    Connection(ConnectionError),
    /// Read/write failure; it is unknown whether the request was processed
    Io,
    Request(RequestError),
    Response(ResponseError),
    Result(ResultError),
    Cluster(ClusterError),
}

/// Orthogonal flags attached to error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorTrait {
    /// The request was definitely not written to the wire
    NotSent,
    /// Retrying the connection setup will not help
    InitPermanent,
    /// MOVED or ASK redirection
    ClusterMove,
    /// Malformed or unexpected response
    Response,
}

impl ErrorKind {
    /// Check whether this kind carries the given trait.
    pub fn has_trait(self, t: ErrorTrait) -> bool {
        match t {
            ErrorTrait::NotSent => matches!(
                self,
                ErrorKind::ContextClosed
                    | ErrorKind::Connection(_)
                    | ErrorKind::Result(ResultError::Loading)
            ),
            ErrorTrait::InitPermanent => matches!(
                self,
                ErrorKind::Connection(ConnectionError::Auth | ConnectionError::Init)
            ),
            ErrorTrait::ClusterMove => matches!(
                self,
                ErrorKind::Result(ResultError::Moved | ResultError::Ask)
            ),
            ErrorTrait::Response => matches!(self, ErrorKind::Response(_)),
        }
    }

    fn name(self) -> (&'static str, Option<&'static str>) {
        match self {
            ErrorKind::Opts(sub) => (
                "opts",
                Some(match sub {
                    OptsError::ContextIsNil => "context_is_nil",
                    OptsError::NoAddress => "no_address",
                    OptsError::Invalid => "invalid",
                }),
            ),
            ErrorKind::ContextClosed => ("connection_context_closed", None),
            ErrorKind::Connection(sub) => (
                "connection",
                Some(match sub {
                    ConnectionError::NotConnected => "not_connected",
                    ConnectionError::Dial => "could_not_connect",
                    ConnectionError::Auth => "could_not_auth",
                    ConnectionError::Init => "initialization_error",
                    ConnectionError::ConnSetup => "initialization_temp_error",
                }),
            ),
            ErrorKind::Io => ("io_error", None),
            ErrorKind::Request(sub) => (
                "request",
                Some(match sub {
                    RequestError::ArgumentType => "argument_type",
                    RequestError::BatchFormat => "batch_format",
                    RequestError::NoSlotKey => "no_slot_key",
                    RequestError::Cancelled => "request_cancelled",
                }),
            ),
            ErrorKind::Response(sub) => (
                "response",
                Some(match sub {
                    ResponseError::Format => "format",
                    ResponseError::Unexpected => "unexpected",
                    ResponseError::HeaderlineTooLarge => "headerline_too_large",
                    ResponseError::HeaderlineEmpty => "headerline_empty",
                    ResponseError::IntegerParsing => "integer_parsing",
                    ResponseError::NoFinalRn => "no_final_rn",
                    ResponseError::UnknownHeaderType => "unknown_headerline_type",
                    ResponseError::Ping => "ping",
                }),
            ),
            ErrorKind::Result(sub) => (
                "result",
                match sub {
                    ResultError::Generic => None,
                    ResultError::Moved => Some("moved"),
                    ResultError::Ask => Some("ask"),
                    ResultError::Loading => Some("loading"),
                    ResultError::ExecEmpty => Some("exec_empty"),
                    ResultError::ExecAbort => Some("exec_abort"),
                    ResultError::TryAgain => Some("exec_try_again"),
                },
            ),
            ErrorKind::Cluster(ClusterError::ConfigEmpty) => ("cluster", Some("config_empty")),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            (kind, Some(sub)) => write!(f, "aikv.{}.{}", kind, sub),
            (kind, None) => write!(f, "aikv.{}", kind),
        }
    }
}

/// Diagnostic property keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Raw line that could not be parsed
    Line,
    /// Target address of a MOVED/ASK redirect
    MovedTo,
    Slot,
    /// Offending value
    Val,
    ArgPos,
    Request,
    /// Offending response
    Response,
    Address,
    /// Position of the offending element in the reply
    Index,
}

impl Property {
    pub fn as_str(self) -> &'static str {
        match self {
            Property::Line => "line",
            Property::MovedTo => "movedto",
            Property::Slot => "slot",
            Property::Val => "val",
            Property::ArgPos => "argpos",
            Property::Request => "request",
            Property::Response => "response",
            Property::Address => "address",
            Property::Index => "index",
        }
    }
}

/// Structured error value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}{}", render_properties(.properties))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    properties: Vec<(Property, String)>,
    trace: Option<String>,
}

fn render_properties(properties: &[(Property, String)]) -> String {
    properties
        .iter()
        .map(|(key, value)| format!(", {}: {}", key.as_str(), value))
        .collect()
}

impl Error {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            properties: Vec::new(),
            trace: None,
        }
    }

    /// Shorthand for `Response/Unexpected`.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Response(ResponseError::Unexpected), message)
    }

    /// Shorthand for `Response/Format`.
    pub fn format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Response(ResponseError::Format), message)
    }

    /// Classify an error reply already decoded by the transport.
    ///
    /// `MOVED` and `ASK` replies get `slot` and `movedto` properties.
    pub fn from_reply(line: &str) -> Self {
        let line = line.trim_end_matches("\r\n");
        let (code, rest) = line.split_once(' ').unwrap_or((line, ""));
        let subtype = match code {
            "MOVED" => ResultError::Moved,
            "ASK" => ResultError::Ask,
            "LOADING" => ResultError::Loading,
            "EXECABORT" => ResultError::ExecAbort,
            "TRYAGAIN" => ResultError::TryAgain,
            _ => ResultError::Generic,
        };

        let err = Self::new(ErrorKind::Result(subtype), line);
        if !matches!(subtype, ResultError::Moved | ResultError::Ask) {
            return err;
        }

        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(slot), Some(addr)) => err
                .with(Property::Slot, slot)
                .with(Property::MovedTo, addr),
            _ => err,
        }
    }

    /// Attach a diagnostic property.
    pub fn with(mut self, key: Property, value: impl fmt::Display) -> Self {
        self.properties.push((key, value.to_string()));
        self
    }

    /// Capture a call-site trace when the observability config asks for it.
    pub fn traced(mut self, observability: &ObservabilityConfig) -> Self {
        if observability.collect_trace {
            self.trace = Some(Backtrace::force_capture().to_string());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn has_trait(&self, t: ErrorTrait) -> bool {
        self.kind.has_trait(t)
    }

    /// Look up the first value stored under `key`.
    pub fn property(&self, key: Property) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn properties(&self) -> &[(Property, String)] {
        &self.properties
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// Slot of a MOVED/ASK redirect.
    pub fn redirect_slot(&self) -> Option<u16> {
        self.property(Property::Slot)?.parse().ok()
    }

    /// Target address of a MOVED/ASK redirect.
    pub fn moved_to(&self) -> Option<&str> {
        self.property(Property::MovedTo)
    }
}
