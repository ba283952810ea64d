#![forbid(unsafe_code)]

use thiserror::Error;

/// Number of message categories carried by the tunnel protocol.
pub const MESSAGE_TYPE_COUNT: usize = 4;

// Unpadded WireGuard message sizes (bytes on the wire).
pub const INITIATION_SIZE: usize = 148;
pub const RESPONSE_SIZE: usize = 92;
pub const COOKIE_REPLY_SIZE: usize = 64;
/// Header (type + receiver + counter) plus Poly1305 tag.
pub const TRANSPORT_MIN_SIZE: usize = 32;

/// Offset and width of the little-endian type field in every message.
pub const TYPE_FIELD_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum MessageType {
    Initiation = 1,
    Response = 2,
    CookieReply = 3,
    Transport = 4,
}

impl MessageType {
    pub const ALL: [MessageType; MESSAGE_TYPE_COUNT] = [
        MessageType::Initiation,
        MessageType::Response,
        MessageType::CookieReply,
        MessageType::Transport,
    ];

    /// The unmodified WireGuard type constant.
    #[inline]
    pub fn wire_value(self) -> u32 {
        self as u32
    }

    /// Zero-based slot in per-category tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize - 1
    }

    /// Size of the message body before any junk is prepended.
    /// Transport messages are variable; this is their lower bound.
    pub fn base_size(self) -> usize {
        match self {
            MessageType::Initiation => INITIATION_SIZE,
            MessageType::Response => RESPONSE_SIZE,
            MessageType::CookieReply => COOKIE_REPLY_SIZE,
            MessageType::Transport => TRANSPORT_MIN_SIZE,
        }
    }

    pub fn is_handshake(self) -> bool {
        !matches!(self, MessageType::Transport)
    }
}

impl TryFrom<u32> for MessageType {
    type Error = AwgError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Initiation),
            2 => Ok(MessageType::Response),
            3 => Ok(MessageType::CookieReply),
            4 => Ok(MessageType::Transport),
            other => Err(AwgError::InvalidCategory(other)),
        }
    }
}

impl core::fmt::Display for MessageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            MessageType::Initiation => "initiation",
            MessageType::Response => "response",
            MessageType::CookieReply => "cookie-reply",
            MessageType::Transport => "transport",
        };
        f.write_str(name)
    }
}

pub type AwgResult<T> = Result<T, AwgError>;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected at configuration time. Fatal to that attempt only.
    Configuration,
    /// Received bytes do not match the configured disguise. Drop the packet.
    ProtocolMismatch,
    /// Caller-supplied buffers cannot hold the result.
    BufferCapacity,
    /// The OS could not seed the keystream. Session startup must abort.
    EntropyUnavailable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwgError {
    #[error("min ({min}) cannot be greater than max ({max})")]
    InvalidRange { min: u32, max: u32 },
    #[error("magic headers shouldn't overlap: {max} >= {next_min}")]
    Overlap { max: u32, next_min: u32 },
    #[error("expected 4 magic header ranges, got {0}")]
    CountMismatch(usize),
    #[error("cannot parse {input:?}: {reason}")]
    ParseError { input: String, reason: String },
    #[error("invalid message type: {0}")]
    InvalidCategory(u32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no magic header range contains {0}")]
    NoMatch(u32),
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),

    #[error("insufficient output buffers: need {needed}, have {available}")]
    InsufficientBuffers { needed: usize, available: usize },
    #[error("header length {hdr_len} exceeds packet length {packet_len}")]
    HeaderTooLong { hdr_len: usize, packet_len: usize },
    #[error("gso size must be non-zero")]
    InvalidGsoSize,

    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),
}

impl AwgError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AwgError::InvalidRange { .. }
            | AwgError::Overlap { .. }
            | AwgError::CountMismatch(_)
            | AwgError::ParseError { .. }
            | AwgError::InvalidCategory(_)
            | AwgError::InvalidConfig(_) => ErrorKind::Configuration,
            AwgError::NoMatch(_) | AwgError::MalformedMessage(_) => ErrorKind::ProtocolMismatch,
            AwgError::InsufficientBuffers { .. }
            | AwgError::HeaderTooLong { .. }
            | AwgError::InvalidGsoSize => ErrorKind::BufferCapacity,
            AwgError::EntropyUnavailable(_) => ErrorKind::EntropyUnavailable,
        }
    }
}

/// Builds an [`AwgError::ParseError`] for `input`.
pub fn parse_error(input: &str, reason: impl Into<String>) -> AwgError {
    AwgError::ParseError { input: input.to_string(), reason: reason.into() }
}
