use thiserror::Error;

/// Packet-level decode failures. Any of these drops the offending packet
/// without an acknowledgement; the device retransmits per Codec8 protocol.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("preamble is not zero")]
    BadPreamble,

    #[error("packet shorter than declared layout ({got} bytes, need {need})")]
    ShortPacket { got: usize, need: usize },

    #[error("unsupported codec id 0x{0:02X}")]
    UnsupportedCodec(u8),

    #[error("record count mismatch: header {header}, trailer {trailer}")]
    RecordCountMismatch { header: u16, trailer: u16 },

    #[error("record stream overruns data length at offset {0}")]
    Truncated(usize),

    #[error("crc mismatch: computed 0x{computed:04X}, packet carries 0x{expected:04X}")]
    BadCrc { computed: u16, expected: u16 },
}

/// Connection-level failures. These close the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("bad device identifier: {0}")]
    BadIdentifier(String),

    #[error("declared frame of {declared} bytes exceeds cap of {cap}")]
    OversizedFrame { declared: usize, cap: usize },

    #[error("session idle timeout")]
    IdleTimeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("device '{0}' is not registered")]
    UnauthorizedDevice(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("spatial backend unavailable: {0}")]
    BackendUnavailable(String),
}
