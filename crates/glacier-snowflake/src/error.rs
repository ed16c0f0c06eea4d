use jiff::Timestamp;
use thiserror::Error;

/// Errors returned by Snowflake initialization and ID generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid datacenter id {datacenter_id}; expected 0..={max}")]
    InvalidDatacenterId { datacenter_id: i64, max: u8 },
    #[error("invalid machine id {machine_id}; expected 0..={max}")]
    InvalidMachineId { machine_id: i64, max: u8 },
    #[error("identity value {name} is missing or malformed: {reason}")]
    MissingIdentity { name: &'static str, reason: String },
    #[error("clock moved backwards: last={last}, now={now}; refusing to generate id")]
    ClockMovedBackwards { last: Timestamp, now: Timestamp },
    #[error("interrupted while waiting for the next millisecond")]
    Interrupted,
    #[error("clock is behind the snowflake epoch: epoch={epoch}, now={now}")]
    BeforeEpoch { epoch: Timestamp, now: Timestamp },
    #[error("overtime limit")]
    OverTimeLimit,
    #[error("generator state lock is poisoned")]
    StatePoisoned,
}

impl Error {
    /// Whether the error was raised while building a generator, as opposed
    /// to while generating an id.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidDatacenterId { .. }
                | Error::InvalidMachineId { .. }
                | Error::MissingIdentity { .. }
        )
    }
}

/// Errors returned when parsing a textual [`SnowflakeId`](crate::SnowflakeId).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid base58 input: {0}")]
    InvalidBase58(String),
    #[error("decoded id has {0} significant bytes; expected at most 8")]
    TooLong(usize),
    #[error("reserved sign bit is set in {0:#018x}")]
    ReservedBitSet(u64),
}
