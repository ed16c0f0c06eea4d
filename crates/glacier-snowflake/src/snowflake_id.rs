use crate::error::DecodeError;
use jiff::Timestamp;
use modular_bitfield::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Milliseconds between the Unix epoch and 2024-01-01T00:00:00Z, the zero
/// point of the timestamp field. Changing it breaks ordering of every id
/// already issued.
pub const EPOCH_MILLIS: i64 = 1_704_067_200_000;

pub const TIMESTAMP_BITS: u32 = 41;
pub const DATACENTER_ID_BITS: u32 = 5;
pub const MACHINE_ID_BITS: u32 = 5;
pub const SEQUENCE_BITS: u32 = 12;

pub const MACHINE_ID_SHIFT: u32 = SEQUENCE_BITS;
pub const DATACENTER_ID_SHIFT: u32 = SEQUENCE_BITS + MACHINE_ID_BITS;
pub const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + MACHINE_ID_BITS + DATACENTER_ID_BITS;

pub const MAX_TIMESTAMP: u64 = (1_u64 << TIMESTAMP_BITS) - 1;
pub const MAX_DATACENTER_ID: u8 = (1_u8 << DATACENTER_ID_BITS) - 1;
pub const MAX_MACHINE_ID: u8 = (1_u8 << MACHINE_ID_BITS) - 1;
pub const SEQUENCE_MASK: u16 = (1_u16 << SEQUENCE_BITS) - 1;

const RESERVED_BIT: u64 = 1_u64 << 63;

/// A 64-bit Snowflake identifier.
///
/// Fields are declared from the least significant bit upwards, so the raw
/// value reads (MSB to LSB) as: 1 reserved bit, 41 bits of timestamp,
/// 5 bits of datacenter id, 5 bits of machine id, 12 bits of sequence.
#[bitfield]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnowflakeId {
    /// 12 bits for sequence number (resets every millisecond).
    pub sequence: B12,
    /// 5 bits for machine ID.
    pub machine_id: B5,
    /// 5 bits for datacenter ID.
    pub datacenter_id: B5,
    /// 41 bits for timestamp (milliseconds since [`EPOCH_MILLIS`]).
    pub timestamp: B41,
    #[skip]
    __: B1,
}

impl SnowflakeId {
    /// Packs the id into its raw 64-bit representation.
    pub fn to_raw(self) -> u64 {
        u64::from_le_bytes(self.into_bytes())
    }

    /// Unpacks a raw 64-bit value. The reserved bit is cleared.
    pub fn from_raw(raw: u64) -> Self {
        Self::from_bytes((raw & !RESERVED_BIT).to_le_bytes())
    }

    /// The wall-clock instant encoded in the timestamp field.
    pub fn created_at(&self) -> Timestamp {
        // 41 bits of milliseconds past 2024 stay far inside jiff's range.
        Timestamp::from_millisecond(EPOCH_MILLIS + self.timestamp() as i64)
            .expect("41-bit timestamp field is a valid jiff timestamp")
    }

    /// Encodes the big-endian bytes of the raw value as base58.
    pub fn to_base58(self) -> String {
        bs58::encode(self.to_raw().to_be_bytes()).into_string()
    }

    pub fn from_base58(encoded: &str) -> Result<Self, DecodeError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| DecodeError::InvalidBase58(e.to_string()))?;
        // leading zero bytes (base58 '1's) carry no value
        let leading_zeros = bytes.iter().take_while(|b| **b == 0).count();
        let bytes = &bytes[leading_zeros..];
        if bytes.len() > 8 {
            return Err(DecodeError::TooLong(bytes.len()));
        }

        let mut buf = [0_u8; 8];
        buf[8 - bytes.len()..].copy_from_slice(bytes);
        let raw = u64::from_be_bytes(buf);
        if raw & RESERVED_BIT != 0 {
            return Err(DecodeError::ReservedBitSet(raw));
        }
        Ok(Self::from_raw(raw))
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_raw()
    }
}

impl From<u64> for SnowflakeId {
    fn from(raw: u64) -> Self {
        SnowflakeId::from_raw(raw)
    }
}

impl PartialOrd for SnowflakeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SnowflakeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_raw().cmp(&other.to_raw())
    }
}

impl fmt::Debug for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeId")
            .field("timestamp", &self.timestamp())
            .field("datacenter_id", &self.datacenter_id())
            .field("machine_id", &self.machine_id())
            .field("sequence", &self.sequence())
            .finish()
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

impl Serialize for SnowflakeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.to_raw())
    }
}

impl<'de> Deserialize<'de> for SnowflakeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        if raw & RESERVED_BIT != 0 {
            return Err(serde::de::Error::custom(DecodeError::ReservedBitSet(raw)));
        }
        Ok(Self::from_raw(raw))
    }
}
