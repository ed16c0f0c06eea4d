//! Distributed 64-bit Snowflake identifiers.
//!
//! An id packs, from the most significant bit down, one reserved bit,
//! 41 bits of milliseconds since 2024-01-01T00:00:00Z, a 5-bit datacenter
//! id, a 5-bit machine id and a 12-bit per-millisecond sequence.
//!
//! ```rust
//! use glacier_snowflake::{Snowflake, SnowflakeSettings};
//!
//! let settings = SnowflakeSettings::builder()
//!     .datacenter_id(1)
//!     .machine_id(7)
//!     .build();
//! let generator = Snowflake::new(settings)?;
//!
//! let id = generator.next_id()?;
//! assert_eq!(id.datacenter_id(), 1);
//! assert_eq!(id.machine_id(), 7);
//! # Ok::<(), glacier_snowflake::Error>(())
//! ```

pub mod backoff;
mod clock;
pub mod error;
mod generator;
pub mod identity;
mod snowflake;
pub mod snowflake_id;

pub use backoff::Interrupter;
pub use clock::{Clock, SystemClock};
pub use error::{DecodeError, Error};
pub use generator::IdGenerator;
pub use identity::{EnvIdentity, IdentityProvider, StaticIdentity};
pub use snowflake::{Snowflake, SnowflakeSettings};
pub use snowflake_id::SnowflakeId;
