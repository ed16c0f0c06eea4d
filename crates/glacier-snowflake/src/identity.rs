//! Sources of the datacenter and machine ids a generator is built with.
//!
//! Providers hand back signed integers exactly as they found them; range
//! checking happens once, in [`SnowflakeSettings::from_provider`].

use crate::error::Error;
use crate::snowflake::SnowflakeSettings;
use crate::snowflake_id::{MAX_DATACENTER_ID, MAX_MACHINE_ID};

pub const DATACENTER_ID_ENV: &str = "GLACIER_DATACENTER_ID";
pub const MACHINE_ID_ENV: &str = "GLACIER_MACHINE_ID";

/// Supplies the identity of the current process.
pub trait IdentityProvider {
    fn current_datacenter_id(&self) -> Result<i64, Error>;
    fn current_machine_id(&self) -> Result<i64, Error>;
}

/// Identity fixed at construction, e.g. from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIdentity {
    pub datacenter_id: i64,
    pub machine_id: i64,
}

impl IdentityProvider for StaticIdentity {
    fn current_datacenter_id(&self) -> Result<i64, Error> {
        Ok(self.datacenter_id)
    }

    fn current_machine_id(&self) -> Result<i64, Error> {
        Ok(self.machine_id)
    }
}

/// Identity read from environment variables on each lookup.
#[derive(Debug, Clone)]
pub struct EnvIdentity {
    datacenter_var: &'static str,
    machine_var: &'static str,
}

impl Default for EnvIdentity {
    fn default() -> Self {
        Self::with_vars(DATACENTER_ID_ENV, MACHINE_ID_ENV)
    }
}

impl EnvIdentity {
    pub fn with_vars(datacenter_var: &'static str, machine_var: &'static str) -> Self {
        Self {
            datacenter_var,
            machine_var,
        }
    }

    fn read(name: &'static str) -> Result<i64, Error> {
        let raw = std::env::var(name).map_err(|e| Error::MissingIdentity {
            name,
            reason: e.to_string(),
        })?;
        raw.trim()
            .parse::<i64>()
            .map_err(|e| Error::MissingIdentity {
                name,
                reason: format!("{raw:?}: {e}"),
            })
    }
}

impl IdentityProvider for EnvIdentity {
    fn current_datacenter_id(&self) -> Result<i64, Error> {
        Self::read(self.datacenter_var)
    }

    fn current_machine_id(&self) -> Result<i64, Error> {
        Self::read(self.machine_var)
    }
}

pub(crate) fn check_datacenter_id(datacenter_id: i64) -> Result<u8, Error> {
    u8::try_from(datacenter_id)
        .ok()
        .filter(|id| *id <= MAX_DATACENTER_ID)
        .ok_or(Error::InvalidDatacenterId {
            datacenter_id,
            max: MAX_DATACENTER_ID,
        })
}

pub(crate) fn check_machine_id(machine_id: i64) -> Result<u8, Error> {
    u8::try_from(machine_id)
        .ok()
        .filter(|id| *id <= MAX_MACHINE_ID)
        .ok_or(Error::InvalidMachineId {
            machine_id,
            max: MAX_MACHINE_ID,
        })
}

impl SnowflakeSettings {
    /// Builds settings from a provider, rejecting negative or too-wide ids.
    pub fn from_provider<P: IdentityProvider + ?Sized>(provider: &P) -> Result<Self, Error> {
        let datacenter_id = check_datacenter_id(provider.current_datacenter_id()?)?;
        let machine_id = check_machine_id(provider.current_machine_id()?)?;
        Ok(SnowflakeSettings::builder()
            .datacenter_id(datacenter_id)
            .machine_id(machine_id)
            .build())
    }
}
