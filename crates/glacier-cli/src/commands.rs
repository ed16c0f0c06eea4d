use crate::cli::{DecodeArgs, GenerateArgs, OutputFormat};
use anyhow::{Context, Result};
use glacier_snowflake::{
    EnvIdentity, Error, IdGenerator, IdentityProvider, Snowflake, SnowflakeId, SnowflakeSettings,
};
use jiff::Timestamp;
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// The fields of a decoded id, as printed by `glacier decode --json`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DecodedId {
    pub id: SnowflakeId,
    pub base58: String,
    pub created_at: Timestamp,
    pub timestamp: u64,
    pub datacenter_id: u8,
    pub machine_id: u8,
    pub sequence: u16,
}

impl From<SnowflakeId> for DecodedId {
    fn from(id: SnowflakeId) -> Self {
        Self {
            id,
            base58: id.to_base58(),
            created_at: id.created_at(),
            timestamp: id.timestamp(),
            datacenter_id: id.datacenter_id(),
            machine_id: id.machine_id(),
            sequence: id.sequence(),
        }
    }
}

/// Identity given on the command line, with unset values read from the
/// environment.
#[derive(Debug, Clone)]
pub struct CliIdentity {
    pub datacenter_id: Option<i64>,
    pub machine_id: Option<i64>,
    pub fallback: EnvIdentity,
}

impl CliIdentity {
    pub fn from_args(args: &GenerateArgs, fallback: EnvIdentity) -> Self {
        Self {
            datacenter_id: args.datacenter_id,
            machine_id: args.machine_id,
            fallback,
        }
    }
}

impl IdentityProvider for CliIdentity {
    fn current_datacenter_id(&self) -> Result<i64, Error> {
        match self.datacenter_id {
            Some(id) => Ok(id),
            None => self.fallback.current_datacenter_id(),
        }
    }

    fn current_machine_id(&self) -> Result<i64, Error> {
        match self.machine_id {
            Some(id) => Ok(id),
            None => self.fallback.current_machine_id(),
        }
    }
}

pub fn generate(args: &GenerateArgs, out: &mut impl Write) -> Result<()> {
    generate_with(&CliIdentity::from_args(args, EnvIdentity::default()), args, out)
}

pub fn generate_with<P: IdentityProvider>(
    identity: &P,
    args: &GenerateArgs,
    out: &mut impl Write,
) -> Result<()> {
    let settings = SnowflakeSettings::from_provider(identity)
        .context("invalid generator identity")?;
    let generator = Snowflake::new(settings)?;

    info!(
        count = args.count,
        output = %args.format,
        "generating ids"
    );
    mint(&generator, args.count, args.format, out)
}

pub fn mint<G: IdGenerator<Output = SnowflakeId>>(
    generator: &G,
    count: usize,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    for _ in 0..count {
        let id = generator.generate().context("failed to generate id")?;
        match format {
            OutputFormat::Decimal => writeln!(out, "{id}")?,
            OutputFormat::Base58 => writeln!(out, "{}", id.to_base58())?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, &DecodedId::from(id))?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

pub fn parse_id(input: &str, base58: bool) -> Result<SnowflakeId> {
    if base58 {
        return SnowflakeId::from_base58(input)
            .with_context(|| format!("{input:?} is not a base58 snowflake id"));
    }
    let raw: u64 = input
        .trim()
        .parse()
        .with_context(|| format!("{input:?} is not a decimal snowflake id"))?;
    anyhow::ensure!(raw <= i64::MAX as u64, "{raw} has the reserved sign bit set");
    Ok(SnowflakeId::from_raw(raw))
}

pub fn decode(args: &DecodeArgs, out: &mut impl Write) -> Result<()> {
    let decoded = DecodedId::from(parse_id(&args.id, args.base58)?);

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &decoded)?;
        writeln!(out)?;
    } else {
        writeln!(out, "id:            {}", decoded.id)?;
        writeln!(out, "base58:        {}", decoded.base58)?;
        writeln!(out, "created_at:    {}", decoded.created_at)?;
        writeln!(out, "timestamp:     {}", decoded.timestamp)?;
        writeln!(out, "datacenter_id: {}", decoded.datacenter_id)?;
        writeln!(out, "machine_id:    {}", decoded.machine_id)?;
        writeln!(out, "sequence:      {}", decoded.sequence)?;
    }
    Ok(())
}
