use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};

pub const OUTPUT_FORMAT_ENV: &str = "GLACIER_OUTPUT_FORMAT";

pub const DEFAULT_COUNT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[value(name = "decimal")]
    Decimal,
    #[value(name = "base58")]
    Base58,
    #[value(name = "json")]
    Json,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Decimal => write!(f, "decimal"),
            OutputFormat::Base58 => write!(f, "base58"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "glacier", about = "Mint and inspect 64-bit snowflake ids")]
pub struct CLI {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate new ids.
    Generate(GenerateArgs),
    /// Print the fields packed into an id.
    Decode(DecodeArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    // signed so that out-of-range values reach the generator's own validation
    /// Datacenter id; falls back to $GLACIER_DATACENTER_ID when omitted.
    #[arg(long, allow_negative_numbers = true)]
    pub datacenter_id: Option<i64>,

    /// Machine id; falls back to $GLACIER_MACHINE_ID when omitted.
    #[arg(long, allow_negative_numbers = true)]
    pub machine_id: Option<i64>,

    #[arg(short = 'n', long, default_value_t = DEFAULT_COUNT)]
    pub count: usize,

    #[arg(
        long,
        env = OUTPUT_FORMAT_ENV,
        value_enum,
        default_value_t = OutputFormat::Decimal
    )]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// The id, in decimal unless `--base58` is given.
    pub id: String,

    #[arg(long)]
    pub base58: bool,

    #[arg(long)]
    pub json: bool,
}
