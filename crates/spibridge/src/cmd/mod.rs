use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use spibridge_core::{BridgeConfig, SpiBridge};
use spibridge_frame::{AddressingMode, DEFAULT_CHUNK_SIZE};
use spibridge_transport::BridgeStream;

use crate::exit::{bridge_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod burst_read;
pub mod burst_write;
pub mod read;
pub mod serve;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read one register.
    Read(ReadArgs),
    /// Write one register.
    Write(WriteArgs),
    /// Read consecutive registers as one burst.
    BurstRead(BurstReadArgs),
    /// Write consecutive registers as one burst.
    BurstWrite(BurstWriteArgs),
    /// Serve an in-memory register bank on the socket.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, bridge: &BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => read::run(args, bridge, format),
        Command::Write(args) => write::run(args, bridge, format),
        Command::BurstRead(args) => burst_read::run(args, bridge, format),
        Command::BurstWrite(args) => burst_write::run(args, bridge, format),
        Command::Serve(args) => serve::run(args, bridge),
        Command::Version(args) => version::run(args),
    }
}

/// Connection settings shared by every subcommand.
#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Bridge socket path [default: /var/run/lora.sock].
    #[arg(long, value_name = "PATH", env = "SPIBRIDGE_SOCKET", global = true)]
    pub socket: Option<PathBuf>,
    /// Prefix frames with a mux target byte.
    #[arg(long, global = true)]
    pub multiplexed: bool,
    /// Mux target byte (only sent with --multiplexed).
    #[arg(long, value_name = "TARGET", default_value = "0", value_parser = parse_u8, global = true)]
    pub mux_target: u8,
    /// Maximum bytes per burst chunk. Must match the remote.
    #[arg(long, value_name = "BYTES", env = "SPIBRIDGE_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE, global = true)]
    pub chunk_size: usize,
    /// Socket read/write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub timeout: String,
}

impl BridgeArgs {
    pub fn mode(&self) -> AddressingMode {
        if self.multiplexed {
            AddressingMode::Multiplexed
        } else {
            AddressingMode::Direct
        }
    }

    pub fn config(&self) -> CliResult<BridgeConfig> {
        let mut config = BridgeConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_timeout(Some(parse_duration(&self.timeout)?));
        if let Some(path) = &self.socket {
            config = config.with_socket_path(path);
        }
        Ok(config)
    }

    pub fn connect(&self) -> CliResult<SpiBridge<BridgeStream>> {
        SpiBridge::connect(self.config()?).map_err(|err| bridge_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Register address (decimal or 0x hex).
    #[arg(value_parser = parse_u8)]
    pub address: u8,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Register address (decimal or 0x hex).
    #[arg(value_parser = parse_u8)]
    pub address: u8,
    /// Byte to store.
    #[arg(value_parser = parse_u8)]
    pub value: u8,
}

#[derive(Args, Debug)]
pub struct BurstReadArgs {
    /// Start address (decimal or 0x hex).
    #[arg(value_parser = parse_u8)]
    pub address: u8,
    /// Number of bytes to read.
    #[arg(value_parser = parse_usize)]
    pub length: usize,
}

#[derive(Args, Debug)]
pub struct BurstWriteArgs {
    /// Start address (decimal or 0x hex).
    #[arg(value_parser = parse_u8)]
    pub address: u8,
    /// Payload as hex digits (whitespace ignored).
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Status byte to answer with. Anything but 0xff rejects every request.
    #[arg(long, default_value = "0xff", value_parser = parse_u8)]
    pub status: u8,
    /// Reject burst writes longer than this many bytes on their final chunk.
    #[arg(long, value_name = "BYTES", value_parser = parse_usize)]
    pub burst_limit: Option<usize>,
    /// Exit after N client sessions.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse an unsigned integer written in decimal or with a `0x` prefix.
fn parse_unsigned(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("not a decimal or 0x-prefixed number: {input}"))
}

pub fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_unsigned(input)?;
    u8::try_from(value).map_err(|_| format!("{input} does not fit in one byte"))
}

pub fn parse_usize(input: &str) -> Result<usize, String> {
    let value = parse_unsigned(input)?;
    usize::try_from(value).map_err(|_| format!("{input} is too large"))
}

/// Decode `--hex` input. Whitespace and a leading `0x` are ignored.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    hex::decode(digits)
        .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
