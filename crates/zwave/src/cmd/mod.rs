use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use zwave_config::{ConfigHandle, LoaderConfig};
use zwave_driver::{Driver, DriverBuilder};
use zwave_transport::TransportConfig;

use crate::exit::{config_error, driver_error, CliError, CliResult, INTERNAL, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod info;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode serial API bytes offline.
    Decode(DecodeArgs),
    /// Query the controller's version, capabilities and identity.
    Info(InfoArgs),
    /// Print application commands and value changes as they arrive.
    Listen(ListenArgs),
    /// Send one raw command class to a node.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum Origin {
    /// Bytes read from the controller.
    #[default]
    Controller,
    /// Bytes written by a host application.
    Host,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes, e.g. `01 09 00 04 00 05 03 20 03 63 b4`. Separators are ignored.
    #[arg(required = true, num_args = 1..)]
    pub bytes: Vec<String>,
    /// Which side wrote the bytes.
    #[arg(long, value_enum, default_value_t = Origin::Controller)]
    pub origin: Origin,
    /// The bytes are a bare command class, not a serial frame.
    #[arg(long)]
    pub cc: bool,
    /// Source node of a bare command class.
    #[arg(long, default_value = "1", requires = "cc")]
    pub node: u8,
    /// Node id of the controller, used when decoding encapsulated commands.
    #[arg(long, default_value = "1")]
    pub own_node_id: u8,
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial device (`/dev/ttyUSB0`, `COM3`) or `tcp://host:port`.
    #[arg(env = "ZWAVE_PORT")]
    pub port: String,
    /// Serial baud rate.
    #[arg(long, default_value = "115200")]
    pub baud_rate: u32,
    /// Overall time limit (e.g. 30s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

impl PortArgs {
    /// The `--timeout` value, or `default` when none was given.
    pub fn limit(&self, default: Option<Duration>) -> CliResult<Option<Duration>> {
        match &self.timeout {
            Some(input) => parse_duration(input).map(Some),
            None => Ok(default),
        }
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub port: PortArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Only print events for these nodes (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub nodes: Option<Vec<u8>>,
    /// Also print node and controller status changes.
    #[arg(long)]
    pub status: bool,
    /// Directory of device configuration files.
    #[arg(long, value_name = "DIR")]
    pub devices: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Target node id.
    #[arg(long, short = 'n')]
    pub node: u8,
    /// Command class bytes in hex: CC id, command, payload.
    #[arg(long)]
    pub cc: String,
    /// Transmission attempts (1-5).
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u8).range(1..=5))]
    pub attempts: u8,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse durations like `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Hex string to bytes. Spaces, colons and a `0x` prefix are tolerated.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | ',' | '\t'))
        .collect();
    if cleaned.is_empty() {
        return Err(CliError::usage("no bytes given"));
    }
    hex::decode(&cleaned).map_err(|err| CliError::new(USAGE, format!("invalid hex: {err}")))
}

/// Limit for one-shot commands against the controller.
pub const DEFAULT_LIMIT: Duration = Duration::from_secs(30);

pub fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("cannot start runtime: {err}")))
}

/// Run `work` against a freshly opened driver and shut it down afterwards,
/// whatever the outcome.
pub fn with_driver<F, Fut, T>(
    args: &PortArgs,
    devices: Option<&PathBuf>,
    limit: Option<Duration>,
    work: F,
) -> CliResult<T>
where
    F: FnOnce(Driver) -> Fut,
    Fut: Future<Output = CliResult<T>>,
{
    let transport = TransportConfig {
        baud_rate: args.baud_rate,
        ..TransportConfig::default()
    };
    let mut builder = DriverBuilder::new().transport(transport);
    if let Some(dir) = devices {
        let handle = ConfigHandle::load(dir, LoaderConfig::default())
            .map_err(|err| config_error("loading device files failed", err))?;
        builder = builder.devices(handle);
    }

    runtime()?.block_on(async move {
        let driver = builder
            .open(&args.port)
            .await
            .map_err(|err| driver_error("open failed", err))?;
        let work = work(driver.clone());
        let result = match limit {
            Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                Err(CliError::new(TIMEOUT, format!("gave up after {limit:?}")))
            }),
            None => work.await,
        };
        if let Err(err) = driver.shutdown().await {
            tracing::warn!(error = %err, "driver did not shut down cleanly");
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_tolerates_separators() {
        assert_eq!(parse_hex("01 03:00,15 e9").unwrap(), vec![0x01, 0x03, 0x00, 0x15, 0xE9]);
        assert_eq!(parse_hex("0x2001").unwrap(), vec![0x20, 0x01]);
    }

    #[test]
    fn parse_hex_rejects_odd_and_garbage() {
        assert_eq!(parse_hex("123").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("  ").unwrap_err().code, USAGE);
    }
}
