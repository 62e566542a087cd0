mod call;
mod probe;
mod watch;

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, bail};
use call::{CallAction, ToggleArgs};
use clap::{ArgAction, Parser, Subcommand};
use hidtel::transport::HidTransport;
use probe::ProbeCommand;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use watch::WatchCommand;

use crate::async_hid_impl::{AsyncHidTransport, enumerate_headsets};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    color: colorchoice_clap::Color,

    #[command(subcommand)]
    command: Commands,

    /// Output plain JSON without color and interactivity
    #[arg(short, long, global = true)]
    json: bool,

    /// Log more details to stderr, may be repeated
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only use headsets with the given vendor and product ID, e.g. `0b0e:245e`
    #[arg(short, long, global = true)]
    device: Option<DeviceFilter>,

    /// Which of the matching headsets to use
    #[arg(short, long, global = true, default_value_t = 0)]
    index: usize,
}

#[derive(Subcommand)]
enum Commands {
    Probe(ProbeCommand),
    Watch(WatchCommand),

    /// Start or stop ringing
    Ring(ToggleArgs),

    /// Turn the mute indicators on or off
    Mute(ToggleArgs),

    /// Turn the hold indicator on or off
    Hold(ToggleArgs),

    /// Turn the on-line indicator on or off
    Online(ToggleArgs),

    /// Stop ringing and go off hook
    Accept,

    /// Stop ringing
    Decline,

    /// Go on hook and clear all call indicators
    Hangup,
}

/// Selects headsets by vendor and product ID.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct DeviceFilter {
    vendor_id: u16,
    product_id: u16,
}

impl FromStr for DeviceFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (vendor_id, product_id) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected VID:PID, got `{s}`"))?;

        Ok(Self {
            vendor_id: u16::from_str_radix(vendor_id.trim_start_matches("0x"), 16)?,
            product_id: u16::from_str_radix(product_id.trim_start_matches("0x"), 16)?,
        })
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

impl Cli {
    /// Finds all connected headsets matching `--device`.
    async fn headsets(&self) -> Result<Vec<AsyncHidTransport>> {
        let mut headsets = enumerate_headsets().await?;

        if let Some(filter) = self.device {
            headsets.retain(|headset| {
                let info = headset.device_info();
                info.vendor_id == filter.vendor_id && info.product_id == filter.product_id
            });
        }

        Ok(headsets)
    }

    /// Picks the headset selected by `--device` and `--index`.
    async fn headset(&self) -> Result<AsyncHidTransport> {
        let mut headsets = self.headsets().await?;

        if headsets.is_empty() {
            match self.device {
                Some(filter) => bail!("no headset matching {filter} was found"),
                None => bail!("no headset was found"),
            }
        }

        if self.index >= headsets.len() {
            bail!(
                "headset index {} is out of range, {} headsets were found",
                self.index,
                headsets.len()
            );
        }

        Ok(headsets.swap_remove(self.index))
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "hidtel=warn,hidtelctl=warn",
        1 => "hidtel=info,hidtelctl=info",
        2 => "hidtel=debug,hidtelctl=debug",
        _ => "hidtel=trace,hidtelctl=trace",
    };

    // RUST_LOG takes precedence over -v.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {err}");
    }
}

pub async fn execute() -> Result<()> {
    let cli = Cli::parse();

    cli.color.write_global();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Probe(cmd) => cmd.execute(&cli).await,
        Commands::Watch(cmd) => cmd.execute(&cli).await,
        Commands::Ring(args) => call::execute(&cli, CallAction::Ring(args.on())).await,
        Commands::Mute(args) => call::execute(&cli, CallAction::Mute(args.on())).await,
        Commands::Hold(args) => call::execute(&cli, CallAction::Hold(args.on())).await,
        Commands::Online(args) => call::execute(&cli, CallAction::Online(args.on())).await,
        Commands::Accept => call::execute(&cli, CallAction::Accept).await,
        Commands::Decline => call::execute(&cli, CallAction::Decline).await,
        Commands::Hangup => call::execute(&cli, CallAction::Hangup).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_device_filter() {
        let filter: DeviceFilter = "0b0e:245e".parse().unwrap();
        assert_eq!(filter, DeviceFilter {
            vendor_id: 0x0b0e,
            product_id: 0x245e,
        });
        assert_eq!(filter.to_string(), "0b0e:245e");

        let filter: DeviceFilter = "0x047f:0xc056".parse().unwrap();
        assert_eq!(filter.vendor_id, 0x047f);

        assert!("0b0e".parse::<DeviceFilter>().is_err());
        assert!("xyz:245e".parse::<DeviceFilter>().is_err());
    }

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from(["hidtelctl", "ring", "--off", "-d", "0b0e:245e", "-vv"])
            .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.index, 0);
        assert!(matches!(&cli.command, Commands::Ring(args) if !args.on()));
    }
}
