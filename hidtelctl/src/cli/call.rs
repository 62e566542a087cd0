use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use clap::Args;
use hidtel::{driver::HeadsetDriver, transport::HidTransport};
use owo_colors::OwoColorize;
use serde_json::json;

use super::Cli;

#[derive(Args)]
pub struct ToggleArgs {
    /// Turn it off instead of on
    #[arg(long)]
    off: bool,
}

impl ToggleArgs {
    pub fn on(&self) -> bool {
        !self.off
    }
}

/// A single call control command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CallAction {
    Ring(bool),
    Mute(bool),
    Hold(bool),
    Online(bool),
    Accept,
    Decline,
    Hangup,
}

impl CallAction {
    fn name(self) -> &'static str {
        match self {
            Self::Ring(_) => "ring",
            Self::Mute(_) => "mute",
            Self::Hold(_) => "hold",
            Self::Online(_) => "online",
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Hangup => "hangup",
        }
    }

    fn value(self) -> Option<bool> {
        match self {
            Self::Ring(value) | Self::Mute(value) | Self::Hold(value) | Self::Online(value) => {
                Some(value)
            },
            _ => None,
        }
    }

    async fn apply<T: HidTransport>(self, driver: &HeadsetDriver<T>) -> Result<()> {
        match self {
            Self::Ring(ring) => driver.ring(ring).await?,
            Self::Mute(muted) => driver.mute(muted).await?,
            Self::Hold(held) => driver.hold(held).await?,
            Self::Online(online) => driver.online(online).await?,
            Self::Accept => driver.accept_call().await?,
            Self::Decline => driver.decline_call().await?,
            Self::Hangup => driver.hangup().await?,
        }

        Ok(())
    }
}

/// Opens the selected headset, sends a single command and closes it again.
pub async fn execute(root: &Cli, action: CallAction) -> Result<()> {
    let mut stdout = BufWriter::new(anstream::stdout());

    let driver = HeadsetDriver::new(root.headset().await?);
    let info = driver.device_info();

    driver
        .init()
        .await
        .with_context(|| format!("could not initialize {}", info.product_name))?;
    action
        .apply(&driver)
        .await
        .with_context(|| format!("could not send `{}` to {}", action.name(), info.product_name))?;
    driver.close().await?;

    if root.json {
        writeln!(
            stdout,
            "{}",
            json!({
                "device": info,
                "action": action.name(),
                "value": action.value(),
            })
        )?;
    } else {
        write!(stdout, "{} {}", info.product_name, action.name().bright_blue())?;
        match action.value() {
            Some(true) => write!(stdout, " {}", "on".green())?,
            Some(false) => write!(stdout, " {}", "off".red())?,
            None => {},
        }
        writeln!(stdout)?;
    }

    stdout.flush()?;

    Ok(())
}
