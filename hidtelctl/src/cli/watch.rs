use std::io::Write;

use anyhow::Result;
use clap::Args;
use hidtel::{
    driver::{DriverState, HeadsetDriver},
    event::HeadsetEvent,
};
use owo_colors::OwoColorize;
use serde_json::json;

use super::Cli;

/// Print hook switch, mute button and other events until interrupted or the
/// headset is unplugged.
#[derive(Args)]
pub struct WatchCommand {
    /// Also print reports that did not change any state
    #[arg(short, long)]
    all: bool,
}

impl WatchCommand {
    pub async fn execute(&self, root: &Cli) -> Result<()> {
        let mut stdout = anstream::stdout();

        let headset = root.headset().await?;
        let disconnected = headset.disconnected();
        let driver = HeadsetDriver::new(headset);
        let rx = driver.listen();
        driver.init().await?;

        let info = driver.device_info();
        if !root.json {
            writeln!(
                stdout,
                "{} ({:#06x}:{:#06x}) {}",
                info.product_name,
                info.vendor_id.bright_black(),
                info.product_id.bright_black(),
                "Press Ctrl+C to stop.".bright_black().italic()
            )?;
        }

        loop {
            let event = tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = disconnected.wait() => {
                    if root.json {
                        writeln!(stdout, "{}", json!({ "disconnected": info }))?;
                    } else {
                        writeln!(stdout, " ╰─ {}", "Disconnected.".red())?;
                    }
                    stdout.flush()?;
                    break;
                },
                event = rx.recv_async() => match event {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };

            if root.json {
                writeln!(stdout, "{}", json!(event))?;
            } else {
                self.print_event(&mut stdout, event)?;
            }
            stdout.flush()?;

            if event == HeadsetEvent::StateChanged(DriverState::Closed) {
                break;
            }
        }

        driver.close().await?;

        Ok(())
    }

    fn print_event(&self, stdout: &mut impl Write, event: HeadsetEvent) -> Result<()> {
        match event {
            HeadsetEvent::FeatureChanged(change) => {
                if !self.all && !change.is_transition() {
                    return Ok(());
                }

                writeln!(
                    stdout,
                    " ├─ {} {}: {}",
                    format!("{:#04x}", change.report_id).bright_black(),
                    change.usage,
                    if change.value {
                        "on".green().into_styled()
                    } else {
                        "off".red().into_styled()
                    }
                )?;
            },
            HeadsetEvent::StateChanged(state) => {
                writeln!(stdout, " ├─ {}", format!("{state:?}").bright_blue())?;
            },
            HeadsetEvent::Diagnostic(diagnostic) => {
                writeln!(stdout, " ├─ {}", format!("{diagnostic:?}").yellow())?;
            },
            _ => {},
        }

        Ok(())
    }
}
