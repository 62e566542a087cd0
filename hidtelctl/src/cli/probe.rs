use std::io::{BufWriter, Write};

use anyhow::Result;
use clap::Args;
use hidtel::{
    collection::DeviceInfo,
    descriptor::{self, ReportTable},
    event::Diagnostic,
    transport::HidTransport,
    usage::KnownUsage,
};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

use super::Cli;

/// Detect connected headsets and view the controls they expose.
#[derive(Args)]
pub struct ProbeCommand {
    /// Also list everything that was skipped while reading the descriptors
    #[arg(short = 'D', long)]
    diagnostics: bool,
}

impl ProbeCommand {
    pub async fn execute(&self, root: &Cli) -> Result<()> {
        let mut stdout = BufWriter::new(anstream::stdout());

        let headsets: Vec<ProbedHeadset> = root
            .headsets()
            .await?
            .iter()
            .map(ProbedHeadset::probe)
            .collect();

        if root.json {
            writeln!(stdout, "{}", json!(headsets))?;
            stdout.flush()?;
            return Ok(());
        }

        if headsets.is_empty() {
            writeln!(stdout, "{}", "No headsets were found.".bright_black())?;
            stdout.flush()?;
            return Ok(());
        }

        for (headset_i, headset) in headsets.into_iter().enumerate() {
            if headset_i != 0 {
                writeln!(stdout)?;
            }

            writeln!(
                stdout,
                "{}: {} ({:#06x}:{:#06x})",
                headset_i.bright_black(),
                headset.device.product_name,
                headset.device.vendor_id.bright_black(),
                headset.device.product_id.bright_black()
            )?;
            writeln!(stdout, " │")?;

            let mut sections = vec![
                ("INPUT", headset.input_reports),
                ("OUTPUT", headset.output_reports),
            ];
            sections.retain(|(_, reports)| !reports.is_empty());

            if sections.is_empty() {
                writeln!(
                    stdout,
                    " ╰─ {}",
                    "No known controls were found.".bright_black().italic()
                )?;
            }

            let sections_len = sections.len();
            for (section_i, (direction, reports)) in sections.into_iter().enumerate() {
                let last_section = section_i == sections_len - 1 && !self.diagnostics;
                writeln!(
                    stdout,
                    "{} {}",
                    if last_section { " ╰─" } else { " ├─" },
                    direction.bright_blue()
                )?;

                let usages: Vec<String> = reports
                    .iter()
                    .flat_map(|report| {
                        report.usages.iter().map(move |(bit, usage)| {
                            format!(
                                "{} {}",
                                format!("{:#04x}:{bit}", report.report_id).bright_black(),
                                usage
                            )
                        })
                    })
                    .collect();

                let usages_len = usages.len();
                for (usage_i, usage) in usages.into_iter().enumerate() {
                    writeln!(
                        stdout,
                        "{}{} {}",
                        if last_section { "    " } else { " │  " },
                        if usage_i == usages_len - 1 {
                            "╰─"
                        } else {
                            "├─"
                        },
                        usage
                    )?;
                }
            }

            if self.diagnostics {
                writeln!(stdout, " ╰─ {}", "DIAGNOSTICS".yellow())?;

                let diagnostics_len = headset.diagnostics.len();
                for (diagnostic_i, diagnostic) in headset.diagnostics.into_iter().enumerate() {
                    writeln!(
                        stdout,
                        "    {} {}",
                        if diagnostic_i == diagnostics_len - 1 {
                            "╰─"
                        } else {
                            "├─"
                        },
                        format!("{diagnostic:?}").bright_black()
                    )?;
                }
            }
        }

        stdout.flush()?;

        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
struct ProbedHeadset {
    device: DeviceInfo,
    input_reports: Vec<ProbedReport>,
    output_reports: Vec<ProbedReport>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
struct ProbedReport {
    report_id: u8,
    byte_len: usize,

    /// Assigned bits as `(bit position, usage)`.
    usages: Vec<(usize, KnownUsage)>,
}

impl ProbedHeadset {
    /// Compiles the descriptors of a headset without opening it.
    fn probe(headset: &impl HidTransport) -> Self {
        let compiled = descriptor::compile(headset.collections());

        Self {
            device: headset.device_info(),
            input_reports: ProbedReport::from_table(&compiled.input),
            output_reports: ProbedReport::from_table(&compiled.output),
            diagnostics: compiled.diagnostics,
        }
    }
}

impl ProbedReport {
    fn from_table(table: &ReportTable) -> Vec<Self> {
        table
            .iter()
            .map(|report| Self {
                report_id: report.report_id(),
                byte_len: report.byte_len(),
                usages: report.usages().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use hidtel::{
        collection::{CollectionInfo, ReportInfo, ReportItem},
        transport::{InputReportHandler, TransportError},
    };

    use super::*;

    struct Offline(Vec<CollectionInfo>);

    #[hidtel::async_trait]
    impl HidTransport for Offline {
        fn device_info(&self) -> DeviceInfo {
            DeviceInfo::default()
        }

        fn collections(&self) -> &[CollectionInfo] {
            &self.0
        }

        fn is_open(&self) -> bool {
            false
        }

        async fn open(&self) -> Result<(), TransportError> {
            Err("offline".into())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn send_report(&self, _: u8, _: &[u8]) -> Result<(), TransportError> {
            Err("offline".into())
        }

        fn set_input_report_handler(&self, _: Option<InputReportHandler>) {}
    }

    #[test]
    fn test_probe() {
        let mut collection = CollectionInfo::new(0x0b, 0x05);
        collection.output_reports.push(ReportInfo::new(0x02, vec![
            ReportItem::padding(3),
            ReportItem::flags([KnownUsage::LedOffHook.usage()]),
            ReportItem::padding(4),
        ]));

        let probed = ProbedHeadset::probe(&Offline(vec![
            collection,
            CollectionInfo::new(0xff00, 0x01),
        ]));

        assert!(probed.input_reports.is_empty());
        assert_eq!(probed.output_reports, vec![ProbedReport {
            report_id: 0x02,
            byte_len: 1,
            usages: vec![(3, KnownUsage::LedOffHook)],
        }]);
        assert_eq!(probed.diagnostics, vec![Diagnostic::UnrecognizedCollection {
            usage_page: 0xff00,
        }]);
    }
}
