//! Compiles the collection tree of a device into bit-addressable report
//! descriptors.
//!
//! Headset vendors encode every telephony control we care about as a boolean
//! on an individual bit of some report. This has held for all headsets seen
//! so far, so compilation takes the same shortcut: only report items made of
//! single bit fields with a logical maximum of `1` are mapped, everything
//! else is treated as opaque filler that still occupies its bits.

use tracing::trace;

use crate::{
    collection::{CollectionInfo, ReportInfo},
    event::Diagnostic,
    usage::{self, Direction, KnownUsage},
};

/// Reports wider than this many bytes are never read.
const MAX_REPORT_LENGTH: usize = 4096;

/// Describes which known usage, if any, each bit of a report payload carries.
///
/// Bit `i` lives in byte `i / 8` at bit position `i % 8`, counting from the
/// least significant bit.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportDescriptor {
    report_id: u8,
    bits_usage: Vec<Option<KnownUsage>>,
}

impl ReportDescriptor {
    /// Creates a descriptor from an explicit bit layout.
    ///
    /// Returns [`None`] if the layout is not a whole number of bytes or does
    /// not contain any usage.
    pub fn new(report_id: u8, bits_usage: Vec<Option<KnownUsage>>) -> Option<Self> {
        if bits_usage.len() % 8 != 0 || bits_usage.iter().all(Option::is_none) {
            return None;
        }

        Some(Self {
            report_id,
            bits_usage,
        })
    }

    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    pub fn bits_usage(&self) -> &[Option<KnownUsage>] {
        &self.bits_usage
    }

    /// The length of the payload in bytes, excluding the report ID.
    pub fn byte_len(&self) -> usize {
        self.bits_usage.len() / 8
    }

    /// Whether any bit of the report carries the usage.
    pub fn contains(&self, usage: KnownUsage) -> bool {
        self.bits_usage.contains(&Some(usage))
    }

    /// Iterates over all assigned bits as `(bit position, usage)` pairs.
    pub fn usages(&self) -> impl Iterator<Item = (usize, KnownUsage)> + '_ {
        self.bits_usage
            .iter()
            .enumerate()
            .filter_map(|(bit, usage)| usage.map(|usage| (bit, usage)))
    }
}

/// The compiled report descriptors of one direction.
///
/// Report IDs are unique within a table.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportTable {
    direction: Direction,
    reports: Vec<ReportDescriptor>,
}

impl ReportTable {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            reports: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Adds a descriptor unless one with the same report ID exists.
    ///
    /// Returns whether the descriptor was added.
    pub fn insert(&mut self, descriptor: ReportDescriptor) -> bool {
        if self.by_id(descriptor.report_id).is_some() {
            return false;
        }

        self.reports.push(descriptor);
        true
    }

    /// Looks up a descriptor by its report ID.
    pub fn by_id(&self, report_id: u8) -> Option<&ReportDescriptor> {
        self.reports
            .iter()
            .find(|report| report.report_id == report_id)
    }

    /// Looks up the first descriptor carrying the usage.
    pub fn for_usage(&self, usage: KnownUsage) -> Option<&ReportDescriptor> {
        self.reports.iter().find(|report| report.contains(usage))
    }

    /// Iterates over every descriptor carrying the usage.
    pub fn all_for_usage(&self, usage: KnownUsage) -> impl Iterator<Item = &ReportDescriptor> {
        self.reports
            .iter()
            .filter(move |report| report.contains(usage))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReportDescriptor> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl<'a> IntoIterator for &'a ReportTable {
    type Item = &'a ReportDescriptor;
    type IntoIter = std::slice::Iter<'a, ReportDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The result of [`compile`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CompiledDescriptors {
    /// Reports sent from the device to the host.
    pub input: ReportTable,

    /// Reports sent from the host to the device.
    pub output: ReportTable,

    /// Everything that was skipped along the way, in walk order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles the report descriptors of all collections relevant to headsets.
///
/// Collections are walked depth first. A collection whose usage page is not
/// one of [`usage::UsagePage`] is skipped together with its children.
pub fn compile(collections: &[CollectionInfo]) -> CompiledDescriptors {
    let mut compiled = CompiledDescriptors {
        input: ReportTable::new(Direction::Input),
        output: ReportTable::new(Direction::Output),
        diagnostics: Vec::new(),
    };

    for collection in collections {
        compiled.visit(collection);
    }

    compiled
}

impl CompiledDescriptors {
    fn visit(&mut self, collection: &CollectionInfo) {
        if !usage::is_known_page(collection.usage_page) {
            trace!(
                usage_page = collection.usage_page,
                "skipping collection with unrecognized usage page"
            );
            self.diagnostics.push(Diagnostic::UnrecognizedCollection {
                usage_page: collection.usage_page,
            });
            return;
        }

        for report in &collection.input_reports {
            self.add_report(Direction::Input, report);
        }
        for report in &collection.output_reports {
            self.add_report(Direction::Output, report);
        }

        for child in &collection.children {
            self.visit(child);
        }
    }

    fn add_report(&mut self, direction: Direction, info: &ReportInfo) {
        let Some(descriptor) = compile_report(direction, info, &mut self.diagnostics) else {
            return;
        };

        let table = match direction {
            Direction::Input => &mut self.input,
            Direction::Output => &mut self.output,
        };

        if !table.insert(descriptor) {
            self.diagnostics.push(Diagnostic::DuplicateReport {
                direction,
                report_id: info.report_id,
            });
        }
    }
}

/// Maps the bits of a single report to known usages.
fn compile_report(
    direction: Direction,
    info: &ReportInfo,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ReportDescriptor> {
    let report_id = info.report_id;
    let bit_len = info.bit_len();

    if info.items.is_empty() || bit_len == 0 || bit_len > MAX_REPORT_LENGTH * 8 {
        diagnostics.push(Diagnostic::DegenerateReport {
            direction,
            report_id,
        });
        return None;
    }

    if bit_len % 8 != 0 {
        diagnostics.push(Diagnostic::UnalignedReport {
            direction,
            report_id,
            bits: bit_len,
        });
        return None;
    }

    let mut bits_usage = vec![None; bit_len];
    let mut offset = 0;

    for item in &info.items {
        let item_len = item.bit_len();

        if item.is_boolean() {
            // Each usage of the item maps to the bit at its position.
            for (position, usage) in item.usages.iter().take(item_len).enumerate() {
                if let Some(known) = usage::lookup(usage) {
                    bits_usage[offset + position] = Some(known);
                }
            }
        } else if item.usages.iter().next().is_some() {
            diagnostics.push(Diagnostic::SkippedItem {
                direction,
                report_id,
                bit_offset: offset,
                report_size: item.report_size,
                report_count: item.report_count,
            });
        }

        offset += item_len;
    }

    let descriptor = ReportDescriptor::new(report_id, bits_usage);
    if descriptor.is_none() {
        diagnostics.push(Diagnostic::DiscardedReport {
            direction,
            report_id,
        });
    }

    descriptor
}
