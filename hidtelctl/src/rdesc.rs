//! Converts raw report descriptors into the collection tree `hidtel` reads.

use std::ops::Range;

use anyhow::{Context, Result};
use hidreport::{Field, Report, ReportDescriptor};
use hidtel::{
    collection::{CollectionInfo, ItemUsages, ReportInfo, ReportItem},
    usage::Usage,
};

/// Parses a raw report descriptor.
///
/// Every report is attached to the top-level collection of its first field
/// with a usage. Top-level collections keep the order of their first report.
pub fn parse_collections(raw: &[u8]) -> Result<Vec<CollectionInfo>> {
    let descriptor =
        ReportDescriptor::try_from(raw).context("the report descriptor could not be parsed")?;

    let mut collections: Vec<CollectionInfo> = Vec::new();

    for (reports, slot) in [
        (convert_reports(descriptor.input_reports()), Slot::Input),
        (convert_reports(descriptor.output_reports()), Slot::Output),
        (convert_reports(descriptor.feature_reports()), Slot::Feature),
    ] {
        for ((usage_page, usage), report) in reports {
            let index = match collections
                .iter()
                .position(|c| c.usage_page == usage_page && c.usage == usage)
            {
                Some(index) => index,
                None => {
                    collections.push(CollectionInfo::new(usage_page, usage));
                    collections.len() - 1
                },
            };

            let collection = &mut collections[index];
            match slot {
                Slot::Input => collection.input_reports.push(report),
                Slot::Output => collection.output_reports.push(report),
                Slot::Feature => collection.feature_reports.push(report),
            }
        }
    }

    Ok(collections)
}

#[derive(Clone, Copy)]
enum Slot {
    Input,
    Output,
    Feature,
}

fn convert_reports(reports: &[impl Report]) -> Vec<((u16, u16), ReportInfo)> {
    reports
        .iter()
        .filter_map(|report| {
            let collection = top_level_collection(report.fields())?;
            Some((collection, convert_report(report)))
        })
        .collect()
}

/// The usage page and usage of the outermost collection of the first field
/// that belongs to one.
fn top_level_collection(fields: &[Field]) -> Option<(u16, u16)> {
    let usage = fields
        .iter()
        .filter_map(|field| field.collections().first())
        .find_map(|collection| collection.usages().first())?;

    let usage = Usage::from(u32::from(usage));
    Some((usage.page(), usage.code()))
}

/// Rebuilds the item list of a report from its fields.
///
/// Field bit ranges include the report ID prefix, if any.
fn convert_report(report: &impl Report) -> ReportInfo {
    let (report_id, prefix) = match report.report_id() {
        Some(id) => (u8::from(id), 8),
        None => (0, 0),
    };

    let fields = report
        .fields()
        .iter()
        .map(|field| {
            let bits = field.bits().clone();
            let width = (bits.end - bits.start) as u32;

            let item = match field {
                Field::Variable(var) => ReportItem {
                    report_size: width,
                    report_count: 1,
                    logical_minimum: i32::from(&var.logical_minimum),
                    logical_maximum: i32::from(&var.logical_maximum),
                    usages: ItemUsages::List(vec![Usage::from(u32::from(&var.usage))]),
                },
                // Arrays report selector indices, never flags, so only their
                // width matters.
                Field::Array(arr) => ReportItem {
                    report_size: width,
                    report_count: 1,
                    usages: ItemUsages::List(
                        arr.usages()
                            .iter()
                            .map(|usage| Usage::from(u32::from(usage)))
                            .collect(),
                    ),
                    ..Default::default()
                },
                Field::Constant(_) => ReportItem::padding(width),
            };

            (bits, item)
        })
        .collect();

    lay_out(report_id, prefix, report.size_in_bits(), fields)
}

/// Orders items by their bit range and fills gaps with padding so every item
/// keeps its offset.
///
/// Ranges are end-exclusive and counted from the start of the report,
/// including `prefix` bits for the report ID.
fn lay_out(
    report_id: u8,
    prefix: usize,
    size_in_bits: usize,
    mut fields: Vec<(Range<usize>, ReportItem)>,
) -> ReportInfo {
    fields.sort_by_key(|(bits, _)| bits.start);

    let mut offset = prefix;
    let mut items = Vec::with_capacity(fields.len());
    for (bits, item) in fields {
        if bits.start > offset {
            items.push(ReportItem::padding((bits.start - offset) as u32));
        }

        items.push(item);
        offset = offset.max(bits.end);
    }

    if size_in_bits > offset {
        items.push(ReportItem::padding((size_in_bits - offset) as u32));
    }

    ReportInfo::new(report_id, items)
}
