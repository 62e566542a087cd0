//! Describes a connected device the way the device-access layer hands it over.
//!
//! These types mirror the structured HID metadata most platforms expose: a
//! tree of collections, each listing its input, output and feature reports
//! item by item. Backends fill them in, the
//! [`descriptor`](crate::descriptor) module compiles them.

use crate::usage::Usage;

/// Identifies a connected device. The values are opaque to the driver.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: String,
}

/// Represents one HID collection and the reports declared inside it.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CollectionInfo {
    pub usage_page: u16,
    pub usage: u16,
    pub children: Vec<CollectionInfo>,
    pub input_reports: Vec<ReportInfo>,
    pub output_reports: Vec<ReportInfo>,
    pub feature_reports: Vec<ReportInfo>,
}

impl CollectionInfo {
    /// Creates an empty collection with the given usage.
    pub fn new(usage_page: u16, usage: u16) -> Self {
        Self {
            usage_page,
            usage,
            ..Default::default()
        }
    }
}

/// Represents a single report as a sequence of report items.
///
/// The items are laid out in the payload in the order they are listed.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportInfo {
    pub report_id: u8,
    pub items: Vec<ReportItem>,
}

impl ReportInfo {
    pub fn new(report_id: u8, items: Vec<ReportItem>) -> Self {
        Self { report_id, items }
    }

    /// The total width of the report payload in bits.
    pub fn bit_len(&self) -> usize {
        self.items.iter().map(ReportItem::bit_len).sum()
    }
}

/// Represents a main item of a report: `report_count` fields of
/// `report_size` bits each.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportItem {
    pub report_size: u32,
    pub report_count: u32,
    pub logical_minimum: i32,
    pub logical_maximum: i32,
    pub usages: ItemUsages,
}

impl ReportItem {
    /// Creates an item of single bit boolean fields, one per usage.
    pub fn flags(usages: impl IntoIterator<Item = Usage>) -> Self {
        let usages: Vec<Usage> = usages.into_iter().collect();

        Self {
            report_size: 1,
            report_count: usages.len() as u32,
            logical_minimum: 0,
            logical_maximum: 1,
            usages: ItemUsages::List(usages),
        }
    }

    /// Creates a constant item without usages, as used for padding.
    pub fn padding(bits: u32) -> Self {
        Self {
            report_size: bits,
            report_count: 1,
            ..Default::default()
        }
    }

    /// The width of the item in bits.
    pub fn bit_len(&self) -> usize {
        self.report_size as usize * self.report_count as usize
    }

    /// Whether every field of the item is a single bit holding `0` or `1`.
    pub fn is_boolean(&self) -> bool {
        self.report_size == 1 && self.logical_maximum == 1
    }
}

/// The usages a report item declares, either listed one by one or as an
/// inclusive range.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ItemUsages {
    List(Vec<Usage>),
    Range { minimum: Usage, maximum: Usage },
}

impl Default for ItemUsages {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ItemUsages {
    /// Iterates over the declared usages in field order.
    ///
    /// A range is expanded within the usage page of its minimum. An inverted
    /// range yields nothing.
    pub fn iter(&self) -> Box<dyn Iterator<Item = Usage> + '_> {
        match self {
            Self::List(usages) => Box::new(usages.iter().copied()),
            Self::Range { minimum, maximum } => {
                let page = minimum.page();
                let last = if maximum.page() == page {
                    maximum.code()
                } else {
                    u16::MAX
                };

                Box::new(
                    (minimum.code()..=last).map(move |code| Usage::from_page_and_code(page, code)),
                )
            },
        }
    }
}
