//! Translates between the [`StateStore`] and raw report payloads.
//!
//! Both directions share the same bit addressing: bit `i` of a descriptor is
//! bit `i % 8` (least significant first) of payload byte `i / 8`. Real
//! devices depend on this exact layout.

use thiserror::Error;

use crate::{
    descriptor::{ReportDescriptor, ReportTable},
    event::FeatureChange,
    state::StateStore,
};

/// Splits a bit position into a byte index and the bit within that byte.
fn locate(bit: usize) -> (usize, u8) {
    let byte = bit / 8;
    (byte, (bit - 8 * byte) as u8)
}

/// Builds the payload of an output report from the stored states.
///
/// Unassigned bits and usages that are off or unknown are left at zero.
pub fn encode(descriptor: &ReportDescriptor, store: &StateStore) -> Vec<u8> {
    let mut payload = vec![0u8; descriptor.byte_len()];

    for (bit, usage) in descriptor.usages() {
        if store.is_on(usage) {
            let (byte, offset) = locate(bit);
            payload[byte] |= 1 << offset;
        }
    }

    payload
}

/// Looks up an output report by ID and builds its payload.
///
/// Returns [`None`] if the table has no such report.
pub fn encode_report(table: &ReportTable, report_id: u8, store: &StateStore) -> Option<Vec<u8>> {
    table
        .by_id(report_id)
        .map(|descriptor| encode(descriptor, store))
}

/// Reads every usage carried by an input report into the store.
///
/// Returns one [`FeatureChange`] per assigned bit. A payload of unexpected
/// length leaves the store untouched.
pub fn decode(
    descriptor: &ReportDescriptor,
    payload: &[u8],
    store: &mut StateStore,
) -> Result<Vec<FeatureChange>, DecodeError> {
    let expected = descriptor.byte_len();
    if payload.len() != expected {
        return Err(DecodeError::LengthMismatch {
            report_id: descriptor.report_id(),
            expected,
            actual: payload.len(),
        });
    }

    let changes = descriptor
        .usages()
        .map(|(bit, usage)| {
            let (byte, offset) = locate(bit);
            let value = payload[byte] & (1 << offset) != 0;

            FeatureChange {
                report_id: descriptor.report_id(),
                usage,
                previous: store.set(usage, value),
                value,
            }
        })
        .collect();

    Ok(changes)
}

/// Looks up an input report by ID and decodes it into the store.
pub fn decode_report(
    table: &ReportTable,
    report_id: u8,
    payload: &[u8],
    store: &mut StateStore,
) -> Result<Vec<FeatureChange>, DecodeError> {
    let descriptor = table
        .by_id(report_id)
        .ok_or(DecodeError::UnknownReport(report_id))?;

    decode(descriptor, payload, store)
}

/// Represents a reason an input report was not decoded.
///
/// Neither case is a failure of the device: unknown reports carry features
/// outside of the recognized set and mismatched lengths are dropped.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Error)]
pub enum DecodeError {
    /// Indicates that no input report with the given ID carries known usages.
    #[error("the input report {0:#04x} carries no known usages")]
    UnknownReport(u8),

    /// Indicates that the payload length does not match the descriptor.
    #[error("expected {expected} bytes for input report {report_id:#04x}, got {actual}")]
    LengthMismatch {
        report_id: u8,
        expected: usize,
        actual: usize,
    },
}
