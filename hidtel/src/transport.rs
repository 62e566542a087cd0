//! Defines the interface to the device access layer.
//!
//! This crate does not discover or open devices by itself. Whatever backend
//! the host uses (a platform HID library, a browser API bridge, a vendor SDK)
//! implements [`HidTransport`] and hands an instance to
//! [`HeadsetDriver::new`](crate::driver::HeadsetDriver::new).

use std::error::Error;

use async_trait::async_trait;

use crate::collection::{CollectionInfo, DeviceInfo};

/// The error type transports report failures with.
pub type TransportError = Box<dyn Error + Send + Sync>;

/// Receives every input report the device sends as `(report ID, payload)`.
///
/// The payload does not include the report ID.
pub type InputReportHandler = Box<dyn Fn(u8, &[u8]) + Send + Sync>;

/// Represents a single connected HID device that is both readable and
/// writable.
///
/// Input reports are pushed to the handler installed with
/// [`Self::set_input_report_handler`], one at a time, from whatever thread or
/// task the implementation reads on.
#[async_trait]
pub trait HidTransport: Send + Sync + 'static {
    /// The identity of the device.
    fn device_info(&self) -> DeviceInfo;

    /// The collection tree declared by the device's report descriptor.
    fn collections(&self) -> &[CollectionInfo];

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;

    /// Opens the connection. Opening an open connection is a no-op.
    async fn open(&self) -> Result<(), TransportError>;

    /// Closes the connection. Closing a closed connection is a no-op.
    async fn close(&self) -> Result<(), TransportError>;

    /// Writes an output report.
    async fn send_report(&self, report_id: u8, data: &[u8]) -> Result<(), TransportError>;

    /// Reads a feature report.
    ///
    /// None of the known usages live in feature reports, so transports may
    /// leave this unsupported.
    async fn receive_feature_report(&self, report_id: u8) -> Result<Vec<u8>, TransportError> {
        Err(format!("feature report {report_id:#04x} cannot be read by this transport").into())
    }

    /// Installs the handler for input reports, replacing any previous one.
    /// Passing [`None`] removes it.
    fn set_input_report_handler(&self, handler: Option<InputReportHandler>);
}
