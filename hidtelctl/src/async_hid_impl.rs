//! Implements HID communication using the `async-hid` crate.

use std::{
    fs,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{Result, anyhow};
use async_hid::{AsyncHidRead, AsyncHidWrite, Device, DeviceId, DeviceWriter, HidBackend};
use futures_lite::StreamExt;
use hidtel::{
    async_trait,
    collection::{CollectionInfo, DeviceInfo},
    transport::{HidTransport, InputReportHandler, TransportError},
    usage::UsagePage,
};
use itertools::Itertools;
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, trace, warn};

use crate::rdesc;

type SharedHandler = Arc<Mutex<Option<InputReportHandler>>>;

/// The size of the buffer incoming reports are read into: the widest input
/// report plus one byte for the report ID.
fn input_buffer_len(collections: &[CollectionInfo]) -> usize {
    fn widest(collection: &CollectionInfo) -> usize {
        let own = collection
            .input_reports
            .iter()
            .map(|report| report.bit_len().div_ceil(8))
            .max()
            .unwrap_or(0);

        collection.children.iter().map(widest).fold(own, usize::max)
    }

    collections.iter().map(widest).max().unwrap_or(0) + 1
}

/// Fires once the reader task of a connection ends on its own, which
/// happens when the device goes away.
#[derive(Clone, Debug, Default)]
pub struct Disconnected(Arc<Notify>);

impl Disconnected {
    fn notify(&self) {
        self.0.notify_one();
    }

    /// Waits for the disconnect. Returns immediately if it already happened.
    pub async fn wait(&self) {
        self.0.notified().await;
    }
}

struct Connection {
    writer: Arc<tokio::sync::Mutex<DeviceWriter>>,
    reader: JoinHandle<()>,
}

/// A headset opened through `async-hid`.
///
/// Input reports are read on a dedicated task for as long as the connection
/// is open. The connection counts as closed once that task ends.
pub struct AsyncHidTransport {
    device: Device,
    info: DeviceInfo,
    collections: Vec<CollectionInfo>,

    /// Whether reports are prefixed with a report ID on the wire.
    numbered: bool,

    /// The size of the input report buffer.
    buffer_len: usize,

    disconnected: Disconnected,

    connection: Mutex<Option<Connection>>,
    handler: SharedHandler,
}

impl AsyncHidTransport {
    /// A handle that fires when the device disappears while open.
    pub fn disconnected(&self) -> Disconnected {
        self.disconnected.clone()
    }

    fn connection(&self) -> std::sync::MutexGuard<'_, Option<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HidTransport for AsyncHidTransport {
    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn collections(&self) -> &[CollectionInfo] {
        &self.collections
    }

    fn is_open(&self) -> bool {
        self.connection()
            .as_ref()
            .is_some_and(|connection| !connection.reader.is_finished())
    }

    async fn open(&self) -> Result<(), TransportError> {
        if self.is_open() {
            return Ok(());
        }

        let (mut reader, writer) = self.device.open().await?;
        debug!(device = %self.info.product_name, "opened device");

        let handler = Arc::clone(&self.handler);
        let numbered = self.numbered;
        let buffer_len = self.buffer_len;
        let disconnected = self.disconnected.clone();
        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; buffer_len];

            loop {
                let len = match reader.read_input_report(&mut buf).await {
                    Ok(0) => continue,
                    Ok(len) => len,
                    Err(err) => {
                        warn!(error = %err, "could not read input report, closing connection");
                        disconnected.notify();
                        break;
                    },
                };

                let (report_id, payload) = if numbered {
                    (buf[0], &buf[1..len])
                } else {
                    (0, &buf[..len])
                };
                trace!(report_id, ?payload, "received input report");

                if let Some(handler) = &*handler.lock().unwrap_or_else(PoisonError::into_inner) {
                    handler(report_id, payload);
                }
            }
        });

        if let Some(previous) = self.connection().replace(Connection {
            writer: Arc::new(tokio::sync::Mutex::new(writer)),
            reader: task,
        }) {
            previous.reader.abort();
        }

        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(connection) = self.connection().take() {
            connection.reader.abort();
            debug!(device = %self.info.product_name, "closed device");
        }

        Ok(())
    }

    async fn send_report(&self, report_id: u8, data: &[u8]) -> Result<(), TransportError> {
        let writer = match &*self.connection() {
            Some(connection) => Arc::clone(&connection.writer),
            None => return Err(anyhow!("the device is not open").into_boxed_dyn_error()),
        };

        // The report ID is always written, `0` standing for none.
        let mut report = Vec::with_capacity(data.len() + 1);
        report.push(report_id);
        report.extend_from_slice(data);

        let mut guard = writer.lock().await;
        guard.write_output_report(&report).await?;
        Ok(())
    }

    fn set_input_report_handler(&self, handler: Option<InputReportHandler>) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = handler;
    }
}

impl Drop for AsyncHidTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection().take() {
            connection.reader.abort();
        }
    }
}

/// Reads the raw report descriptor of a device.
fn read_report_descriptor(id: &DeviceId) -> Result<Vec<u8>> {
    let DeviceId::DevPath(path) = id else {
        return Err(anyhow!(
            "report descriptors are currently only supported on Linux"
        ));
    };

    Ok(fs::read(path.join("device/report_descriptor"))?)
}

/// Tries to find all telephony headsets on the local machine.
///
/// A device counts as a headset if its report descriptor declares a top-level
/// collection on the telephony usage page. Devices whose descriptor cannot be
/// read are skipped.
pub async fn enumerate_headsets() -> Result<Vec<AsyncHidTransport>> {
    let hid = HidBackend::default();
    let devices: Vec<Device> = hid
        .enumerate()
        .await?
        .collect::<Vec<Device>>()
        .await
        .into_iter()
        .unique_by(|x| x.id.clone())
        .collect();

    let mut headsets = Vec::new();
    for dev in devices.into_iter() {
        let info = (*dev).clone();

        let collections = match read_report_descriptor(&info.id)
            .and_then(|raw| rdesc::parse_collections(&raw))
        {
            Ok(collections) => collections,
            Err(err) => {
                debug!(device = %info.name, error = %err, "skipping device");
                continue;
            },
        };

        if !collections
            .iter()
            .any(|c| c.usage_page == u16::from(UsagePage::Telephony))
        {
            trace!(device = %info.name, "skipping device without telephony collection");
            continue;
        }

        let numbered = collections.iter().any(|c| {
            c.input_reports
                .iter()
                .chain(&c.output_reports)
                .chain(&c.feature_reports)
                .any(|report| report.report_id != 0)
        });

        let buffer_len = input_buffer_len(&collections);
        headsets.push(AsyncHidTransport {
            info: DeviceInfo {
                vendor_id: info.vendor_id,
                product_id: info.product_id,
                product_name: info.name.clone(),
            },
            device: dev,
            collections,
            numbered,
            buffer_len,
            disconnected: Disconnected::default(),
            connection: Mutex::new(None),
            handler: Arc::new(Mutex::new(None)),
        });
    }

    Ok(headsets)
}
