//! Implements the headset driver on top of a [`HidTransport`].

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    codec::{self, DecodeError},
    collection::DeviceInfo,
    descriptor::{self, ReportDescriptor, ReportTable},
    event::{Diagnostic, EventEmitter, HeadsetEvent},
    state::StateStore,
    transport::{HidTransport, TransportError},
    usage::{Direction, KnownUsage},
};

/// The lifecycle state of a [`HeadsetDriver`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DriverState {
    /// The driver was created but [`HeadsetDriver::init`] did not succeed yet.
    Uninitialized,

    /// [`HeadsetDriver::init`] is running.
    Initializing,

    /// The connection is open and commands are accepted.
    Ready,

    /// The connection was closed, either on request or because it was lost.
    Closed,
}

/// Drives the call control features of a single headset.
///
/// The driver exclusively owns its transport and the state of every feature
/// the device exposes. Only one driver should exist per physical device.
pub struct HeadsetDriver<T: HidTransport> {
    /// The underlying device connection.
    transport: T,

    /// The state shared with the input report handler installed on the
    /// transport.
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,

    /// The emitter used to emit events.
    emitter: EventEmitter<HeadsetEvent>,
}

struct Inner {
    state: DriverState,
    input: ReportTable,
    output: ReportTable,
    store: StateStore,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> DriverState {
        self.lock().state
    }

    fn set_state(&self, state: DriverState) {
        let previous = std::mem::replace(&mut self.lock().state, state);
        if previous != state {
            debug!(?previous, ?state, "driver state changed");
            self.emitter.emit(HeadsetEvent::StateChanged(state));
        }
    }

    fn diagnose(&self, diagnostic: Diagnostic) {
        self.emitter.emit(HeadsetEvent::Diagnostic(diagnostic));
    }

    fn handle_input_report(&self, report_id: u8, payload: &[u8]) {
        let result = {
            let mut inner = self.lock();
            if inner.state != DriverState::Ready {
                return;
            }

            let Inner { input, store, .. } = &mut *inner;
            codec::decode_report(input, report_id, payload, store)
        };

        match result {
            Ok(changes) => {
                for change in changes {
                    trace!(
                        report_id,
                        usage = %change.usage,
                        value = change.value,
                        "decoded input usage"
                    );
                    self.emitter.emit(HeadsetEvent::FeatureChanged(change));
                }
            },
            Err(DecodeError::UnknownReport(_)) => {
                trace!(report_id, "ignoring unsupported input report");
                self.diagnose(Diagnostic::UnsupportedInputReport { report_id });
            },
            Err(DecodeError::LengthMismatch {
                report_id,
                expected,
                actual,
            }) => {
                debug!(
                    report_id,
                    expected, actual, "unexpected payload size, ignoring input report"
                );
                self.diagnose(Diagnostic::MalformedInputReport {
                    report_id,
                    expected,
                    actual,
                });
            },
        }
    }
}

impl Inner {
    fn ensure_ready(&self) -> Result<(), DriverError> {
        if self.state == DriverState::Ready {
            Ok(())
        } else {
            Err(DriverError::NotReady(self.state))
        }
    }
}

impl<T: HidTransport> HeadsetDriver<T> {
    /// Creates a driver for the device behind the transport.
    ///
    /// Nothing is read or opened until [`Self::init`] is called.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: DriverState::Uninitialized,
                    input: ReportTable::new(Direction::Input),
                    output: ReportTable::new(Direction::Output),
                    store: StateStore::new(),
                }),
                emitter: EventEmitter::new(),
            }),
        }
    }

    /// The identity of the underlying device.
    pub fn device_info(&self) -> DeviceInfo {
        self.transport.device_info()
    }

    pub fn state(&self) -> DriverState {
        self.shared.state()
    }

    /// Creates a new listener for receiving driver events.
    pub fn listen(&self) -> flume::Receiver<HeadsetEvent> {
        self.shared.emitter.create_receiver()
    }

    /// The compiled input report descriptors. Empty until [`Self::init`]
    /// succeeds.
    pub fn input_reports(&self) -> ReportTable {
        self.shared.lock().input.clone()
    }

    /// The compiled output report descriptors. Empty until [`Self::init`]
    /// succeeds.
    pub fn output_reports(&self) -> ReportTable {
        self.shared.lock().output.clone()
    }

    /// The last known or requested value of a usage.
    pub fn feature_state(&self, usage: KnownUsage) -> Option<bool> {
        self.shared.lock().store.get(usage)
    }

    /// Compiles the report descriptors of the device and opens the
    /// connection.
    ///
    /// Returns [`DriverError::InvalidState`] unless the driver is
    /// [`DriverState::Uninitialized`]. If the connection cannot be opened,
    /// the driver stays uninitialized and `init` may be retried.
    pub async fn init(&self) -> Result<(), DriverError> {
        {
            let mut inner = self.shared.lock();
            if inner.state != DriverState::Uninitialized {
                return Err(DriverError::InvalidState(inner.state));
            }
            inner.state = DriverState::Initializing;
        }
        self.shared
            .emitter
            .emit(HeadsetEvent::StateChanged(DriverState::Initializing));

        let compiled = descriptor::compile(self.transport.collections());
        debug!(input = ?compiled.input, "compiled input report descriptors");
        debug!(output = ?compiled.output, "compiled output report descriptors");

        for diagnostic in compiled.diagnostics {
            self.shared.diagnose(diagnostic);
        }

        if let Err(err) = self.transport.open().await {
            warn!(error = %err, "could not open the device");
            self.shared.set_state(DriverState::Uninitialized);
            return Err(DriverError::Transport(err));
        }

        if !self.transport.is_open() {
            warn!("open failed");
            self.shared.set_state(DriverState::Uninitialized);
            return Err(DriverError::OpenFailed);
        }

        {
            let mut inner = self.shared.lock();
            inner.input = compiled.input;
            inner.output = compiled.output;
        }

        // Reports are only decoded while ready, so switch first.
        self.shared.set_state(DriverState::Ready);
        self.transport.set_input_report_handler(Some(Box::new({
            let shared = Arc::clone(&self.shared);

            move |report_id, payload| shared.handle_input_report(report_id, payload)
        })));

        Ok(())
    }

    /// Sets the mute indicators.
    pub async fn mute(&self, muted: bool) -> Result<(), DriverError> {
        self.apply(&[
            (KnownUsage::LedMute, muted),
            (KnownUsage::LedMicrophone, muted),
        ])
        .await
    }

    /// Starts or stops ringing. Both the ring indicator and the ringer are
    /// driven, whichever the device has.
    pub async fn ring(&self, ring: bool) -> Result<(), DriverError> {
        self.apply(&[
            (KnownUsage::LedRing, ring),
            (KnownUsage::TelephonyRinger, ring),
        ])
        .await
    }

    /// Stops ringing and takes the headset off hook.
    pub async fn accept_call(&self) -> Result<(), DriverError> {
        self.apply(&[
            (KnownUsage::LedRing, false),
            (KnownUsage::TelephonyRinger, false),
            (KnownUsage::LedOffHook, true),
        ])
        .await
    }

    /// Stops ringing without taking the headset off hook.
    pub async fn decline_call(&self) -> Result<(), DriverError> {
        self.apply(&[
            (KnownUsage::LedRing, false),
            (KnownUsage::TelephonyRinger, false),
        ])
        .await
    }

    /// Puts the headset back on hook and clears all call indicators.
    pub async fn hangup(&self) -> Result<(), DriverError> {
        self.apply(&[
            (KnownUsage::LedOffHook, false),
            (KnownUsage::LedRing, false),
            (KnownUsage::TelephonyRinger, false),
            (KnownUsage::LedMute, false),
            (KnownUsage::LedMicrophone, false),
            (KnownUsage::LedHold, false),
        ])
        .await
    }

    /// Sets the call held indicator.
    pub async fn hold(&self, held: bool) -> Result<(), DriverError> {
        self.apply(&[(KnownUsage::LedHold, held)]).await
    }

    /// Sets the on-line indicator.
    pub async fn online(&self, online: bool) -> Result<(), DriverError> {
        self.apply(&[(KnownUsage::LedOnline, online)]).await
    }

    /// Sets a single usage.
    pub async fn set_feature(&self, usage: KnownUsage, value: bool) -> Result<(), DriverError> {
        self.apply(&[(usage, value)]).await
    }

    /// Reads a feature report from the device.
    pub async fn receive_feature_report(&self, report_id: u8) -> Result<Vec<u8>, DriverError> {
        self.shared.lock().ensure_ready()?;

        Ok(self.transport.receive_feature_report(report_id).await?)
    }

    /// Stores the requested values and sends every output report carrying
    /// any of them, once per report ID.
    ///
    /// Usages that no output report carries are skipped. On a send failure
    /// the stored values are kept, so repeating the command sends the same
    /// payloads.
    async fn apply(&self, changes: &[(KnownUsage, bool)]) -> Result<(), DriverError> {
        let mut not_exposed = Vec::new();

        let reports: Vec<(u8, Vec<u8>)> = {
            let mut inner = self.shared.lock();
            inner.ensure_ready()?;

            let Inner { output, store, .. } = &mut *inner;
            let mut report_ids = BTreeSet::new();

            for &(usage, value) in changes {
                if output.for_usage(usage).is_none() {
                    not_exposed.push(usage);
                    continue;
                }

                store.set(usage, value);
                report_ids.extend(output.all_for_usage(usage).map(ReportDescriptor::report_id));
            }

            report_ids
                .into_iter()
                .filter_map(|report_id| {
                    codec::encode_report(output, report_id, store).map(|payload| (report_id, payload))
                })
                .collect()
        };

        for usage in not_exposed {
            trace!(usage = %usage, "device does not expose usage");
            self.shared.diagnose(Diagnostic::FeatureNotExposed { usage });
        }

        for (report_id, payload) in reports {
            debug!(report_id, ?payload, "sending output report");

            if let Err(err) = self.transport.send_report(report_id, &payload).await {
                warn!(report_id, error = %err, "could not send output report");

                if !self.transport.is_open() {
                    self.shared.set_state(DriverState::Closed);
                }

                return Err(DriverError::Transport(err));
            }
        }

        Ok(())
    }

    /// Closes the connection and discards all feature states.
    ///
    /// Does nothing unless the driver is [`DriverState::Ready`]. Once closed,
    /// the driver cannot be initialized again.
    pub async fn close(&self) -> Result<(), DriverError> {
        if self.shared.state() != DriverState::Ready {
            return Ok(());
        }

        self.transport.set_input_report_handler(None);
        let result = self.transport.close().await;

        self.shared.lock().store.clear();
        self.shared.set_state(DriverState::Closed);

        result.map_err(DriverError::Transport)
    }
}

impl<T: HidTransport> Drop for HeadsetDriver<T> {
    fn drop(&mut self) {
        if self.shared.state() == DriverState::Ready {
            self.transport.set_input_report_handler(None);
        }
    }
}

/// Represents an error returned by a [`HeadsetDriver`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// Indicates that a command was issued before [`HeadsetDriver::init`]
    /// succeeded or after the driver was closed.
    #[error("the driver is not ready (state: {0:?})")]
    NotReady(DriverState),

    /// Indicates that [`HeadsetDriver::init`] was called more than once.
    #[error("the driver cannot be initialized in state {0:?}")]
    InvalidState(DriverState),

    /// Indicates that the transport did not report an open connection after
    /// opening it.
    #[error("the device connection could not be opened")]
    OpenFailed,

    /// Indicates that the transport returned an error.
    #[error("the transport returned an error")]
    Transport(#[from] TransportError),
}
