//! Events published by a headset driver.

use std::sync::{Mutex, PoisonError};

use crate::usage::{Direction, KnownUsage};

/// A simple event emitter sending a single event to multiple MPSC channels.
#[derive(Debug)]
pub struct EventEmitter<T: Clone> {
    senders: Mutex<Vec<flume::Sender<T>>>,
}

impl<T: Clone> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Creates a new receiver and adds the corresponding sender to the sender
    /// list.
    pub fn create_receiver(&self) -> flume::Receiver<T> {
        let (tx, rx) = flume::unbounded();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Emits an event to all senders. Senders whose receivers were dropped are
    /// removed from the list.
    pub fn emit(&self, event: T) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// The amount of currently attached receivers.
    pub fn receiver_count(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Represents an event emitted by a [`HeadsetDriver`](crate::driver::HeadsetDriver).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum HeadsetEvent {
    /// Is emitted for every usage carried by an accepted input report.
    FeatureChanged(FeatureChange),

    /// Is emitted whenever the driver moves to another lifecycle state.
    StateChanged(crate::driver::DriverState),

    /// Is emitted whenever something was skipped or ignored. None of these
    /// are errors.
    Diagnostic(Diagnostic),
}

/// Represents the data of the [`HeadsetEvent::FeatureChanged`] event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureChange {
    /// The input report the value was read from.
    pub report_id: u8,

    pub usage: KnownUsage,

    /// The value stored before the report arrived, [`None`] if the usage was
    /// never observed.
    pub previous: Option<bool>,

    pub value: bool,
}

impl FeatureChange {
    /// Whether the value differs from the previously known one.
    pub fn is_transition(&self) -> bool {
        self.previous != Some(self.value)
    }
}

/// Describes device data or commands that were tolerated rather than
/// rejected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum Diagnostic {
    /// A collection with a usage page that cannot carry headset controls was
    /// not read.
    UnrecognizedCollection { usage_page: u16 },

    /// A report without items or without any bits was skipped.
    DegenerateReport { direction: Direction, report_id: u8 },

    /// A report whose width is not a whole number of bytes was skipped.
    UnalignedReport {
        direction: Direction,
        report_id: u8,
        bits: usize,
    },

    /// A report item with usages that are not single bit booleans was not
    /// mapped.
    SkippedItem {
        direction: Direction,
        report_id: u8,
        bit_offset: usize,
        report_size: u32,
        report_count: u32,
    },

    /// A report without any known usage was dropped.
    DiscardedReport { direction: Direction, report_id: u8 },

    /// A report ID was declared more than once for the same direction. The
    /// first declaration is kept.
    DuplicateReport { direction: Direction, report_id: u8 },

    /// An input report with an ID that carries no known usage arrived.
    UnsupportedInputReport { report_id: u8 },

    /// An input report did not match the expected length and was dropped.
    MalformedInputReport {
        report_id: u8,
        expected: usize,
        actual: usize,
    },

    /// A command touched a usage no output report of the device carries.
    FeatureNotExposed { usage: KnownUsage },
}
