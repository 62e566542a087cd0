//! Call control for USB telephony headsets over generic HID.
//!
//! Headsets meant for softphones (Jabra, Poly, EPOS and many others) expose a
//! small set of standardized HID usages: the hook switch and mute button as
//! input, the ring, off-hook, mute and hold indicators as output. Where these
//! usages live differs from device to device, so every report has to be
//! located by parsing the device's report descriptor.
//!
//! This crate compiles the collection tree of a device into per-report bit
//! maps, keeps the last known state of every recognized usage and translates
//! call control commands into output reports. Incoming input reports are
//! decoded and published as events.
//!
//! # Quickstart
//!
//! ## Establish HID communication
//!
//! This crate does not talk to HID devices by itself. The trait used for
//! bridging your HID implementation to this crate is
//! [`transport::HidTransport`], so make sure to provide an implementation
//! for it. The trait defines async methods using [`mod@async_trait`], which
//! is re-exported for annotating your implementing type.
//!
//! The `hidtelctl` binary in this repository ships an implementation based on
//! [`async-hid`](https://crates.io/crates/async-hid).
//!
//! ## Drive the headset
//!
//! ```ignore
//! use hidtel::{driver::HeadsetDriver, event::HeadsetEvent, usage::KnownUsage};
//!
//! let driver = HeadsetDriver::new(my_transport);
//!
//! // Compiles the report descriptors and opens the device.
//! driver.init().await.expect("could not initialize headset");
//!
//! // Events are delivered through flume channels.
//! tokio::spawn({
//!     let rx = driver.listen();
//!
//!     async move {
//!         while let Ok(event) = rx.recv_async().await {
//!             if let HeadsetEvent::FeatureChanged(change) = event
//!                 && change.usage == KnownUsage::TelephonyHookSwitch
//!             {
//!                 println!("hook switch: {}", change.value);
//!             }
//!         }
//!     }
//! });
//!
//! // Incoming call. Devices with both a ring indicator and a ringer get both.
//! driver.ring(true).await.expect("could not ring");
//!
//! // The user picked up.
//! driver.accept_call().await.expect("could not accept call");
//! driver.mute(true).await.expect("could not mute");
//!
//! driver.hangup().await.expect("could not hang up");
//! driver.close().await.expect("could not close headset");
//! ```

pub use async_trait::async_trait;

pub mod codec;
pub mod collection;
pub mod descriptor;
pub mod driver;
pub mod event;
pub mod state;
pub mod transport;
pub mod usage;
