//! Maintains the registry of HID usages relevant to telephony headsets.
//!
//! A HID usage is a pair of two 16 bit values packed into 32 bits: the usage
//! page (LED, Telephony, ...) occupies the upper half and the usage code
//! within that page (Mute, Hook Switch, ...) the lower half. Report
//! descriptors encode extended usages this way, so the packing has to be
//! exact.
//!
//! Values are taken from the [HID Usage Tables](https://www.usb.org/document-library/hid-usage-tables-112).

use std::{collections::HashMap, fmt};

use lazy_static::lazy_static;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Represents a 32 bit HID usage consisting of a usage page and a usage code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Usage(u32);

impl Usage {
    /// Packs a usage page and a usage code into a single usage.
    pub const fn from_page_and_code(page: u16, code: u16) -> Self {
        Self(((page as u32) << 16) | code as u32)
    }

    /// The usage page stored in the upper 16 bits.
    pub const fn page(self) -> u16 {
        ((self.0 & 0xffff_0000) >> 16) as u16
    }

    /// The usage code stored in the lower 16 bits.
    pub const fn code(self) -> u16 {
        (self.0 & 0x0000_ffff) as u16
    }

    /// Looks up the usage in the registry.
    ///
    /// Returns [`None`] if the usage is not one of the [`KnownUsage`]s.
    pub fn known(self) -> Option<KnownUsage> {
        lookup(self)
    }
}

impl From<u32> for Usage {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Usage> for u32 {
    fn from(value: Usage) -> Self {
        value.0
    }
}

impl fmt::Debug for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Usage({:#06x}:{:#06x})", self.page(), self.code())
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{:#06x}", self.page(), self.code())
    }
}

/// Represents the usage pages whose collections may carry headset controls.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u16)]
pub enum UsagePage {
    Led = 0x08,
    Telephony = 0x0b,
    Consumer = 0x0c,
}

/// The direction a report travels in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Direction {
    /// Sent from the device to the host.
    Input,

    /// Sent from the host to the device.
    Output,
}

/// Represents a usage this crate knows how to handle.
///
/// The discriminant of every variant is its packed [`Usage`] value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u32)]
pub enum KnownUsage {
    /// Sets the microphone mute indicator.
    LedMute = 0x0008_0009,

    /// Sets the hook state indicator.
    LedOffHook = 0x0008_0017,

    /// Sets the ring indicator.
    LedRing = 0x0008_0018,

    /// Sets the call held indicator.
    LedHold = 0x0008_0020,

    /// Sets the microphone indicator. Devices use it to show the mute state.
    LedMicrophone = 0x0008_0021,

    LedOnline = 0x0008_002a,

    /// Starts or stops the device ringer.
    TelephonyRinger = 0x000b_009e,

    /// Reported when the answer/end button is pressed.
    TelephonyHookSwitch = 0x000b_0020,

    /// Reported to swap between an active call and a call on hold.
    TelephonyFlash = 0x000b_0021,

    /// Reported to redial the last number.
    TelephonyRedial = 0x000b_0024,

    /// Reported when the mute button is pressed.
    TelephonyMute = 0x000b_002f,

    /// Reported while the user has a call on one of the telephony interfaces.
    TelephonyLineBusy = 0x000b_0097,
}

impl KnownUsage {
    /// All known usages, output usages first.
    pub const ALL: [KnownUsage; 12] = [
        Self::LedMute,
        Self::LedOffHook,
        Self::LedRing,
        Self::LedHold,
        Self::LedMicrophone,
        Self::LedOnline,
        Self::TelephonyRinger,
        Self::TelephonyHookSwitch,
        Self::TelephonyFlash,
        Self::TelephonyRedial,
        Self::TelephonyMute,
        Self::TelephonyLineBusy,
    ];

    /// The packed usage value.
    pub fn usage(self) -> Usage {
        Usage(self.into())
    }

    /// The direction the usage is exchanged in.
    pub fn direction(self) -> Direction {
        match self {
            Self::LedMute
            | Self::LedOffHook
            | Self::LedRing
            | Self::LedHold
            | Self::LedMicrophone
            | Self::LedOnline
            | Self::TelephonyRinger => Direction::Output,
            Self::TelephonyHookSwitch
            | Self::TelephonyFlash
            | Self::TelephonyRedial
            | Self::TelephonyMute
            | Self::TelephonyLineBusy => Direction::Input,
        }
    }

    /// A human readable name, mostly following the HID usage tables.
    pub fn name(self) -> &'static str {
        match self {
            Self::LedMute => "LED Mute",
            Self::LedOffHook => "LED Off-Hook",
            Self::LedRing => "LED Ring",
            Self::LedHold => "LED Hold",
            Self::LedMicrophone => "LED Microphone",
            Self::LedOnline => "LED On-Line",
            Self::TelephonyRinger => "Telephony Ringer",
            Self::TelephonyHookSwitch => "Telephony Hook Switch",
            Self::TelephonyFlash => "Telephony Flash",
            Self::TelephonyRedial => "Telephony Redial",
            Self::TelephonyMute => "Telephony Phone Mute",
            Self::TelephonyLineBusy => "Telephony Line Busy",
        }
    }
}

impl From<KnownUsage> for Usage {
    fn from(value: KnownUsage) -> Self {
        value.usage()
    }
}

impl fmt::Display for KnownUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

lazy_static! {
    static ref KNOWN_USAGES: HashMap<Usage, KnownUsage> = KnownUsage::ALL
        .iter()
        .map(|&known| (known.usage(), known))
        .collect();
}

/// Looks up a usage in the registry.
pub fn lookup(usage: Usage) -> Option<KnownUsage> {
    KNOWN_USAGES.get(&usage).copied()
}

/// Checks whether a usage page may contain headset controls.
pub fn is_known_page(page: u16) -> bool {
    UsagePage::try_from(page).is_ok()
}
