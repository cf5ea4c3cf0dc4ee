//! Epoch and slot timing for each network.

use std::fmt;
use std::str::FromStr;

/// Networks the wallet can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Pre-release staging network.
    Staging,
    /// Public test network.
    Testnet,
    /// Local development cluster.
    Development,
}

impl Network {
    /// All networks, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Mainnet,
        Self::Staging,
        Self::Testnet,
        Self::Development,
    ];

    /// Returns the network's lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Staging => "staging",
            Self::Testnet => "testnet",
            Self::Development => "development",
        }
    }

    /// Timing parameters for this network.
    pub const fn epochs(self) -> EpochParams {
        match self {
            Self::Mainnet => EpochParams {
                start_time: 1_506_203_091,
                slot_duration: 20,
                epoch_length_base: 2160,
            },
            Self::Staging => EpochParams {
                start_time: 1_506_450_213,
                slot_duration: 20,
                epoch_length_base: 2160,
            },
            Self::Testnet => EpochParams {
                start_time: 1_537_941_600,
                slot_duration: 20,
                epoch_length_base: 2160,
            },
            Self::Development => EpochParams {
                start_time: 1_541_808_003,
                slot_duration: 7,
                epoch_length_base: 2,
            },
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown network name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownNetwork(s.to_owned()))
    }
}

/// Genesis time and slot layout of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochParams {
    /// Start of slot 0 of epoch 0, in Unix seconds.
    pub start_time: u64,
    /// Length of one slot in seconds.
    pub slot_duration: u64,
    /// Security parameter `k`; an epoch spans `10 * k` slots.
    pub epoch_length_base: u64,
}

/// Where a moment falls on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPosition {
    /// Epoch number.
    pub epoch: u64,
    /// Slot within the epoch.
    pub slot: u64,
}

impl EpochParams {
    /// Slots per epoch, saturating at `u64::MAX`.
    pub const fn slots_per_epoch(&self) -> u64 {
        self.epoch_length_base.saturating_mul(10)
    }

    /// Seconds per epoch, saturating at `u64::MAX`.
    pub const fn epoch_duration(&self) -> u64 {
        self.slots_per_epoch().saturating_mul(self.slot_duration)
    }

    /// Locates `unix_secs`.
    ///
    /// Returns `None` if it precedes the network start, or if the layout
    /// has zero-length slots or epochs.
    pub const fn position(&self, unix_secs: u64) -> Option<SlotPosition> {
        let slots = self.slots_per_epoch();
        if unix_secs < self.start_time || self.slot_duration == 0 || slots == 0 {
            return None;
        }
        let absolute = (unix_secs - self.start_time) / self.slot_duration;
        Some(SlotPosition {
            epoch: absolute / slots,
            slot: absolute % slots,
        })
    }

    /// Unix time at which `epoch` begins, or `None` past `u64::MAX`.
    pub const fn epoch_start(&self, epoch: u64) -> Option<u64> {
        match epoch.checked_mul(self.epoch_duration()) {
            Some(offset) => self.start_time.checked_add(offset),
            None => None,
        }
    }
}
