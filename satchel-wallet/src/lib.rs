//! Network timing and display rules for the satchel wallet renderer.
//!
//! Static configuration lives here as `const` items: per-network epoch
//! layout, the tolerated clock offset, and transaction display thresholds.

pub mod epochs;
pub mod timing;
pub mod transactions;

pub use epochs::{EpochParams, Network, SlotPosition, UnknownNetwork};
pub use timing::{ALLOWED_TIME_DIFFERENCE, ClockStatus, duration_language, humanize_offset};
pub use transactions::{
    AssuranceLevel, AssuranceMode, MAX_TRANSACTION_CONFIRMATIONS, TransactionState,
    display_confirmations,
};
