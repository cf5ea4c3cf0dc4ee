//! Display rules for wallet transactions.

/// Confirmation counts above this are shown as `20+`.
pub const MAX_TRANSACTION_CONFIRMATIONS: u64 = 20;

/// Ledger state of a transaction as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransactionState {
    /// Submitted, not yet in a block.
    Pending,
    /// In the ledger.
    Ok,
    /// Rejected or expired.
    Failed,
}

impl TransactionState {
    /// State to display: an in-ledger transaction with no confirmations
    /// yet is still shown as pending.
    pub const fn displayed(self, confirmations: u64) -> Self {
        match self {
            Self::Ok if confirmations == 0 => Self::Pending,
            other => other,
        }
    }
}

/// How strictly confirmations are counted before a transaction is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssuranceMode {
    /// Default thresholds.
    #[default]
    Normal,
    /// Higher thresholds for cautious users.
    Strict,
}

impl AssuranceMode {
    /// Confirmations needed to leave `(Low, Medium)`.
    pub const fn thresholds(self) -> (u64, u64) {
        match self {
            Self::Normal => (3, 9),
            Self::Strict => (5, 15),
        }
    }
}

/// Confidence that a transaction is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum AssuranceLevel {
    /// Fewer confirmations than the low threshold.
    Low,
    /// Between the low and medium thresholds.
    Medium,
    /// At or above the medium threshold.
    High,
}

impl AssuranceLevel {
    /// Level reached by `confirmations` under `mode`.
    pub const fn of(confirmations: u64, mode: AssuranceMode) -> Self {
        let (low, medium) = mode.thresholds();
        if confirmations < low {
            Self::Low
        } else if confirmations < medium {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Formats a confirmation count, capped at [`MAX_TRANSACTION_CONFIRMATIONS`].
pub fn display_confirmations(confirmations: u64) -> String {
    if confirmations > MAX_TRANSACTION_CONFIRMATIONS {
        format!("{MAX_TRANSACTION_CONFIRMATIONS}+")
    } else {
        confirmations.to_string()
    }
}
