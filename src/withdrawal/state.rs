//! Withdrawal FSM State Definitions
//!
//! States are persisted as lowercase TEXT in the `withdrawals.status` column.

use std::fmt;
use std::str::FromStr;

/// Withdrawal FSM States
///
/// ```text
/// PENDING ──▶ APPROVED ──▶ COMPLETED
///    │            │
///    │ operator   │ transfer failed
///    ▼            │
/// REJECTED ◀──────┘
/// ```
///
/// Terminal states: COMPLETED, REJECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WithdrawalStatus {
    /// Initial state - amount already deducted from the store's balances
    Pending,

    /// Picked up for payout; the bank transfer may be in flight
    Approved,

    /// Terminal: deduction refunded
    Rejected,

    /// Terminal: provider accepted the transfer
    Completed,
}

impl WithdrawalStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Rejected | WithdrawalStatus::Completed)
    }

    /// Whether the FSM allows moving from `self` to `next`.
    ///
    /// `Approved -> Rejected` is reserved for the settlement orchestrator
    /// after a failed bank transfer; operators may only reject `Pending`.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Completed) | (Approved, Rejected)
        )
    }

    /// Whether the deducted amount still counts against the store.
    ///
    /// Only a rejection gives the funds back.
    #[inline]
    pub fn holds_funds(&self) -> bool {
        !matches!(self, WithdrawalStatus::Rejected)
    }

    /// Get the storage / API name
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            "completed" => Ok(WithdrawalStatus::Completed),
            other => Err(format!("unknown withdrawal status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WithdrawalStatus::*;

    const ALL: [WithdrawalStatus; 4] = [Pending, Approved, Rejected, Completed];

    #[test]
    fn test_terminal_states() {
        assert!(Rejected.is_terminal());
        assert!(Completed.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Approved.is_terminal());
    }

    #[test]
    fn test_transition_table() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));
        assert!(Approved.can_transition_to(Rejected));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_no_exit_from_terminal() {
        for from in [Rejected, Completed] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_str_roundtrip() {
        for state in ALL {
            assert_eq!(state.as_str().parse::<WithdrawalStatus>(), Ok(state));
        }
        assert!("processing".parse::<WithdrawalStatus>().is_err());
    }

    #[test]
    fn test_holds_funds() {
        assert!(Pending.holds_funds());
        assert!(Approved.holds_funds());
        assert!(Completed.holds_funds());
        assert!(!Rejected.holds_funds());
    }
}
