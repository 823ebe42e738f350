use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order fulfilment status.
///
/// The only legal forward path is
/// `pending -> processing -> shipped -> delivered`; `cancelled` is
/// reachable from any non-terminal state. `delivered` and `cancelled`
/// are terminal. Status is only ever mutated through the order
/// manager's transition operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Outcome of validating a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// The target is the next legal state; persist it.
    Apply,
    /// Target equals the current state; succeed without writing.
    Noop,
    /// Backward, skip-forward, or out-of-terminal move; reject.
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The single legal forward successor, if any.
    fn successor(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// Validates a requested transition from `self` to `target`.
    ///
    /// ```
    /// use cm_core::{OrderStatus, TransitionCheck};
    ///
    /// let s = OrderStatus::Processing;
    /// assert_eq!(s.check_transition(OrderStatus::Shipped), TransitionCheck::Apply);
    /// assert_eq!(s.check_transition(OrderStatus::Processing), TransitionCheck::Noop);
    /// assert_eq!(s.check_transition(OrderStatus::Pending), TransitionCheck::Rejected);
    /// ```
    pub fn check_transition(&self, target: OrderStatus) -> TransitionCheck {
        if *self == target {
            return TransitionCheck::Noop;
        }
        if target == OrderStatus::Cancelled {
            return if self.is_terminal() {
                TransitionCheck::Rejected
            } else {
                TransitionCheck::Apply
            };
        }
        if self.successor() == Some(target) {
            TransitionCheck::Apply
        } else {
            TransitionCheck::Rejected
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;
    use TransitionCheck::*;

    const ALL: [OrderStatus; 5] = [Pending, Processing, Shipped, Delivered, Cancelled];

    #[test]
    fn forward_chain_is_the_only_advance() {
        assert_eq!(Pending.check_transition(Processing), Apply);
        assert_eq!(Processing.check_transition(Shipped), Apply);
        assert_eq!(Shipped.check_transition(Delivered), Apply);
    }

    #[test]
    fn skip_forward_and_backward_are_rejected() {
        assert_eq!(Pending.check_transition(Shipped), Rejected);
        assert_eq!(Pending.check_transition(Delivered), Rejected);
        assert_eq!(Delivered.check_transition(Processing), Rejected);
        assert_eq!(Shipped.check_transition(Pending), Rejected);
    }

    #[test]
    fn cancel_allowed_only_from_non_terminal() {
        assert_eq!(Pending.check_transition(Cancelled), Apply);
        assert_eq!(Processing.check_transition(Cancelled), Apply);
        assert_eq!(Shipped.check_transition(Cancelled), Apply);
        assert_eq!(Delivered.check_transition(Cancelled), Rejected);
    }

    #[test]
    fn same_state_is_a_noop_everywhere() {
        for status in ALL {
            assert_eq!(status.check_transition(status), Noop);
        }
    }

    #[test]
    fn terminal_states_accept_nothing_new() {
        for status in [Delivered, Cancelled] {
            for target in ALL {
                if target != status {
                    assert_eq!(status.check_transition(target), Rejected);
                }
            }
        }
    }

    #[test]
    fn parses_lowercase_names() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), Shipped);
        assert!("unknown".parse::<OrderStatus>().is_err());
    }
}
