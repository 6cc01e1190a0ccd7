use crate::models::shipment::ShipmentStatus;

use ShipmentStatus::*;

/// Every permitted courier-driven status change.
const TRANSITIONS: &[(ShipmentStatus, ShipmentStatus)] = &[
    (ReadyForPickup, OutForDelivery),
    (OutForDelivery, Delivered),
    (OutForDelivery, FailedAttempt),
    (FailedAttempt, OutForDelivery),
    (FailedAttempt, ReturnedToSender),
    (ReadyForPickup, Lost),
    (ReadyForPickup, Damaged),
    (OutForDelivery, Lost),
    (OutForDelivery, Damaged),
    (FailedAttempt, Lost),
    (FailedAttempt, Damaged),
];

/// Status every newly stored shipment starts in.
pub const INITIAL: ShipmentStatus = ReadyForPickup;

pub fn can_transition(from: ShipmentStatus, to: ShipmentStatus) -> bool {
    TRANSITIONS.contains(&(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        assert!(can_transition(ReadyForPickup, OutForDelivery));
        assert!(can_transition(OutForDelivery, Delivered));
    }

    #[test]
    fn failed_attempt_can_retry_or_return() {
        assert!(can_transition(OutForDelivery, FailedAttempt));
        assert!(can_transition(FailedAttempt, OutForDelivery));
        assert!(can_transition(FailedAttempt, ReturnedToSender));
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for terminal in [Delivered, ReturnedToSender, Lost, Damaged] {
            for to in ShipmentStatus::ALL {
                assert!(!can_transition(terminal, to), "{terminal} -> {to}");
            }
        }
        assert!(ShipmentStatus::ALL
            .into_iter()
            .any(|to| can_transition(INITIAL, to)));
    }

    #[test]
    fn skipping_and_self_transitions_are_rejected() {
        assert!(!can_transition(ReadyForPickup, Delivered));
        assert!(!can_transition(ReadyForPickup, FailedAttempt));
        assert!(!can_transition(OutForDelivery, ReturnedToSender));
        for status in ShipmentStatus::ALL {
            assert!(!can_transition(status, status));
        }
    }

    #[test]
    fn exceptional_outcomes_reachable_from_every_active_state() {
        for from in [ReadyForPickup, OutForDelivery, FailedAttempt] {
            assert!(can_transition(from, Lost), "{from} -> lost");
            assert!(can_transition(from, Damaged), "{from} -> damaged");
        }
    }
}
