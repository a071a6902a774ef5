//! The status machine shared by bookings, land leases, deliveries and purchase requests
//!
//! Every reservation-like record starts `Pending`. The resource owner moves it
//! forward (approve, reject, dispatch, complete); the requester may only
//! cancel. Rejected, cancelled and completed reservations are final.
//!
//! ```text
//!            approve            dispatch (delivery)         complete
//! Pending ----------> Approved -------------------> InTransit ------> Completed
//!    |                  |  \___________________________________________^
//!    | reject           | cancel              complete (booking, lease)
//!    v                  v
//! Rejected          Cancelled  <---- cancel (from Pending as well)
//! ```
use crate::error::{MarketError, MarketResult};
use crate::types::TimeStamp;

/// States counted by conflict and exclusivity checks.
pub const ACTIVE_STATUSES: [ReservationStatus; 2] =
    [ReservationStatus::Pending, ReservationStatus::Approved];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum ReservationStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    InTransit,
    #[n(3)]
    Rejected,
    #[n(4)]
    Cancelled,
    #[n(5)]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum Transition {
    #[n(0)]
    Approve,
    #[n(1)]
    Reject,
    #[n(2)]
    Cancel,
    #[n(3)]
    Dispatch,
    #[n(4)]
    Complete,
}

/// Which family of reservation is moving; each has its own transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Booking,
    Lease,
    Delivery,
    Purchase,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }
    pub fn is_active(&self) -> bool {
        ACTIVE_STATUSES.contains(self)
    }

    /// Apply `transition` under the table for `flow`.
    pub fn apply(self, flow: Flow, transition: Transition) -> MarketResult<ReservationStatus> {
        use ReservationStatus::*;
        use Transition::*;

        let next = match (flow, self, transition) {
            (_, Pending, Approve) => Some(Approved),
            (_, Pending, Reject) => Some(Rejected),
            (_, Pending, Cancel) => Some(Cancelled),

            (Flow::Booking | Flow::Lease, Approved, Cancel) => Some(Cancelled),
            (Flow::Booking | Flow::Lease, Approved, Complete) => Some(Completed),

            (Flow::Delivery, Approved, Cancel) => Some(Cancelled),
            (Flow::Delivery, Approved, Dispatch) => Some(InTransit),
            (Flow::Delivery, InTransit, Complete) => Some(Completed),

            _ => None,
        };

        next.ok_or(MarketError::InvalidTransition {
            from: self,
            transition,
        })
    }
}

impl Transition {
    /// Whether the transition belongs to the resource owner rather than the requester.
    pub fn is_owner_action(&self) -> bool {
        !matches!(self, Transition::Cancel)
    }
}

/// The two users a reservation is between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parties<'a> {
    pub owner_id: &'a str,
    pub requester_id: &'a str,
}

impl<'a> Parties<'a> {
    pub fn new(owner_id: &'a str, requester_id: &'a str) -> Self {
        Self {
            owner_id,
            requester_id,
        }
    }

    pub fn authorize(&self, actor: &str, transition: Transition) -> MarketResult<()> {
        if transition.is_owner_action() {
            if actor != self.owner_id {
                return Err(MarketError::Forbidden(format!(
                    "only the resource owner may {transition:?} this reservation"
                )));
            }
        } else if actor != self.requester_id {
            return Err(MarketError::Forbidden(format!(
                "only the requester may {transition:?} this reservation"
            )));
        }
        Ok(())
    }
}

/// One committed step in a reservation's life, kept as an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct StatusChange {
    #[n(0)]
    pub actor: String,
    #[n(1)]
    pub at: TimeStamp,
    #[n(2)]
    pub transition: Transition,
    #[n(3)]
    pub from: ReservationStatus,
    #[n(4)]
    pub to: ReservationStatus,
}

/// Authorize `actor`, apply the transition to `status` and append the change to `history`.
///
/// Nothing is mutated when either check fails.
pub fn advance(
    flow: Flow,
    parties: &Parties<'_>,
    actor: &str,
    transition: Transition,
    status: &mut ReservationStatus,
    history: &mut Vec<StatusChange>,
) -> MarketResult<StatusChange> {
    parties.authorize(actor, transition)?;
    let next = status.apply(flow, transition)?;

    let change = StatusChange {
        actor: actor.to_string(),
        at: TimeStamp::now(),
        transition,
        from: *status,
        to: next,
    };
    *status = next;
    history.push(change.clone());

    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReservationStatus::*;
    use Transition::*;

    const ALL_STATUSES: [ReservationStatus; 6] =
        [Pending, Approved, InTransit, Rejected, Cancelled, Completed];
    const ALL_TRANSITIONS: [Transition; 5] = [Approve, Reject, Cancel, Dispatch, Complete];
    const ALL_FLOWS: [Flow; 4] = [Flow::Booking, Flow::Lease, Flow::Delivery, Flow::Purchase];

    #[test]
    fn pending_moves_to_decisions() {
        for flow in ALL_FLOWS {
            assert_eq!(Pending.apply(flow, Approve).unwrap(), Approved);
            assert_eq!(Pending.apply(flow, Reject).unwrap(), Rejected);
            assert_eq!(Pending.apply(flow, Cancel).unwrap(), Cancelled);
        }
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for flow in ALL_FLOWS {
            for status in [Rejected, Cancelled, Completed] {
                for transition in ALL_TRANSITIONS {
                    let err = status.apply(flow, transition).unwrap_err();
                    assert!(err.is_invalid_transition(), "{flow:?} {status:?} {transition:?}");
                }
            }
        }
    }

    #[test]
    fn only_deliveries_pass_through_transit() {
        assert_eq!(Approved.apply(Flow::Delivery, Dispatch).unwrap(), InTransit);
        assert!(Approved.apply(Flow::Delivery, Complete).is_err());
        assert_eq!(InTransit.apply(Flow::Delivery, Complete).unwrap(), Completed);
        assert!(InTransit.apply(Flow::Delivery, Cancel).is_err());

        assert!(Approved.apply(Flow::Booking, Dispatch).is_err());
        assert_eq!(Approved.apply(Flow::Booking, Complete).unwrap(), Completed);
        assert_eq!(Approved.apply(Flow::Lease, Complete).unwrap(), Completed);
    }

    #[test]
    fn accepted_purchases_are_settled() {
        for transition in ALL_TRANSITIONS {
            assert!(Approved.apply(Flow::Purchase, transition).is_err());
        }
    }

    #[test]
    fn active_set_is_pending_and_approved() {
        let active: Vec<_> = ALL_STATUSES.into_iter().filter(|s| s.is_active()).collect();
        assert_eq!(active, vec![Pending, Approved]);
    }

    #[test]
    fn owner_and_requester_have_separate_powers() {
        let parties = Parties::new("owner", "renter");

        assert!(parties.authorize("owner", Approve).is_ok());
        assert!(parties.authorize("renter", Approve).unwrap_err().is_forbidden());
        assert!(parties.authorize("renter", Cancel).is_ok());
        assert!(parties.authorize("owner", Cancel).unwrap_err().is_forbidden());
        assert!(parties.authorize("stranger", Reject).unwrap_err().is_forbidden());
    }

    #[test]
    fn advance_leaves_state_untouched_on_failure() {
        let parties = Parties::new("owner", "renter");
        let mut status = Pending;
        let mut history = vec![];

        let err = advance(
            Flow::Booking,
            &parties,
            "renter",
            Approve,
            &mut status,
            &mut history,
        )
        .unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(status, Pending);
        assert!(history.is_empty());

        advance(Flow::Booking, &parties, "owner", Reject, &mut status, &mut history).unwrap();
        let err = advance(Flow::Booking, &parties, "owner", Reject, &mut status, &mut history)
            .unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(status, Rejected);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, Pending);
        assert_eq!(history[0].to, Rejected);
    }

    #[test]
    fn status_change_encoding() {
        let change = StatusChange {
            actor: "user_1".into(),
            at: TimeStamp::now(),
            transition: Dispatch,
            from: Approved,
            to: InTransit,
        };

        let encoded = minicbor::to_vec(&change).unwrap();
        let decoded: StatusChange = minicbor::decode(&encoded).unwrap();
        assert_eq!(change, decoded);
    }
}
