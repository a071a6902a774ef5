//! Property-based tests for the booking overlap rule, the status machine and funding totals
//!
//! These use proptest to check invariants that must hold for every input,
//! not only the hand-picked cases in the scenario tests.

use farm_market::booking::overlaps;
use farm_market::funding::{CrowdfundingProject, ProjectStatus};
use farm_market::status::{Flow, ReservationStatus, Transition};
use farm_market::types::{Money, TimeStamp};
use proptest::prelude::*;

// PROPERTY TEST STRATEGIES

/// A half-open range of days within one summer, start strictly before end
fn range_strategy() -> impl Strategy<Value = (TimeStamp, TimeStamp)> {
    (0i64..60, 1i64..15).prop_map(|(offset, length)| {
        let base = TimeStamp::new_with(2025, 6, 1, 0, 0, 0).unwrap();
        (base.plus_days(offset), base.plus_days(offset + length))
    })
}

fn status_strategy() -> impl Strategy<Value = ReservationStatus> {
    prop_oneof![
        Just(ReservationStatus::Pending),
        Just(ReservationStatus::Approved),
        Just(ReservationStatus::InTransit),
        Just(ReservationStatus::Rejected),
        Just(ReservationStatus::Cancelled),
        Just(ReservationStatus::Completed),
    ]
}

fn transition_strategy() -> impl Strategy<Value = Transition> {
    prop_oneof![
        Just(Transition::Approve),
        Just(Transition::Reject),
        Just(Transition::Cancel),
        Just(Transition::Dispatch),
        Just(Transition::Complete),
    ]
}

fn flow_strategy() -> impl Strategy<Value = Flow> {
    prop_oneof![
        Just(Flow::Booking),
        Just(Flow::Lease),
        Just(Flow::Delivery),
        Just(Flow::Purchase),
    ]
}

fn project(target: i64, minimum: i64) -> CrowdfundingProject {
    CrowdfundingProject {
        id: "project_prop".into(),
        owner_id: "farmer".into(),
        title: "Well".into(),
        target: Money::from_major(target),
        raised: Money::ZERO,
        minimum_contribution: Money::from_major(minimum),
        status: ProjectStatus::Active,
        created_at: TimeStamp::now(),
    }
}

proptest! {
    #[test]
    fn overlap_is_symmetric(a in range_strategy(), b in range_strategy()) {
        prop_assert_eq!(overlaps(a.0, a.1, b.0, b.1), overlaps(b.0, b.1, a.0, a.1));
    }

    #[test]
    fn a_range_overlaps_itself_but_not_its_neighbour(a in range_strategy(), gap in 0i64..5) {
        prop_assert!(overlaps(a.0, a.1, a.0, a.1));

        let next_start = a.1.plus_days(gap);
        prop_assert!(!overlaps(a.0, a.1, next_start, next_start.plus_days(1)));
    }

    #[test]
    fn final_states_accept_no_transition(
        status in status_strategy(),
        flow in flow_strategy(),
        transition in transition_strategy(),
    ) {
        if status.is_terminal() {
            prop_assert!(status.apply(flow, transition).unwrap_err().is_invalid_transition());
        }
    }

    #[test]
    fn pending_always_resolves_to_an_owner_or_requester_decision(
        flow in flow_strategy(),
        transition in transition_strategy(),
    ) {
        let next = ReservationStatus::Pending.apply(flow, transition);
        match transition {
            Transition::Approve => prop_assert_eq!(next.unwrap(), ReservationStatus::Approved),
            Transition::Reject => prop_assert_eq!(next.unwrap(), ReservationStatus::Rejected),
            Transition::Cancel => prop_assert_eq!(next.unwrap(), ReservationStatus::Cancelled),
            Transition::Dispatch | Transition::Complete => prop_assert!(next.is_err()),
        }
    }

    #[test]
    fn raised_never_exceeds_target(
        target in 100i64..10_000,
        pledges in prop::collection::vec(1i64..3_000, 1..30),
    ) {
        let mut p = project(target, 1);
        let mut accepted = Money::ZERO;

        for pledge in pledges {
            let before = p.raised;
            match p.record_contribution(Money::from_major(pledge)) {
                Ok(()) => {
                    accepted = accepted.checked_add(Money::from_major(pledge)).unwrap();
                    prop_assert!(p.raised > before);
                }
                Err(_) => prop_assert_eq!(p.raised, before),
            }
            prop_assert!(p.raised <= p.target);
        }

        prop_assert_eq!(p.raised, accepted);
        prop_assert_eq!(p.status == ProjectStatus::Funded, p.raised == p.target);
    }
}
