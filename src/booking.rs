//! Equipment rental: the rentable unit, its bookings and the overlap check
use crate::error::{MarketError, MarketResult};
use crate::status::{ReservationStatus, StatusChange};
use crate::store::Record;
use crate::types::{Money, TimeStamp};

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Equipment {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub owner_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub kind: Option<String>, // tractor, harvester, sprayer ...
    #[n(4)]
    pub price_per_day: Money,
    #[n(5)]
    pub listed: bool, // unlisted equipment takes no new bookings
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Booking {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub equipment_id: String,
    #[n(2)]
    pub owner_id: String, // copied from the equipment at request time
    #[n(3)]
    pub requester_id: String,
    #[n(4)]
    pub start: TimeStamp,
    #[n(5)]
    pub end: TimeStamp,
    #[n(6)]
    pub status: ReservationStatus,
    #[n(7)]
    pub requested_at: TimeStamp,
    #[n(8)]
    pub history: Vec<StatusChange>,
}

impl Record for Equipment {
    const KIND: &'static str = "equipment";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Owner's edits to a listing; fields left `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentChanges {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub price_per_day: Option<Money>,
}

impl EquipmentChanges {
    pub fn apply_to(self, equipment: &mut Equipment) -> MarketResult<()> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(MarketError::InvalidArgument("equipment name is empty".into()));
        }
        if let Some(price) = self.price_per_day.filter(|price| !price.is_positive()) {
            return Err(MarketError::InvalidArgument(format!(
                "daily price must be positive, got {price}"
            )));
        }

        if let Some(name) = self.name {
            equipment.name = name;
        }
        if let Some(kind) = self.kind {
            equipment.kind = Some(kind);
        }
        if let Some(price) = self.price_per_day {
            equipment.price_per_day = price;
        }
        Ok(())
    }
}

impl Record for Booking {
    const KIND: &'static str = "booking";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Half-open interval test: ranges that only touch at an endpoint do not overlap.
pub fn overlaps(
    a_start: TimeStamp,
    a_end: TimeStamp,
    b_start: TimeStamp,
    b_end: TimeStamp,
) -> bool {
    a_start.max(b_start) < a_end.min(b_end)
}

/// Whether `[start, end)` collides with an active booking of `equipment_id`.
///
/// `exclude` skips the booking being rescheduled so it never conflicts with itself.
pub fn has_conflict<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    equipment_id: &str,
    start: TimeStamp,
    end: TimeStamp,
    exclude: Option<&str>,
) -> bool {
    bookings
        .into_iter()
        .filter(|b| b.equipment_id == equipment_id && b.status.is_active())
        .filter(|b| exclude != Some(b.id.as_str()))
        .any(|b| overlaps(b.start, b.end, start, end))
}
