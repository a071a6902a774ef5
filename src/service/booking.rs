use super::MarketService;
use crate::booking::{Booking, Equipment, EquipmentChanges, has_conflict};
use crate::error::{MarketError, MarketResult};
use crate::notification::{NewNotification, NotificationKind, RelatedKind};
use crate::status::{Flow, Parties, ReservationStatus, Transition, advance};
use crate::types::{Money, TimeStamp};
use tracing::info;

impl MarketService {
    pub fn list_equipment(
        &self,
        owner_id: &str,
        name: &str,
        kind: Option<&str>,
        price_per_day: Money,
    ) -> MarketResult<Equipment> {
        if name.trim().is_empty() {
            return Err(MarketError::InvalidArgument("equipment name is empty".into()));
        }
        if !price_per_day.is_positive() {
            return Err(MarketError::InvalidArgument(format!(
                "daily price must be positive, got {price_per_day}"
            )));
        }

        let equipment = Equipment {
            id: self.new_id("equipment_")?,
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            kind: kind.map(str::to_string),
            price_per_day,
            listed: true,
        };
        self.store.put(&equipment)?;

        info!(equipment = %equipment.id, owner = owner_id, "equipment listed");
        Ok(equipment)
    }

    pub fn equipment(&self, equipment_id: &str) -> MarketResult<Equipment> {
        self.store.fetch(equipment_id)
    }

    pub fn update_equipment(
        &self,
        actor: &str,
        equipment_id: &str,
        changes: EquipmentChanges,
    ) -> MarketResult<Equipment> {
        let _guard = self.store.lock(equipment_id);

        let mut equipment: Equipment = self.store.fetch(equipment_id)?;
        self.check_equipment_editable(actor, &equipment)?;

        changes.apply_to(&mut equipment)?;
        self.store.put(&equipment)?;
        info!(equipment = equipment_id, "equipment updated");
        Ok(equipment)
    }

    /// Remove equipment from the market for good. Finished bookings are kept.
    pub fn delete_equipment(&self, actor: &str, equipment_id: &str) -> MarketResult<()> {
        let _guard = self.store.lock(equipment_id);

        let equipment: Equipment = self.store.fetch(equipment_id)?;
        self.check_equipment_editable(actor, &equipment)?;

        self.store.remove::<Equipment>(equipment_id)?;
        info!(equipment = equipment_id, "equipment deleted");
        Ok(())
    }

    /// Take equipment off the market, or put it back. Existing bookings are untouched.
    pub fn set_equipment_listed(
        &self,
        actor: &str,
        equipment_id: &str,
        listed: bool,
    ) -> MarketResult<Equipment> {
        let mut equipment: Equipment = self.store.fetch(equipment_id)?;
        if equipment.owner_id != actor {
            return Err(MarketError::Forbidden("not your equipment".into()));
        }

        equipment.listed = listed;
        self.store.put(&equipment)?;
        Ok(equipment)
    }

    /// Ask to rent `equipment_id` over `[start, end)`.
    pub fn request_booking(
        &self,
        requester_id: &str,
        equipment_id: &str,
        start: TimeStamp,
        end: TimeStamp,
    ) -> MarketResult<Booking> {
        if end <= start {
            return Err(MarketError::InvalidArgument(format!(
                "booking must end after it starts ({start} .. {end})"
            )));
        }

        let _guard = self.store.lock(equipment_id);

        let equipment: Equipment = self.store.fetch(equipment_id)?;
        if equipment.owner_id == requester_id {
            return Err(MarketError::Forbidden(
                "you cannot book your own equipment".into(),
            ));
        }
        if !equipment.listed {
            return Err(MarketError::Conflict(format!(
                "equipment {equipment_id} is not taking bookings"
            )));
        }

        let existing = self
            .store
            .filter(|b: &Booking| b.equipment_id == equipment_id)?;
        if has_conflict(&existing, equipment_id, start, end, None) {
            return Err(MarketError::Conflict(format!(
                "equipment {equipment_id} is already booked between {start} and {end}"
            )));
        }

        let booking = Booking {
            id: self.new_id("booking_")?,
            equipment_id: equipment.id.clone(),
            owner_id: equipment.owner_id.clone(),
            requester_id: requester_id.to_string(),
            start,
            end,
            status: ReservationStatus::Pending,
            requested_at: TimeStamp::now(),
            history: vec![],
        };
        self.store.put(&booking)?;
        info!(booking = %booking.id, equipment = equipment_id, "booking requested");

        self.notify(
            NewNotification::new(
                &equipment.owner_id,
                NotificationKind::NewReservation,
                "New booking request",
                format!(
                    "{} would like to rent {} from {start} to {end}.",
                    requester_id, equipment.name
                ),
            )
            .about(&booking.id, RelatedKind::Booking),
        );

        Ok(booking)
    }

    /// Move a pending booking to new dates. The booking never conflicts with itself.
    pub fn reschedule_booking(
        &self,
        actor: &str,
        booking_id: &str,
        start: TimeStamp,
        end: TimeStamp,
    ) -> MarketResult<Booking> {
        if end <= start {
            return Err(MarketError::InvalidArgument(format!(
                "booking must end after it starts ({start} .. {end})"
            )));
        }

        let equipment_id = self.store.fetch::<Booking>(booking_id)?.equipment_id;
        let _guard = self.store.lock(&equipment_id);

        let mut booking: Booking = self.store.fetch(booking_id)?;
        if booking.requester_id != actor {
            return Err(MarketError::Forbidden(
                "only the requester may reschedule a booking".into(),
            ));
        }
        if booking.status != ReservationStatus::Pending {
            return Err(MarketError::Conflict(format!(
                "booking {booking_id} was already {:?}",
                booking.status
            )));
        }

        let existing = self
            .store
            .filter(|b: &Booking| b.equipment_id == equipment_id)?;
        if has_conflict(&existing, &equipment_id, start, end, Some(booking_id)) {
            return Err(MarketError::Conflict(format!(
                "equipment {equipment_id} is already booked between {start} and {end}"
            )));
        }

        booking.start = start;
        booking.end = end;
        self.store.put(&booking)?;
        Ok(booking)
    }

    pub fn approve_booking(&self, actor: &str, booking_id: &str) -> MarketResult<Booking> {
        self.transition_booking(actor, booking_id, Transition::Approve)
    }

    pub fn reject_booking(&self, actor: &str, booking_id: &str) -> MarketResult<Booking> {
        self.transition_booking(actor, booking_id, Transition::Reject)
    }

    /// Requester backs out. A pending booking may be removed, see [`crate::config::CancelPolicy`].
    pub fn cancel_booking(&self, actor: &str, booking_id: &str) -> MarketResult<Booking> {
        self.transition_booking(actor, booking_id, Transition::Cancel)
    }

    pub fn complete_booking(&self, actor: &str, booking_id: &str) -> MarketResult<Booking> {
        self.transition_booking(actor, booking_id, Transition::Complete)
    }

    pub fn booking(&self, booking_id: &str) -> MarketResult<Option<Booking>> {
        self.store.get(booking_id)
    }

    pub fn bookings_by_requester(&self, user_id: &str) -> MarketResult<Vec<Booking>> {
        let mut found = self
            .store
            .filter(|b: &Booking| b.requester_id == user_id)?;
        found.sort_by_key(|b| b.start);
        Ok(found)
    }

    /// Bookings on equipment `owner_id` lists.
    pub fn bookings_received(&self, owner_id: &str) -> MarketResult<Vec<Booking>> {
        let mut found = self.store.filter(|b: &Booking| b.owner_id == owner_id)?;
        found.sort_by_key(|b| b.start);
        Ok(found)
    }

    // owner only, and never under a booking that is still pending or approved
    fn check_equipment_editable(&self, actor: &str, equipment: &Equipment) -> MarketResult<()> {
        if equipment.owner_id != actor {
            return Err(MarketError::Forbidden("not your equipment".into()));
        }
        let active = self.store.filter(|b: &Booking| {
            b.equipment_id == equipment.id && b.status.is_active()
        })?;
        if !active.is_empty() {
            return Err(MarketError::Conflict(format!(
                "equipment {} has {} pending or approved bookings",
                equipment.id,
                active.len()
            )));
        }
        Ok(())
    }

    fn transition_booking(
        &self,
        actor: &str,
        booking_id: &str,
        transition: Transition,
    ) -> MarketResult<Booking> {
        let equipment_id = self.store.fetch::<Booking>(booking_id)?.equipment_id;
        let _guard = self.store.lock(&equipment_id);

        let mut booking: Booking = self.store.fetch(booking_id)?;
        let equipment: Equipment = self.store.fetch(&equipment_id)?;
        let previous = booking.status;

        let change = advance(
            Flow::Booking,
            &Parties::new(&equipment.owner_id, &booking.requester_id),
            actor,
            transition,
            &mut booking.status,
            &mut booking.history,
        )?;

        if transition == Transition::Cancel && self.removes_on_cancel(previous) {
            self.store.remove::<Booking>(booking_id)?;
        } else {
            self.store.put(&booking)?;
        }
        info!(booking = booking_id, from = ?change.from, to = ?change.to, "booking updated");

        let notice = match transition {
            Transition::Approve => Some(NewNotification::new(
                &booking.requester_id,
                NotificationKind::ReservationAccepted,
                "Booking accepted",
                format!("Your booking of {} was accepted.", equipment.name),
            )),
            Transition::Reject => Some(NewNotification::new(
                &booking.requester_id,
                NotificationKind::ReservationRejected,
                "Booking declined",
                format!("Your booking of {} was declined.", equipment.name),
            )),
            Transition::Cancel => Some(NewNotification::new(
                &equipment.owner_id,
                NotificationKind::ReservationCancelled,
                "Booking cancelled",
                format!("A booking of {} was cancelled by the renter.", equipment.name),
            )),
            Transition::Dispatch | Transition::Complete => None,
        };
        if let Some(notice) = notice {
            self.notify(notice.about(booking_id, RelatedKind::Booking));
        }

        Ok(booking)
    }
}
