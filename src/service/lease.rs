use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::lease::{LandListing, LandListingDraft, LandStatus, LeaseRequest};
use crate::notification::{NewNotification, NotificationKind, RelatedKind};
use crate::status::{Flow, Parties, ReservationStatus, Transition, advance};
use crate::types::{Money, TimeStamp};
use tracing::info;

/// Money a user has tied up in leases, from both sides of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RentalStats {
    /// Rent owed on approved and completed leases taken by the user.
    pub committed_rent: Money,
    /// Pending or approved leases taken by the user.
    pub active_leases: usize,
    /// Rent from active leases on land the user owns.
    pub potential_income: Money,
    /// Every request ever made on land the user owns.
    pub requests_received: usize,
}

impl MarketService {
    pub fn list_land(&self, owner_id: &str, draft: LandListingDraft) -> MarketResult<LandListing> {
        let terms = draft.validate_and_finalise()?;

        let listing = LandListing {
            id: self.new_id("land_")?,
            owner_id: owner_id.to_string(),
            title: terms.title,
            location: terms.location,
            area_hectares: terms.area_hectares,
            price_per_month: terms.price_per_month,
            min_months: terms.min_months,
            max_months: terms.max_months,
            status: LandStatus::Available,
            listed_at: TimeStamp::now(),
        };
        self.store.put(&listing)?;

        info!(land = %listing.id, owner = owner_id, "land listed");
        Ok(listing)
    }

    pub fn land(&self, listing_id: &str) -> MarketResult<LandListing> {
        self.store.fetch(listing_id)
    }

    /// Change a listing's terms. Fields the draft leaves unset keep their value.
    pub fn update_land(
        &self,
        actor: &str,
        listing_id: &str,
        draft: LandListingDraft,
    ) -> MarketResult<LandListing> {
        let _guard = self.store.lock(listing_id);

        let mut listing: LandListing = self.store.fetch(listing_id)?;
        self.check_listing_editable(actor, &listing)?;

        let terms = draft.fill_from(&listing).validate_and_finalise()?;
        listing.title = terms.title;
        listing.location = terms.location;
        listing.area_hectares = terms.area_hectares;
        listing.price_per_month = terms.price_per_month;
        listing.min_months = terms.min_months;
        listing.max_months = terms.max_months;
        self.store.put(&listing)?;

        info!(land = listing_id, "land listing updated");
        Ok(listing)
    }

    /// Withdraw a listing for good. Past leases on it are kept.
    pub fn delete_land(&self, actor: &str, listing_id: &str) -> MarketResult<()> {
        let _guard = self.store.lock(listing_id);

        let listing: LandListing = self.store.fetch(listing_id)?;
        self.check_listing_editable(actor, &listing)?;

        self.store.remove::<LandListing>(listing_id)?;
        info!(land = listing_id, "land listing deleted");
        Ok(())
    }

    /// Ask for a lease of `months`. The parcel is reserved until the owner answers.
    pub fn request_lease(
        &self,
        requester_id: &str,
        listing_id: &str,
        months: u32,
    ) -> MarketResult<LeaseRequest> {
        let _guard = self.store.lock(listing_id);

        let mut listing: LandListing = self.store.fetch(listing_id)?;
        if listing.owner_id == requester_id {
            return Err(MarketError::Forbidden("you cannot lease your own land".into()));
        }
        if listing.status != LandStatus::Available {
            return Err(MarketError::Conflict(format!(
                "land {listing_id} is {:?}",
                listing.status
            )));
        }
        if !listing.accepts_duration(months) {
            return Err(MarketError::InvalidArgument(format!(
                "lease of {months} months is outside {} to {} months",
                listing.min_months, listing.max_months
            )));
        }

        let lease = LeaseRequest {
            id: self.new_id("lease_")?,
            listing_id: listing.id.clone(),
            owner_id: listing.owner_id.clone(),
            requester_id: requester_id.to_string(),
            months,
            amount: listing.price_per_month.times(months)?,
            status: ReservationStatus::Pending,
            requested_at: TimeStamp::now(),
            history: vec![],
        };
        listing.status = LandStatus::Reserved;

        let mut writes = self.store.write_set();
        writes.put(&lease)?.put(&listing)?;
        writes.commit(&self.store)?;
        info!(lease = %lease.id, land = listing_id, amount = %lease.amount, "lease requested");

        self.notify(
            NewNotification::new(
                &listing.owner_id,
                NotificationKind::NewReservation,
                "New lease request",
                format!(
                    "{requester_id} would like to lease {} for {months} months.",
                    listing.title
                ),
            )
            .about(&lease.id, RelatedKind::Lease),
        );

        Ok(lease)
    }

    pub fn approve_lease(&self, actor: &str, lease_id: &str) -> MarketResult<LeaseRequest> {
        self.transition_lease(actor, lease_id, Transition::Approve)
    }

    pub fn reject_lease(&self, actor: &str, lease_id: &str) -> MarketResult<LeaseRequest> {
        self.transition_lease(actor, lease_id, Transition::Reject)
    }

    pub fn cancel_lease(&self, actor: &str, lease_id: &str) -> MarketResult<LeaseRequest> {
        self.transition_lease(actor, lease_id, Transition::Cancel)
    }

    /// The season is over. The parcel keeps its status until the owner relists it.
    pub fn complete_lease(&self, actor: &str, lease_id: &str) -> MarketResult<LeaseRequest> {
        self.transition_lease(actor, lease_id, Transition::Complete)
    }

    /// Put a parcel back on the market once no lease holds it.
    pub fn relist_land(&self, actor: &str, listing_id: &str) -> MarketResult<LandListing> {
        let _guard = self.store.lock(listing_id);

        let mut listing: LandListing = self.store.fetch(listing_id)?;
        if listing.owner_id != actor {
            return Err(MarketError::Forbidden("not your land".into()));
        }
        if self.has_active_lease(listing_id, None)? {
            return Err(MarketError::Conflict(format!(
                "land {listing_id} still has an active lease"
            )));
        }

        if listing.status != LandStatus::Available {
            listing.status = LandStatus::Available;
            self.store.put(&listing)?;
            info!(land = listing_id, "land relisted");
        }
        Ok(listing)
    }

    pub fn lease(&self, lease_id: &str) -> MarketResult<Option<LeaseRequest>> {
        self.store.get(lease_id)
    }

    /// Requests on one parcel, visible to its owner only.
    pub fn leases_for_listing(
        &self,
        actor: &str,
        listing_id: &str,
    ) -> MarketResult<Vec<LeaseRequest>> {
        let listing: LandListing = self.store.fetch(listing_id)?;
        if listing.owner_id != actor {
            return Err(MarketError::Forbidden(
                "only the owner may see requests on this land".into(),
            ));
        }

        let mut found = self
            .store
            .filter(|l: &LeaseRequest| l.listing_id == listing_id)?;
        found.sort_by_key(|l| l.requested_at);
        Ok(found)
    }

    pub fn leases_by_requester(&self, user_id: &str) -> MarketResult<Vec<LeaseRequest>> {
        let mut found = self
            .store
            .filter(|l: &LeaseRequest| l.requester_id == user_id)?;
        found.sort_by_key(|l| l.requested_at);
        Ok(found)
    }

    pub fn rental_stats(&self, user_id: &str) -> MarketResult<RentalStats> {
        let leases = self.store.filter(|l: &LeaseRequest| {
            l.requester_id == user_id || l.owner_id == user_id
        })?;

        let mut stats = RentalStats::default();
        for lease in &leases {
            if lease.requester_id == user_id {
                if matches!(
                    lease.status,
                    ReservationStatus::Approved | ReservationStatus::Completed
                ) {
                    stats.committed_rent = stats.committed_rent.checked_add(lease.amount)?;
                }
                if lease.status.is_active() {
                    stats.active_leases += 1;
                }
            }
            if lease.owner_id == user_id {
                stats.requests_received += 1;
                if lease.status.is_active() {
                    stats.potential_income = stats.potential_income.checked_add(lease.amount)?;
                }
            }
        }
        Ok(stats)
    }

    fn check_listing_editable(&self, actor: &str, listing: &LandListing) -> MarketResult<()> {
        if listing.owner_id != actor {
            return Err(MarketError::Forbidden("not your land".into()));
        }
        if self.has_active_lease(&listing.id, None)? {
            return Err(MarketError::Conflict(format!(
                "land {} has a pending or approved lease",
                listing.id
            )));
        }
        Ok(())
    }

    fn has_active_lease(&self, listing_id: &str, except: Option<&str>) -> MarketResult<bool> {
        let active = self.store.filter(|l: &LeaseRequest| {
            l.listing_id == listing_id && l.status.is_active() && Some(l.id.as_str()) != except
        })?;
        Ok(!active.is_empty())
    }

    fn transition_lease(
        &self,
        actor: &str,
        lease_id: &str,
        transition: Transition,
    ) -> MarketResult<LeaseRequest> {
        let listing_id = self.store.fetch::<LeaseRequest>(lease_id)?.listing_id;
        let _guard = self.store.lock(&listing_id);

        let mut lease: LeaseRequest = self.store.fetch(lease_id)?;
        let mut listing: LandListing = self.store.fetch(&listing_id)?;
        let previous = lease.status;

        let change = advance(
            Flow::Lease,
            &Parties::new(&listing.owner_id, &lease.requester_id),
            actor,
            transition,
            &mut lease.status,
            &mut lease.history,
        )?;

        match transition {
            Transition::Approve => listing.status = LandStatus::Leased,
            Transition::Reject | Transition::Cancel => {
                if !self.has_active_lease(&listing_id, Some(lease_id))? {
                    listing.status = LandStatus::Available;
                }
            }
            Transition::Dispatch | Transition::Complete => {}
        }

        let mut writes = self.store.write_set();
        if transition == Transition::Cancel && self.removes_on_cancel(previous) {
            writes.delete::<LeaseRequest>(lease_id);
        } else {
            writes.put(&lease)?;
        }
        writes.put(&listing)?;
        writes.commit(&self.store)?;
        info!(
            lease = lease_id,
            from = ?change.from,
            to = ?change.to,
            land = ?listing.status,
            "lease updated"
        );

        let notice = match transition {
            Transition::Approve => Some(NewNotification::new(
                &lease.requester_id,
                NotificationKind::ReservationAccepted,
                "Lease accepted",
                format!("Your lease of {} was accepted.", listing.title),
            )),
            Transition::Reject => Some(NewNotification::new(
                &lease.requester_id,
                NotificationKind::ReservationRejected,
                "Lease declined",
                format!("Your lease of {} was declined.", listing.title),
            )),
            Transition::Cancel => Some(NewNotification::new(
                &listing.owner_id,
                NotificationKind::ReservationCancelled,
                "Lease cancelled",
                format!("A lease of {} was cancelled by the tenant.", listing.title),
            )),
            Transition::Dispatch | Transition::Complete => None,
        };
        if let Some(notice) = notice {
            self.notify(notice.about(lease_id, RelatedKind::Lease));
        }

        Ok(lease)
    }
}
