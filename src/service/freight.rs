use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::freight::{
    Carrier, CarrierQuote, CarrierStatus, Delivery, DeliveryRequest, TrackingUpdate, estimate,
    rank_carriers,
};
use crate::notification::{NewNotification, NotificationKind, RelatedKind};
use crate::status::{Flow, Parties, ReservationStatus, Transition, advance};
use crate::types::{Money, TimeStamp};
use rust_decimal::Decimal;
use tracing::info;

/// What a transport company registers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCarrier {
    pub company_name: String,
    pub vehicle_type: Option<String>,
    pub capacity_kg: u32,
    pub price_per_km: Money,
    pub price_per_tonne: Option<Money>,
}

impl MarketService {
    /// Register a carrier. Company names are unique across the market.
    pub fn register_carrier(&self, owner_id: &str, details: NewCarrier) -> MarketResult<Carrier> {
        if details.company_name.trim().is_empty() {
            return Err(MarketError::InvalidArgument("company name is empty".into()));
        }
        if details.capacity_kg == 0 {
            return Err(MarketError::InvalidArgument("capacity must be positive".into()));
        }
        if details.price_per_km < Money::ZERO
            || details.price_per_tonne.is_some_and(|rate| rate < Money::ZERO)
        {
            return Err(MarketError::InvalidArgument("rates cannot be negative".into()));
        }

        let _guard = self.store.lock("carrier-registry");

        let taken = self
            .store
            .filter(|c: &Carrier| c.company_name.eq_ignore_ascii_case(&details.company_name))?;
        if !taken.is_empty() {
            return Err(MarketError::Conflict(format!(
                "a carrier named {} already exists",
                details.company_name
            )));
        }

        let carrier = Carrier {
            id: self.new_id("carrier_")?,
            owner_id: owner_id.to_string(),
            company_name: details.company_name,
            vehicle_type: details.vehicle_type,
            capacity_kg: details.capacity_kg,
            price_per_km: details.price_per_km,
            price_per_tonne: details.price_per_tonne,
            average_rating: Decimal::from(5),
            total_reviews: 0,
            status: CarrierStatus::Active,
        };
        self.store.put(&carrier)?;

        info!(carrier = %carrier.id, company = %carrier.company_name, "carrier registered");
        Ok(carrier)
    }

    pub fn carrier(&self, carrier_id: &str) -> MarketResult<Carrier> {
        self.store.fetch(carrier_id)
    }

    pub fn set_carrier_status(
        &self,
        actor: &str,
        carrier_id: &str,
        status: CarrierStatus,
    ) -> MarketResult<Carrier> {
        let _guard = self.store.lock(carrier_id);

        let mut carrier: Carrier = self.store.fetch(carrier_id)?;
        if carrier.owner_id != actor {
            return Err(MarketError::Forbidden("not your carrier".into()));
        }

        carrier.status = status;
        self.store.put(&carrier)?;
        info!(carrier = carrier_id, ?status, "carrier status changed");
        Ok(carrier)
    }

    /// Quotes for a load, cheapest first.
    pub fn suggest_carriers(
        &self,
        requester_id: &str,
        weight_kg: u32,
        pickup: &str,
        dropoff: &str,
    ) -> MarketResult<Vec<CarrierQuote>> {
        if weight_kg == 0 {
            return Err(MarketError::InvalidArgument("weight must be positive".into()));
        }

        let distance_km = self.distances.distance_km(pickup, dropoff)?;
        let carriers = self.store.all::<Carrier>()?;
        Ok(rank_carriers(&carriers, requester_id, weight_kg, distance_km))
    }

    pub fn book_delivery(
        &self,
        requester_id: &str,
        request: DeliveryRequest,
    ) -> MarketResult<Delivery> {
        let order = request.validate_and_finalise()?;

        let _guard = self.store.lock(&order.carrier_id);

        let carrier: Carrier = self.store.fetch(&order.carrier_id)?;
        if carrier.owner_id == requester_id {
            return Err(MarketError::Forbidden(
                "you cannot book your own carrier".into(),
            ));
        }
        if carrier.status != CarrierStatus::Active {
            return Err(MarketError::Conflict(format!(
                "carrier {} is {:?}",
                carrier.id, carrier.status
            )));
        }
        if order.weight_kg > carrier.capacity_kg {
            return Err(MarketError::InvalidArgument(format!(
                "{} kg exceeds the carrier's capacity of {} kg",
                order.weight_kg, carrier.capacity_kg
            )));
        }

        let distance_km = self
            .distances
            .distance_km(&order.pickup_address, &order.delivery_address)?;
        let total_cost = estimate(&carrier, distance_km, order.weight_kg)?;
        let delivery = Delivery {
            id: self.new_id("delivery_")?,
            carrier_id: carrier.id.clone(),
            owner_id: carrier.owner_id.clone(),
            requester_id: requester_id.to_string(),
            goods_type: order.goods_type,
            weight_kg: order.weight_kg,
            pickup_address: order.pickup_address,
            delivery_address: order.delivery_address,
            distance_km,
            desired_date: order.desired_date,
            total_cost,
            status: ReservationStatus::Pending,
            carrier_rating: None,
            tracking: vec![],
            history: vec![],
            requested_at: TimeStamp::now(),
        };
        self.store.put(&delivery)?;
        info!(
            delivery = %delivery.id,
            carrier = %carrier.id,
            cost = %delivery.total_cost,
            "delivery booked"
        );

        self.notify(
            NewNotification::new(
                &carrier.owner_id,
                NotificationKind::NewReservation,
                "New delivery request",
                format!(
                    "{} kg of {} from {} to {} on {}.",
                    delivery.weight_kg,
                    delivery.goods_type,
                    delivery.pickup_address,
                    delivery.delivery_address,
                    delivery.desired_date
                ),
            )
            .about(&delivery.id, RelatedKind::Delivery),
        );

        Ok(delivery)
    }

    pub fn approve_delivery(&self, actor: &str, delivery_id: &str) -> MarketResult<Delivery> {
        self.transition_delivery(actor, delivery_id, Transition::Approve)
    }

    pub fn reject_delivery(&self, actor: &str, delivery_id: &str) -> MarketResult<Delivery> {
        self.transition_delivery(actor, delivery_id, Transition::Reject)
    }

    /// Goods picked up; the delivery is now in transit.
    pub fn dispatch_delivery(&self, actor: &str, delivery_id: &str) -> MarketResult<Delivery> {
        self.transition_delivery(actor, delivery_id, Transition::Dispatch)
    }

    pub fn complete_delivery(&self, actor: &str, delivery_id: &str) -> MarketResult<Delivery> {
        self.transition_delivery(actor, delivery_id, Transition::Complete)
    }

    pub fn cancel_delivery(&self, actor: &str, delivery_id: &str) -> MarketResult<Delivery> {
        self.transition_delivery(actor, delivery_id, Transition::Cancel)
    }

    /// Append a position report. Only the carrier, and only while in transit.
    pub fn record_tracking(
        &self,
        actor: &str,
        delivery_id: &str,
        location: &str,
        message: &str,
    ) -> MarketResult<Delivery> {
        let carrier_id = self.store.fetch::<Delivery>(delivery_id)?.carrier_id;
        let _guard = self.store.lock(&carrier_id);

        let mut delivery: Delivery = self.store.fetch(delivery_id)?;
        if delivery.owner_id != actor {
            return Err(MarketError::Forbidden(
                "only the carrier may report tracking".into(),
            ));
        }
        if delivery.status != ReservationStatus::InTransit {
            return Err(MarketError::Conflict(format!(
                "delivery {delivery_id} is {:?}, not in transit",
                delivery.status
            )));
        }

        delivery.tracking.push(TrackingUpdate {
            at: TimeStamp::now(),
            location: location.to_string(),
            message: message.to_string(),
        });
        self.store.put(&delivery)?;

        self.notify(
            NewNotification::new(
                &delivery.requester_id,
                NotificationKind::DeliveryStatus,
                "Delivery update",
                format!("{location}: {message}"),
            )
            .about(delivery_id, RelatedKind::Delivery),
        );

        Ok(delivery)
    }

    /// Current state of a delivery, tracking included.
    pub fn track_delivery(&self, delivery_id: &str) -> MarketResult<Delivery> {
        self.store.fetch(delivery_id)
    }

    /// The requester rates a completed delivery once; the carrier's average follows.
    pub fn review_delivery(
        &self,
        actor: &str,
        delivery_id: &str,
        rating: u8,
    ) -> MarketResult<Carrier> {
        let carrier_id = self.store.fetch::<Delivery>(delivery_id)?.carrier_id;
        let _guard = self.store.lock(&carrier_id);

        let mut delivery: Delivery = self.store.fetch(delivery_id)?;
        if delivery.requester_id != actor {
            return Err(MarketError::Forbidden(
                "only the requester may review a delivery".into(),
            ));
        }
        if delivery.status != ReservationStatus::Completed {
            return Err(MarketError::Conflict(format!(
                "delivery {delivery_id} is {:?}; only completed deliveries are reviewed",
                delivery.status
            )));
        }
        if delivery.carrier_rating.is_some() {
            return Err(MarketError::Conflict(format!(
                "delivery {delivery_id} was already reviewed"
            )));
        }

        let mut carrier: Carrier = self.store.fetch(&carrier_id)?;
        carrier.record_rating(rating)?;
        delivery.carrier_rating = Some(rating);

        let mut writes = self.store.write_set();
        writes.put(&delivery)?.put(&carrier)?;
        writes.commit(&self.store)?;
        info!(
            delivery = delivery_id,
            carrier = %carrier_id,
            rating,
            average = %carrier.average_rating,
            "delivery reviewed"
        );

        Ok(carrier)
    }

    pub fn deliveries_by_requester(&self, user_id: &str) -> MarketResult<Vec<Delivery>> {
        let mut found = self
            .store
            .filter(|d: &Delivery| d.requester_id == user_id)?;
        found.sort_by_key(|d| d.requested_at);
        Ok(found)
    }

    /// Deliveries booked on carriers `owner_id` runs.
    pub fn deliveries_received(&self, owner_id: &str) -> MarketResult<Vec<Delivery>> {
        let mut found = self.store.filter(|d: &Delivery| d.owner_id == owner_id)?;
        found.sort_by_key(|d| d.requested_at);
        Ok(found)
    }

    fn transition_delivery(
        &self,
        actor: &str,
        delivery_id: &str,
        transition: Transition,
    ) -> MarketResult<Delivery> {
        let carrier_id = self.store.fetch::<Delivery>(delivery_id)?.carrier_id;
        let _guard = self.store.lock(&carrier_id);

        let mut delivery: Delivery = self.store.fetch(delivery_id)?;
        let carrier: Carrier = self.store.fetch(&carrier_id)?;
        let previous = delivery.status;

        let change = advance(
            Flow::Delivery,
            &Parties::new(&carrier.owner_id, &delivery.requester_id),
            actor,
            transition,
            &mut delivery.status,
            &mut delivery.history,
        )?;

        if transition == Transition::Cancel && self.removes_on_cancel(previous) {
            self.store.remove::<Delivery>(delivery_id)?;
        } else {
            self.store.put(&delivery)?;
        }
        info!(delivery = delivery_id, from = ?change.from, to = ?change.to, "delivery updated");

        let notice = match transition {
            Transition::Approve => NewNotification::new(
                &delivery.requester_id,
                NotificationKind::ReservationAccepted,
                "Delivery accepted",
                format!("{} accepted your delivery.", carrier.company_name),
            ),
            Transition::Reject => NewNotification::new(
                &delivery.requester_id,
                NotificationKind::ReservationRejected,
                "Delivery declined",
                format!("{} declined your delivery.", carrier.company_name),
            ),
            Transition::Dispatch => NewNotification::new(
                &delivery.requester_id,
                NotificationKind::DeliveryStatus,
                "Delivery on its way",
                format!("{} picked up your {}.", carrier.company_name, delivery.goods_type),
            ),
            Transition::Complete => NewNotification::new(
                &delivery.requester_id,
                NotificationKind::DeliveryStatus,
                "Delivery completed",
                format!(
                    "Your {} reached {}.",
                    delivery.goods_type, delivery.delivery_address
                ),
            ),
            Transition::Cancel => NewNotification::new(
                &carrier.owner_id,
                NotificationKind::ReservationCancelled,
                "Delivery cancelled",
                format!("A delivery of {} was cancelled.", delivery.goods_type),
            ),
        };
        self.notify(notice.about(delivery_id, RelatedKind::Delivery));

        Ok(delivery)
    }
}
