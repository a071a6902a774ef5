//! Freight: carriers, delivery bookings and the cost estimator
use crate::error::{MarketError, MarketResult};
use crate::status::{ReservationStatus, StatusChange};
use crate::store::Record;
use crate::types::{Money, TimeStamp};
use rust_decimal::Decimal;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum CarrierStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Suspended,
    #[n(2)]
    PendingValidation,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Carrier {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub owner_id: String,
    #[n(2)]
    pub company_name: String,
    #[n(3)]
    pub vehicle_type: Option<String>,
    #[n(4)]
    pub capacity_kg: u32,
    #[n(5)]
    pub price_per_km: Money,
    #[n(6)]
    pub price_per_tonne: Option<Money>,
    #[cbor(n(7), with = "crate::types::decimal")]
    pub average_rating: Decimal,
    #[n(8)]
    pub total_reviews: u32,
    #[n(9)]
    pub status: CarrierStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct TrackingUpdate {
    #[n(0)]
    pub at: TimeStamp,
    #[n(1)]
    pub location: String,
    #[n(2)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Delivery {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub carrier_id: String,
    #[n(2)]
    pub owner_id: String, // the carrier's owner
    #[n(3)]
    pub requester_id: String,
    #[n(4)]
    pub goods_type: String,
    #[n(5)]
    pub weight_kg: u32,
    #[n(6)]
    pub pickup_address: String,
    #[n(7)]
    pub delivery_address: String,
    #[cbor(n(8), with = "crate::types::decimal")]
    pub distance_km: Decimal,
    #[n(9)]
    pub desired_date: TimeStamp,
    #[n(10)]
    pub total_cost: Money,
    #[n(11)]
    pub status: ReservationStatus,
    #[n(12)]
    pub carrier_rating: Option<u8>,
    #[n(13)]
    pub tracking: Vec<TrackingUpdate>,
    #[n(14)]
    pub history: Vec<StatusChange>,
    #[n(15)]
    pub requested_at: TimeStamp,
}

impl Record for Carrier {
    const KIND: &'static str = "carrier";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Delivery {
    const KIND: &'static str = "delivery";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Carrier {
    /// Fold one review into the running average, kept to two decimals.
    pub fn record_rating(&mut self, rating: u8) -> MarketResult<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(MarketError::InvalidArgument(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
            )));
        }

        let total = Decimal::from(self.total_reviews);
        let sum = self.average_rating * total + Decimal::from(rating);
        self.total_reviews += 1;
        self.average_rating = (sum / Decimal::from(self.total_reviews)).round_dp(2);
        Ok(())
    }
}

/// `distance * price_per_km + tonnes * price_per_tonne`, the second term only
/// when the carrier charges by weight.
pub fn estimate(carrier: &Carrier, distance_km: Decimal, weight_kg: u32) -> MarketResult<Money> {
    let tonnes = Decimal::from(weight_kg) / Decimal::from(1000);
    let distance_cost = distance_km.checked_mul(carrier.price_per_km.amount());
    let weight_cost = match carrier.price_per_tonne {
        Some(rate) => tonnes.checked_mul(rate.amount()),
        None => Some(Decimal::ZERO),
    };

    distance_cost
        .zip(weight_cost)
        .and_then(|(distance, weight)| distance.checked_add(weight))
        .map(Money::new)
        .ok_or_else(|| {
            MarketError::InvalidArgument(format!(
                "cost of {weight_kg} kg over {distance_km} km with {} is too large",
                carrier.company_name
            ))
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierQuote {
    pub carrier_id: String,
    pub company_name: String,
    pub average_rating: Decimal,
    pub estimated_cost: Money,
    pub distance_km: Decimal,
}

/// Quotes from every carrier able to take the load, cheapest first.
///
/// Skips carriers that are not active, are too small, or belong to the requester.
/// A carrier whose rates cannot price the load is skipped as well.
pub fn rank_carriers<'a>(
    carriers: impl IntoIterator<Item = &'a Carrier>,
    requester_id: &str,
    weight_kg: u32,
    distance_km: Decimal,
) -> Vec<CarrierQuote> {
    let mut quotes: Vec<CarrierQuote> = carriers
        .into_iter()
        .filter(|c| c.capacity_kg >= weight_kg)
        .filter(|c| c.status == CarrierStatus::Active)
        .filter(|c| c.owner_id != requester_id)
        .filter_map(|c| {
            let estimated_cost = estimate(c, distance_km, weight_kg).ok()?;
            Some(CarrierQuote {
                carrier_id: c.id.clone(),
                company_name: c.company_name.clone(),
                average_rating: c.average_rating,
                estimated_cost,
                distance_km,
            })
        })
        .collect();

    quotes.sort_by(|a, b| a.estimated_cost.cmp(&b.estimated_cost));
    quotes
}

/// Road distance between two addresses.
pub trait DistanceOracle: Send + Sync {
    fn distance_km(&self, pickup: &str, dropoff: &str) -> MarketResult<Decimal>;
}

/// Quotes the same distance for every route; stands in until a geolocation
/// service is wired up.
#[derive(Debug, Clone, Copy)]
pub struct FixedDistance(pub Decimal);

impl DistanceOracle for FixedDistance {
    fn distance_km(&self, _pickup: &str, _dropoff: &str) -> MarketResult<Decimal> {
        Ok(self.0)
    }
}

// used for constructing a delivery booking before a carrier accepts it
#[derive(Debug, Default, Clone)]
pub struct DeliveryRequest {
    carrier_id: Option<String>,
    goods_type: Option<String>,
    weight_kg: u32,
    pickup_address: Option<String>,
    delivery_address: Option<String>,
    desired_date: Option<TimeStamp>,
}

/// A delivery request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOrder {
    pub carrier_id: String,
    pub goods_type: String,
    pub weight_kg: u32,
    pub pickup_address: String,
    pub delivery_address: String,
    pub desired_date: TimeStamp,
}

impl DeliveryRequest {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_carrier(mut self, carrier_id: impl Into<String>) -> Self {
        self.carrier_id = Some(carrier_id.into());
        self
    }
    pub fn set_goods_type(mut self, goods: impl Into<String>) -> Self {
        self.goods_type = Some(goods.into());
        self
    }
    pub fn set_weight_kg(mut self, weight: u32) -> Self {
        self.weight_kg = weight;
        self
    }
    pub fn set_pickup(mut self, address: impl Into<String>) -> Self {
        self.pickup_address = Some(address.into());
        self
    }
    pub fn set_dropoff(mut self, address: impl Into<String>) -> Self {
        self.delivery_address = Some(address.into());
        self
    }
    pub fn set_desired_date(mut self, date: TimeStamp) -> Self {
        self.desired_date = Some(date);
        self
    }

    pub fn validate_and_finalise(self) -> MarketResult<DeliveryOrder> {
        fn required(field: Option<String>, name: &str) -> MarketResult<String> {
            match field {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(MarketError::InvalidArgument(format!("{name} is not set"))),
            }
        }

        let carrier_id = required(self.carrier_id, "carrier")?;
        let goods_type = required(self.goods_type, "goods type")?;
        let pickup_address = required(self.pickup_address, "pickup address")?;
        let delivery_address = required(self.delivery_address, "delivery address")?;
        if self.weight_kg == 0 {
            return Err(MarketError::InvalidArgument("weight is set to zero".into()));
        }
        let desired_date = self
            .desired_date
            .ok_or_else(|| MarketError::InvalidArgument("desired date is not set".into()))?;

        Ok(DeliveryOrder {
            carrier_id,
            goods_type,
            weight_kg: self.weight_kg,
            pickup_address,
            delivery_address,
            desired_date,
        })
    }
}
