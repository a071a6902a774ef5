//! Land parcels offered for seasonal lease, and the requests against them
use crate::error::{MarketError, MarketResult};
use crate::status::{ReservationStatus, StatusChange};
use crate::store::Record;
use crate::types::{Money, TimeStamp};
use rust_decimal::Decimal;

/// A parcel is held by at most one lease at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum LandStatus {
    #[n(0)]
    Available,
    #[n(1)]
    Reserved, // a request is waiting on the owner
    #[n(2)]
    Leased,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LandListing {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub owner_id: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub location: Option<String>,
    #[cbor(n(4), with = "crate::types::decimal")]
    pub area_hectares: Decimal,
    #[n(5)]
    pub price_per_month: Money,
    #[n(6)]
    pub min_months: u32,
    #[n(7)]
    pub max_months: u32,
    #[n(8)]
    pub status: LandStatus,
    #[n(9)]
    pub listed_at: TimeStamp,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LeaseRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub listing_id: String,
    #[n(2)]
    pub owner_id: String,
    #[n(3)]
    pub requester_id: String,
    #[n(4)]
    pub months: u32,
    #[n(5)]
    pub amount: Money, // price_per_month * months, fixed at request time
    #[n(6)]
    pub status: ReservationStatus,
    #[n(7)]
    pub requested_at: TimeStamp,
    #[n(8)]
    pub history: Vec<StatusChange>,
}

impl Record for LandListing {
    const KIND: &'static str = "land";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for LeaseRequest {
    const KIND: &'static str = "lease";

    fn id(&self) -> &str {
        &self.id
    }
}

impl LandListing {
    pub fn accepts_duration(&self, months: u32) -> bool {
        (self.min_months..=self.max_months).contains(&months)
    }
}

// Draft of a listing, filled in by the owner before it is published
#[derive(Debug, Default, Clone)]
pub struct LandListingDraft {
    title: Option<String>,
    location: Option<String>,
    area_hectares: Option<Decimal>,
    price_per_month: Option<Money>,
    min_months: Option<u32>,
    max_months: Option<u32>,
}

/// Validated fields of a listing, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandTerms {
    pub title: String,
    pub location: Option<String>,
    pub area_hectares: Decimal,
    pub price_per_month: Money,
    pub min_months: u32,
    pub max_months: u32,
}

impl LandListingDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
    pub fn set_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
    pub fn set_area_hectares(mut self, area: Decimal) -> Self {
        self.area_hectares = Some(area);
        self
    }
    pub fn set_price_per_month(mut self, price: Money) -> Self {
        self.price_per_month = Some(price);
        self
    }
    pub fn set_season(mut self, min_months: u32, max_months: u32) -> Self {
        self.min_months = Some(min_months);
        self.max_months = Some(max_months);
        self
    }

    /// Take every field left unset from `current`, so an edit only names what changes.
    pub fn fill_from(self, current: &LandListing) -> Self {
        Self {
            title: self.title.or_else(|| Some(current.title.clone())),
            location: self.location.or_else(|| current.location.clone()),
            area_hectares: self.area_hectares.or(Some(current.area_hectares)),
            price_per_month: self.price_per_month.or(Some(current.price_per_month)),
            min_months: self.min_months.or(Some(current.min_months)),
            max_months: self.max_months.or(Some(current.max_months)),
        }
    }

    pub fn validate_and_finalise(self) -> MarketResult<LandTerms> {
        let title = match self.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(MarketError::InvalidArgument("listing title is not set".into())),
        };
        let area_hectares = self
            .area_hectares
            .filter(|area| *area > Decimal::ZERO)
            .ok_or_else(|| MarketError::InvalidArgument("area must be positive".into()))?;
        let price_per_month = self
            .price_per_month
            .filter(Money::is_positive)
            .ok_or_else(|| MarketError::InvalidArgument("monthly price must be positive".into()))?;

        // seasons default to one to twelve months
        let min_months = self.min_months.unwrap_or(1);
        let max_months = self.max_months.unwrap_or(12);
        if min_months == 0 || min_months > max_months {
            return Err(MarketError::InvalidArgument(format!(
                "season of {min_months} to {max_months} months is not a valid range"
            )));
        }

        Ok(LandTerms {
            title,
            location: self.location,
            area_hectares,
            price_per_month,
            min_months,
            max_months,
        })
    }
}
