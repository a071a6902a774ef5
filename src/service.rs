//! Service layer API for marketplace operations
//!
//! `MarketService` is the single entry point callers use. Every mutating
//! operation takes the acting user's id, authorizes it against the records
//! involved, applies the business rules and writes all affected records in
//! one batch. Notifications are sent after the batch commits and never fail
//! the operation that triggered them.
use crate::config::{CancelPolicy, MarketConfig};
use crate::error::MarketResult;
use crate::freight::{DistanceOracle, FixedDistance};
use crate::notification::{NewNotification, NotificationCenter, Notifier};
use crate::status::ReservationStatus;
use crate::store::Store;
use crate::utils::new_record_id;
use std::sync::Arc;
use tracing::warn;

mod booking;
mod cart;
mod freight;
mod funding;
mod lease;
mod purchase;

pub use freight::NewCarrier;
pub use lease::RentalStats;

pub struct MarketService {
    store: Store,
    notifier: Arc<dyn Notifier>,
    distances: Arc<dyn DistanceOracle>,
    config: MarketConfig,
}

impl MarketService {
    /// Notifications go to the sled inbox in `store`; distances come from
    /// `config.default_distance_km` until another oracle is supplied.
    pub fn new(store: Store, config: MarketConfig) -> Self {
        Self {
            notifier: Arc::new(NotificationCenter::new(store.clone())),
            distances: Arc::new(FixedDistance(config.default_distance_km)),
            store,
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_distance_oracle(mut self, distances: Arc<dyn DistanceOracle>) -> Self {
        self.distances = distances;
        self
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The inbox users read their notifications from.
    pub fn notifications(&self) -> NotificationCenter {
        NotificationCenter::new(self.store.clone())
    }

    // best effort: a lost notification is logged, never surfaced
    fn notify(&self, notice: NewNotification) {
        let recipient = notice.recipient_id.clone();
        let kind = notice.kind;
        if let Err(error) = self.notifier.emit(notice) {
            warn!(%recipient, ?kind, %error, "failed to record notification");
        }
    }

    fn new_id(&self, hrp: &str) -> MarketResult<String> {
        new_record_id(hrp)
    }

    /// Whether a cancellation from `previous` removes the record instead of keeping it.
    fn removes_on_cancel(&self, previous: ReservationStatus) -> bool {
        self.config.cancel_policy == CancelPolicy::Delete && previous == ReservationStatus::Pending
    }
}
