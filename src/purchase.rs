//! Produce listings and buyers' purchase requests
use crate::status::{ReservationStatus, StatusChange};
use crate::store::Record;
use crate::types::{Money, TimeStamp};

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Product {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub seller_id: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub unit_price: Money,
    #[n(4)]
    pub listed_at: TimeStamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuyerContact {
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct PurchaseRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub seller_id: String,
    #[n(3)]
    pub buyer_id: String,
    #[n(4)]
    pub quantity: u32,
    #[n(5)]
    pub total_price: Money,
    #[n(6)]
    pub buyer_name: String,
    #[n(7)]
    pub buyer_phone: String,
    #[n(8)]
    pub buyer_address: Option<String>,
    #[n(9)]
    pub buyer_message: Option<String>,
    #[n(10)]
    pub seller_response: Option<String>,
    #[n(11)]
    pub status: ReservationStatus,
    #[n(12)]
    pub requested_at: TimeStamp,
    #[n(13)]
    pub history: Vec<StatusChange>,
}

impl Record for Product {
    const KIND: &'static str = "product";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for PurchaseRequest {
    const KIND: &'static str = "purchase";

    fn id(&self) -> &str {
        &self.id
    }
}
