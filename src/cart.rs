//! Shopping carts of produce and the orders checked out from them
use crate::error::{MarketError, MarketResult};
use crate::purchase::Product;
use crate::store::Record;
use crate::types::{Money, TimeStamp};

/// One cart per user, stored under the user's id.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Cart {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub items: Vec<CartItem>,
    #[n(2)]
    pub updated_at: TimeStamp,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct CartItem {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub unit_price: Money, // copied from the product when first added
    #[n(4)]
    pub quantity: u32,
    #[n(5)]
    pub seller_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum OrderStatus {
    #[n(0)]
    Paid,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Order {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub buyer_id: String,
    #[n(2)]
    pub items: Vec<OrderItem>,
    #[n(3)]
    pub total: Money,
    #[n(4)]
    pub status: OrderStatus,
    #[n(5)]
    pub created_at: TimeStamp,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct OrderItem {
    #[n(0)]
    pub product_id: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub unit_price: Money,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub seller_id: String,
}

impl Record for Cart {
    const KIND: &'static str = "cart";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Order {
    const KIND: &'static str = "order";

    fn id(&self) -> &str {
        &self.id
    }
}

impl CartItem {
    pub fn subtotal(&self) -> MarketResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

impl Cart {
    pub fn empty(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            items: vec![],
            updated_at: TimeStamp::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` of `product`. A product already in the cart keeps its line and
    /// price; only the quantity grows. `item_id` is used when a new line is needed.
    pub fn add(
        &mut self,
        product: &Product,
        quantity: u32,
        item_id: String,
    ) -> MarketResult<&CartItem> {
        if quantity == 0 {
            return Err(MarketError::InvalidArgument("quantity must be at least one".into()));
        }

        let index = match self.items.iter().position(|i| i.product_id == product.id) {
            Some(index) => {
                let item = &mut self.items[index];
                item.quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
                    MarketError::InvalidArgument(format!(
                        "{} more of {} would overflow the cart",
                        quantity, item.title
                    ))
                })?;
                index
            }
            None => {
                self.items.push(CartItem {
                    id: item_id,
                    product_id: product.id.clone(),
                    title: product.title.clone(),
                    unit_price: product.unit_price,
                    quantity,
                    seller_id: product.seller_id.clone(),
                });
                self.items.len() - 1
            }
        };
        self.updated_at = TimeStamp::now();
        Ok(&self.items[index])
    }

    pub fn set_quantity(&mut self, item_id: &str, quantity: u32) -> MarketResult<&CartItem> {
        if quantity == 0 {
            return Err(MarketError::InvalidArgument("quantity must be at least one".into()));
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| MarketError::not_found("cart item", item_id))?;
        item.quantity = quantity;
        self.updated_at = TimeStamp::now();
        Ok(item)
    }

    pub fn remove(&mut self, item_id: &str) -> MarketResult<CartItem> {
        let index = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| MarketError::not_found("cart item", item_id))?;
        self.updated_at = TimeStamp::now();
        Ok(self.items.remove(index))
    }

    /// Sum of unit price times quantity over every line.
    pub fn total(&self) -> MarketResult<Money> {
        let subtotals = self
            .items
            .iter()
            .map(CartItem::subtotal)
            .collect::<MarketResult<Vec<_>>>()?;
        Money::checked_sum(subtotals)
    }

    /// Turn the cart into a paid order. The cart itself is left to the caller to clear.
    pub fn to_order(&self, order_id: String) -> MarketResult<Order> {
        if self.is_empty() {
            return Err(MarketError::not_found("cart with items for", self.id.clone()));
        }

        Ok(Order {
            id: order_id,
            buyer_id: self.id.clone(),
            total: self.total()?,
            items: self
                .items
                .iter()
                .map(|i| OrderItem {
                    product_id: i.product_id.clone(),
                    title: i.title.clone(),
                    unit_price: i.unit_price,
                    quantity: i.quantity,
                    seller_id: i.seller_id.clone(),
                })
                .collect(),
            status: OrderStatus::Paid,
            created_at: TimeStamp::now(),
        })
    }
}
