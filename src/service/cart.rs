use super::MarketService;
use crate::cart::{Cart, CartItem, Order};
use crate::error::{MarketError, MarketResult};
use crate::notification::{NewNotification, NotificationKind, RelatedKind};
use crate::purchase::Product;
use std::collections::BTreeSet;
use tracing::info;

fn cart_lock(user_id: &str) -> String {
    format!("cart/{user_id}")
}

impl MarketService {
    /// The user's cart. A user who never added anything has an empty one.
    pub fn cart(&self, user_id: &str) -> MarketResult<Cart> {
        Ok(self
            .store
            .get::<Cart>(user_id)?
            .unwrap_or_else(|| Cart::empty(user_id)))
    }

    /// Put `quantity` of a product in the cart, merging with a line already there.
    pub fn add_to_cart(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> MarketResult<CartItem> {
        let _guard = self.store.lock(&cart_lock(user_id));

        let product: Product = self.store.fetch(product_id)?;
        if product.seller_id == user_id {
            return Err(MarketError::Forbidden(
                "you cannot buy your own product".into(),
            ));
        }

        let mut cart = self.cart(user_id)?;
        let item = cart.add(&product, quantity, self.new_id("cartitem_")?)?.clone();
        self.store.put(&cart)?;

        info!(user = user_id, product = product_id, quantity = item.quantity, "cart updated");
        Ok(item)
    }

    pub fn update_cart_item(
        &self,
        user_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> MarketResult<CartItem> {
        let _guard = self.store.lock(&cart_lock(user_id));

        let mut cart = self.cart(user_id)?;
        let item = cart.set_quantity(item_id, quantity)?.clone();
        self.store.put(&cart)?;
        Ok(item)
    }

    pub fn remove_cart_item(&self, user_id: &str, item_id: &str) -> MarketResult<CartItem> {
        let _guard = self.store.lock(&cart_lock(user_id));

        let mut cart = self.cart(user_id)?;
        let item = cart.remove(item_id)?;
        self.store.put(&cart)?;
        Ok(item)
    }

    pub fn clear_cart(&self, user_id: &str) -> MarketResult<()> {
        let _guard = self.store.lock(&cart_lock(user_id));

        self.store.remove::<Cart>(user_id)?;
        Ok(())
    }

    /// Check the cart out as a paid order. The order is stored and the cart emptied together.
    pub fn checkout(&self, user_id: &str) -> MarketResult<Order> {
        let _guard = self.store.lock(&cart_lock(user_id));

        let cart = self.cart(user_id)?;
        let order = cart.to_order(self.new_id("order_")?)?;

        let mut writes = self.store.write_set();
        writes.put(&order)?.delete::<Cart>(user_id);
        writes.commit(&self.store)?;
        info!(
            order = %order.id,
            user = user_id,
            lines = order.items.len(),
            total = %order.total,
            "order placed"
        );

        let sellers: BTreeSet<&str> = order.items.iter().map(|i| i.seller_id.as_str()).collect();
        for seller in sellers {
            self.notify(
                NewNotification::new(
                    seller,
                    NotificationKind::NewOrder,
                    "New order",
                    format!("{user_id} placed an order including your produce."),
                )
                .about(&order.id, RelatedKind::Order),
            );
        }

        Ok(order)
    }

    pub fn orders_by_buyer(&self, user_id: &str) -> MarketResult<Vec<Order>> {
        let mut found = self.store.filter(|o: &Order| o.buyer_id == user_id)?;
        found.sort_by_key(|o| o.created_at);
        Ok(found)
    }
}
