use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::notification::{NewNotification, NotificationKind, RelatedKind};
use crate::purchase::{BuyerContact, Product, PurchaseRequest};
use crate::status::{Flow, Parties, ReservationStatus, Transition, advance};
use crate::types::{Money, TimeStamp};
use tracing::info;

impl MarketService {
    pub fn list_product(
        &self,
        seller_id: &str,
        title: &str,
        unit_price: Money,
    ) -> MarketResult<Product> {
        if title.trim().is_empty() {
            return Err(MarketError::InvalidArgument("product title is empty".into()));
        }
        if !unit_price.is_positive() {
            return Err(MarketError::InvalidArgument(format!(
                "unit price must be positive, got {unit_price}"
            )));
        }

        let product = Product {
            id: self.new_id("product_")?,
            seller_id: seller_id.to_string(),
            title: title.to_string(),
            unit_price,
            listed_at: TimeStamp::now(),
        };
        self.store.put(&product)?;

        info!(product = %product.id, seller = seller_id, "product listed");
        Ok(product)
    }

    pub fn product(&self, product_id: &str) -> MarketResult<Product> {
        self.store.fetch(product_id)
    }

    pub fn request_purchase(
        &self,
        buyer_id: &str,
        product_id: &str,
        quantity: u32,
        contact: BuyerContact,
    ) -> MarketResult<PurchaseRequest> {
        let product: Product = self.store.fetch(product_id)?;
        if product.seller_id == buyer_id {
            return Err(MarketError::Forbidden(
                "you cannot buy your own product".into(),
            ));
        }
        if quantity == 0 {
            return Err(MarketError::InvalidArgument("quantity must be at least one".into()));
        }
        if contact.name.trim().is_empty() || contact.phone.trim().is_empty() {
            return Err(MarketError::InvalidArgument(
                "buyer name and phone are required".into(),
            ));
        }

        let request = PurchaseRequest {
            id: self.new_id("purchase_")?,
            product_id: product.id.clone(),
            seller_id: product.seller_id.clone(),
            buyer_id: buyer_id.to_string(),
            quantity,
            total_price: product.unit_price.times(quantity)?,
            buyer_name: contact.name,
            buyer_phone: contact.phone,
            buyer_address: contact.address,
            buyer_message: contact.message,
            seller_response: None,
            status: ReservationStatus::Pending,
            requested_at: TimeStamp::now(),
            history: vec![],
        };
        self.store.put(&request)?;
        info!(
            purchase = %request.id,
            product = product_id,
            total = %request.total_price,
            "purchase requested"
        );

        self.notify(
            NewNotification::new(
                &product.seller_id,
                NotificationKind::NewPurchaseRequest,
                "New purchase request",
                format!(
                    "{} would like {quantity} of {} for {}.",
                    request.buyer_name, product.title, request.total_price
                ),
            )
            .about(&request.id, RelatedKind::PurchaseRequest),
        );

        Ok(request)
    }

    /// Change the quantity of a pending request; the total is priced again from the product.
    pub fn update_purchase_quantity(
        &self,
        actor: &str,
        request_id: &str,
        quantity: u32,
    ) -> MarketResult<PurchaseRequest> {
        if quantity == 0 {
            return Err(MarketError::InvalidArgument("quantity must be at least one".into()));
        }

        let _guard = self.store.lock(request_id);

        let mut request: PurchaseRequest = self.store.fetch(request_id)?;
        if request.buyer_id != actor {
            return Err(MarketError::Forbidden(
                "only the buyer may change a purchase request".into(),
            ));
        }
        if request.status != ReservationStatus::Pending {
            return Err(MarketError::Conflict(format!(
                "purchase request {request_id} was already {:?}",
                request.status
            )));
        }

        let product: Product = self.store.fetch(&request.product_id)?;
        request.quantity = quantity;
        request.total_price = product.unit_price.times(quantity)?;
        self.store.put(&request)?;
        Ok(request)
    }

    pub fn accept_purchase(
        &self,
        actor: &str,
        request_id: &str,
        response: Option<&str>,
    ) -> MarketResult<PurchaseRequest> {
        self.transition_purchase(actor, request_id, Transition::Approve, response)
    }

    pub fn reject_purchase(
        &self,
        actor: &str,
        request_id: &str,
        response: Option<&str>,
    ) -> MarketResult<PurchaseRequest> {
        self.transition_purchase(actor, request_id, Transition::Reject, response)
    }

    pub fn cancel_purchase(&self, actor: &str, request_id: &str) -> MarketResult<PurchaseRequest> {
        self.transition_purchase(actor, request_id, Transition::Cancel, None)
    }

    pub fn purchase_request(&self, request_id: &str) -> MarketResult<Option<PurchaseRequest>> {
        self.store.get(request_id)
    }

    pub fn purchases_by_buyer(&self, buyer_id: &str) -> MarketResult<Vec<PurchaseRequest>> {
        let mut found = self
            .store
            .filter(|p: &PurchaseRequest| p.buyer_id == buyer_id)?;
        found.sort_by_key(|p| p.requested_at);
        Ok(found)
    }

    pub fn purchases_received(&self, seller_id: &str) -> MarketResult<Vec<PurchaseRequest>> {
        let mut found = self
            .store
            .filter(|p: &PurchaseRequest| p.seller_id == seller_id)?;
        found.sort_by_key(|p| p.requested_at);
        Ok(found)
    }

    fn transition_purchase(
        &self,
        actor: &str,
        request_id: &str,
        transition: Transition,
        response: Option<&str>,
    ) -> MarketResult<PurchaseRequest> {
        let _guard = self.store.lock(request_id);

        let mut request: PurchaseRequest = self.store.fetch(request_id)?;
        let product: Product = self.store.fetch(&request.product_id)?;
        let previous = request.status;

        let change = advance(
            Flow::Purchase,
            &Parties::new(&product.seller_id, &request.buyer_id),
            actor,
            transition,
            &mut request.status,
            &mut request.history,
        )?;
        if let Some(response) = response {
            request.seller_response = Some(response.to_string());
        }

        if transition == Transition::Cancel && self.removes_on_cancel(previous) {
            self.store.remove::<PurchaseRequest>(request_id)?;
        } else {
            self.store.put(&request)?;
        }
        info!(
            purchase = request_id,
            from = ?change.from,
            to = ?change.to,
            "purchase request updated"
        );

        let reply = request
            .seller_response
            .as_deref()
            .map(|r| format!(" The seller says: {r}"))
            .unwrap_or_default();
        let notice = match transition {
            Transition::Approve => Some(NewNotification::new(
                &request.buyer_id,
                NotificationKind::PurchaseAccepted,
                "Purchase accepted",
                format!("Your request for {} was accepted.{reply}", product.title),
            )),
            Transition::Reject => Some(NewNotification::new(
                &request.buyer_id,
                NotificationKind::PurchaseRejected,
                "Purchase declined",
                format!("Your request for {} was declined.{reply}", product.title),
            )),
            Transition::Cancel | Transition::Dispatch | Transition::Complete => None,
        };
        if let Some(notice) = notice {
            self.notify(notice.about(request_id, RelatedKind::PurchaseRequest));
        }

        Ok(request)
    }
}
