//! Carts of produce and checkout into paid orders

use farm_market::MarketService;
use farm_market::cart::OrderStatus;
use farm_market::config::MarketConfig;
use farm_market::notification::NotificationKind;
use farm_market::store::Store;
use farm_market::types::Money;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

fn market(name: &str) -> anyhow::Result<(TempDir, MarketService)> {
    let temp_dir = tempdir()?;
    let db = sled::open(temp_dir.path().join(name))?;
    let service = MarketService::new(Store::new(Arc::new(db)), MarketConfig::default());
    Ok((temp_dir, service))
}

#[test]
fn adding_a_product_twice_grows_one_line() -> anyhow::Result<()> {
    let (_dir, service) = market("merge.db")?;
    let figs = service.list_product("seller_ines", "Dried figs (kg)", Money::parse("6.40")?)?;

    let first = service.add_to_cart("buyer_salma", &figs.id, 2)?;
    let second = service.add_to_cart("buyer_salma", &figs.id, 3)?;
    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 5);

    let cart = service.cart("buyer_salma")?;
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total()?, Money::parse("32.00")?);
    Ok(())
}

#[test]
fn lines_can_be_changed_and_removed() -> anyhow::Result<()> {
    let (_dir, service) = market("edit.db")?;
    let figs = service.list_product("seller_ines", "Dried figs (kg)", Money::parse("6.40")?)?;
    let oil = service.list_product("seller_ines", "Olive oil (l)", Money::from_major(12))?;

    let figs_line = service.add_to_cart("buyer_salma", &figs.id, 1)?;
    let oil_line = service.add_to_cart("buyer_salma", &oil.id, 1)?;

    assert_eq!(service.update_cart_item("buyer_salma", &oil_line.id, 4)?.quantity, 4);
    assert!(
        service
            .update_cart_item("buyer_salma", &oil_line.id, 0)
            .unwrap_err()
            .is_invalid_argument()
    );
    // another user's cart does not hold this line
    assert!(
        service
            .update_cart_item("buyer_karim", &oil_line.id, 2)
            .unwrap_err()
            .is_not_found()
    );

    service.remove_cart_item("buyer_salma", &figs_line.id)?;
    assert!(
        service
            .remove_cart_item("buyer_salma", &figs_line.id)
            .unwrap_err()
            .is_not_found()
    );
    assert_eq!(service.cart("buyer_salma")?.total()?, Money::from_major(48));

    service.clear_cart("buyer_salma")?;
    assert!(service.cart("buyer_salma")?.is_empty());
    Ok(())
}

#[test]
fn invalid_additions_are_refused() -> anyhow::Result<()> {
    let (_dir, service) = market("refuse.db")?;
    let figs = service.list_product("seller_ines", "Dried figs (kg)", Money::parse("6.40")?)?;

    assert!(service.add_to_cart("buyer_salma", &figs.id, 0).unwrap_err().is_invalid_argument());
    assert!(service.add_to_cart("seller_ines", &figs.id, 1).unwrap_err().is_forbidden());
    assert!(service.add_to_cart("buyer_salma", "product_missing", 1).unwrap_err().is_not_found());
    assert!(service.cart("buyer_salma")?.is_empty());
    Ok(())
}

#[test]
fn checkout_places_a_paid_order_and_empties_the_cart() -> anyhow::Result<()> {
    let (_dir, service) = market("checkout.db")?;
    let figs = service.list_product("seller_ines", "Dried figs (kg)", Money::parse("6.40")?)?;
    let honey = service.list_product("seller_nour", "Thyme honey (jar)", Money::from_major(25))?;

    service.add_to_cart("buyer_salma", &figs.id, 3)?;
    service.add_to_cart("buyer_salma", &honey.id, 2)?;

    let order = service.checkout("buyer_salma")?;
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.total, Money::parse("69.20")?);
    assert_eq!(order.items.len(), 2);
    assert!(service.cart("buyer_salma")?.is_empty());
    assert_eq!(service.orders_by_buyer("buyer_salma")?, vec![order.clone()]);

    let inbox = service.notifications();
    for seller in ["seller_ines", "seller_nour"] {
        let notes = inbox.for_user(seller)?;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::NewOrder);
    }

    // nothing left to check out
    assert!(service.checkout("buyer_salma").unwrap_err().is_not_found());
    assert_eq!(service.orders_by_buyer("buyer_salma")?.len(), 1);
    Ok(())
}

#[test]
fn a_cart_too_large_to_price_is_not_checked_out() -> anyhow::Result<()> {
    let (_dir, service) = market("price.db")?;
    let saffron = service.list_product(
        "seller_ines",
        "Saffron (bulk)",
        Money::parse("10000000000000000000000000")?,
    )?;
    let figs = service.list_product("seller_ines", "Dried figs (kg)", Money::parse("6.40")?)?;

    service.add_to_cart("buyer_salma", &saffron.id, 100_000)?;
    // the cart accepts the line but cannot price it
    assert!(service.checkout("buyer_salma").unwrap_err().is_invalid_argument());
    assert_eq!(service.cart("buyer_salma")?.items.len(), 1);
    assert!(service.orders_by_buyer("buyer_salma")?.is_empty());

    service.clear_cart("buyer_salma")?;
    service.add_to_cart("buyer_salma", &figs.id, 1)?;
    assert_eq!(service.checkout("buyer_salma")?.total, Money::parse("6.40")?);
    Ok(())
}
