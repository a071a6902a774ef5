//! A short tour of the marketplace against a local sled database.
//!
//! ```text
//! MARKET_DB_PATH=/tmp/market.db RUST_LOG=debug cargo run --example marketplace
//! ```
use anyhow::Context;
use farm_market::MarketService;
use farm_market::config::MarketConfig;
use farm_market::freight::DeliveryRequest;
use farm_market::lease::LandListingDraft;
use farm_market::service::NewCarrier;
use farm_market::store::Store;
use farm_market::telemetry::init_logger;
use farm_market::types::{Money, TimeStamp};
use farm_market::utils::new_uuid_to_bech32;
use rust_decimal::Decimal;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = MarketConfig::from_env()?;
    init_logger(&config)?;

    let store = Store::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let service = MarketService::new(store, config);

    let farmer = new_uuid_to_bech32("user_")?;
    let neighbour = new_uuid_to_bech32("user_")?;
    let haulier = new_uuid_to_bech32("user_")?;

    // equipment
    let tractor =
        service.list_equipment(&farmer, "Tractor 75hp", Some("tractor"), Money::from_major(120))?;
    let start = TimeStamp::now().plus_days(1);
    let booking = service.request_booking(&neighbour, &tractor.id, start, start.plus_days(3))?;
    let booking = service.approve_booking(&farmer, &booking.id)?;
    info!(booking = %booking.id, status = ?booking.status, "tractor booked");

    // land
    let land = service.list_land(
        &farmer,
        LandListingDraft::new()
            .set_title("Irrigated plot")
            .set_area_hectares(Decimal::from(2))
            .set_price_per_month(Money::from_major(250))
            .set_season(3, 6),
    )?;
    let lease = service.request_lease(&neighbour, &land.id, 4)?;
    service.approve_lease(&farmer, &lease.id)?;
    info!(lease = %lease.id, amount = %lease.amount, "plot leased");

    // funding
    let project = service.create_project(
        &farmer,
        "Drip irrigation",
        Money::from_major(1000),
        Money::from_major(50),
    )?;
    service.contribute(&neighbour, &project.id, Money::from_major(1000))?;
    info!(status = ?service.project(&project.id)?.status, "project raised");

    // freight
    let carrier = service.register_carrier(
        &haulier,
        NewCarrier {
            company_name: "Sahel Transport".into(),
            vehicle_type: Some("refrigerated truck".into()),
            capacity_kg: 8000,
            price_per_km: Money::parse("1.20")?,
            price_per_tonne: Some(Money::from_major(15)),
        },
    )?;
    for quote in service.suggest_carriers(&farmer, 2500, "Sfax", "Tunis")? {
        info!(carrier = %quote.company_name, cost = %quote.estimated_cost, "quote");
    }
    let delivery = service.book_delivery(
        &farmer,
        DeliveryRequest::new()
            .set_carrier(&carrier.id)
            .set_goods_type("olives")
            .set_weight_kg(2500)
            .set_pickup("Sfax")
            .set_dropoff("Tunis")
            .set_desired_date(start),
    )?;
    service.approve_delivery(&haulier, &delivery.id)?;
    service.dispatch_delivery(&haulier, &delivery.id)?;
    service.record_tracking(&haulier, &delivery.id, "El Jem", "on schedule")?;
    service.complete_delivery(&haulier, &delivery.id)?;
    let carrier = service.review_delivery(&farmer, &delivery.id, 5)?;
    info!(rating = %carrier.average_rating, "delivery reviewed");

    // produce
    let oil = service.list_product(&farmer, "Olive oil (l)", Money::parse("11.50")?)?;
    service.add_to_cart(&neighbour, &oil.id, 6)?;
    let order = service.checkout(&neighbour)?;
    info!(order = %order.id, total = %order.total, "order paid");

    let inbox = service.notifications();
    for note in inbox.for_user(&neighbour)? {
        info!(title = %note.title, message = %note.message, "notification");
    }
    info!(unread = inbox.unread_count(&farmer)?, "farmer inbox");

    Ok(())
}
