//! Crowdfunding: targets, minimums and withdrawals

use farm_market::MarketService;
use farm_market::config::MarketConfig;
use farm_market::funding::{ContributionStatus, ProjectStatus};
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
fn contributions_fill_the_target_exactly() -> anyhow::Result<()> {
    let (_dir, service) = market("target.db")?;
    let project = service.create_project(
        "farmer_nour",
        "Solar pump",
        Money::from_major(1000),
        Money::from_major(50),
    )?;

    service.contribute("backer_a", &project.id, Money::from_major(400))?;

    let err = service
        .contribute("backer_b", &project.id, Money::from_major(700))
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(service.project(&project.id)?.raised, Money::from_major(400));

    service.contribute("backer_b", &project.id, Money::from_major(600))?;
    let project = service.project(&project.id)?;
    assert_eq!(project.raised, Money::from_major(1000));
    assert_eq!(project.status, ProjectStatus::Funded);

    let err = service
        .contribute("backer_c", &project.id, Money::from_major(50))
        .unwrap_err();
    assert!(err.is_conflict());

    assert_eq!(service.contributions_for_project(&project.id)?.len(), 2);

    let notes = service.notifications().for_user("farmer_nour")?;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::ProjectFunded);
    Ok(())
}

#[test]
fn project_terms_are_validated() -> anyhow::Result<()> {
    let (_dir, service) = market("terms.db")?;

    let bad_target = service
        .create_project("farmer_nour", "Barn", Money::ZERO, Money::from_major(1))
        .unwrap_err();
    assert!(bad_target.is_invalid_argument());

    let bad_minimum = service
        .create_project("farmer_nour", "Barn", Money::from_major(100), Money::from_major(101))
        .unwrap_err();
    assert!(bad_minimum.is_invalid_argument());

    let project = service.create_project(
        "farmer_nour",
        "Barn",
        Money::from_major(100),
        Money::from_major(10),
    )?;
    let err = service
        .contribute("backer_a", &project.id, Money::parse("9.99")?)
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let err = service
        .contribute("farmer_nour", &project.id, Money::from_major(10))
        .unwrap_err();
    assert!(err.is_forbidden());
    Ok(())
}

#[test]
fn withdrawal_returns_the_amount_while_raising() -> anyhow::Result<()> {
    let (_dir, service) = market("withdraw.db")?;
    let project = service.create_project(
        "farmer_nour",
        "Cold room",
        Money::from_major(500),
        Money::from_major(20),
    )?;

    let pledge = service.contribute("backer_a", &project.id, Money::parse("120.50")?)?;
    assert!(
        service
            .withdraw_contribution("backer_b", &pledge.id)
            .unwrap_err()
            .is_forbidden()
    );

    let pledge = service.withdraw_contribution("backer_a", &pledge.id)?;
    assert_eq!(pledge.status, ContributionStatus::Withdrawn);
    assert_eq!(service.project(&project.id)?.raised, Money::ZERO);

    let err = service.withdraw_contribution("backer_a", &pledge.id).unwrap_err();
    assert!(err.is_conflict());
    Ok(())
}

#[test]
fn funded_and_closed_projects_are_locked() -> anyhow::Result<()> {
    let (_dir, service) = market("locked.db")?;
    let project = service.create_project(
        "farmer_nour",
        "Greenhouse",
        Money::from_major(200),
        Money::from_major(20),
    )?;
    let pledge = service.contribute("backer_a", &project.id, Money::from_major(200))?;

    let err = service.withdraw_contribution("backer_a", &pledge.id).unwrap_err();
    assert!(err.is_conflict());
    assert!(service.close_project("farmer_nour", &project.id).unwrap_err().is_conflict());

    let other = service.create_project(
        "farmer_nour",
        "Fence",
        Money::from_major(200),
        Money::from_major(20),
    )?;
    assert!(service.close_project("backer_a", &other.id).unwrap_err().is_forbidden());
    let closed = service.close_project("farmer_nour", &other.id)?;
    assert_eq!(closed.status, ProjectStatus::Closed);
    assert!(
        service
            .contribute("backer_a", &other.id, Money::from_major(20))
            .unwrap_err()
            .is_conflict()
    );
    Ok(())
}
