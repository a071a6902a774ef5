//! Crowdfunded farm projects and the contributions that raise them
use crate::error::{MarketError, MarketResult};
use crate::store::Record;
use crate::types::{Money, TimeStamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ProjectStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Funded,
    #[n(2)]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ContributionStatus {
    #[n(0)]
    Committed,
    #[n(1)]
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct CrowdfundingProject {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub owner_id: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub target: Money,
    #[n(4)]
    pub raised: Money,
    #[n(5)]
    pub minimum_contribution: Money,
    #[n(6)]
    pub status: ProjectStatus,
    #[n(7)]
    pub created_at: TimeStamp,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Contribution {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub project_id: String,
    #[n(2)]
    pub contributor_id: String,
    #[n(3)]
    pub amount: Money,
    #[n(4)]
    pub status: ContributionStatus,
    #[n(5)]
    pub contributed_at: TimeStamp,
}

impl Record for CrowdfundingProject {
    const KIND: &'static str = "project";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Contribution {
    const KIND: &'static str = "contribution";

    fn id(&self) -> &str {
        &self.id
    }
}

impl CrowdfundingProject {
    pub fn remaining(&self) -> Money {
        self.target - self.raised
    }

    pub fn is_funded(&self) -> bool {
        self.raised >= self.target
    }

    /// Check `amount` against the project's rules without changing anything.
    pub fn check_contribution(&self, amount: Money) -> MarketResult<()> {
        if self.status != ProjectStatus::Active {
            return Err(MarketError::Conflict(format!(
                "project {} is {:?} and takes no contributions",
                self.id, self.status
            )));
        }
        if amount < self.minimum_contribution {
            return Err(MarketError::InvalidArgument(format!(
                "contribution of {amount} is below the minimum of {}",
                self.minimum_contribution
            )));
        }
        if amount > self.remaining() {
            return Err(MarketError::InvalidArgument(format!(
                "contribution of {amount} exceeds the remaining {}",
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Add a checked contribution; flips the project to `Funded` once the target is met.
    pub fn record_contribution(&mut self, amount: Money) -> MarketResult<()> {
        self.check_contribution(amount)?;
        self.raised = self.raised.checked_add(amount)?;
        if self.is_funded() {
            self.status = ProjectStatus::Funded;
        }
        Ok(())
    }

    /// Reverse a contribution while the project is still raising.
    pub fn reverse_contribution(&mut self, amount: Money) -> MarketResult<()> {
        if self.status != ProjectStatus::Active {
            return Err(MarketError::Conflict(format!(
                "project {} is {:?}; contributions are locked",
                self.id, self.status
            )));
        }
        if amount > self.raised {
            return Err(MarketError::InvalidArgument(format!(
                "cannot reverse {amount}, only {} raised",
                self.raised
            )));
        }
        self.raised -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(target: i64, minimum: i64) -> CrowdfundingProject {
        CrowdfundingProject {
            id: "project_1".into(),
            owner_id: "farmer".into(),
            title: "Drip irrigation".into(),
            target: Money::from_major(target),
            raised: Money::ZERO,
            minimum_contribution: Money::from_major(minimum),
            status: ProjectStatus::Active,
            created_at: TimeStamp::now(),
        }
    }

    #[test]
    fn exact_remaining_funds_the_project() {
        let mut p = project(1000, 50);
        p.record_contribution(Money::from_major(400)).unwrap();

        let err = p.record_contribution(Money::from_major(700)).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(p.raised, Money::from_major(400));

        p.record_contribution(Money::from_major(600)).unwrap();
        assert_eq!(p.raised, Money::from_major(1000));
        assert_eq!(p.status, ProjectStatus::Funded);

        let err = p.record_contribution(Money::from_major(50)).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn minimum_is_enforced() {
        let mut p = project(1000, 50);
        let err = p.record_contribution(Money::parse("49.99").unwrap()).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(p.raised, Money::ZERO);
    }

    #[test]
    fn reversal_lowers_raised_only_while_active() {
        let mut p = project(1000, 50);
        p.record_contribution(Money::from_major(300)).unwrap();
        p.reverse_contribution(Money::from_major(300)).unwrap();
        assert_eq!(p.raised, Money::ZERO);

        p.record_contribution(Money::from_major(1000)).unwrap();
        assert!(p.reverse_contribution(Money::from_major(100)).unwrap_err().is_conflict());
    }
}
