use super::MarketService;
use crate::error::{MarketError, MarketResult};
use crate::funding::{Contribution, ContributionStatus, CrowdfundingProject, ProjectStatus};
use crate::notification::{NewNotification, NotificationKind, RelatedKind};
use crate::types::{Money, TimeStamp};
use tracing::info;

impl MarketService {
    pub fn create_project(
        &self,
        owner_id: &str,
        title: &str,
        target: Money,
        minimum_contribution: Money,
    ) -> MarketResult<CrowdfundingProject> {
        if title.trim().is_empty() {
            return Err(MarketError::InvalidArgument("project title is empty".into()));
        }
        if !target.is_positive() {
            return Err(MarketError::InvalidArgument(format!(
                "funding target must be positive, got {target}"
            )));
        }
        if !minimum_contribution.is_positive() || minimum_contribution > target {
            return Err(MarketError::InvalidArgument(format!(
                "minimum contribution of {minimum_contribution} must be between zero and {target}"
            )));
        }

        let project = CrowdfundingProject {
            id: self.new_id("project_")?,
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            target,
            raised: Money::ZERO,
            minimum_contribution,
            status: ProjectStatus::Active,
            created_at: TimeStamp::now(),
        };
        self.store.put(&project)?;

        info!(project = %project.id, %target, "project created");
        Ok(project)
    }

    pub fn project(&self, project_id: &str) -> MarketResult<CrowdfundingProject> {
        self.store.fetch(project_id)
    }

    /// Pledge `amount` to a project. The contribution and the new total are stored together.
    pub fn contribute(
        &self,
        contributor_id: &str,
        project_id: &str,
        amount: Money,
    ) -> MarketResult<Contribution> {
        let _guard = self.store.lock(project_id);

        let mut project: CrowdfundingProject = self.store.fetch(project_id)?;
        if project.owner_id == contributor_id {
            return Err(MarketError::Forbidden(
                "you cannot fund your own project".into(),
            ));
        }
        project.record_contribution(amount)?;

        let contribution = Contribution {
            id: self.new_id("contribution_")?,
            project_id: project.id.clone(),
            contributor_id: contributor_id.to_string(),
            amount,
            status: ContributionStatus::Committed,
            contributed_at: TimeStamp::now(),
        };

        let mut writes = self.store.write_set();
        writes.put(&contribution)?.put(&project)?;
        writes.commit(&self.store)?;
        info!(
            project = project_id,
            %amount,
            raised = %project.raised,
            status = ?project.status,
            "contribution recorded"
        );

        if project.status == ProjectStatus::Funded {
            self.notify(
                NewNotification::new(
                    &project.owner_id,
                    NotificationKind::ProjectFunded,
                    "Project funded",
                    format!("{} reached its target of {}.", project.title, project.target),
                )
                .about(project_id, RelatedKind::Project),
            );
        }

        Ok(contribution)
    }

    /// Take a contribution back while the project is still raising.
    pub fn withdraw_contribution(
        &self,
        actor: &str,
        contribution_id: &str,
    ) -> MarketResult<Contribution> {
        let project_id = self
            .store
            .fetch::<Contribution>(contribution_id)?
            .project_id;
        let _guard = self.store.lock(&project_id);

        let mut contribution: Contribution = self.store.fetch(contribution_id)?;
        if contribution.contributor_id != actor {
            return Err(MarketError::Forbidden(
                "only the contributor may withdraw a contribution".into(),
            ));
        }
        if contribution.status == ContributionStatus::Withdrawn {
            return Err(MarketError::Conflict(format!(
                "contribution {contribution_id} was already withdrawn"
            )));
        }

        let mut project: CrowdfundingProject = self.store.fetch(&project_id)?;
        project.reverse_contribution(contribution.amount)?;
        contribution.status = ContributionStatus::Withdrawn;

        let mut writes = self.store.write_set();
        writes.put(&contribution)?.put(&project)?;
        writes.commit(&self.store)?;
        info!(project = %project_id, amount = %contribution.amount, "contribution withdrawn");

        Ok(contribution)
    }

    /// Stop raising. Only an active project can be closed.
    pub fn close_project(
        &self,
        actor: &str,
        project_id: &str,
    ) -> MarketResult<CrowdfundingProject> {
        let _guard = self.store.lock(project_id);

        let mut project: CrowdfundingProject = self.store.fetch(project_id)?;
        if project.owner_id != actor {
            return Err(MarketError::Forbidden("not your project".into()));
        }
        if project.status != ProjectStatus::Active {
            return Err(MarketError::Conflict(format!(
                "project {project_id} is already {:?}",
                project.status
            )));
        }

        project.status = ProjectStatus::Closed;
        self.store.put(&project)?;
        info!(project = project_id, raised = %project.raised, "project closed");
        Ok(project)
    }

    pub fn contributions_for_project(&self, project_id: &str) -> MarketResult<Vec<Contribution>> {
        let mut found = self
            .store
            .filter(|c: &Contribution| c.project_id == project_id)?;
        found.sort_by_key(|c| c.contributed_at);
        Ok(found)
    }
}
