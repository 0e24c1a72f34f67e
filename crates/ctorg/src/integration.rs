//! integration cascade
//!
//! An integration owns pull and push actions. They are its cascade targets, with one
//! exception: the pull called [PROTECTED_PULL] is managed by the service itself. It is never
//! deleted and never blocks anything.
use crate::batch::BatchReport;
use crate::client::ResourceClient;
use crate::error::Error;
use crate::execute::{execute, ExecutionReport};
use crate::plan::{DeletionPlan, ForcePolicy, Step};
use crate::resource::{Integration, IntegrationService};

pub const PROTECTED_PULL: &str = "ExternalValues";

/// A single step plan: pulls, then pushes, then the integration
pub fn plan_integration(
    client: &(impl ResourceClient + ?Sized),
    integration: &Integration,
    policy: ForcePolicy,
) -> Result<DeletionPlan, Error> {
    let pulls = client.list_pulls(integration)?;
    let pushes = client.list_pushes(integration)?;

    let cascade = pulls
        .into_iter()
        .filter(|pull| pull.name != PROTECTED_PULL)
        .chain(pushes)
        .collect();

    let step = Step::new(integration.to_ref(), cascade, policy);
    if step.blocked {
        tracing::warn!(
            integration = %integration.name,
            actions = step.cascade.len(),
            "integration has pulls or pushes, use force to remove everything"
        );
    }

    Ok(DeletionPlan {
        root: integration.to_ref(),
        policy,
        steps: vec![step],
    })
}

#[tracing::instrument(
    level = "debug",
    skip(client, integration),
    fields(integration = %integration.name)
)]
pub fn delete_integration(
    client: &(impl ResourceClient + ?Sized),
    integration: &Integration,
    policy: ForcePolicy,
    dry_run: bool,
) -> Result<ExecutionReport, Error> {
    let plan = plan_integration(client, integration, policy)?;
    Ok(execute(client, &plan, dry_run))
}

/// Integrations of one service, or of all of them in [IntegrationService::ALL] order
pub fn list_all_integrations(
    client: &(impl ResourceClient + ?Sized),
    service: Option<IntegrationService>,
) -> Result<Vec<Integration>, Error> {
    let mut integrations = vec![];
    for candidate in IntegrationService::ALL {
        if service.is_some_and(|service| service != candidate) {
            continue;
        }
        integrations.extend(client.list_integrations(candidate)?);
    }
    tracing::debug!(count = integrations.len(), "integrations found");
    Ok(integrations)
}

/// Deletes `integrations` one after another, a failing one does not stop the others
pub fn delete_integrations(
    client: &(impl ResourceClient + ?Sized),
    integrations: &[Integration],
    policy: ForcePolicy,
    dry_run: bool,
) -> BatchReport {
    let mut report = BatchReport::default();
    for integration in integrations {
        let result = delete_integration(client, integration, policy, dry_run);
        report.push(integration.to_ref(), result);
    }
    report
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::batch::ItemOutcome;
    use crate::execute::{Outcome, Status};
    use crate::memory::MemoryService;
    use pretty_assertions::assert_eq;

    fn vault(service: &MemoryService) -> Integration {
        let integration = service.add_integration("vault", IntegrationService::AzureKeyVault);
        service.add_pull(&integration, PROTECTED_PULL);
        service.add_pull(&integration, "sync-1");
        service.add_push(&integration, "push-1");
        integration
    }

    #[test]
    fn protected_pull_is_not_a_target() {
        let service = MemoryService::new();
        let integration = vault(&service);

        let plan = plan_integration(&service, &integration, ForcePolicy::Cascade).unwrap();
        let targets: Vec<_> = plan.targets().map(|r| r.name.as_str()).collect();
        assert_eq!(targets, vec!["sync-1", "push-1", "vault"]);
    }

    #[test]
    fn only_protected_pull_does_not_block() {
        let service = MemoryService::new();
        let integration = service.add_integration("aws-main", IntegrationService::Aws);
        let external = service.add_pull(&integration, PROTECTED_PULL);

        let report =
            delete_integration(&service, &integration, ForcePolicy::Refuse, false).unwrap();

        assert!(report.is_success());
        assert_eq!(service.deleted_names(), vec!["aws-main"]);
        assert!(service.exists(&external.url));
    }

    #[test]
    fn refuse_deletes_nothing() {
        let service = MemoryService::new();
        let integration = vault(&service);

        let report =
            delete_integration(&service, &integration, ForcePolicy::Refuse, false).unwrap();

        assert!(matches!(report.status, Status::Blocked { .. }));
        assert_eq!(service.mutation_count(), 0);
    }

    #[test]
    fn dry_run_lists_actions() {
        let service = MemoryService::new();
        let integration = vault(&service);

        let report =
            delete_integration(&service, &integration, ForcePolicy::Cascade, true).unwrap();

        assert_eq!(report.entries.len(), 3);
        assert!(report
            .entries
            .iter()
            .all(|entry| entry.outcome == Outcome::WouldDelete));
        assert_eq!(service.mutation_count(), 0);
    }

    #[test]
    fn listing_in_service_order() {
        let service = MemoryService::new();
        service.add_integration("gh", IntegrationService::Github);
        service.add_integration("kv", IntegrationService::AzureKeyVault);
        service.add_integration("s3", IntegrationService::Aws);

        let all = list_all_integrations(&service, None).unwrap();
        let names: Vec<_> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["s3", "kv", "gh"]);

        let github = list_all_integrations(&service, Some(IntegrationService::Github)).unwrap();
        assert_eq!(github.len(), 1);
        assert_eq!(github[0].name, "gh");
    }

    #[test]
    fn listing_failure_aborts_only_that_integration() {
        let service = MemoryService::new();
        let broken = service.add_integration("broken", IntegrationService::Aws);
        service.fail_listing(&broken.url);
        service.add_integration("fine", IntegrationService::Aws);
        let integrations = list_all_integrations(&service, None).unwrap();

        let report = delete_integrations(&service, &integrations, ForcePolicy::Cascade, false);

        assert!(!report.is_success());
        assert!(matches!(
            report.items[0].outcome,
            ItemOutcome::Aborted { .. }
        ));
        assert!(report.items[1].is_success());
        assert_eq!(service.deleted_names(), vec!["fine"]);
    }
}
