//! plan execution
//!
//! Walks a [DeletionPlan] step by step. Within a step the cascade targets go first, then the
//! step's resource.
//!
//! - a blocked step ends the run before anything of it is touched
//! - a failed delete is recorded and the run continues
//! - "not found" on delete counts as done
//!
//! A dry run walks the same path, gate included, and only records what it would delete.
use crate::client::{Deleted, ResourceClient};
use crate::error::Error;
use crate::plan::DeletionPlan;
use crate::resource::ResourceRef;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Deleted,
    AlreadyGone,
    WouldDelete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    #[serde(flatten)]
    pub target: ResourceRef,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Entry {
    fn new(target: &ResourceRef, outcome: Outcome) -> Self {
        Self {
            target: target.clone(),
            outcome,
            error: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Status {
    Success,
    Failed {
        failed: usize,
    },
    Blocked {
        resource: ResourceRef,
        dependents: Vec<ResourceRef>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub root: ResourceRef,
    pub dry_run: bool,
    #[serde(flatten)]
    pub status: Status,
    /// In the order the deletes were issued
    pub entries: Vec<Entry>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Maps a blocked or failed report to the matching [Error]
    pub fn error(&self) -> Option<Error> {
        match &self.status {
            Status::Success => None,
            Status::Failed { failed } => Some(Error::PartialFailure {
                failed: *failed,
                attempted: self.entries.len(),
            }),
            Status::Blocked {
                resource,
                dependents,
            } => Some(Error::BlockedByDependents {
                resource: resource.clone(),
                dependents: dependents.clone(),
            }),
        }
    }

    /// Targets that are gone (or would be, for a dry run)
    pub fn completed(&self) -> impl Iterator<Item = &ResourceRef> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_failure())
            .map(|entry| &entry.target)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| entry.is_failure())
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(root = %plan.root.name, dry_run = dry_run))]
pub fn execute(
    client: &(impl ResourceClient + ?Sized),
    plan: &DeletionPlan,
    dry_run: bool,
) -> ExecutionReport {
    let mut entries = Vec::new();

    for step in &plan.steps {
        if step.blocked {
            tracing::warn!(
                resource = %step.resource,
                dependents = step.cascade.len(),
                "refusing to delete without force"
            );
            return ExecutionReport {
                root: plan.root.clone(),
                dry_run,
                status: Status::Blocked {
                    resource: step.resource.clone(),
                    dependents: step.cascade.clone(),
                },
                entries,
            };
        }

        for target in step.targets() {
            entries.push(delete(client, target, dry_run));
        }
    }

    let failed = entries.iter().filter(|entry| entry.is_failure()).count();
    let status = if failed == 0 {
        Status::Success
    } else {
        Status::Failed { failed }
    };

    ExecutionReport {
        root: plan.root.clone(),
        dry_run,
        status,
        entries,
    }
}

fn delete(client: &(impl ResourceClient + ?Sized), target: &ResourceRef, dry_run: bool) -> Entry {
    if dry_run {
        tracing::info!(%target, "would delete");
        return Entry::new(target, Outcome::WouldDelete);
    }

    match client.delete(&target.url) {
        Ok(Deleted::Removed) => {
            tracing::info!(%target, "deleted");
            Entry::new(target, Outcome::Deleted)
        }
        Ok(Deleted::AlreadyGone) => {
            tracing::info!(%target, "already gone");
            Entry::new(target, Outcome::AlreadyGone)
        }
        Err(error) => {
            tracing::warn!(%target, %error, "delete failed");
            Entry {
                error: Some(error.to_string()),
                ..Entry::new(target, Outcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::MemoryService;
    use crate::plan::{plan, ForcePolicy};
    use crate::resource::HierarchicalResource;
    use crate::tree::build_subtree;
    use pretty_assertions::assert_eq;

    fn outcomes(report: &ExecutionReport) -> Vec<(&str, Outcome)> {
        report
            .entries
            .iter()
            .map(|entry| (entry.target.name.as_str(), entry.outcome))
            .collect()
    }

    /// parent -> [child], child owns one parameter
    fn project_pair(service: &MemoryService) -> HierarchicalResource {
        let parent = service.add_project("parent", None);
        let child = service.add_project("child", Some(&parent));
        service.add_parameter(&child, "PORT");
        service.node(&parent.url).unwrap()
    }

    #[test]
    fn cascade_deletes_parameters_first() {
        let service = MemoryService::new();
        let root = project_pair(&service);
        let subtree = build_subtree(&service, root).unwrap();
        let plan = plan(&service, &subtree, ForcePolicy::Cascade).unwrap();

        let report = execute(&service, &plan, false);

        assert!(report.is_success());
        assert_eq!(
            outcomes(&report),
            vec![
                ("PORT", Outcome::Deleted),
                ("child", Outcome::Deleted),
                ("parent", Outcome::Deleted),
            ]
        );
        assert_eq!(service.deleted_names(), vec!["PORT", "child", "parent"]);
    }

    #[test]
    fn blocked_step_touches_nothing_of_its_own() {
        let service = MemoryService::new();
        let root = project_pair(&service);
        let subtree = build_subtree(&service, root).unwrap();
        let plan = plan(&service, &subtree, ForcePolicy::Refuse).unwrap();

        let report = execute(&service, &plan, false);

        assert!(report.entries.is_empty());
        assert_eq!(service.mutation_count(), 0);
        let Some(Error::BlockedByDependents { resource, dependents }) = report.error() else {
            panic!("expected a blocked report, got {:?}", report.status);
        };
        assert_eq!(resource.name, "child");
        assert_eq!(dependents[0].name, "PORT");
    }

    #[test]
    fn failures_do_not_stop_the_run() {
        let service = MemoryService::new();
        let root = service.add_environment("root", None);
        let first = service.add_environment("first", Some(&root));
        service.add_environment("second", Some(&root));
        service.fail_delete(&first.url);
        let subtree = build_subtree(&service, service.node(&root.url).unwrap()).unwrap();
        let plan = plan(&service, &subtree, ForcePolicy::Refuse).unwrap();

        let report = execute(&service, &plan, false);

        assert_eq!(
            outcomes(&report),
            vec![
                ("second", Outcome::Deleted),
                ("first", Outcome::Failed),
                ("root", Outcome::Failed),
            ]
        );
        assert_eq!(report.status, Status::Failed { failed: 2 });
        assert!(matches!(
            report.error(),
            Some(Error::PartialFailure {
                failed: 2,
                attempted: 3
            })
        ));
        assert!(report.failures().all(|entry| entry.error.is_some()));
    }

    #[test]
    fn already_gone_counts_as_success() {
        let service = MemoryService::new();
        let root = service.add_environment("root", None);
        let leaf = service.add_environment("leaf", Some(&root));
        let subtree = build_subtree(&service, service.node(&root.url).unwrap()).unwrap();
        let plan = plan(&service, &subtree, ForcePolicy::Refuse).unwrap();

        service.remove_out_of_band(&leaf.url);
        let report = execute(&service, &plan, false);

        assert!(report.is_success());
        assert_eq!(
            outcomes(&report),
            vec![("leaf", Outcome::AlreadyGone), ("root", Outcome::Deleted)]
        );
    }

    #[test]
    fn dry_run_matches_real_run() {
        let service = MemoryService::new();
        let root = project_pair(&service);
        let subtree = build_subtree(&service, root).unwrap();
        let plan = plan(&service, &subtree, ForcePolicy::Cascade).unwrap();

        let dry = execute(&service, &plan, true);
        assert_eq!(service.mutation_count(), 0);
        assert!(dry.entries.iter().all(|e| e.outcome == Outcome::WouldDelete));

        let real = execute(&service, &plan, false);
        let dry_targets: Vec<_> = dry.completed().collect();
        let real_targets: Vec<_> = real.completed().collect();
        assert_eq!(dry_targets, real_targets);
    }
}
