//! deleting one or many roots
//!
//! Every root gets its own discovery, plan and execution. A root that cannot be discovered or
//! planned is recorded as aborted, the next root is still attempted.
use crate::client::ResourceClient;
use crate::error::Error;
use crate::execute::{execute, ExecutionReport};
use crate::plan::{plan, ForcePolicy};
use crate::resource::{Hierarchy, HierarchicalResource, Kind, ResourceRef};
use crate::tree::{build_subtree, find_subtree, Subtree};
use serde::Serialize;

/// The environment every organization has, never deleted
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Roles that may look but not delete
pub const DENIED_ROLES: [&str; 2] = ["VIEWER", "CONTRIB"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Report(ExecutionReport),
    Aborted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub root: ResourceRef,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        match &self.outcome {
            ItemOutcome::Report(report) => report.is_success(),
            ItemOutcome::Aborted { .. } => false,
        }
    }

    /// Why this root did not complete
    pub fn reason(&self) -> Option<String> {
        match &self.outcome {
            ItemOutcome::Report(report) => report.error().map(|error| error.to_string()),
            ItemOutcome::Aborted { reason } => Some(reason.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn push(&mut self, root: ResourceRef, result: Result<ExecutionReport, Error>) {
        let outcome = match result {
            Ok(report) => ItemOutcome::Report(report),
            Err(error) => {
                tracing::warn!(%root, error = %error_chain(&error), "aborted");
                ItemOutcome::Aborted {
                    reason: error_chain(&error),
                }
            }
        };
        self.items.push(BatchItem { root, outcome });
    }

    /// True for an empty batch
    pub fn is_success(&self) -> bool {
        self.items.iter().all(BatchItem::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.iter().filter(|item| !item.is_success())
    }
}

/// `error` and all of its sources, joined with ": "
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Refuses users whose role only allows reading, or who have no role at all
pub fn ensure_can_delete(client: &(impl ResourceClient + ?Sized)) -> Result<(), Error> {
    let role = client.current_role()?.trim().to_uppercase();
    if role.is_empty() {
        return Err(Error::InsufficientRole("<none>".to_string()));
    }
    if DENIED_ROLES.contains(&role.as_str()) {
        return Err(Error::InsufficientRole(role));
    }
    tracing::debug!(%role, "role may delete");
    Ok(())
}

pub fn delete_subtree(
    client: &(impl ResourceClient + ?Sized),
    subtree: &Subtree,
    policy: ForcePolicy,
    dry_run: bool,
) -> Result<ExecutionReport, Error> {
    let plan = plan(client, subtree, policy)?;
    Ok(execute(client, &plan, dry_run))
}

/// Deletes the resource called `name` together with everything below it
pub fn delete_named(
    client: &(impl ResourceClient + ?Sized),
    hierarchy: Hierarchy,
    name: &str,
    policy: ForcePolicy,
    dry_run: bool,
) -> Result<ExecutionReport, Error> {
    if hierarchy == Hierarchy::Environment && name == DEFAULT_ENVIRONMENT {
        return Err(Error::Protected {
            kind: Kind::Environment,
            name: name.to_string(),
        });
    }

    let subtree = find_subtree(client, hierarchy, name)?;
    delete_subtree(client, &subtree, policy, dry_run)
}

/// Deletes every tree of `hierarchy`
///
/// Only the listing itself is fatal, everything after it is recorded per root.
#[tracing::instrument(level = "debug", skip(client))]
pub fn delete_all(
    client: &(impl ResourceClient + ?Sized),
    hierarchy: Hierarchy,
    policy: ForcePolicy,
    dry_run: bool,
) -> Result<BatchReport, Error> {
    let listing = client.list(hierarchy)?;
    let roots = roots(hierarchy, listing);
    tracing::info!(roots = roots.len(), "deleting all {hierarchy}s");

    let mut report = BatchReport::default();
    for root in roots {
        let root_ref = root.to_ref();
        let result = build_subtree(client, root)
            .and_then(|subtree| delete_subtree(client, &subtree, policy, dry_run));
        report.push(root_ref, result);
    }

    Ok(report)
}

/// Top-level resources in listing order
///
/// The default environment stays, its children take its place as roots at their own position
/// in the listing.
fn roots(hierarchy: Hierarchy, listing: Vec<HierarchicalResource>) -> Vec<HierarchicalResource> {
    let default = match hierarchy {
        Hierarchy::Environment => listing
            .iter()
            .find(|resource| resource.name == DEFAULT_ENVIRONMENT)
            .map(|default| default.url.clone()),
        Hierarchy::Project => None,
    };

    listing
        .into_iter()
        .filter(|resource| match (&default, &resource.parent_ref) {
            (Some(default), _) if resource.url == *default => false,
            (Some(default), Some(parent)) => parent == default,
            (_, parent) => parent.is_none(),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::execute::Status;
    use crate::memory::MemoryService;
    use pretty_assertions::assert_eq;

    fn root_names(report: &BatchReport) -> Vec<&str> {
        report.items.iter().map(|item| item.root.name.as_str()).collect()
    }

    #[test]
    fn default_environment_is_protected() {
        let service = MemoryService::new();
        service.add_environment(DEFAULT_ENVIRONMENT, None);

        let error = delete_named(
            &service,
            Hierarchy::Environment,
            DEFAULT_ENVIRONMENT,
            ForcePolicy::Cascade,
            false,
        )
        .unwrap_err();

        assert!(matches!(error, Error::Protected { .. }));
        assert_eq!(service.mutation_count(), 0);
    }

    #[test]
    fn named_delete_takes_the_subtree() {
        let service = MemoryService::new();
        let root = service.add_project("web", None);
        service.add_project("web-child", Some(&root));
        service.add_project("other", None);

        let report =
            delete_named(&service, Hierarchy::Project, "web", ForcePolicy::Refuse, false).unwrap();

        assert!(report.is_success());
        assert_eq!(service.deleted_names(), vec!["web-child", "web"]);
    }

    #[test]
    fn named_delete_of_missing_resource() {
        let service = MemoryService::new();
        let error =
            delete_named(&service, Hierarchy::Project, "nope", ForcePolicy::Refuse, false)
                .unwrap_err();
        assert_eq!(error.to_string(), "project \"nope\" not found");
    }

    #[test]
    fn environment_roots_skip_default() {
        let service = MemoryService::new();
        let default = service.add_environment(DEFAULT_ENVIRONMENT, None);
        let staging = service.add_environment("staging", Some(&default));
        service.add_environment("staging-eu", Some(&staging));
        service.add_environment("production", Some(&default));
        service.add_environment("orphan", None);

        let report =
            delete_all(&service, Hierarchy::Environment, ForcePolicy::Refuse, false).unwrap();

        assert!(report.is_success());
        assert_eq!(root_names(&report), vec!["staging", "production", "orphan"]);
        assert_eq!(
            service.deleted_names(),
            vec!["staging-eu", "staging", "production", "orphan"]
        );
        assert!(service.exists(&default.url));
    }

    #[test]
    fn default_children_keep_their_listing_position() {
        let service = MemoryService::new();
        let default = service.add_environment(DEFAULT_ENVIRONMENT, None);
        service.add_environment("orphan", None);
        let late = service.add_environment("late", Some(&default));
        let early = service.add_environment("early", Some(&default));
        service.set_children(&default.url, &[early.url.as_str(), late.url.as_str()]);

        let roots = roots(Hierarchy::Environment, service.list(Hierarchy::Environment).unwrap());
        let names: Vec<_> = roots.iter().map(|root| root.name.as_str()).collect();

        assert_eq!(names, vec!["orphan", "late", "early"]);
    }

    #[test]
    fn one_blocked_root_does_not_stop_the_rest() {
        let service = MemoryService::new();
        let first = service.add_project("first", None);
        service.add_parameter(&first, "TOKEN");
        service.add_project("second", None);

        let report = delete_all(&service, Hierarchy::Project, ForcePolicy::Refuse, false).unwrap();

        assert!(!report.is_success());
        assert_eq!(service.deleted_names(), vec!["second"]);
        let failures: Vec<_> = report.failures().map(|item| item.root.name.as_str()).collect();
        assert_eq!(failures, vec!["first"]);
        let ItemOutcome::Report(blocked) = &report.items[0].outcome else {
            panic!("expected a report");
        };
        assert!(matches!(blocked.status, Status::Blocked { .. }));
    }

    #[test]
    fn discovery_failure_is_recorded() {
        let service = MemoryService::new();
        let broken = service.add_project("broken", None);
        service.set_children(&broken.url, &["mem://projects/999/"]);
        service.add_project("fine", None);

        let report = delete_all(&service, Hierarchy::Project, ForcePolicy::Cascade, false).unwrap();

        assert!(matches!(
            report.items[0].outcome,
            ItemOutcome::Aborted { .. }
        ));
        assert!(report.items[0].reason().unwrap().contains("not found"));
        assert!(report.items[1].is_success());
        assert_eq!(service.deleted_names(), vec!["fine"]);
    }

    #[test]
    fn denied_roles() {
        let service = MemoryService::new();
        assert!(ensure_can_delete(&service).is_ok());

        service.set_role("contrib");
        let error = ensure_can_delete(&service).unwrap_err();
        assert_eq!(error.to_string(), "insufficient privileges for role CONTRIB");
    }

    #[test]
    fn missing_role_is_refused() {
        let service = MemoryService::new();
        service.set_role("");

        let error = ensure_can_delete(&service).unwrap_err();
        assert_eq!(error.to_string(), "insufficient privileges for role <none>");
    }

    #[test]
    fn chain_includes_sources() {
        let error = anyhow::anyhow!("inner").context("outer");
        assert_eq!(error_chain(&*error), "outer: inner");
    }
}
