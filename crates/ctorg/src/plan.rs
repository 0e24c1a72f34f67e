//! deletion planning
//!
//! A [DeletionPlan] is a subtree turned around: leaves first, the root last. Every step also
//! carries the sub-resources that have to go before the step's resource can go, and whether
//! the force policy lets that happen at all.
use crate::client::ResourceClient;
use crate::error::Error;
use crate::resource::{Hierarchy, ResourceRef};
use crate::tree::Subtree;
use serde::Serialize;

/// What to do with resources that still own sub-resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcePolicy {
    /// Stop before a resource that owns sub-resources
    Refuse,
    /// Delete sub-resources first, then the resource
    Cascade,
}

impl From<bool> for ForcePolicy {
    fn from(force: bool) -> Self {
        if force {
            ForcePolicy::Cascade
        } else {
            ForcePolicy::Refuse
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub resource: ResourceRef,
    /// Deleted before `resource`
    pub cascade: Vec<ResourceRef>,
    /// Execution stops here
    pub blocked: bool,
}

impl Step {
    pub fn new(resource: ResourceRef, cascade: Vec<ResourceRef>, policy: ForcePolicy) -> Self {
        let blocked = policy == ForcePolicy::Refuse && !cascade.is_empty();
        Self {
            resource,
            cascade,
            blocked,
        }
    }

    /// Cascade targets followed by the resource itself
    pub fn targets(&self) -> impl Iterator<Item = &ResourceRef> {
        self.cascade.iter().chain(std::iter::once(&self.resource))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionPlan {
    pub root: ResourceRef,
    pub policy: ForcePolicy,
    /// In execution order
    pub steps: Vec<Step>,
}

impl DeletionPlan {
    pub fn first_blocked(&self) -> Option<&Step> {
        self.steps.iter().find(|step| step.blocked)
    }

    /// Everything the plan deletes, in order, when no gate trips
    pub fn targets(&self) -> impl Iterator<Item = &ResourceRef> {
        self.steps.iter().flat_map(|step| step.targets())
    }
}

/// Orders `subtree` for deletion and collects each node's cascade targets
///
/// Reads parameters of every project in the subtree, never writes.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(root = tracing::field::Empty, policy = ?policy)
)]
pub fn plan(
    client: &(impl ResourceClient + ?Sized),
    subtree: &Subtree,
    policy: ForcePolicy,
) -> Result<DeletionPlan, Error> {
    let Some(root) = subtree.root() else {
        return Err(Error::NotFound("subtree root".to_string()));
    };
    tracing::Span::current().record("root", root.name.as_str());

    let mut steps = Vec::with_capacity(subtree.len());
    for resource in subtree.deletion_order() {
        let cascade = match resource.hierarchy {
            Hierarchy::Project => client.list_parameters(resource)?,
            Hierarchy::Environment => vec![],
        };

        let step = Step::new(resource.to_ref(), cascade, policy);
        if step.blocked {
            tracing::warn!(
                resource = %step.resource,
                dependents = step.cascade.len(),
                "deletion will be refused without force"
            );
        }
        steps.push(step);
    }

    Ok(DeletionPlan {
        root: root.to_ref(),
        policy,
        steps,
    })
}
