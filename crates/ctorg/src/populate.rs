//! test data
//!
//! Fills an organization with throwaway trees, the counterpart to the deletes. Generated
//! names carry a prefix per kind and a random suffix, so repeated runs never collide.
use crate::client::ResourceClient;
use crate::error::Error;
use crate::resource::{Hierarchy, HierarchicalResource, Kind, NewResource, ResourceRef};
use serde::Serialize;

pub const PARAMETER_PREFIX: &str = "param-testing_";

/// Shape of the trees to create
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Layout {
    /// Resources per parent
    pub count: usize,
    /// Extra levels below the first one
    pub levels: usize,
    /// Name of an existing resource to create below, top level when absent
    pub root: Option<String>,
}

/// Everything a populate run created, in creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Population {
    pub created: Vec<ResourceRef>,
}

pub fn generated_name(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().simple())
}

/// Creates `layout.count` resources, then `layout.count` children under each of them, and so
/// on for `layout.levels` more levels
///
/// Returns the created resources level by level.
#[tracing::instrument(level = "debug", skip(client))]
pub fn populate(
    client: &(impl ResourceClient + ?Sized),
    hierarchy: Hierarchy,
    layout: &Layout,
) -> Result<Vec<HierarchicalResource>, Error> {
    let root = match &layout.root {
        Some(name) => match client.get_by_name(hierarchy, name)? {
            Some(root) => Some(root),
            None => return Err(Error::not_found(hierarchy.into(), name)),
        },
        None => None,
    };

    let mut parents = vec![root];
    let mut created = vec![];

    for level in 0..=layout.levels {
        let mut next = Vec::with_capacity(parents.len() * layout.count);
        for parent in &parents {
            for _ in 0..layout.count {
                let attributes = NewResource::new(
                    generated_name(hierarchy.name_prefix()),
                    parent.as_ref().map(|parent| parent.url.clone()),
                );
                let resource = client.create(hierarchy, &attributes)?;
                tracing::info!(name = %resource.name, depth = level, "created {hierarchy}");
                next.push(resource);
            }
        }
        created.extend(next.iter().cloned());
        parents = next.into_iter().map(Some).collect();
    }

    Ok(created)
}

/// Creates `count` generated parameters in `project`
pub fn add_parameters(
    client: &(impl ResourceClient + ?Sized),
    project: &HierarchicalResource,
    count: usize,
) -> Result<Vec<ResourceRef>, Error> {
    let mut parameters = Vec::with_capacity(count);
    for _ in 0..count {
        let parameter = client.create_parameter(project, &generated_name(PARAMETER_PREFIX))?;
        tracing::info!(project = %project.name, name = %parameter.name, "created parameter");
        parameters.push(parameter);
    }
    Ok(parameters)
}

/// [add_parameters] for a project looked up by name
pub fn create_parameters(
    client: &(impl ResourceClient + ?Sized),
    project: &str,
    count: usize,
) -> Result<Vec<ResourceRef>, Error> {
    let Some(project) = client.get_by_name(Hierarchy::Project, project)? else {
        return Err(Error::not_found(Kind::Project, project));
    };
    add_parameters(client, &project, count)
}
