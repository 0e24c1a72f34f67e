//! in-memory [ResourceClient]
//!
//! Behaves like the service for everything the engine relies on: parents learn about new
//! children, deleting a node unlinks it from its parent, a node with children left cannot
//! be deleted (409) and deleting something unknown answers "not found".
//!
//! Every call is recorded so tests can assert on exactly what was read and written.
use crate::client::{ClientError, Deleted, ResourceClient};
use crate::resource::{
    Hierarchy, HierarchicalResource, Integration, IntegrationService, Kind, NewResource,
    ResourceRef,
};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashSet;

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(Hierarchy),
    Get(String),
    Create(String),
    Delete(String),
    ListParameters(String),
    CreateParameter(String),
    ListIntegrations(IntegrationService),
    ListPulls(String),
    ListPushes(String),
    CurrentRole,
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Create(_) | Call::Delete(_) | Call::CreateParameter(_)
        )
    }
}

#[derive(Debug, Default)]
pub struct MemoryService {
    state: RefCell<State>,
}

#[derive(Debug)]
struct State {
    next_id: u64,
    nodes: IndexMap<String, HierarchicalResource>,
    /// keyed by owner url (project or integration)
    sub_resources: IndexMap<String, Vec<ResourceRef>>,
    integrations: Vec<Integration>,
    failing_deletes: HashSet<String>,
    failing_listings: HashSet<String>,
    role: String,
    calls: Vec<Call>,
    deleted: Vec<ResourceRef>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_id: 1,
            nodes: Default::default(),
            sub_resources: Default::default(),
            integrations: Default::default(),
            failing_deletes: Default::default(),
            failing_listings: Default::default(),
            role: "OWNER".to_string(),
            calls: Default::default(),
            deleted: Default::default(),
        }
    }
}

impl State {
    fn url(&mut self, collection: &str) -> (String, String) {
        let id = self.next_id.to_string();
        self.next_id += 1;
        (id.clone(), format!("mem://{collection}{id}/"))
    }

    fn insert_node(
        &mut self,
        hierarchy: Hierarchy,
        name: &str,
        parent: Option<&str>,
    ) -> HierarchicalResource {
        let (id, url) = self.url(hierarchy.collection());
        let node = HierarchicalResource {
            id,
            name: name.to_string(),
            url: url.clone(),
            hierarchy,
            parent_ref: parent.map(ToString::to_string),
            child_refs: vec![],
        };

        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(parent)) {
            parent.child_refs.push(url.clone());
        }

        self.nodes.insert(url, node.clone());
        node
    }

    fn insert_sub_resource(
        &mut self,
        owner: &str,
        kind: Kind,
        collection: &str,
        name: &str,
    ) -> ResourceRef {
        let (_, url) = self.url(collection);
        let sub_resource = ResourceRef::new(kind, name, url);
        self.sub_resources
            .entry(owner.to_string())
            .or_default()
            .push(sub_resource.clone());
        sub_resource
    }

    fn sub_resources_of(&self, owner: &str, kind: Kind) -> Vec<ResourceRef> {
        self.sub_resources
            .get(owner)
            .map(|refs| refs.iter().filter(|r| r.kind == kind).cloned().collect())
            .unwrap_or_default()
    }

    fn check_listing(&self, owner: &str) -> Result<(), ClientError> {
        if self.failing_listings.contains(owner) {
            return Err(ClientError::Status {
                method: "GET".into(),
                url: owner.to_string(),
                status: 500,
                message: "listing failed".into(),
            });
        }
        Ok(())
    }

    /// Removes whatever lives at `url`, returns what was removed
    fn remove(&mut self, url: &str) -> Option<ResourceRef> {
        if let Some(node) = self.nodes.shift_remove(url) {
            if let Some(parent) = node
                .parent_ref
                .as_deref()
                .and_then(|parent| self.nodes.get_mut(parent))
            {
                parent.child_refs.retain(|child| child != url);
            }
            return Some(node.to_ref());
        }

        if let Some(position) = self.integrations.iter().position(|i| i.url == url) {
            return Some(self.integrations.remove(position).to_ref());
        }

        for refs in self.sub_resources.values_mut() {
            if let Some(position) = refs.iter().position(|r| r.url == url) {
                return Some(refs.remove(position));
            }
        }

        None
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(
        &self,
        name: &str,
        parent: Option<&HierarchicalResource>,
    ) -> HierarchicalResource {
        self.state.borrow_mut().insert_node(
            Hierarchy::Project,
            name,
            parent.map(|parent| parent.url.as_str()),
        )
    }

    pub fn add_environment(
        &self,
        name: &str,
        parent: Option<&HierarchicalResource>,
    ) -> HierarchicalResource {
        self.state.borrow_mut().insert_node(
            Hierarchy::Environment,
            name,
            parent.map(|parent| parent.url.as_str()),
        )
    }

    pub fn add_parameter(&self, project: &HierarchicalResource, name: &str) -> ResourceRef {
        let collection = format!("projects/{}/parameters/", project.id);
        self.state
            .borrow_mut()
            .insert_sub_resource(&project.url, Kind::Parameter, &collection, name)
    }

    pub fn add_integration(&self, name: &str, service: IntegrationService) -> Integration {
        let mut state = self.state.borrow_mut();
        let (id, url) = state.url(&format!("integrations/{}/", service.path()));
        let integration = Integration {
            id,
            name: name.to_string(),
            url,
            service,
        };
        state.integrations.push(integration.clone());
        integration
    }

    pub fn add_pull(&self, integration: &Integration, name: &str) -> ResourceRef {
        let collection = format!("integrations/{}/pulls/", integration.id);
        self.state
            .borrow_mut()
            .insert_sub_resource(&integration.url, Kind::Pull, &collection, name)
    }

    pub fn add_push(&self, integration: &Integration, name: &str) -> ResourceRef {
        let collection = format!("integrations/{}/pushes/", integration.id);
        self.state
            .borrow_mut()
            .insert_sub_resource(&integration.url, Kind::Push, &collection, name)
    }

    /// Makes every delete of `url` answer 500
    pub fn fail_delete(&self, url: &str) {
        self.state.borrow_mut().failing_deletes.insert(url.to_string());
    }

    /// Makes listing sub-resources of `owner` answer 500
    pub fn fail_listing(&self, owner: &str) {
        self.state.borrow_mut().failing_listings.insert(owner.to_string());
    }

    pub fn set_role(&self, role: &str) {
        self.state.borrow_mut().role = role.to_string();
    }

    /// Removes a resource behind the engine's back
    pub fn remove_out_of_band(&self, url: &str) {
        self.state.borrow_mut().remove(url);
    }

    /// Overwrites the child pointers of a node, for building broken trees
    pub fn set_children(&self, url: &str, children: &[&str]) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(url) {
            node.child_refs = children.iter().map(ToString::to_string).collect();
        }
    }

    pub fn exists(&self, url: &str) -> bool {
        let state = self.state.borrow();
        state.nodes.contains_key(url)
            || state.integrations.iter().any(|i| i.url == url)
            || state
                .sub_resources
                .values()
                .any(|refs| refs.iter().any(|r| r.url == url))
    }

    pub fn node(&self, url: &str) -> Option<HierarchicalResource> {
        self.state.borrow().nodes.get(url).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    /// Names of everything deleted through [ResourceClient::delete], in order
    pub fn deleted_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .deleted
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl ResourceClient for MemoryService {
    fn list(&self, hierarchy: Hierarchy) -> Result<Vec<HierarchicalResource>, ClientError> {
        self.record(Call::List(hierarchy));
        Ok(self
            .state
            .borrow()
            .nodes
            .values()
            .filter(|node| node.hierarchy == hierarchy)
            .cloned()
            .collect())
    }

    fn get_by_url(
        &self,
        hierarchy: Hierarchy,
        url: &str,
    ) -> Result<HierarchicalResource, ClientError> {
        self.record(Call::Get(url.to_string()));
        self.state
            .borrow()
            .nodes
            .get(url)
            .filter(|node| node.hierarchy == hierarchy)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(url.to_string()))
    }

    fn create(
        &self,
        hierarchy: Hierarchy,
        attributes: &NewResource,
    ) -> Result<HierarchicalResource, ClientError> {
        self.record(Call::Create(attributes.name.clone()));
        let mut state = self.state.borrow_mut();

        if let Some(parent) = &attributes.parent {
            if !state.nodes.contains_key(parent) {
                return Err(ClientError::Status {
                    method: "POST".into(),
                    url: hierarchy.collection().into(),
                    status: 400,
                    message: format!("unknown parent {parent}"),
                });
            }
        }

        Ok(state.insert_node(hierarchy, &attributes.name, attributes.parent.as_deref()))
    }

    fn delete(&self, url: &str) -> Result<Deleted, ClientError> {
        self.record(Call::Delete(url.to_string()));
        let mut state = self.state.borrow_mut();

        if state.failing_deletes.contains(url) {
            return Err(ClientError::Status {
                method: "DELETE".into(),
                url: url.to_string(),
                status: 500,
                message: "internal server error".into(),
            });
        }

        if state.nodes.get(url).is_some_and(|node| !node.is_leaf()) {
            return Err(ClientError::Status {
                method: "DELETE".into(),
                url: url.to_string(),
                status: 409,
                message: "resource has dependents".into(),
            });
        }

        match state.remove(url) {
            Some(removed) => {
                state.deleted.push(removed);
                Ok(Deleted::Removed)
            }
            None => Ok(Deleted::AlreadyGone),
        }
    }

    fn list_parameters(
        &self,
        project: &HierarchicalResource,
    ) -> Result<Vec<ResourceRef>, ClientError> {
        self.record(Call::ListParameters(project.url.clone()));
        let state = self.state.borrow();
        state.check_listing(&project.url)?;
        Ok(state.sub_resources_of(&project.url, Kind::Parameter))
    }

    fn create_parameter(
        &self,
        project: &HierarchicalResource,
        name: &str,
    ) -> Result<ResourceRef, ClientError> {
        self.record(Call::CreateParameter(name.to_string()));
        if !self.state.borrow().nodes.contains_key(&project.url) {
            return Err(ClientError::NotFound(project.url.clone()));
        }
        Ok(self.add_parameter(project, name))
    }

    fn list_integrations(
        &self,
        service: IntegrationService,
    ) -> Result<Vec<Integration>, ClientError> {
        self.record(Call::ListIntegrations(service));
        Ok(self
            .state
            .borrow()
            .integrations
            .iter()
            .filter(|integration| integration.service == service)
            .cloned()
            .collect())
    }

    fn list_pulls(&self, integration: &Integration) -> Result<Vec<ResourceRef>, ClientError> {
        self.record(Call::ListPulls(integration.url.clone()));
        let state = self.state.borrow();
        state.check_listing(&integration.url)?;
        Ok(state.sub_resources_of(&integration.url, Kind::Pull))
    }

    fn list_pushes(&self, integration: &Integration) -> Result<Vec<ResourceRef>, ClientError> {
        self.record(Call::ListPushes(integration.url.clone()));
        let state = self.state.borrow();
        state.check_listing(&integration.url)?;
        Ok(state.sub_resources_of(&integration.url, Kind::Push))
    }

    fn current_role(&self) -> Result<String, ClientError> {
        self.record(Call::CurrentRole);
        Ok(self.state.borrow().role.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parents_track_children() {
        let service = MemoryService::new();
        let parent = service.add_project("parent", None);
        let child = service.add_project("child", Some(&parent));

        let parent = service.node(&parent.url).unwrap();
        assert_eq!(parent.child_refs, vec![child.url.clone()]);
        assert_eq!(child.parent_ref.as_deref(), Some(parent.url.as_str()));
    }

    #[test]
    fn delete_unlinks_and_is_idempotent() {
        let service = MemoryService::new();
        let parent = service.add_project("parent", None);
        let child = service.add_project("child", Some(&parent));

        assert_eq!(service.delete(&child.url).unwrap(), Deleted::Removed);
        assert!(service.node(&parent.url).unwrap().is_leaf());
        assert_eq!(service.delete(&child.url).unwrap(), Deleted::AlreadyGone);
        assert_eq!(service.deleted_names(), vec!["child".to_string()]);
    }

    #[test]
    fn delete_with_children_conflicts() {
        let service = MemoryService::new();
        let parent = service.add_environment("parent", None);
        service.add_environment("child", Some(&parent));

        let error = service.delete(&parent.url).unwrap_err();
        assert!(matches!(error, ClientError::Status { status: 409, .. }));
        assert!(service.exists(&parent.url));
    }

    #[test]
    fn get_by_name_uses_listing() {
        let service = MemoryService::new();
        service.add_project("one", None);
        let two = service.add_project("two", None);

        let found = service.get_by_name(Hierarchy::Project, "two").unwrap();
        assert_eq!(found, Some(two));
        assert_eq!(service.get_by_name(Hierarchy::Environment, "two").unwrap(), None);
    }
}
