//! remote operations the engine is built on
//!
//! [ResourceClient] is the only way the tree and cascade code reaches the service.
//! [crate::http::HttpClient] talks to the real api, [crate::memory::MemoryService] keeps
//! an in-process forest for tests.
use crate::resource::{
    Hierarchy, HierarchicalResource, Integration, IntegrationService, NewResource, ResourceRef,
};

/// Result of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    Removed,
    /// The service answered "not found", somebody else was faster
    AlreadyGone,
}

pub trait ResourceClient {
    fn list(&self, hierarchy: Hierarchy) -> Result<Vec<HierarchicalResource>, ClientError>;

    fn get_by_url(
        &self,
        hierarchy: Hierarchy,
        url: &str,
    ) -> Result<HierarchicalResource, ClientError>;

    /// First exact name match of [ResourceClient::list]
    fn get_by_name(
        &self,
        hierarchy: Hierarchy,
        name: &str,
    ) -> Result<Option<HierarchicalResource>, ClientError> {
        Ok(self
            .list(hierarchy)?
            .into_iter()
            .find(|resource| resource.name == name))
    }

    fn create(
        &self,
        hierarchy: Hierarchy,
        attributes: &NewResource,
    ) -> Result<HierarchicalResource, ClientError>;

    fn delete(&self, url: &str) -> Result<Deleted, ClientError>;

    fn list_parameters(
        &self,
        project: &HierarchicalResource,
    ) -> Result<Vec<ResourceRef>, ClientError>;

    fn create_parameter(
        &self,
        project: &HierarchicalResource,
        name: &str,
    ) -> Result<ResourceRef, ClientError>;

    fn list_integrations(
        &self,
        service: IntegrationService,
    ) -> Result<Vec<Integration>, ClientError>;

    fn list_pulls(&self, integration: &Integration) -> Result<Vec<ResourceRef>, ClientError>;

    fn list_pushes(&self, integration: &Integration) -> Result<Vec<ResourceRef>, ClientError>;

    /// Role of the user the api key belongs to
    fn current_role(&self) -> Result<String, ClientError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{method} {url} failed with {status}: {message}")]
    Status {
        method: String,
        url: String,
        status: u16,
        message: String,
    },
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("listing loops back to {0}")]
    PageLoop(String),
    #[error("invalid url {0}")]
    InvalidUrl(String),
    #[error("api key is not a valid header value")]
    InvalidApiKey,
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::NotFound(_) => true,
            ClientError::Status { status, .. } => *status == 404,
            _ => false,
        }
    }
}
