//! [ResourceClient] over the service's REST api
//!
//! Every response is decoded into a record struct first. Only the fields the tree needs are
//! read, everything else the service returns is ignored.
use crate::client::{ClientError, Deleted, ResourceClient};
use crate::resource::{
    Hierarchy, HierarchicalResource, Integration, IntegrationService, Kind, NewResource,
    ResourceRef,
};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Per request timeout
pub const TIMEOUT: Duration = Duration::from_secs(300);

pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// `api_base_url` is the versioned root, e.g. `https://api.cloudtruth.io/api/v1`
    pub fn new(api_base_url: &str, api_key: &str) -> Result<Self, ClientError> {
        let mut auth = HeaderValue::from_str(&format!("Api-Key {api_key}"))
            .map_err(|_| ClientError::InvalidApiKey)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .timeout(TIMEOUT)
            .build()
            .map_err(|source| ClientError::Transport {
                url: api_base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url(api_base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<String, ClientError> {
        endpoint(&self.base_url, path)
    }

    fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, ClientError> {
        tracing::debug!(%method, url, "request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })
    }

    fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let response = self.send(method.clone(), url, body)?;
        let response = check(method, url, response)?;

        let text = response.text().map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;
        tracing::trace!(url, body = %text, "response");

        serde_json::from_str(&text).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Follows `next` links until the last page, a link back to a page already read is an error
    fn list_all<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, ClientError> {
        let mut results = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(url);

        while let Some(url) = next {
            if !seen.insert(url.clone()) {
                return Err(ClientError::PageLoop(url));
            }
            let page: Page<T> = self.request(Method::GET, &url, None)?;
            results.extend(page.results);
            next = page.next;
        }

        Ok(results)
    }

    fn get_node(
        &self,
        hierarchy: Hierarchy,
        url: &str,
    ) -> Result<HierarchicalResource, ClientError> {
        Ok(match hierarchy {
            Hierarchy::Project => self.request::<ProjectRecord>(Method::GET, url, None)?.into(),
            Hierarchy::Environment => {
                self.request::<EnvironmentRecord>(Method::GET, url, None)?.into()
            }
        })
    }

    fn integration_endpoint(
        &self,
        integration: &Integration,
        leaf: &str,
    ) -> Result<String, ClientError> {
        self.endpoint(&format!(
            "integrations/{}/{}/{leaf}/",
            integration.service.path(),
            integration.id
        ))
    }
}

impl ResourceClient for HttpClient {
    #[tracing::instrument(level = "debug", skip(self))]
    fn list(&self, hierarchy: Hierarchy) -> Result<Vec<HierarchicalResource>, ClientError> {
        let url = self.endpoint(hierarchy.collection())?;
        Ok(match hierarchy {
            Hierarchy::Project => self
                .list_all::<ProjectRecord>(url)?
                .into_iter()
                .map(Into::into)
                .collect(),
            Hierarchy::Environment => self
                .list_all::<EnvironmentRecord>(url)?
                .into_iter()
                .map(Into::into)
                .collect(),
        })
    }

    fn get_by_url(
        &self,
        hierarchy: Hierarchy,
        url: &str,
    ) -> Result<HierarchicalResource, ClientError> {
        self.get_node(hierarchy, url).map_err(|error| {
            if error.is_not_found() {
                ClientError::NotFound(url.to_string())
            } else {
                error
            }
        })
    }

    fn create(
        &self,
        hierarchy: Hierarchy,
        attributes: &NewResource,
    ) -> Result<HierarchicalResource, ClientError> {
        let url = self.endpoint(hierarchy.collection())?;
        let parent = attributes.parent.clone().unwrap_or_default();

        Ok(match hierarchy {
            Hierarchy::Project => {
                let body = json!({ "name": attributes.name, "depends_on": parent });
                self.request::<ProjectRecord>(Method::POST, &url, Some(&body))?
                    .into()
            }
            Hierarchy::Environment => {
                let body = json!({ "name": attributes.name, "parent": parent });
                self.request::<EnvironmentRecord>(Method::POST, &url, Some(&body))?
                    .into()
            }
        })
    }

    fn delete(&self, url: &str) -> Result<Deleted, ClientError> {
        let response = self.send(Method::DELETE, url, None)?;
        match check(Method::DELETE, url, response) {
            Ok(_) => Ok(Deleted::Removed),
            Err(error) if error.is_not_found() => Ok(Deleted::AlreadyGone),
            Err(error) => Err(error),
        }
    }

    fn list_parameters(
        &self,
        project: &HierarchicalResource,
    ) -> Result<Vec<ResourceRef>, ClientError> {
        let url = self.endpoint(&format!("projects/{}/parameters/", project.id))?;
        Ok(self
            .list_all::<NamedRecord>(url)?
            .into_iter()
            .map(|record| record.into_ref(Kind::Parameter))
            .collect())
    }

    fn create_parameter(
        &self,
        project: &HierarchicalResource,
        name: &str,
    ) -> Result<ResourceRef, ClientError> {
        let url = self.endpoint(&format!("projects/{}/parameters/", project.id))?;
        let body = json!({ "name": name });
        Ok(self
            .request::<NamedRecord>(Method::POST, &url, Some(&body))?
            .into_ref(Kind::Parameter))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn list_integrations(
        &self,
        service: IntegrationService,
    ) -> Result<Vec<Integration>, ClientError> {
        let url = self.endpoint(&format!("integrations/{}/", service.path()))?;
        Ok(self
            .list_all::<IntegrationRecord>(url)?
            .into_iter()
            .map(|record| Integration {
                id: record.id,
                name: record.name,
                url: record.url,
                service,
            })
            .collect())
    }

    fn list_pulls(&self, integration: &Integration) -> Result<Vec<ResourceRef>, ClientError> {
        let url = self.integration_endpoint(integration, "pulls")?;
        Ok(self
            .list_all::<NamedRecord>(url)?
            .into_iter()
            .map(|record| record.into_ref(Kind::Pull))
            .collect())
    }

    fn list_pushes(&self, integration: &Integration) -> Result<Vec<ResourceRef>, ClientError> {
        let url = self.integration_endpoint(integration, "pushes")?;
        Ok(self
            .list_all::<NamedRecord>(url)?
            .into_iter()
            .map(|record| record.into_ref(Kind::Push))
            .collect())
    }

    fn current_role(&self) -> Result<String, ClientError> {
        let url = self.endpoint("users/current/")?;
        let user: UserRecord = self.request(Method::GET, &url, None)?;
        Ok(user.role.unwrap_or_default())
    }
}

/// Turns non-2xx responses into [ClientError::Status]
fn check(method: Method, url: &str, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .ok()
        .map(|body| error_message(&body))
        .unwrap_or_default();

    Err(ClientError::Status {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        message,
    })
}

/// Picks `detail` out of an error body, falls back to the raw body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value["detail"]
            .as_str()
            .map(ToString::to_string)
            .unwrap_or_else(|| value.to_string()),
        Err(_) => body.trim().to_string(),
    }
}

/// Parses the base url and makes sure it ends with `/` so [Url::join] appends
fn base_url(api_base_url: &str) -> Result<Url, ClientError> {
    let mut url =
        Url::parse(api_base_url).map_err(|_| ClientError::InvalidUrl(api_base_url.to_string()))?;

    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(api_base_url.to_string()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn endpoint(base_url: &Url, path: &str) -> Result<String, ClientError> {
    base_url
        .join(path)
        .map(String::from)
        .map_err(|_| ClientError::InvalidUrl(format!("{base_url}{path}")))
}

#[derive(Deserialize, Debug)]
struct Page<T> {
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ProjectRecord {
    id: String,
    name: String,
    url: String,
    #[serde(default)]
    depends_on: Option<String>,
    #[serde(default)]
    dependents: Vec<String>,
}

impl From<ProjectRecord> for HierarchicalResource {
    fn from(record: ProjectRecord) -> Self {
        HierarchicalResource {
            id: record.id,
            name: record.name,
            url: record.url,
            hierarchy: Hierarchy::Project,
            parent_ref: record.depends_on.filter(|parent| !parent.is_empty()),
            child_refs: record.dependents,
        }
    }
}

#[derive(Deserialize, Debug)]
struct EnvironmentRecord {
    id: String,
    name: String,
    url: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    children: Vec<String>,
}

impl From<EnvironmentRecord> for HierarchicalResource {
    fn from(record: EnvironmentRecord) -> Self {
        HierarchicalResource {
            id: record.id,
            name: record.name,
            url: record.url,
            hierarchy: Hierarchy::Environment,
            parent_ref: record.parent.filter(|parent| !parent.is_empty()),
            child_refs: record.children,
        }
    }
}

#[derive(Deserialize, Debug)]
struct IntegrationRecord {
    id: String,
    name: String,
    url: String,
}

#[derive(Deserialize, Debug)]
struct NamedRecord {
    name: String,
    url: String,
}

impl NamedRecord {
    fn into_ref(self, kind: Kind) -> ResourceRef {
        ResourceRef::new(kind, self.name, self.url)
    }
}

#[derive(Deserialize, Debug)]
struct UserRecord {
    #[serde(default)]
    role: Option<String>,
}
