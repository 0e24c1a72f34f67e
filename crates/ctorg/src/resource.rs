//! resource snapshots
//!
//! Everything in here is a value copied out of a remote response. Nothing is cached and
//! nothing outlives the command that fetched it.
//!
//! Identity is always the `url` the service assigned. `id` is only used where the service
//! builds nested endpoints from it (parameters, pulls, pushes).
use serde::{Deserialize, Serialize};

/// What a [ResourceRef] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Project,
    Environment,
    Integration,
    Parameter,
    Pull,
    Push,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Project => f.write_str("project"),
            Kind::Environment => f.write_str("environment"),
            Kind::Integration => f.write_str("integration"),
            Kind::Parameter => f.write_str("parameter"),
            Kind::Pull => f.write_str("pull"),
            Kind::Push => f.write_str("push"),
        }
    }
}

/// Resource kinds that nest into trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hierarchy {
    Project,
    Environment,
}

impl Hierarchy {
    /// Collection path below the api base url
    pub fn collection(&self) -> &'static str {
        match self {
            Hierarchy::Project => "projects/",
            Hierarchy::Environment => "environments/",
        }
    }

    /// Prefix for generated names
    pub fn name_prefix(&self) -> &'static str {
        match self {
            Hierarchy::Project => "proj-testing_",
            Hierarchy::Environment => "env-testing_",
        }
    }
}

impl From<Hierarchy> for Kind {
    fn from(value: Hierarchy) -> Self {
        match value {
            Hierarchy::Project => Kind::Project,
            Hierarchy::Environment => Kind::Environment,
        }
    }
}

impl std::fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Kind::from(*self).fmt(f)
    }
}

/// Name and address of anything the engine may delete
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceRef {
    pub kind: Kind,
    pub name: String,
    pub url: String,
}

impl ResourceRef {
    pub fn new(kind: Kind, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            url: url.into(),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.kind, self.name)
    }
}

/// A project or environment together with its tree pointers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchicalResource {
    pub id: String,
    pub name: String,
    pub url: String,
    pub hierarchy: Hierarchy,
    /// url of the declared parent
    pub parent_ref: Option<String>,
    /// urls of the direct dependents, in remote order
    pub child_refs: Vec<String>,
}

impl HierarchicalResource {
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(self.hierarchy.into(), &self.name, &self.url)
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_ref.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.child_refs.is_empty()
    }
}

/// Services an integration can connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationService {
    Aws,
    AzureKeyVault,
    Github,
}

impl IntegrationService {
    /// In listing order
    pub const ALL: [IntegrationService; 3] = [
        IntegrationService::Aws,
        IntegrationService::AzureKeyVault,
        IntegrationService::Github,
    ];

    /// Path segment(s) below `integrations/`
    pub fn path(&self) -> &'static str {
        match self {
            IntegrationService::Aws => "aws",
            IntegrationService::AzureKeyVault => "azure/key_vault",
            IntegrationService::Github => "github",
        }
    }
}

impl std::fmt::Display for IntegrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Integration {
    pub id: String,
    pub name: String,
    pub url: String,
    pub service: IntegrationService,
}

impl Integration {
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(Kind::Integration, &self.name, &self.url)
    }
}

/// Attributes for creating a project or environment
#[derive(Debug, Clone, derive_new::new)]
pub struct NewResource {
    pub name: String,
    /// url of the parent, top level when absent
    pub parent: Option<String>,
}
